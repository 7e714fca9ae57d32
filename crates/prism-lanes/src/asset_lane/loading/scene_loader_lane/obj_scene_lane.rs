// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Defines a lane for loading Wavefront OBJ scenes and their MTL libraries.

use std::error::Error;
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

use prism_core::math::{Vec2, Vec3, Vec4};
use prism_core::scene::{
    ImportedScene, PrimitiveKind, SceneMaterial, SceneMesh, SceneNode, TextureType, ROOT_NODE,
};

use super::ResourceResolver;
use crate::asset_lane::{AssetLoaderLane, ImportError};

const FORMAT: &str = "OBJ";

/// Lane for loading OBJ scenes. Polygons are always triangulated.
#[derive(Clone)]
pub struct ObjSceneLane {
    resolver: Arc<dyn ResourceResolver>,
}

impl ObjSceneLane {
    /// Creates a lane resolving `mtllib` references through `resolver`.
    pub fn new(resolver: Arc<dyn ResourceResolver>) -> Self {
        Self { resolver }
    }

    /// Parses an OBJ file held in memory.
    ///
    /// A missing or broken material library is not fatal: the meshes are kept
    /// and only the materials are lost.
    pub fn import_bytes(&self, bytes: &[u8]) -> Result<ImportedScene, ImportError> {
        let (models, materials) = tobj::load_obj_buf(
            &mut Cursor::new(bytes),
            &tobj::LoadOptions {
                triangulate: true,
                single_index: true,
                ..Default::default()
            },
            |path| self.load_material_library(path),
        )
        .map_err(|e| ImportError::Parse {
            format: FORMAT,
            message: e.to_string(),
        })?;

        let mut scene = ImportedScene::new(String::new(), "root");
        scene.materials = match materials {
            Ok(materials) => materials.iter().map(convert_material).collect(),
            Err(e) => {
                log::warn!("OBJ material library could not be loaded: {e}");
                Vec::new()
            }
        };

        for model in &models {
            let mesh = convert_mesh(model, scene.materials.len())?;
            let mesh_index = scene.meshes.len();
            scene.meshes.push(mesh);

            let mut node = SceneNode::new(model.name.clone());
            node.meshes.push(mesh_index);
            scene.add_child_node(ROOT_NODE, node);
        }

        log::debug!(
            "ObjSceneLane: parsed {} meshes, {} materials",
            scene.meshes.len(),
            scene.materials.len()
        );
        Ok(scene)
    }

    fn load_material_library(&self, path: &Path) -> tobj::MTLLoadResult {
        let uri = path.to_string_lossy();
        let bytes = self.resolver.resolve_material_library(&uri).map_err(|e| {
            log::warn!("{e}");
            tobj::LoadError::OpenFileFailed
        })?;
        tobj::load_mtl_buf(&mut Cursor::new(bytes))
    }
}

impl AssetLoaderLane<ImportedScene> for ObjSceneLane {
    fn load(&self, bytes: &[u8]) -> Result<ImportedScene, Box<dyn Error + Send + Sync>> {
        self.import_bytes(bytes).map_err(Into::into)
    }
}

fn convert_mesh(model: &tobj::Model, material_count: usize) -> Result<SceneMesh, ImportError> {
    let mesh = &model.mesh;
    if mesh.positions.is_empty() {
        return Err(ImportError::MissingData(format!(
            "OBJ object '{}' has no vertices",
            model.name
        )));
    }

    let positions: Vec<Vec3> = mesh.positions.chunks_exact(3).map(Vec3::from_slice).collect();
    let normals = (!mesh.normals.is_empty())
        .then(|| mesh.normals.chunks_exact(3).map(Vec3::from_slice).collect());
    let tex_coords = (!mesh.texcoords.is_empty())
        .then(|| mesh.texcoords.chunks_exact(2).map(Vec2::from_slice).collect());
    let colors = (!mesh.vertex_color.is_empty()).then(|| {
        mesh.vertex_color
            .chunks_exact(3)
            .map(|c| Vec4::new(c[0], c[1], c[2], 1.0))
            .collect()
    });

    let material_index = mesh.material_id.filter(|&id| {
        let known = id < material_count;
        if !known {
            log::warn!("OBJ object '{}' uses unknown material {id}", model.name);
        }
        known
    });

    let mut converted = SceneMesh {
        name: model.name.clone(),
        primitive: PrimitiveKind::Triangles,
        positions,
        normals,
        tex_coords: [tex_coords, None, None],
        colors,
        indices: mesh.indices.clone(),
        material_index,
        ..Default::default()
    };
    // Faces may mix `v/vt/vn` and `v//vn`, leaving some channels short.
    converted.drop_incomplete_channels();
    Ok(converted)
}

fn convert_material(material: &tobj::Material) -> SceneMaterial {
    let rgb = |c: [f32; 3]| Vec3::from_array(c);
    let mut converted = SceneMaterial {
        name: material.name.clone(),
        ambient_color: material.ambient.map(rgb),
        diffuse_color: material.diffuse.map(|c| rgb(c).extend(1.0)),
        specular_color: material.specular.map(|c| rgb(c).extend(1.0)),
        shininess: material.shininess,
        opacity: material.dissolve,
        refraction: material.optical_density,
        ..Default::default()
    };

    let textures = [
        (TextureType::Ambient, &material.ambient_texture),
        (TextureType::Diffuse, &material.diffuse_texture),
        (TextureType::Specular, &material.specular_texture),
        (TextureType::Height, &material.normal_texture),
        (TextureType::Shininess, &material.shininess_texture),
        (TextureType::Opacity, &material.dissolve_texture),
    ];
    for (texture_type, name) in textures {
        if let Some(name) = name {
            converted.add_texture(texture_type, texture_file_name(name));
        }
    }

    for (key, value) in &material.unknown_param {
        match key.as_str() {
            "Ke" => converted.emissive_color = parse_rgb(value),
            "map_Ke" => converted.add_texture(TextureType::Emissive, texture_file_name(value)),
            "norm" | "map_Kn" => {
                converted.add_texture(TextureType::Normals, texture_file_name(value))
            }
            "disp" => converted.add_texture(TextureType::Displacement, texture_file_name(value)),
            "refl" => converted.add_texture(TextureType::Reflection, texture_file_name(value)),
            _ => log::trace!("Ignoring MTL statement '{key}' in '{}'", material.name),
        }
    }
    converted
}

/// Strips texture options such as `-bm 0.5` and keeps the file name.
fn texture_file_name(statement: &str) -> String {
    statement
        .split_whitespace()
        .last()
        .unwrap_or_default()
        .to_string()
}

fn parse_rgb(value: &str) -> Option<Vec3> {
    let channels: Vec<f32> = value
        .split_whitespace()
        .map(str::parse)
        .collect::<Result<_, _>>()
        .ok()?;
    match channels.as_slice() {
        [r, g, b] => Some(Vec3::new(*r, *g, *b)),
        [gray] => Some(Vec3::splat(*gray)),
        _ => None,
    }
}
