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

//! glTF 2.0 scene lane with support for both embedded and external buffers.
//!
//! Every primitive becomes its own [`SceneMesh`]; nodes referencing a glTF mesh get
//! all of its primitives. The scene's top-level nodes hang below a synthetic root.

use std::error::Error;
use std::ops::Range;
use std::sync::Arc;

use ahash::AHashMap;
use base64::Engine;
use gltf::animation::util::ReadOutputs;
use gltf::{mesh::Reader, Buffer};
use prism_core::math::{Mat4, Quat, Vec2, Vec3, Vec4};
use prism_core::scene::{
    Bone, ImportedScene, MorphWeightKey, NodeAnimationChannel, PrimitiveKind, RotationKey,
    SceneAnimation, SceneMaterial, SceneMesh, SceneNode, TextureType, VectorKey, VertexWeight,
    MAX_TEX_COORD_SETS, ROOT_NODE,
};

use super::ResourceResolver;
use crate::asset_lane::{AssetLoaderLane, ImportError};

const FORMAT: &str = "glTF";

/// Animation key times are stored in milliseconds.
pub const GLTF_TICKS_PER_SECOND: f64 = 1000.0;

/// Lane for loading glTF scenes, configured with a resource resolver.
#[derive(Clone)]
pub struct GltfSceneLane {
    resolver: Arc<dyn ResourceResolver>,
}

impl GltfSceneLane {
    /// Creates a new glTF lane with the given resource resolver.
    pub fn new(resolver: Arc<dyn ResourceResolver>) -> Self {
        Self { resolver }
    }

    /// Parses a `.gltf` or `.glb` file held in memory.
    pub fn import_bytes(&self, bytes: &[u8]) -> Result<ImportedScene, ImportError> {
        let gltf = gltf::Gltf::from_slice(bytes).map_err(|e| ImportError::Parse {
            format: FORMAT,
            message: e.to_string(),
        })?;
        let buffer_data = self.load_buffer_data(&gltf)?;
        let get_buffer_data =
            |buffer: Buffer<'_>| buffer_data.get(buffer.index()).map(Vec::as_slice);

        let document = &gltf.document;
        let gltf_scene = document
            .default_scene()
            .or_else(|| document.scenes().next());
        let root_name = gltf_scene
            .as_ref()
            .and_then(|s| s.name())
            .unwrap_or("root");
        let mut scene = ImportedScene::new(String::new(), root_name);

        scene.materials = document
            .materials()
            .map(|material| convert_material(&material))
            .collect();

        let skins_by_mesh = skins_by_mesh(document);
        let mut default_material = None;
        let mut primitive_ranges: Vec<Range<usize>> = Vec::with_capacity(document.meshes().len());
        for mesh in document.meshes() {
            let start = scene.meshes.len();
            let mesh_name = mesh
                .name()
                .map(str::to_string)
                .unwrap_or_else(|| format!("mesh_{}", mesh.index()));
            for primitive in mesh.primitives() {
                let mut scene_mesh = self.convert_primitive(
                    &mesh_name,
                    &primitive,
                    skins_by_mesh.get(&mesh.index()),
                    get_buffer_data,
                )?;
                if scene_mesh.material_index.is_none() {
                    let index = *default_material.get_or_insert_with(|| {
                        scene.materials.push(SceneMaterial {
                            name: "default".to_string(),
                            diffuse_color: Some(Vec4::ONE),
                            ..Default::default()
                        });
                        scene.materials.len() - 1
                    });
                    scene_mesh.material_index = Some(index);
                }
                scene.meshes.push(scene_mesh);
            }
            primitive_ranges.push(start..scene.meshes.len());
        }

        if let Some(gltf_scene) = gltf_scene {
            for node in gltf_scene.nodes() {
                add_node(&mut scene, ROOT_NODE, &node, &primitive_ranges);
            }
        } else {
            log::warn!("glTF file has no scene; meshes are not attached to any node");
        }

        scene.animations = document
            .animations()
            .map(|animation| convert_animation(&animation, get_buffer_data))
            .collect();

        log::debug!(
            "GltfSceneLane: parsed {} nodes, {} meshes, {} materials, {} animations",
            scene.nodes.len(),
            scene.meshes.len(),
            scene.materials.len(),
            scene.animations.len()
        );
        Ok(scene)
    }

    fn load_buffer_data(&self, gltf: &gltf::Gltf) -> Result<Vec<Vec<u8>>, ImportError> {
        let mut buffer_data = Vec::new();
        for buffer in gltf.buffers() {
            match buffer.source() {
                gltf::buffer::Source::Bin => {
                    let blob = gltf.blob.as_deref().ok_or_else(|| {
                        ImportError::MissingData(
                            "GLB file references binary chunk but it is missing".to_string(),
                        )
                    })?;
                    buffer_data.push(blob.to_vec());
                }
                gltf::buffer::Source::Uri(uri) if uri.starts_with("data:") => {
                    buffer_data.push(decode_data_uri(uri)?);
                }
                gltf::buffer::Source::Uri(uri) => {
                    buffer_data.push(self.resolver.resolve_buffer(uri)?);
                }
            }
        }
        Ok(buffer_data)
    }

    fn convert_primitive<'s, F>(
        &self,
        mesh_name: &str,
        primitive: &gltf::Primitive<'_>,
        skin: Option<&gltf::Skin<'_>>,
        get_buffer_data: F,
    ) -> Result<SceneMesh, ImportError>
    where
        F: Clone + Fn(Buffer<'_>) -> Option<&'s [u8]>,
    {
        let reader = primitive.reader(get_buffer_data.clone());

        let positions = extract_positions(&reader).ok_or_else(|| {
            ImportError::MissingData(format!(
                "primitive {} of mesh '{mesh_name}' has no positions",
                primitive.index()
            ))
        })?;
        let normals = extract_normals(&reader);

        let mut tex_coords: [Option<Vec<Vec2>>; MAX_TEX_COORD_SETS] = Default::default();
        for (set, slot) in tex_coords.iter_mut().enumerate() {
            *slot = extract_tex_coords(&reader, set as u32);
        }

        let (tangents, bitangents) = match (extract_tangents(&reader), normals.as_ref()) {
            (Some(tangents), Some(normals)) => {
                let bitangents = tangents
                    .iter()
                    .zip(normals)
                    .map(|(t, n)| n.cross(t.truncate()) * t.w)
                    .collect();
                (
                    Some(tangents.iter().map(|t| t.truncate()).collect()),
                    Some(bitangents),
                )
            }
            _ => (None, None),
        };

        let mut indices = reader
            .read_indices()
            .map(|iter| iter.into_u32().collect())
            .unwrap_or_else(|| (0..positions.len() as u32).collect::<Vec<_>>());
        let primitive_kind = match primitive.mode() {
            gltf::mesh::Mode::Points => PrimitiveKind::Points,
            gltf::mesh::Mode::Lines => PrimitiveKind::Lines,
            gltf::mesh::Mode::LineStrip => PrimitiveKind::LineStrip,
            gltf::mesh::Mode::LineLoop => {
                if let Some(&first) = indices.first() {
                    indices.push(first);
                }
                PrimitiveKind::LineStrip
            }
            gltf::mesh::Mode::Triangles => PrimitiveKind::Triangles,
            gltf::mesh::Mode::TriangleStrip => PrimitiveKind::TriangleStrip,
            gltf::mesh::Mode::TriangleFan => PrimitiveKind::TriangleFan,
        };

        let bones = match skin {
            Some(skin) => {
                let joints = reader
                    .read_joints(0)
                    .map(|iter| iter.into_u16().collect::<Vec<_>>());
                let weights = reader
                    .read_weights(0)
                    .map(|iter| iter.into_f32().collect::<Vec<_>>());
                read_bones(skin, joints, weights, get_buffer_data)
            }
            None => Vec::new(),
        };

        let name = if primitive.index() == 0 {
            mesh_name.to_string()
        } else {
            format!("{mesh_name}_{}", primitive.index())
        };

        let mut scene_mesh = SceneMesh {
            name,
            primitive: primitive_kind,
            positions,
            normals,
            tex_coords,
            colors: extract_colors(&reader),
            tangents,
            bitangents,
            bones,
            indices,
            material_index: primitive.material().index(),
        };
        scene_mesh.drop_incomplete_channels();
        Ok(scene_mesh)
    }
}

impl AssetLoaderLane<ImportedScene> for GltfSceneLane {
    fn load(&self, bytes: &[u8]) -> Result<ImportedScene, Box<dyn Error + Send + Sync>> {
        self.import_bytes(bytes).map_err(Into::into)
    }
}

fn decode_data_uri(uri: &str) -> Result<Vec<u8>, ImportError> {
    let payload = uri
        .strip_prefix("data:application/octet-stream;base64,")
        .or_else(|| uri.strip_prefix("data:application/gltf-buffer;base64,"))
        .ok_or_else(|| ImportError::Resolve {
            uri: uri.chars().take(48).collect(),
            message: "unsupported data URI format".to_string(),
        })?;
    base64::engine::general_purpose::STANDARD
        .decode(payload)
        .map_err(|e| ImportError::Resolve {
            uri: uri.chars().take(48).collect(),
            message: e.to_string(),
        })
}

fn node_name(node: &gltf::Node<'_>) -> String {
    node.name()
        .map(str::to_string)
        .unwrap_or_else(|| format!("node_{}", node.index()))
}

fn add_node(
    scene: &mut ImportedScene,
    parent: usize,
    node: &gltf::Node<'_>,
    primitive_ranges: &[Range<usize>],
) {
    let mut scene_node = SceneNode::new(node_name(node));
    scene_node.transform = Mat4::from_cols_array_2d(&node.transform().matrix());
    if let Some(range) = node.mesh().and_then(|mesh| primitive_ranges.get(mesh.index())) {
        scene_node.meshes.extend(range.clone());
    }
    let index = scene.add_child_node(parent, scene_node);
    for child in node.children() {
        add_node(scene, index, &child, primitive_ranges);
    }
}

/// The first skin any node applies to each mesh.
fn skins_by_mesh(document: &gltf::Document) -> AHashMap<usize, gltf::Skin<'_>> {
    let mut skins = AHashMap::new();
    for node in document.nodes() {
        if let (Some(mesh), Some(skin)) = (node.mesh(), node.skin()) {
            skins.entry(mesh.index()).or_insert(skin);
        }
    }
    skins
}

fn convert_material(material: &gltf::Material<'_>) -> SceneMaterial {
    let pbr = material.pbr_metallic_roughness();
    let base_color = Vec4::from(pbr.base_color_factor());
    let mut converted = SceneMaterial {
        name: material
            .name()
            .map(str::to_string)
            .or_else(|| material.index().map(|i| format!("material_{i}")))
            .unwrap_or_else(|| "default".to_string()),
        diffuse_color: Some(base_color),
        emissive_color: Some(Vec3::from(material.emissive_factor())),
        opacity: Some(base_color.w),
        ..Default::default()
    };

    if let Some(info) = pbr.base_color_texture() {
        converted.add_texture(TextureType::Diffuse, texture_name(&info.texture()));
    }
    if let Some(normal) = material.normal_texture() {
        converted.add_texture(TextureType::Normals, texture_name(&normal.texture()));
        converted.bump_scaling = Some(normal.scale());
    }
    if let Some(occlusion) = material.occlusion_texture() {
        converted.add_texture(TextureType::Lightmap, texture_name(&occlusion.texture()));
    }
    if let Some(info) = material.emissive_texture() {
        converted.add_texture(TextureType::Emissive, texture_name(&info.texture()));
    }
    converted
}

/// External images keep their URI; embedded ones are named `*<image index>`.
fn texture_name(texture: &gltf::Texture<'_>) -> String {
    let image = texture.source();
    match image.source() {
        gltf::image::Source::Uri { uri, .. } if !uri.starts_with("data:") => uri.to_string(),
        _ => format!("*{}", image.index()),
    }
}

fn read_bones<'s, F>(
    skin: &gltf::Skin<'_>,
    joints: Option<Vec<[u16; 4]>>,
    weights: Option<Vec<[f32; 4]>>,
    get_buffer_data: F,
) -> Vec<Bone>
where
    F: Clone + Fn(Buffer<'_>) -> Option<&'s [u8]>,
{
    let inverse_bind_matrices: Vec<Mat4> = skin
        .reader(get_buffer_data)
        .read_inverse_bind_matrices()
        .map(|iter| iter.map(|m| Mat4::from_cols_array_2d(&m)).collect())
        .unwrap_or_default();

    let mut bones: Vec<Bone> = skin
        .joints()
        .enumerate()
        .map(|(joint_index, joint)| Bone {
            name: node_name(&joint),
            offset_matrix: inverse_bind_matrices
                .get(joint_index)
                .copied()
                .unwrap_or(Mat4::IDENTITY),
            weights: Vec::new(),
        })
        .collect();

    if let (Some(joints), Some(weights)) = (joints, weights) {
        for (vertex_id, (joint_set, weight_set)) in joints.iter().zip(&weights).enumerate() {
            for (&joint, &weight) in joint_set.iter().zip(weight_set.iter()) {
                if weight <= 0.0 {
                    continue;
                }
                match bones.get_mut(joint as usize) {
                    Some(bone) => bone.weights.push(VertexWeight {
                        vertex_id: vertex_id as u32,
                        weight,
                    }),
                    None => log::warn!(
                        "Vertex {vertex_id} references joint {joint} outside of skin '{}'",
                        skin.name().unwrap_or_default()
                    ),
                }
            }
        }
    }

    // Bones that influence nothing are dropped, so bone indices stay dense.
    bones.retain(|bone| !bone.weights.is_empty());
    bones
}

fn convert_animation<'s, F>(animation: &gltf::Animation<'_>, get_buffer_data: F) -> SceneAnimation
where
    F: Clone + Fn(Buffer<'_>) -> Option<&'s [u8]>,
{
    let mut channels: Vec<NodeAnimationChannel> = Vec::new();
    let mut channel_by_node: AHashMap<usize, usize> = AHashMap::new();
    let mut duration_ticks = 0.0f64;

    for channel in animation.channels() {
        let target = channel.target().node();
        let slot = *channel_by_node.entry(target.index()).or_insert_with(|| {
            channels.push(NodeAnimationChannel {
                node_name: node_name(&target),
                ..Default::default()
            });
            channels.len() - 1
        });

        let reader = channel.reader(get_buffer_data.clone());
        let (Some(inputs), Some(outputs)) = (reader.read_inputs(), reader.read_outputs()) else {
            continue;
        };
        let times: Vec<f64> = inputs
            .map(|seconds| f64::from(seconds) * GLTF_TICKS_PER_SECOND)
            .collect();
        if let Some(&last) = times.last() {
            duration_ticks = duration_ticks.max(last);
        }
        let cubic = matches!(
            channel.sampler().interpolation(),
            gltf::animation::Interpolation::CubicSpline
        );

        let entry = &mut channels[slot];
        match outputs {
            ReadOutputs::Translations(values) => {
                entry
                    .position_keys
                    .extend(vector_keys(&times, keyframe_values(values.collect(), cubic)));
            }
            ReadOutputs::Scales(values) => {
                entry
                    .scaling_keys
                    .extend(vector_keys(&times, keyframe_values(values.collect(), cubic)));
            }
            ReadOutputs::Rotations(values) => {
                let rotations = keyframe_values(values.into_f32().collect(), cubic);
                entry.rotation_keys.extend(
                    times
                        .iter()
                        .zip(rotations)
                        .map(|(&time, q)| RotationKey {
                            time,
                            value: Quat::from_array(q),
                        }),
                );
            }
            ReadOutputs::MorphTargetWeights(values) => {
                let weights: Vec<f32> = values.into_f32().collect();
                let stride = if cubic { 3 } else { 1 };
                let per_key = weights.len() / (times.len().max(1) * stride);
                if per_key == 0 {
                    continue;
                }
                for (key, &time) in times.iter().enumerate() {
                    // Cubic splines store in-tangent, value, out-tangent per key.
                    let start = (key * stride + stride / 2) * per_key;
                    if let Some(slice) = weights.get(start..start + per_key) {
                        entry.morph_weight_keys.push(MorphWeightKey {
                            time,
                            weights: slice.to_vec(),
                        });
                    }
                }
            }
        }
    }

    SceneAnimation {
        name: animation
            .name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("animation_{}", animation.index())),
        duration_ticks,
        ticks_per_second: GLTF_TICKS_PER_SECOND,
        channels,
    }
}

fn keyframe_values<T: Copy>(values: Vec<T>, cubic: bool) -> Vec<T> {
    if cubic {
        values
            .chunks(3)
            .filter_map(|chunk| chunk.get(1).copied())
            .collect()
    } else {
        values
    }
}

fn vector_keys<'t>(times: &'t [f64], values: Vec<[f32; 3]>) -> impl Iterator<Item = VectorKey> + 't {
    times
        .iter()
        .zip(values)
        .map(|(&time, value)| VectorKey {
            time,
            value: Vec3::from(value),
        })
}

// The helpers are generic over the buffer-access closure type `F`.
fn extract_positions<'a, 's, F>(reader: &Reader<'a, 's, F>) -> Option<Vec<Vec3>>
where
    F: Clone + Fn(Buffer<'a>) -> Option<&'s [u8]>,
{
    reader
        .read_positions()
        .map(|iter| iter.map(Vec3::from).collect())
}

fn extract_normals<'a, 's, F>(reader: &Reader<'a, 's, F>) -> Option<Vec<Vec3>>
where
    F: Clone + Fn(Buffer<'a>) -> Option<&'s [u8]>,
{
    reader
        .read_normals()
        .map(|iter| iter.map(Vec3::from).collect())
}

fn extract_tex_coords<'a, 's, F>(reader: &Reader<'a, 's, F>, set: u32) -> Option<Vec<Vec2>>
where
    F: Clone + Fn(Buffer<'a>) -> Option<&'s [u8]>,
{
    reader
        .read_tex_coords(set)
        .map(|iter| iter.into_f32().map(Vec2::from).collect())
}

fn extract_tangents<'a, 's, F>(reader: &Reader<'a, 's, F>) -> Option<Vec<Vec4>>
where
    F: Clone + Fn(Buffer<'a>) -> Option<&'s [u8]>,
{
    reader
        .read_tangents()
        .map(|iter| iter.map(Vec4::from).collect())
}

fn extract_colors<'a, 's, F>(reader: &Reader<'a, 's, F>) -> Option<Vec<Vec4>>
where
    F: Clone + Fn(Buffer<'a>) -> Option<&'s [u8]>,
{
    reader
        .read_colors(0)
        .map(|iter| iter.into_rgba_f32().map(Vec4::from).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_uri_requires_known_prefix() {
        assert_eq!(
            decode_data_uri("data:application/octet-stream;base64,AAEC").unwrap(),
            vec![0, 1, 2]
        );
        assert!(matches!(
            decode_data_uri("data:text/plain;base64,AAEC"),
            Err(ImportError::Resolve { .. })
        ));
    }

    #[test]
    fn cubic_keyframes_keep_middle_values() {
        let values = vec![[0.0; 3], [1.0; 3], [2.0; 3], [3.0; 3], [4.0; 3], [5.0; 3]];
        assert_eq!(keyframe_values(values.clone(), true), vec![[1.0; 3], [4.0; 3]]);
        assert_eq!(keyframe_values(values.clone(), false), values);
    }
}
