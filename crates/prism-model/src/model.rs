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

//! The model: every mesh of an imported scene uploaded to the GPU, placed by the
//! node hierarchy and paired with its material.

use std::path::Path;
use std::sync::Arc;

use prism_core::math::{Mat4, UVec4, Vec3, Vec4};
use prism_core::renderer::{GraphicsDevice, RenderPass, VertexBufferLayoutDescriptor};
use prism_core::scene::{SceneMesh, MAX_TEX_COORD_SETS};
use prism_core::ImportedScene;
use prism_lanes::asset_lane::{ModelLoaderFlags, SceneImporter};

use crate::error::ModelError;
use crate::material::MaterialData;
use crate::mesh::{scene_mesh_channels, strongest_influences, Mesh, MeshData};
use crate::shader::{PipelineKey, Shader};
use crate::vertex::{VertexAttrib, VertexAttribData};

/// The vertex channels of `mesh` that end up in its vertex buffer under `flags`.
///
/// A channel is kept when the mesh provides it and `flags` asks for it; with no
/// `LOAD_*` flag at all every channel is asked for. Tangents and bitangents are
/// kept whenever present.
pub fn vertex_channels_for(mesh: &SceneMesh, flags: ModelLoaderFlags) -> VertexAttribData {
    let mut wanted = VertexAttribData::POSITION
        | VertexAttribData::TANGENT
        | VertexAttribData::BITANGENT;
    wanted.set(
        VertexAttribData::NORMAL,
        flags.wants(ModelLoaderFlags::LOAD_NORMALS),
    );
    for set in 0..MAX_TEX_COORD_SETS {
        if let Some(attrib) = VertexAttrib::tex_coord(set) {
            wanted.set(
                attrib.flag(),
                flags.wants(ModelLoaderFlags::load_tex_coords(set)),
            );
        }
    }
    wanted.set(
        VertexAttribData::COLOR,
        flags.wants(ModelLoaderFlags::LOAD_COLORS),
    );
    wanted.set(
        VertexAttribData::BONES,
        flags.wants(ModelLoaderFlags::LOAD_BONES),
    );
    scene_mesh_channels(mesh) & wanted
}

/// A set of GPU meshes built from one model file.
#[derive(Debug)]
pub struct Model {
    scene: ImportedScene,
    meshes: Vec<Mesh>,
    load_transformation: Mat4,
    flags: ModelLoaderFlags,
}

impl Model {
    /// Imports `path` with `flags` and uploads every mesh to `device`.
    ///
    /// `transform` is applied on top of the node hierarchy of the file.
    pub fn load_from_file(
        path: impl AsRef<Path>,
        transform: Mat4,
        flags: ModelLoaderFlags,
        device: Arc<dyn GraphicsDevice>,
    ) -> Result<Self, ModelError> {
        let scene = SceneImporter::new(flags).import_file(path)?;
        Self::from_scene(scene, transform, flags, device)
    }

    /// Uploads every mesh of an already imported scene.
    pub fn from_scene(
        scene: ImportedScene,
        transform: Mat4,
        flags: ModelLoaderFlags,
        device: Arc<dyn GraphicsDevice>,
    ) -> Result<Self, ModelError> {
        if scene.meshes.is_empty() {
            return Err(ModelError::EmptyScene(scene.source_path));
        }

        let meshes = scene
            .meshes
            .iter()
            .map(|mesh| Self::init_mesh(mesh, flags, device.clone()))
            .collect::<Result<Vec<_>, _>>()?;

        let mut model = Self {
            scene,
            meshes,
            load_transformation: transform,
            flags,
        };
        model.init_transformation_matrices();
        model.gather_material_data();

        log::info!(
            "Model '{}': {} meshes, {} vertices",
            model.scene.source_path,
            model.meshes.len(),
            model.meshes.iter().map(Mesh::vertex_count).sum::<usize>()
        );
        Ok(model)
    }

    fn init_mesh(
        mesh: &SceneMesh,
        flags: ModelLoaderFlags,
        device: Arc<dyn GraphicsDevice>,
    ) -> Result<Mesh, ModelError> {
        let channels = vertex_channels_for(mesh, flags);
        let data = MeshData::from_scene_mesh(mesh, channels);
        Ok(Mesh::upload(device, data, mesh.material_index)?)
    }

    fn init_transformation_matrices(&mut self) {
        let mut placements = Vec::new();
        self.scene.visit_nodes(|node, accumulated, _depth| {
            placements.extend(node.meshes.iter().map(|&mesh| (mesh, *accumulated)));
        });
        for (mesh_index, transform) in placements {
            match self.meshes.get_mut(mesh_index) {
                Some(mesh) => mesh.set_scene_transformation(transform),
                None => log::warn!(
                    "Model '{}': node references missing mesh {mesh_index}",
                    self.scene.source_path
                ),
            }
        }
    }

    fn gather_material_data(&mut self) {
        for (index, mesh) in self.meshes.iter_mut().enumerate() {
            let material = self.scene.material_for_mesh(index);
            mesh.set_material(MaterialData::from_scene_material(
                material,
                &self.scene.source_path,
            ));
        }
    }

    /// The imported scene the model was built from.
    pub fn scene(&self) -> &ImportedScene {
        &self.scene
    }

    /// The flags the model was loaded with.
    pub fn flags(&self) -> ModelLoaderFlags {
        self.flags
    }

    /// The transform given at load time.
    pub fn transformation_matrix(&self) -> Mat4 {
        self.load_transformation
    }

    /// Load transform combined with the node transform of mesh `mesh_index`.
    pub fn mesh_transformation_matrix(&self, mesh_index: usize) -> Result<Mat4, ModelError> {
        Ok(self.load_transformation * self.mesh_at(mesh_index)?.scene_transformation())
    }

    /// Number of meshes.
    pub fn num_meshes(&self) -> usize {
        self.meshes.len()
    }

    /// Number of vertices of mesh `mesh_index`.
    pub fn num_vertices(&self, mesh_index: usize) -> Result<usize, ModelError> {
        Ok(self.mesh_at(mesh_index)?.vertex_count())
    }

    /// Number of indices of mesh `mesh_index`.
    pub fn indices_length(&self, mesh_index: usize) -> Result<usize, ModelError> {
        Ok(self.mesh_at(mesh_index)?.index_count())
    }

    /// Name of mesh `mesh_index`.
    pub fn mesh_name(&self, mesh_index: usize) -> Result<&str, ModelError> {
        Ok(self.mesh_at(mesh_index)?.name())
    }

    /// Resolved material of mesh `mesh_index`.
    pub fn material_data(&self, mesh_index: usize) -> Result<&MaterialData, ModelError> {
        Ok(self.mesh_at(mesh_index)?.material())
    }

    /// The mesh at `mesh_index`.
    pub fn mesh_at(&self, mesh_index: usize) -> Result<&Mesh, ModelError> {
        let count = self.meshes.len();
        self.meshes
            .get(mesh_index)
            .ok_or(ModelError::MeshIndexOutOfRange {
                index: mesh_index,
                count,
            })
    }

    /// The mesh at `mesh_index`, mutably.
    pub fn mesh_at_mut(&mut self, mesh_index: usize) -> Result<&mut Mesh, ModelError> {
        let count = self.meshes.len();
        self.meshes
            .get_mut(mesh_index)
            .ok_or(ModelError::MeshIndexOutOfRange {
                index: mesh_index,
                count,
            })
    }

    /// Meshes for which `predicate(index, mesh)` holds.
    pub fn select_meshes<F>(&self, mut predicate: F) -> Vec<&Mesh>
    where
        F: FnMut(usize, &Mesh) -> bool,
    {
        self.meshes
            .iter()
            .enumerate()
            .filter(|(index, mesh)| predicate(*index, mesh))
            .map(|(_, mesh)| mesh)
            .collect()
    }

    /// Mutable version of [`Self::select_meshes`].
    pub fn select_meshes_mut<F>(&mut self, mut predicate: F) -> Vec<&mut Mesh>
    where
        F: FnMut(usize, &Mesh) -> bool,
    {
        self.meshes
            .iter_mut()
            .enumerate()
            .filter(|(index, mesh)| predicate(*index, mesh))
            .map(|(_, mesh)| mesh)
            .collect()
    }

    /// Position of vertex `vertex` of mesh `mesh_index`.
    pub fn vertex_position(&self, mesh_index: usize, vertex: usize) -> Result<Vec3, ModelError> {
        let mesh = self.mesh_at(mesh_index)?;
        mesh.vertex_position(vertex)
            .ok_or(ModelError::VertexIndexOutOfRange {
                mesh: mesh_index,
                vertex,
                count: mesh.vertex_count(),
            })
    }

    /// Normal of vertex `vertex` of mesh `mesh_index`.
    pub fn vertex_normal(&self, mesh_index: usize, vertex: usize) -> Result<Vec3, ModelError> {
        let mesh = self.mesh_at(mesh_index)?;
        if !mesh.available_attributes().contains(VertexAttribData::NORMAL) {
            return Err(ModelError::MissingAttribute {
                mesh: mesh_index,
                attribute: VertexAttrib::Normal,
            });
        }
        mesh.vertex_normal(vertex)
            .ok_or(ModelError::VertexIndexOutOfRange {
                mesh: mesh_index,
                vertex,
                count: mesh.vertex_count(),
            })
    }

    /// Up to four `(bone index, weight)` pairs influencing a vertex, heaviest first.
    ///
    /// Unused slots hold index 0 and weight 0. Returns `None` for vertices no bone
    /// influences.
    pub fn bone_weights_and_indices_for_mesh_vertex(
        scene: &ImportedScene,
        mesh_index: usize,
        vertex_id: u32,
    ) -> Option<(UVec4, Vec4)> {
        strongest_influences(scene.vertex_weights_for(mesh_index, vertex_id))
    }

    // --- Layout variants ---

    /// Generates the layout variant `config` for every mesh.
    ///
    /// Meshes lacking a channel are skipped and reported together in the error.
    pub fn generate_vertex_layouts(&mut self, config: VertexAttribData) -> Result<(), ModelError> {
        let failed: Vec<String> = self
            .meshes
            .iter_mut()
            .filter_map(|mesh| match mesh.generate_vertex_layout(config).map(|_| ()) {
                Ok(()) => None,
                Err(e) => {
                    log::warn!("{e}");
                    Some(mesh.name().to_string())
                }
            })
            .collect();
        if failed.is_empty() {
            Ok(())
        } else {
            Err(ModelError::LayoutGenerationFailed {
                meshes: failed,
                config,
            })
        }
    }

    /// Generates the layout variant `config` for mesh `mesh_index`.
    pub fn generate_vertex_layout_for_mesh(
        &mut self,
        mesh_index: usize,
        config: VertexAttribData,
    ) -> Result<(), ModelError> {
        self.mesh_at_mut(mesh_index)?
            .generate_vertex_layout(config)
            .map(|_| ())
    }

    /// The layout variant `config` of mesh `mesh_index`; it must have been generated.
    pub fn vertex_layout_for_mesh(
        &self,
        mesh_index: usize,
        config: VertexAttribData,
    ) -> Result<&VertexBufferLayoutDescriptor<'static>, ModelError> {
        let mesh = self.mesh_at(mesh_index)?;
        mesh.vertex_layout(config)
            .ok_or_else(|| ModelError::MissingVertexLayout {
                mesh: mesh.name().to_string(),
                config,
            })
    }

    /// Generates the shader's layout variant and its pipelines for every mesh.
    pub fn prepare_for_shader<S>(&mut self, shader: &mut S) -> Result<(), ModelError>
    where
        S: Shader + ?Sized,
    {
        self.generate_vertex_layouts(shader.vertex_attrib_config())?;
        for mesh_index in 0..self.meshes.len() {
            self.prepare_mesh_pipeline(mesh_index, shader)?;
        }
        Ok(())
    }

    fn prepare_mesh_pipeline<S>(&self, mesh_index: usize, shader: &mut S) -> Result<(), ModelError>
    where
        S: Shader + ?Sized,
    {
        let key = self.pipeline_key(mesh_index, shader.vertex_attrib_config())?;
        if shader.cached_pipeline(&key).is_none() {
            shader.build_pipeline(&key)?;
        }
        Ok(())
    }

    fn pipeline_key(
        &self,
        mesh_index: usize,
        config: VertexAttribData,
    ) -> Result<PipelineKey, ModelError> {
        Ok(PipelineKey {
            layout: self.vertex_layout_for_mesh(mesh_index, config)?.clone(),
            topology: self.mesh_at(mesh_index)?.topology(),
        })
    }

    // --- Rendering ---

    /// Draws mesh `mesh_index` with the pipeline currently set on `pass`.
    ///
    /// The layout variant `config` must have been generated.
    pub fn render_mesh_for_config<'pass>(
        &'pass self,
        mesh_index: usize,
        config: VertexAttribData,
        pass: &mut dyn RenderPass<'pass>,
    ) -> Result<(), ModelError> {
        self.vertex_layout_for_mesh(mesh_index, config)?;
        self.mesh_at(mesh_index)?.draw(pass);
        Ok(())
    }

    /// Draws every mesh with the pipeline currently set on `pass`.
    pub fn render_for_config<'pass>(
        &'pass self,
        config: VertexAttribData,
        pass: &mut dyn RenderPass<'pass>,
    ) -> Result<(), ModelError> {
        for mesh_index in 0..self.meshes.len() {
            self.render_mesh_for_config(mesh_index, config, pass)?;
        }
        Ok(())
    }

    /// Sets the shader's pipeline and resources, then draws mesh `mesh_index`.
    pub fn render_mesh_with_shader<'pass, S>(
        &'pass self,
        mesh_index: usize,
        shader: &'pass S,
        pass: &mut dyn RenderPass<'pass>,
    ) -> Result<(), ModelError>
    where
        S: Shader + ?Sized,
    {
        let key = self.pipeline_key(mesh_index, shader.vertex_attrib_config())?;
        let mesh = self.mesh_at(mesh_index)?;
        let pipeline =
            shader
                .cached_pipeline(&key)
                .ok_or_else(|| ModelError::MissingPipeline {
                    shader: shader.label().to_string(),
                    mesh: mesh.name().to_string(),
                })?;
        pass.set_pipeline(pipeline);
        shader.bind_resources(mesh_index, pass);
        mesh.draw(pass);
        Ok(())
    }

    /// [`Self::render_mesh_with_shader`] for every mesh.
    pub fn render_with_shader<'pass, S>(
        &'pass self,
        shader: &'pass S,
        pass: &mut dyn RenderPass<'pass>,
    ) -> Result<(), ModelError>
    where
        S: Shader + ?Sized,
    {
        for mesh_index in 0..self.meshes.len() {
            self.render_mesh_with_shader(mesh_index, shader, pass)?;
        }
        Ok(())
    }

    /// Like [`Self::render_mesh_for_config`], generating the variant if needed.
    pub fn render_mesh_for_config_generate_missing<'pass>(
        &'pass mut self,
        mesh_index: usize,
        config: VertexAttribData,
        pass: &mut dyn RenderPass<'pass>,
    ) -> Result<(), ModelError> {
        self.generate_vertex_layout_for_mesh(mesh_index, config)?;
        let model: &'pass Self = self;
        model.render_mesh_for_config(mesh_index, config, pass)
    }

    /// Like [`Self::render_for_config`], generating the variants if needed.
    pub fn render_for_config_generate_missing<'pass>(
        &'pass mut self,
        config: VertexAttribData,
        pass: &mut dyn RenderPass<'pass>,
    ) -> Result<(), ModelError> {
        self.generate_vertex_layouts(config)?;
        let model: &'pass Self = self;
        model.render_for_config(config, pass)
    }

    /// Like [`Self::render_mesh_with_shader`], generating the variant and the
    /// pipeline if needed.
    pub fn render_mesh_with_shader_generate_missing<'pass, S>(
        &'pass mut self,
        mesh_index: usize,
        shader: &'pass mut S,
        pass: &mut dyn RenderPass<'pass>,
    ) -> Result<(), ModelError>
    where
        S: Shader + ?Sized,
    {
        self.generate_vertex_layout_for_mesh(mesh_index, shader.vertex_attrib_config())?;
        self.prepare_mesh_pipeline(mesh_index, shader)?;
        let model: &'pass Self = self;
        let shader: &'pass S = shader;
        model.render_mesh_with_shader(mesh_index, shader, pass)
    }

    /// Like [`Self::render_with_shader`], generating variants and pipelines if needed.
    pub fn render_with_shader_generate_missing<'pass, S>(
        &'pass mut self,
        shader: &'pass mut S,
        pass: &mut dyn RenderPass<'pass>,
    ) -> Result<(), ModelError>
    where
        S: Shader + ?Sized,
    {
        self.prepare_for_shader(shader)?;
        let model: &'pass Self = self;
        let shader: &'pass S = shader;
        model.render_with_shader(shader, pass)
    }
}
