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

//! Shaders as seen by a [`crate::Model`]: which vertex channels they consume and
//! which pipeline they use for a given vertex layout.

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use prism_core::math::{Mat4, Vec4};
use prism_core::renderer::{
    BindGroupId, BindGroupLayoutDescriptor, BindGroupLayoutEntry, BindGroupLayoutId, BindingType,
    ColorTargetStateDescriptor, CompareFunction, DepthStencilStateDescriptor, GraphicsDevice,
    PrimitiveStateDescriptor, PrimitiveTopology, RenderPass, RenderPipelineDescriptor,
    RenderPipelineId, ResourceError, ShaderModuleDescriptor, ShaderModuleId, ShaderSourceData,
    ShaderStageFlags, TextureFormat, VertexBufferLayoutDescriptor,
};

use crate::vertex::VertexAttribData;

/// Built-in lit shader consuming [`VertexAttribData::POSITION_NORMAL`].
///
/// Group 0, binding 0 holds a [`ModelLitUniforms`] block. Entry points are
/// `vs_main` and `fs_main`.
pub const MODEL_LIT_WGSL: &str = include_str!("shaders/model_lit.wgsl");

/// Identifies a pipeline: one per vertex layout and topology.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PipelineKey {
    /// The vertex buffer layout the pipeline reads.
    pub layout: VertexBufferLayoutDescriptor<'static>,
    /// How vertices are assembled.
    pub topology: PrimitiveTopology,
}

/// A shader program usable to render a model.
pub trait Shader {
    /// A label for logs and errors.
    fn label(&self) -> &str;

    /// The vertex channels the shader reads.
    fn vertex_attrib_config(&self) -> VertexAttribData;

    /// The pipeline built for `key`, if any.
    fn cached_pipeline(&self, key: &PipelineKey) -> Option<&RenderPipelineId>;

    /// Builds (or returns the cached) pipeline for `key`.
    fn build_pipeline(&mut self, key: &PipelineKey) -> Result<RenderPipelineId, ResourceError>;

    /// Binds the per-mesh resources (uniforms, textures) before a mesh is drawn.
    fn bind_resources<'pass>(&'pass self, _mesh_index: usize, _pass: &mut dyn RenderPass<'pass>) {}
}

/// Uniform block of [`MODEL_LIT_WGSL`].
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ModelLitUniforms {
    /// Projection * view * model.
    pub pvm: [[f32; 4]; 4],
    /// Model matrix, used for normals.
    pub model: [[f32; 4]; 4],
    /// Base color.
    pub diffuse: [f32; 4],
}

impl ModelLitUniforms {
    /// Packs the matrices and color.
    pub fn new(view_projection: Mat4, model: Mat4, diffuse: Vec4) -> Self {
        Self {
            pvm: (view_projection * model).to_cols_array_2d(),
            model: model.to_cols_array_2d(),
            diffuse: diffuse.to_array(),
        }
    }
}

/// Everything needed to create a [`ShaderProgram`].
#[derive(Debug, Clone)]
pub struct ShaderProgramDescriptor<'a> {
    /// Label of the program and of its GPU objects.
    pub label: &'a str,
    /// WGSL source holding both stages.
    pub source: &'a str,
    /// Vertex stage entry point.
    pub vertex_entry_point: &'a str,
    /// Fragment stage entry point, `None` for depth-only programs.
    pub fragment_entry_point: Option<&'a str>,
    /// The vertex channels the vertex stage reads.
    pub vertex_attrib_config: VertexAttribData,
    /// Format of the color target.
    pub color_format: TextureFormat,
    /// Format of the depth target, if depth testing is used.
    pub depth_format: Option<TextureFormat>,
    /// Bind group layouts, in group order.
    pub bind_group_layouts: &'a [BindGroupLayoutDescriptor<'a>],
}

/// A WGSL program with a pipeline cache and a per-mesh bind group table.
#[derive(Debug)]
pub struct ShaderProgram {
    label: String,
    device: Arc<dyn GraphicsDevice>,
    module: ShaderModuleId,
    vertex_entry_point: String,
    fragment_entry_point: Option<String>,
    vertex_attrib_config: VertexAttribData,
    color_format: TextureFormat,
    depth_format: Option<TextureFormat>,
    bind_group_layouts: Vec<BindGroupLayoutId>,
    bind_groups: HashMap<usize, Vec<BindGroupId>>,
    pipelines: HashMap<PipelineKey, RenderPipelineId>,
}

impl ShaderProgram {
    /// Compiles the module and creates the bind group layouts.
    pub fn new(
        device: Arc<dyn GraphicsDevice>,
        descriptor: &ShaderProgramDescriptor,
    ) -> Result<Self, ResourceError> {
        let module = device.create_shader_module(&ShaderModuleDescriptor {
            label: Some(descriptor.label),
            source: ShaderSourceData::Wgsl(Cow::Owned(descriptor.source.to_string())),
        })?;
        let bind_group_layouts = descriptor
            .bind_group_layouts
            .iter()
            .map(|layout| device.create_bind_group_layout(layout))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            label: descriptor.label.to_string(),
            device,
            module,
            vertex_entry_point: descriptor.vertex_entry_point.to_string(),
            fragment_entry_point: descriptor.fragment_entry_point.map(str::to_string),
            vertex_attrib_config: descriptor.vertex_attrib_config,
            color_format: descriptor.color_format,
            depth_format: descriptor.depth_format,
            bind_group_layouts,
            bind_groups: HashMap::new(),
            pipelines: HashMap::new(),
        })
    }

    /// The built-in [`MODEL_LIT_WGSL`] program.
    pub fn model_lit(
        device: Arc<dyn GraphicsDevice>,
        color_format: TextureFormat,
        depth_format: Option<TextureFormat>,
    ) -> Result<Self, ResourceError> {
        let entries = [BindGroupLayoutEntry {
            binding: 0,
            visibility: ShaderStageFlags::VERTEX_FRAGMENT,
            ty: BindingType::UniformBuffer {
                min_binding_size: Some(std::mem::size_of::<ModelLitUniforms>() as u64),
            },
        }];
        Self::new(
            device,
            &ShaderProgramDescriptor {
                label: "model_lit",
                source: MODEL_LIT_WGSL,
                vertex_entry_point: "vs_main",
                fragment_entry_point: Some("fs_main"),
                vertex_attrib_config: VertexAttribData::POSITION_NORMAL,
                color_format,
                depth_format,
                bind_group_layouts: &[BindGroupLayoutDescriptor {
                    label: Some("model_lit_uniforms"),
                    entries: &entries,
                }],
            },
        )
    }

    /// The layout of bind group `group`.
    pub fn bind_group_layout(&self, group: usize) -> Option<BindGroupLayoutId> {
        self.bind_group_layouts.get(group).copied()
    }

    /// Sets the bind groups (in group order) bound before drawing mesh `mesh_index`.
    ///
    /// The program takes ownership of the groups and destroys them when replaced
    /// or dropped.
    pub fn set_mesh_bind_groups(&mut self, mesh_index: usize, bind_groups: Vec<BindGroupId>) {
        if let Some(previous) = self.bind_groups.insert(mesh_index, bind_groups) {
            self.destroy_bind_groups(previous);
        }
    }

    /// Number of pipelines built so far.
    pub fn pipeline_count(&self) -> usize {
        self.pipelines.len()
    }

    fn destroy_bind_groups(&self, bind_groups: Vec<BindGroupId>) {
        for bind_group in bind_groups {
            if let Err(e) = self.device.destroy_bind_group(bind_group) {
                log::warn!("Shader '{}': failed to destroy {bind_group:?}: {e}", self.label);
            }
        }
    }
}

impl Shader for ShaderProgram {
    fn label(&self) -> &str {
        &self.label
    }

    fn vertex_attrib_config(&self) -> VertexAttribData {
        self.vertex_attrib_config
    }

    fn cached_pipeline(&self, key: &PipelineKey) -> Option<&RenderPipelineId> {
        self.pipelines.get(key)
    }

    fn build_pipeline(&mut self, key: &PipelineKey) -> Result<RenderPipelineId, ResourceError> {
        if let Some(id) = self.pipelines.get(key) {
            return Ok(*id);
        }

        let color_targets = [ColorTargetStateDescriptor {
            format: self.color_format,
            alpha_blending: false,
        }];
        let descriptor = RenderPipelineDescriptor {
            label: Some(Cow::Owned(format!("{} pipeline", self.label))),
            vertex_shader_module: self.module,
            vertex_entry_point: Cow::Borrowed(&self.vertex_entry_point),
            fragment_shader_module: self.fragment_entry_point.as_ref().map(|_| self.module),
            fragment_entry_point: self.fragment_entry_point.as_deref().map(Cow::Borrowed),
            vertex_buffers_layout: Cow::Owned(vec![key.layout.clone()]),
            bind_group_layouts: Cow::Borrowed(&self.bind_group_layouts),
            primitive_state: PrimitiveStateDescriptor {
                topology: key.topology,
                ..Default::default()
            },
            depth_stencil_state: self.depth_format.map(|format| DepthStencilStateDescriptor {
                format,
                depth_write_enabled: true,
                depth_compare: CompareFunction::Less,
            }),
            color_target_states: Cow::Borrowed(&color_targets),
        };
        let id = self.device.create_render_pipeline(&descriptor)?;
        log::debug!(
            "Shader '{}': built pipeline {id:?} for stride {} ({:?})",
            self.label,
            key.layout.array_stride,
            key.topology
        );
        self.pipelines.insert(key.clone(), id);
        Ok(id)
    }

    fn bind_resources<'pass>(&'pass self, mesh_index: usize, pass: &mut dyn RenderPass<'pass>) {
        if let Some(bind_groups) = self.bind_groups.get(&mesh_index) {
            for (group, bind_group) in bind_groups.iter().enumerate() {
                pass.set_bind_group(group as u32, bind_group);
            }
        }
    }
}

impl Drop for ShaderProgram {
    fn drop(&mut self) {
        for (_, pipeline) in self.pipelines.drain() {
            if let Err(e) = self.device.destroy_render_pipeline(pipeline) {
                log::warn!("Shader '{}': failed to destroy {pipeline:?}: {e}", self.label);
            }
        }
        let bind_groups: Vec<BindGroupId> = self.bind_groups.drain().flat_map(|(_, g)| g).collect();
        self.destroy_bind_groups(bind_groups);
        if let Err(e) = self.device.destroy_shader_module(self.module) {
            log::warn!("Shader '{}': failed to destroy module: {e}", self.label);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prism_core::renderer::testing::{PassCommand, RecordingDevice, RecordingPass};
    use prism_core::renderer::{BindGroupDescriptor, BindGroupEntry, BufferDescriptor, BufferUsage};

    use crate::vertex::VertexLayout;

    fn lit(device: &Arc<RecordingDevice>) -> ShaderProgram {
        ShaderProgram::model_lit(
            device.clone(),
            TextureFormat::Rgba8UnormSrgb,
            Some(TextureFormat::Depth32Float),
        )
        .unwrap()
    }

    fn key() -> PipelineKey {
        PipelineKey {
            layout: VertexLayout::new(VertexAttribData::NORMAL)
                .buffer_layout(VertexAttribData::POSITION_NORMAL)
                .unwrap(),
            topology: PrimitiveTopology::TriangleList,
        }
    }

    #[test]
    fn pipelines_are_cached_per_key() {
        let device = Arc::new(RecordingDevice::new());
        let mut shader = lit(&device);
        assert!(shader.cached_pipeline(&key()).is_none());

        let first = shader.build_pipeline(&key()).unwrap();
        let second = shader.build_pipeline(&key()).unwrap();
        assert_eq!(first, second);
        assert_eq!(shader.cached_pipeline(&key()), Some(&first));
        assert_eq!(device.pipeline_count(), 1);
        assert_eq!(device.pipeline_vertex_layouts(first).unwrap(), vec![key().layout]);

        let mut strip = key();
        strip.topology = PrimitiveTopology::TriangleStrip;
        shader.build_pipeline(&strip).unwrap();
        assert_eq!(shader.pipeline_count(), 2);
    }

    #[test]
    fn bind_resources_binds_groups_of_mesh() {
        let device = Arc::new(RecordingDevice::new());
        let mut shader = lit(&device);
        let buffer = device
            .create_buffer(&BufferDescriptor {
                label: None,
                size: std::mem::size_of::<ModelLitUniforms>() as u64,
                usage: BufferUsage::UNIFORM | BufferUsage::COPY_DST,
            })
            .unwrap();
        let group = device
            .create_bind_group(&BindGroupDescriptor {
                label: None,
                layout: shader.bind_group_layout(0).unwrap(),
                entries: &[BindGroupEntry {
                    binding: 0,
                    buffer,
                    offset: 0,
                    size: None,
                }],
            })
            .unwrap();
        shader.set_mesh_bind_groups(1, vec![group]);

        let mut pass = RecordingPass::default();
        shader.bind_resources(0, &mut pass);
        assert!(pass.commands.is_empty());
        shader.bind_resources(1, &mut pass);
        assert_eq!(pass.commands, vec![PassCommand::SetBindGroup(0, group)]);
    }

    #[test]
    fn uniforms_combine_matrices() {
        let model = Mat4::from_translation(prism_core::math::Vec3::X);
        let uniforms = ModelLitUniforms::new(Mat4::from_scale(prism_core::math::Vec3::splat(2.0)), model, Vec4::ONE);
        assert_eq!(uniforms.pvm[3], [2.0, 0.0, 0.0, 1.0]);
        assert_eq!(uniforms.model[3], [1.0, 0.0, 0.0, 1.0]);
        assert_eq!(std::mem::size_of::<ModelLitUniforms>(), 144);
    }
}
