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

//! Render pipeline descriptors: vertex input layout, primitive assembly and targets.

use std::borrow::Cow;

use super::command::BindGroupLayoutId;
use super::shader::ShaderModuleId;
use super::texture::TextureFormat;

/// An opaque handle to a compiled render pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RenderPipelineId(pub usize);

/// The format of a single vertex attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexFormat {
    /// Two 32-bit floats.
    Float32x2,
    /// Three 32-bit floats.
    Float32x3,
    /// Four 32-bit floats.
    Float32x4,
    /// Four 32-bit unsigned integers.
    Uint32x4,
}

impl VertexFormat {
    /// Size of the attribute in bytes.
    pub const fn size(&self) -> u64 {
        match self {
            VertexFormat::Float32x2 => 8,
            VertexFormat::Float32x3 => 12,
            VertexFormat::Float32x4 | VertexFormat::Uint32x4 => 16,
        }
    }
}

/// Whether a vertex buffer advances per vertex or per instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum VertexStepMode {
    /// Advance once per vertex.
    #[default]
    Vertex,
    /// Advance once per instance.
    Instance,
}

/// One attribute inside a vertex buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexAttributeDescriptor {
    /// The `@location` the attribute feeds in the vertex shader.
    pub shader_location: u32,
    /// Format of the attribute.
    pub format: VertexFormat,
    /// Byte offset from the start of a vertex.
    pub offset: u64,
}

/// The layout of one vertex buffer as seen by a pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VertexBufferLayoutDescriptor<'a> {
    /// Byte distance between two consecutive vertices.
    pub array_stride: u64,
    /// Step mode of the buffer.
    pub step_mode: VertexStepMode,
    /// Attributes read from the buffer.
    pub attributes: Cow<'a, [VertexAttributeDescriptor]>,
}

impl VertexBufferLayoutDescriptor<'_> {
    /// Returns a copy that owns its attribute list.
    pub fn into_owned(self) -> VertexBufferLayoutDescriptor<'static> {
        VertexBufferLayoutDescriptor {
            array_stride: self.array_stride,
            step_mode: self.step_mode,
            attributes: Cow::Owned(self.attributes.into_owned()),
        }
    }
}

/// How vertices are assembled into primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PrimitiveTopology {
    /// Each vertex is a point.
    PointList,
    /// Every two vertices form a line.
    LineList,
    /// Consecutive vertices form a connected line.
    LineStrip,
    /// Every three vertices form a triangle.
    #[default]
    TriangleList,
    /// Consecutive vertices form a triangle strip.
    TriangleStrip,
}

/// Winding order considered front-facing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FrontFace {
    /// Counter-clockwise.
    #[default]
    Ccw,
    /// Clockwise.
    Cw,
}

/// Which faces get culled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CullMode {
    /// Cull front faces.
    Front,
    /// Cull back faces.
    Back,
}

/// Primitive assembly and rasterization state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PrimitiveStateDescriptor {
    /// Primitive topology.
    pub topology: PrimitiveTopology,
    /// Front face winding.
    pub front_face: FrontFace,
    /// Face culling, if any.
    pub cull_mode: Option<CullMode>,
}

/// Comparison used by the depth test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareFunction {
    /// Never passes.
    Never,
    /// Passes if the new value is less.
    Less,
    /// Passes if the new value is less or equal.
    LessEqual,
    /// Passes if the new value is greater.
    Greater,
    /// Always passes.
    Always,
}

/// Depth testing state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DepthStencilStateDescriptor {
    /// Format of the depth attachment.
    pub format: TextureFormat,
    /// Whether fragments write their depth.
    pub depth_write_enabled: bool,
    /// The depth comparison.
    pub depth_compare: CompareFunction,
}

/// A color output of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ColorTargetStateDescriptor {
    /// Format of the color attachment.
    pub format: TextureFormat,
    /// Enables standard `src_alpha / one_minus_src_alpha` blending.
    pub alpha_blending: bool,
}

/// Everything needed to build a render pipeline.
#[derive(Debug, Clone)]
pub struct RenderPipelineDescriptor<'a> {
    /// An optional debug label.
    pub label: Option<Cow<'a, str>>,
    /// Module holding the vertex entry point.
    pub vertex_shader_module: ShaderModuleId,
    /// Name of the vertex entry point.
    pub vertex_entry_point: Cow<'a, str>,
    /// Module holding the fragment entry point, if the pipeline has one.
    pub fragment_shader_module: Option<ShaderModuleId>,
    /// Name of the fragment entry point.
    pub fragment_entry_point: Option<Cow<'a, str>>,
    /// Vertex buffers consumed by the pipeline, indexed by slot.
    pub vertex_buffers_layout: Cow<'a, [VertexBufferLayoutDescriptor<'a>]>,
    /// Bind group layouts, indexed by group number.
    pub bind_group_layouts: Cow<'a, [BindGroupLayoutId]>,
    /// Primitive state.
    pub primitive_state: PrimitiveStateDescriptor,
    /// Depth state, if the pass has a depth attachment.
    pub depth_stencil_state: Option<DepthStencilStateDescriptor>,
    /// Color outputs.
    pub color_target_states: Cow<'a, [ColorTargetStateDescriptor]>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_format_sizes() {
        assert_eq!(VertexFormat::Float32x2.size(), 8);
        assert_eq!(VertexFormat::Float32x3.size(), 12);
        assert_eq!(VertexFormat::Float32x4.size(), 16);
        assert_eq!(VertexFormat::Uint32x4.size(), 16);
    }

    #[test]
    fn into_owned_keeps_attributes() {
        let attributes = [VertexAttributeDescriptor {
            shader_location: 0,
            format: VertexFormat::Float32x3,
            offset: 0,
        }];
        let borrowed = VertexBufferLayoutDescriptor {
            array_stride: 12,
            step_mode: VertexStepMode::Vertex,
            attributes: Cow::Borrowed(&attributes),
        };
        let owned = borrowed.clone().into_owned();
        assert_eq!(owned, borrowed);
        assert!(matches!(owned.attributes, Cow::Owned(_)));
    }
}
