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

use prism_core::renderer::{
    BufferUsage, Color, CompareFunction, CullMode, FrontFace, IndexFormat, LoadOp,
    PrimitiveTopology, ShaderStageFlags, StoreOp, TextureFormat, TextureUsage, VertexFormat,
    VertexStepMode,
};

/// A local extension trait to convert prism types into their wgpu counterparts.
/// This avoids Rust's orphan rules while keeping an idiomatic `.into_wgpu()` syntax.
pub trait IntoWgpu<T> {
    /// Consumes self and converts it into a wgpu type.
    fn into_wgpu(self) -> T;
}

// --- Formats ---

impl IntoWgpu<wgpu::TextureFormat> for TextureFormat {
    fn into_wgpu(self) -> wgpu::TextureFormat {
        match self {
            TextureFormat::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
            TextureFormat::Rgba8UnormSrgb => wgpu::TextureFormat::Rgba8UnormSrgb,
            TextureFormat::Bgra8UnormSrgb => wgpu::TextureFormat::Bgra8UnormSrgb,
            TextureFormat::Depth32Float => wgpu::TextureFormat::Depth32Float,
        }
    }
}

impl IntoWgpu<wgpu::VertexFormat> for VertexFormat {
    fn into_wgpu(self) -> wgpu::VertexFormat {
        match self {
            VertexFormat::Float32x2 => wgpu::VertexFormat::Float32x2,
            VertexFormat::Float32x3 => wgpu::VertexFormat::Float32x3,
            VertexFormat::Float32x4 => wgpu::VertexFormat::Float32x4,
            VertexFormat::Uint32x4 => wgpu::VertexFormat::Uint32x4,
        }
    }
}

impl IntoWgpu<wgpu::IndexFormat> for IndexFormat {
    fn into_wgpu(self) -> wgpu::IndexFormat {
        match self {
            IndexFormat::Uint16 => wgpu::IndexFormat::Uint16,
            IndexFormat::Uint32 => wgpu::IndexFormat::Uint32,
        }
    }
}

// --- Pipeline state ---

impl IntoWgpu<wgpu::VertexStepMode> for VertexStepMode {
    fn into_wgpu(self) -> wgpu::VertexStepMode {
        match self {
            VertexStepMode::Vertex => wgpu::VertexStepMode::Vertex,
            VertexStepMode::Instance => wgpu::VertexStepMode::Instance,
        }
    }
}

impl IntoWgpu<wgpu::PrimitiveTopology> for PrimitiveTopology {
    fn into_wgpu(self) -> wgpu::PrimitiveTopology {
        match self {
            PrimitiveTopology::PointList => wgpu::PrimitiveTopology::PointList,
            PrimitiveTopology::LineList => wgpu::PrimitiveTopology::LineList,
            PrimitiveTopology::LineStrip => wgpu::PrimitiveTopology::LineStrip,
            PrimitiveTopology::TriangleList => wgpu::PrimitiveTopology::TriangleList,
            PrimitiveTopology::TriangleStrip => wgpu::PrimitiveTopology::TriangleStrip,
        }
    }
}

impl IntoWgpu<wgpu::FrontFace> for FrontFace {
    fn into_wgpu(self) -> wgpu::FrontFace {
        match self {
            FrontFace::Ccw => wgpu::FrontFace::Ccw,
            FrontFace::Cw => wgpu::FrontFace::Cw,
        }
    }
}

impl IntoWgpu<wgpu::Face> for CullMode {
    fn into_wgpu(self) -> wgpu::Face {
        match self {
            CullMode::Front => wgpu::Face::Front,
            CullMode::Back => wgpu::Face::Back,
        }
    }
}

impl IntoWgpu<wgpu::CompareFunction> for CompareFunction {
    fn into_wgpu(self) -> wgpu::CompareFunction {
        match self {
            CompareFunction::Never => wgpu::CompareFunction::Never,
            CompareFunction::Less => wgpu::CompareFunction::Less,
            CompareFunction::LessEqual => wgpu::CompareFunction::LessEqual,
            CompareFunction::Greater => wgpu::CompareFunction::Greater,
            CompareFunction::Always => wgpu::CompareFunction::Always,
        }
    }
}

// --- Flags ---

impl IntoWgpu<wgpu::BufferUsages> for BufferUsage {
    fn into_wgpu(self) -> wgpu::BufferUsages {
        let pairs = [
            (BufferUsage::MAP_READ, wgpu::BufferUsages::MAP_READ),
            (BufferUsage::MAP_WRITE, wgpu::BufferUsages::MAP_WRITE),
            (BufferUsage::COPY_SRC, wgpu::BufferUsages::COPY_SRC),
            (BufferUsage::COPY_DST, wgpu::BufferUsages::COPY_DST),
            (BufferUsage::INDEX, wgpu::BufferUsages::INDEX),
            (BufferUsage::VERTEX, wgpu::BufferUsages::VERTEX),
            (BufferUsage::UNIFORM, wgpu::BufferUsages::UNIFORM),
        ];
        pairs
            .into_iter()
            .filter(|(ours, _)| self.contains(*ours))
            .fold(wgpu::BufferUsages::empty(), |acc, (_, theirs)| acc | theirs)
    }
}

impl IntoWgpu<wgpu::TextureUsages> for TextureUsage {
    fn into_wgpu(self) -> wgpu::TextureUsages {
        let pairs = [
            (TextureUsage::COPY_SRC, wgpu::TextureUsages::COPY_SRC),
            (TextureUsage::COPY_DST, wgpu::TextureUsages::COPY_DST),
            (TextureUsage::TEXTURE_BINDING, wgpu::TextureUsages::TEXTURE_BINDING),
            (TextureUsage::RENDER_ATTACHMENT, wgpu::TextureUsages::RENDER_ATTACHMENT),
        ];
        pairs
            .into_iter()
            .filter(|(ours, _)| self.contains(*ours))
            .fold(wgpu::TextureUsages::empty(), |acc, (_, theirs)| acc | theirs)
    }
}

impl IntoWgpu<wgpu::ShaderStages> for ShaderStageFlags {
    fn into_wgpu(self) -> wgpu::ShaderStages {
        let mut stages = wgpu::ShaderStages::NONE;
        if self.contains(ShaderStageFlags::VERTEX) {
            stages |= wgpu::ShaderStages::VERTEX;
        }
        if self.contains(ShaderStageFlags::FRAGMENT) {
            stages |= wgpu::ShaderStages::FRAGMENT;
        }
        stages
    }
}

// --- Render pass operations ---

impl IntoWgpu<wgpu::Color> for Color {
    fn into_wgpu(self) -> wgpu::Color {
        wgpu::Color {
            r: self.r,
            g: self.g,
            b: self.b,
            a: self.a,
        }
    }
}

impl IntoWgpu<wgpu::StoreOp> for StoreOp {
    fn into_wgpu(self) -> wgpu::StoreOp {
        match self {
            StoreOp::Store => wgpu::StoreOp::Store,
            StoreOp::Discard => wgpu::StoreOp::Discard,
        }
    }
}

impl IntoWgpu<wgpu::LoadOp<wgpu::Color>> for LoadOp<Color> {
    fn into_wgpu(self) -> wgpu::LoadOp<wgpu::Color> {
        match self {
            LoadOp::Load => wgpu::LoadOp::Load,
            LoadOp::Clear(color) => wgpu::LoadOp::Clear(color.into_wgpu()),
        }
    }
}

impl IntoWgpu<wgpu::LoadOp<f32>> for LoadOp<f32> {
    fn into_wgpu(self) -> wgpu::LoadOp<f32> {
        match self {
            LoadOp::Load => wgpu::LoadOp::Load,
            LoadOp::Clear(depth) => wgpu::LoadOp::Clear(depth),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_usage_conversion() {
        let usage = BufferUsage::VERTEX | BufferUsage::COPY_DST;
        assert_eq!(
            usage.into_wgpu(),
            wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST
        );
        let empty: wgpu::BufferUsages = BufferUsage::EMPTY.into_wgpu();
        assert!(empty.is_empty());
    }

    #[test]
    fn test_texture_usage_conversion() {
        let usage = TextureUsage::RENDER_ATTACHMENT | TextureUsage::COPY_SRC;
        assert_eq!(
            usage.into_wgpu(),
            wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC
        );
    }

    #[test]
    fn test_shader_stage_conversion() {
        let stages: wgpu::ShaderStages = ShaderStageFlags::VERTEX_FRAGMENT.into_wgpu();
        assert_eq!(stages, wgpu::ShaderStages::VERTEX_FRAGMENT);
    }

    #[test]
    fn test_vertex_format_sizes_match() {
        for format in [
            VertexFormat::Float32x2,
            VertexFormat::Float32x3,
            VertexFormat::Float32x4,
            VertexFormat::Uint32x4,
        ] {
            let wgpu_format: wgpu::VertexFormat = format.into_wgpu();
            assert_eq!(wgpu_format.size(), format.size());
        }
    }

    #[test]
    fn test_clear_color_conversion() {
        let load = LoadOp::Clear(Color {
            r: 0.1,
            g: 0.2,
            b: 0.3,
            a: 1.0,
        });
        assert_eq!(
            load.into_wgpu(),
            wgpu::LoadOp::Clear(wgpu::Color {
                r: 0.1,
                g: 0.2,
                b: 0.3,
                a: 1.0
            })
        );
    }
}
