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

//! Vertex channels and the interleaved layout of a mesh's vertex buffer.
//!
//! Channels are always packed in the same order, so a channel's offset only depends
//! on which channels before it are present. Shader locations, on the other hand,
//! are fixed per channel and never depend on the set of present channels.

use std::borrow::Cow;

use prism_core::prism_bitflags;
use prism_core::renderer::{
    VertexAttributeDescriptor, VertexBufferLayoutDescriptor, VertexFormat, VertexStepMode,
};

prism_bitflags! {
    /// A set of vertex channels, used both for what a mesh stores and for what a
    /// shader consumes.
    pub struct VertexAttribData: u32 {
        /// Position (`vec3<f32>`).
        const POSITION = 1 << 0;
        /// Normal (`vec3<f32>`).
        const NORMAL = 1 << 1;
        /// First texture coordinate set (`vec2<f32>`).
        const TEX2D = 1 << 2;
        /// Second texture coordinate set (`vec2<f32>`).
        const TEX2D_2 = 1 << 3;
        /// Third texture coordinate set (`vec2<f32>`).
        const TEX2D_3 = 1 << 4;
        /// Vertex color (`vec4<f32>`).
        const COLOR = 1 << 5;
        /// Indices of the four strongest bones (`vec4<u32>`).
        const BONE_INDICES = 1 << 6;
        /// Weights of the four strongest bones (`vec4<f32>`).
        const BONE_WEIGHTS = 1 << 7;
        /// Tangent (`vec3<f32>`).
        const TANGENT = 1 << 8;
        /// Bitangent (`vec3<f32>`).
        const BITANGENT = 1 << 9;
    }
}

impl VertexAttribData {
    /// Position and normal, the config of the built-in lit shader.
    pub const POSITION_NORMAL: Self = Self::POSITION.with(Self::NORMAL);

    /// Both bone channels.
    pub const BONES: Self = Self::BONE_INDICES.with(Self::BONE_WEIGHTS);

    /// Iterates over the channels in `self`, in packing order.
    pub fn attribs(self) -> impl Iterator<Item = VertexAttrib> {
        VertexAttrib::ALL
            .into_iter()
            .filter(move |attrib| self.contains(attrib.flag()))
    }
}

/// A single vertex channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum VertexAttrib {
    /// See [`VertexAttribData::POSITION`].
    Position,
    /// See [`VertexAttribData::NORMAL`].
    Normal,
    /// See [`VertexAttribData::TEX2D`].
    TexCoord0,
    /// See [`VertexAttribData::TEX2D_2`].
    TexCoord1,
    /// See [`VertexAttribData::TEX2D_3`].
    TexCoord2,
    /// See [`VertexAttribData::COLOR`].
    Color,
    /// See [`VertexAttribData::BONE_INDICES`].
    BoneIndices,
    /// See [`VertexAttribData::BONE_WEIGHTS`].
    BoneWeights,
    /// See [`VertexAttribData::TANGENT`].
    Tangent,
    /// See [`VertexAttribData::BITANGENT`].
    Bitangent,
}

impl VertexAttrib {
    /// Every channel, in packing order.
    pub const ALL: [VertexAttrib; 10] = [
        VertexAttrib::Position,
        VertexAttrib::Normal,
        VertexAttrib::TexCoord0,
        VertexAttrib::TexCoord1,
        VertexAttrib::TexCoord2,
        VertexAttrib::Color,
        VertexAttrib::BoneIndices,
        VertexAttrib::BoneWeights,
        VertexAttrib::Tangent,
        VertexAttrib::Bitangent,
    ];

    /// The flag naming this channel.
    pub const fn flag(self) -> VertexAttribData {
        match self {
            VertexAttrib::Position => VertexAttribData::POSITION,
            VertexAttrib::Normal => VertexAttribData::NORMAL,
            VertexAttrib::TexCoord0 => VertexAttribData::TEX2D,
            VertexAttrib::TexCoord1 => VertexAttribData::TEX2D_2,
            VertexAttrib::TexCoord2 => VertexAttribData::TEX2D_3,
            VertexAttrib::Color => VertexAttribData::COLOR,
            VertexAttrib::BoneIndices => VertexAttribData::BONE_INDICES,
            VertexAttrib::BoneWeights => VertexAttribData::BONE_WEIGHTS,
            VertexAttrib::Tangent => VertexAttribData::TANGENT,
            VertexAttrib::Bitangent => VertexAttribData::BITANGENT,
        }
    }

    /// The `@location` the channel is bound to in every shader.
    pub const fn shader_location(self) -> u32 {
        self as u32
    }

    /// GPU format of the channel.
    pub const fn format(self) -> VertexFormat {
        match self {
            VertexAttrib::Position
            | VertexAttrib::Normal
            | VertexAttrib::Tangent
            | VertexAttrib::Bitangent => VertexFormat::Float32x3,
            VertexAttrib::TexCoord0 | VertexAttrib::TexCoord1 | VertexAttrib::TexCoord2 => {
                VertexFormat::Float32x2
            }
            VertexAttrib::Color | VertexAttrib::BoneWeights => VertexFormat::Float32x4,
            VertexAttrib::BoneIndices => VertexFormat::Uint32x4,
        }
    }

    /// Size of the channel in bytes.
    pub const fn size(self) -> u64 {
        self.format().size()
    }

    /// The channel holding texture coordinate set `set`.
    pub const fn tex_coord(set: usize) -> Option<Self> {
        match set {
            0 => Some(VertexAttrib::TexCoord0),
            1 => Some(VertexAttrib::TexCoord1),
            2 => Some(VertexAttrib::TexCoord2),
            _ => None,
        }
    }
}

/// Where a channel lives inside one interleaved vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttributeSlot {
    /// Byte offset from the start of the vertex.
    pub offset: u64,
    /// Size in bytes.
    pub size: u64,
}

/// The interleaved layout of a mesh's vertex buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexLayout {
    available: VertexAttribData,
    stride: u64,
    slots: [Option<AttributeSlot>; VertexAttrib::ALL.len()],
}

impl VertexLayout {
    /// Computes the layout for `channels`. Position is always included.
    pub fn new(channels: VertexAttribData) -> Self {
        let available = channels.with(VertexAttribData::POSITION);
        let mut slots = [None; VertexAttrib::ALL.len()];
        let mut offset = 0;
        for attrib in available.attribs() {
            slots[attrib as usize] = Some(AttributeSlot {
                offset,
                size: attrib.size(),
            });
            offset += attrib.size();
        }
        Self {
            available,
            stride: offset,
            slots,
        }
    }

    /// The channels stored in each vertex.
    pub fn available(&self) -> VertexAttribData {
        self.available
    }

    /// Size of one vertex in bytes.
    pub fn stride(&self) -> u64 {
        self.stride
    }

    /// The slot of `attrib`, if the layout stores it.
    pub fn slot(&self, attrib: VertexAttrib) -> Option<AttributeSlot> {
        self.slots[attrib as usize]
    }

    /// Channels of `config` this layout does not store.
    pub fn missing(&self, config: VertexAttribData) -> VertexAttribData {
        config.without(self.available)
    }

    /// Builds the buffer layout exposing exactly the channels of `config`.
    ///
    /// Returns `None` if `config` asks for a channel the layout does not store.
    pub fn buffer_layout(
        &self,
        config: VertexAttribData,
    ) -> Option<VertexBufferLayoutDescriptor<'static>> {
        if !self.missing(config).is_empty() {
            return None;
        }
        let attributes: Vec<VertexAttributeDescriptor> = config
            .attribs()
            .filter_map(|attrib| {
                self.slot(attrib).map(|slot| VertexAttributeDescriptor {
                    shader_location: attrib.shader_location(),
                    format: attrib.format(),
                    offset: slot.offset,
                })
            })
            .collect();
        Some(VertexBufferLayoutDescriptor {
            array_stride: self.stride,
            step_mode: VertexStepMode::Vertex,
            attributes: Cow::Owned(attributes),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_only_layout() {
        let layout = VertexLayout::new(VertexAttribData::EMPTY);
        assert_eq!(layout.available(), VertexAttribData::POSITION);
        assert_eq!(layout.stride(), 12);
        assert_eq!(
            layout.slot(VertexAttrib::Position),
            Some(AttributeSlot { offset: 0, size: 12 })
        );
        assert_eq!(layout.slot(VertexAttrib::Normal), None);
    }

    #[test]
    fn full_layout_packs_in_fixed_order() {
        let all = VertexAttrib::ALL
            .iter()
            .fold(VertexAttribData::EMPTY, |acc, a| acc | a.flag());
        let layout = VertexLayout::new(all);
        let offsets: Vec<u64> = VertexAttrib::ALL
            .iter()
            .map(|a| layout.slot(*a).unwrap().offset)
            .collect();
        assert_eq!(offsets, vec![0, 12, 24, 32, 40, 48, 64, 80, 96, 108]);
        assert_eq!(layout.stride(), 120);
    }

    #[test]
    fn offsets_skip_absent_channels() {
        let layout = VertexLayout::new(
            VertexAttribData::TEX2D_2 | VertexAttribData::COLOR | VertexAttribData::TANGENT,
        );
        assert_eq!(layout.slot(VertexAttrib::TexCoord1).unwrap().offset, 12);
        assert_eq!(layout.slot(VertexAttrib::Color).unwrap().offset, 20);
        assert_eq!(layout.slot(VertexAttrib::Tangent).unwrap().offset, 36);
        assert_eq!(layout.stride(), 48);
    }

    #[test]
    fn buffer_layout_uses_fixed_locations() {
        let layout = VertexLayout::new(
            VertexAttribData::NORMAL | VertexAttribData::TEX2D | VertexAttribData::COLOR,
        );
        let variant = layout
            .buffer_layout(VertexAttribData::POSITION | VertexAttribData::COLOR)
            .unwrap();
        assert_eq!(variant.array_stride, 48);
        assert_eq!(
            variant.attributes.as_ref(),
            &[
                VertexAttributeDescriptor {
                    shader_location: 0,
                    format: VertexFormat::Float32x3,
                    offset: 0,
                },
                VertexAttributeDescriptor {
                    shader_location: 5,
                    format: VertexFormat::Float32x4,
                    offset: 32,
                },
            ]
        );
        assert!(layout.buffer_layout(VertexAttribData::TANGENT).is_none());
        assert_eq!(
            layout.missing(VertexAttribData::TANGENT | VertexAttribData::NORMAL),
            VertexAttribData::TANGENT
        );
    }
}
