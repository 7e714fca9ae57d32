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

//! Texture handles and descriptors.

use std::borrow::Cow;

use crate::prism_bitflags;

/// An opaque handle to a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub usize);

/// An opaque handle to a view into a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureViewId(pub usize);

/// Pixel formats supported by the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    /// 8-bit RGBA, linear.
    Rgba8Unorm,
    /// 8-bit RGBA, sRGB encoded.
    Rgba8UnormSrgb,
    /// 8-bit BGRA, sRGB encoded.
    Bgra8UnormSrgb,
    /// 32-bit float depth.
    Depth32Float,
}

impl TextureFormat {
    /// Size of one texel in bytes.
    pub const fn bytes_per_pixel(&self) -> u32 {
        4
    }

    /// Returns `true` for depth formats.
    pub const fn is_depth(&self) -> bool {
        matches!(self, TextureFormat::Depth32Float)
    }
}

prism_bitflags! {
    /// How a texture is going to be used.
    pub struct TextureUsage: u32 {
        /// The texture can be the source of a copy.
        const COPY_SRC = 1 << 0;
        /// The texture can be the destination of a copy.
        const COPY_DST = 1 << 1;
        /// The texture can be sampled in a shader.
        const TEXTURE_BINDING = 1 << 2;
        /// The texture can be a render pass attachment.
        const RENDER_ATTACHMENT = 1 << 4;
    }
}

/// Describes a 2D texture to create.
#[derive(Debug, Clone)]
pub struct TextureDescriptor<'a> {
    /// An optional debug label.
    pub label: Option<Cow<'a, str>>,
    /// Width in texels.
    pub width: u32,
    /// Height in texels.
    pub height: u32,
    /// Texel format.
    pub format: TextureFormat,
    /// Allowed usages.
    pub usage: TextureUsage,
}
