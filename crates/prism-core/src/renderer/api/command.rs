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

//! Command recording types: bind groups, render pass attachments and command buffers.

use super::buffer::BufferId;
use super::shader::ShaderStageFlags;
use super::texture::TextureViewId;

/// An opaque handle to a finished command buffer awaiting submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CommandBufferId(pub usize);

/// An opaque handle to a bind group layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BindGroupLayoutId(pub usize);

/// An opaque handle to a bind group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BindGroupId(pub usize);

/// The kind of resource bound at a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingType {
    /// A uniform buffer.
    UniformBuffer {
        /// Minimum size the bound range must have, if known.
        min_binding_size: Option<u64>,
    },
}

/// One slot of a bind group layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BindGroupLayoutEntry {
    /// The `@binding` index.
    pub binding: u32,
    /// Stages that can see the binding.
    pub visibility: ShaderStageFlags,
    /// Resource kind.
    pub ty: BindingType,
}

/// Describes a bind group layout.
#[derive(Debug, Clone)]
pub struct BindGroupLayoutDescriptor<'a> {
    /// An optional debug label.
    pub label: Option<&'a str>,
    /// Slots of the layout.
    pub entries: &'a [BindGroupLayoutEntry],
}

/// A buffer range bound to one slot of a bind group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindGroupEntry {
    /// The `@binding` index.
    pub binding: u32,
    /// The bound buffer.
    pub buffer: BufferId,
    /// Byte offset into the buffer.
    pub offset: u64,
    /// Size of the bound range, or the rest of the buffer.
    pub size: Option<u64>,
}

/// Describes a bind group.
#[derive(Debug, Clone)]
pub struct BindGroupDescriptor<'a> {
    /// An optional debug label.
    pub label: Option<&'a str>,
    /// The layout the group conforms to.
    pub layout: BindGroupLayoutId,
    /// Bound resources.
    pub entries: &'a [BindGroupEntry],
}

/// A linear RGBA color with double precision, used for clears.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Color {
    /// Red.
    pub r: f64,
    /// Green.
    pub g: f64,
    /// Blue.
    pub b: f64,
    /// Alpha.
    pub a: f64,
}

/// What happens to an attachment at the start of a pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LoadOp<V> {
    /// Keep the previous contents.
    Load,
    /// Clear to the given value.
    Clear(V),
}

/// What happens to an attachment at the end of a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp {
    /// Write results back.
    Store,
    /// Discard results.
    Discard,
}

/// Load and store operations for an attachment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Operations<V> {
    /// Load operation.
    pub load: LoadOp<V>,
    /// Store operation.
    pub store: StoreOp,
}

/// A color attachment of a render pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderPassColorAttachment {
    /// The view rendered into.
    pub view: TextureViewId,
    /// Attachment operations.
    pub ops: Operations<Color>,
}

/// The depth attachment of a render pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderPassDepthStencilAttachment {
    /// The depth view.
    pub view: TextureViewId,
    /// Depth operations.
    pub depth_ops: Option<Operations<f32>>,
}

/// Describes a render pass.
#[derive(Debug, Clone)]
pub struct RenderPassDescriptor<'a> {
    /// An optional debug label.
    pub label: Option<&'a str>,
    /// Color attachments, indexed by `@location`.
    pub color_attachments: &'a [RenderPassColorAttachment],
    /// Optional depth attachment.
    pub depth_stencil_attachment: Option<RenderPassDepthStencilAttachment>,
}
