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

use crate::renderer::api::buffer::{BufferId, IndexFormat};
use crate::renderer::api::command::{BindGroupId, CommandBufferId, RenderPassDescriptor};
use crate::renderer::api::pipeline::RenderPipelineId;
use std::ops::Range;

/// A trait representing an active render pass, used for recording drawing commands.
///
/// A `RenderPass` object is obtained from a [`CommandEncoder`] and provides methods
/// to set pipeline state (pipeline, bind groups, vertex/index buffers) and issue draw calls.
///
/// The `'pass` lifetime ensures that any handle bound to the pass lives at least as
/// long as the pass itself.
pub trait RenderPass<'pass> {
    /// Sets the active render pipeline for subsequent draw calls.
    fn set_pipeline(&mut self, pipeline: &'pass RenderPipelineId);

    /// Binds a bind group at the given group index.
    fn set_bind_group(&mut self, index: u32, bind_group: &'pass BindGroupId);

    /// Binds a vertex buffer to a specific slot.
    fn set_vertex_buffer(&mut self, slot: u32, buffer: &'pass BufferId, offset: u64);

    /// Binds an index buffer for indexed drawing.
    fn set_index_buffer(&mut self, buffer: &'pass BufferId, offset: u64, index_format: IndexFormat);

    /// Records a non-indexed draw call.
    fn draw(&mut self, vertices: Range<u32>, instances: Range<u32>);

    /// Records an indexed draw call.
    fn draw_indexed(&mut self, indices: Range<u32>, base_vertex: i32, instances: Range<u32>);
}

/// A trait for an object that records a sequence of GPU commands.
///
/// The encoder creates render passes; once every pass is dropped it is turned into a
/// [`CommandBufferId`] with [`CommandEncoder::finish`] and handed to the device.
pub trait CommandEncoder {
    /// Begins a new render pass.
    ///
    /// The returned pass borrows the encoder mutably, so only one pass can be active
    /// at a time. Dropping the pass ends it.
    fn begin_render_pass<'encoder>(
        &'encoder mut self,
        descriptor: &RenderPassDescriptor<'encoder>,
    ) -> Box<dyn RenderPass<'encoder> + 'encoder>;

    /// Finishes recording and returns a handle to the command buffer.
    fn finish(self: Box<Self>) -> CommandBufferId;
}
