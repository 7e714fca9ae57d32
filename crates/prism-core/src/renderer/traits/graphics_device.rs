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

use crate::renderer::api::*;
use crate::renderer::error::ResourceError;
use crate::renderer::traits::CommandEncoder;
use std::fmt::Debug;

/// The resource-creation side of a graphics backend.
///
/// Every GPU object is referred to by an opaque ID; the backend owns the real object
/// and releases it when the matching `destroy_*` call is made.
pub trait GraphicsDevice: Send + Sync + Debug + 'static {
    /// Creates a shader module from the provided descriptor.
    /// ## Arguments
    /// * `descriptor` - The shader source and label.
    /// ## Returns
    /// The ID of the created shader module.
    /// ## Errors
    /// * `ResourceError::Shader` - If the source fails to compile.
    fn create_shader_module(
        &self,
        descriptor: &ShaderModuleDescriptor,
    ) -> Result<ShaderModuleId, ResourceError>;

    /// Destroys the shader module associated with the given ID.
    fn destroy_shader_module(&self, id: ShaderModuleId) -> Result<(), ResourceError>;

    /// Creates a render pipeline from the provided descriptor.
    /// ## Arguments
    /// * `descriptor` - Shaders, vertex layouts, bind group layouts and target states.
    /// ## Returns
    /// The ID of the created render pipeline.
    /// ## Errors
    /// * `ResourceError::Pipeline` - If a referenced module or layout is unknown,
    ///   or the backend rejects the pipeline.
    fn create_render_pipeline(
        &self,
        descriptor: &RenderPipelineDescriptor,
    ) -> Result<RenderPipelineId, ResourceError>;

    /// Destroys the render pipeline associated with the given ID.
    fn destroy_render_pipeline(&self, id: RenderPipelineId) -> Result<(), ResourceError>;

    /// Creates a bind group layout.
    fn create_bind_group_layout(
        &self,
        descriptor: &BindGroupLayoutDescriptor,
    ) -> Result<BindGroupLayoutId, ResourceError>;

    /// Creates a bind group conforming to an existing layout.
    /// ## Errors
    /// * `ResourceError::NotFound` - If the layout or a bound buffer does not exist.
    fn create_bind_group(
        &self,
        descriptor: &BindGroupDescriptor,
    ) -> Result<BindGroupId, ResourceError>;

    /// Destroys a bind group.
    fn destroy_bind_group(&self, id: BindGroupId) -> Result<(), ResourceError>;

    /// Creates a new, uninitialized GPU buffer.
    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<BufferId, ResourceError>;

    /// Creates a new GPU buffer initialized with `data`.
    ///
    /// The size of the buffer is the length of `data`; `descriptor.size` is ignored.
    fn create_buffer_with_data(
        &self,
        descriptor: &BufferDescriptor,
        data: &[u8],
    ) -> Result<BufferId, ResourceError>;

    /// Destroys the buffer associated with the given ID.
    fn destroy_buffer(&self, id: BufferId) -> Result<(), ResourceError>;

    /// Writes `data` into a buffer at `offset`.
    /// ## Errors
    /// * `ResourceError::OutOfBounds` - If the write would go past the end of the buffer.
    fn write_buffer(&self, id: BufferId, offset: u64, data: &[u8]) -> Result<(), ResourceError>;

    /// Creates a 2D texture.
    fn create_texture(&self, descriptor: &TextureDescriptor) -> Result<TextureId, ResourceError>;

    /// Destroys a texture.
    fn destroy_texture(&self, id: TextureId) -> Result<(), ResourceError>;

    /// Creates a default view covering the whole texture.
    fn create_texture_view(&self, texture: TextureId) -> Result<TextureViewId, ResourceError>;

    /// Destroys a texture view.
    fn destroy_texture_view(&self, id: TextureViewId) -> Result<(), ResourceError>;

    /// Creates a new command encoder.
    fn create_command_encoder(&self, label: Option<&str>) -> Box<dyn CommandEncoder>;

    /// Submits a finished command buffer to the queue.
    fn submit_command_buffer(&self, command_buffer: CommandBufferId);
}
