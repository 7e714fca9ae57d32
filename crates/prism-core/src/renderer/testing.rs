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

//! In-memory implementations of the renderer traits that record every call.
//!
//! Enabled for this crate's tests and for downstream crates through the `testing`
//! feature. Buffers keep their bytes so tests can inspect what was uploaded.

use std::collections::{HashMap, HashSet};
use std::ops::Range;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use crate::renderer::api::*;
use crate::renderer::error::{PipelineError, ResourceError, ShaderError};
use crate::renderer::traits::{CommandEncoder, GraphicsDevice, RenderPass};

/// A command recorded by a [`RecordingPass`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassCommand {
    /// `set_pipeline`
    SetPipeline(RenderPipelineId),
    /// `set_bind_group`
    SetBindGroup(u32, BindGroupId),
    /// `set_vertex_buffer`
    SetVertexBuffer {
        /// Slot.
        slot: u32,
        /// Buffer.
        buffer: BufferId,
        /// Offset.
        offset: u64,
    },
    /// `set_index_buffer`
    SetIndexBuffer {
        /// Buffer.
        buffer: BufferId,
        /// Offset.
        offset: u64,
        /// Index format.
        format: IndexFormat,
    },
    /// `draw`
    Draw {
        /// Vertex range.
        vertices: Range<u32>,
        /// Instance range.
        instances: Range<u32>,
    },
    /// `draw_indexed`
    DrawIndexed {
        /// Index range.
        indices: Range<u32>,
        /// Base vertex.
        base_vertex: i32,
        /// Instance range.
        instances: Range<u32>,
    },
}

/// A render pass that stores the commands it receives.
#[derive(Debug, Default)]
pub struct RecordingPass {
    /// Recorded commands, in order.
    pub commands: Vec<PassCommand>,
}

impl RecordingPass {
    /// Returns the index counts of every recorded indexed draw.
    pub fn indexed_draw_counts(&self) -> Vec<u32> {
        self.commands
            .iter()
            .filter_map(|command| match command {
                PassCommand::DrawIndexed { indices, .. } => Some(indices.end - indices.start),
                _ => None,
            })
            .collect()
    }
}

impl<'pass> RenderPass<'pass> for RecordingPass {
    fn set_pipeline(&mut self, pipeline: &'pass RenderPipelineId) {
        self.commands.push(PassCommand::SetPipeline(*pipeline));
    }

    fn set_bind_group(&mut self, index: u32, bind_group: &'pass BindGroupId) {
        self.commands
            .push(PassCommand::SetBindGroup(index, *bind_group));
    }

    fn set_vertex_buffer(&mut self, slot: u32, buffer: &'pass BufferId, offset: u64) {
        self.commands.push(PassCommand::SetVertexBuffer {
            slot,
            buffer: *buffer,
            offset,
        });
    }

    fn set_index_buffer(&mut self, buffer: &'pass BufferId, offset: u64, index_format: IndexFormat) {
        self.commands.push(PassCommand::SetIndexBuffer {
            buffer: *buffer,
            offset,
            format: index_format,
        });
    }

    fn draw(&mut self, vertices: Range<u32>, instances: Range<u32>) {
        self.commands.push(PassCommand::Draw {
            vertices,
            instances,
        });
    }

    fn draw_indexed(&mut self, indices: Range<u32>, base_vertex: i32, instances: Range<u32>) {
        self.commands.push(PassCommand::DrawIndexed {
            indices,
            base_vertex,
            instances,
        });
    }
}

impl<'pass, 'a> RenderPass<'pass> for &'a mut RecordingPass {
    fn set_pipeline(&mut self, pipeline: &'pass RenderPipelineId) {
        (**self).set_pipeline(pipeline);
    }

    fn set_bind_group(&mut self, index: u32, bind_group: &'pass BindGroupId) {
        (**self).set_bind_group(index, bind_group);
    }

    fn set_vertex_buffer(&mut self, slot: u32, buffer: &'pass BufferId, offset: u64) {
        (**self).set_vertex_buffer(slot, buffer, offset);
    }

    fn set_index_buffer(&mut self, buffer: &'pass BufferId, offset: u64, index_format: IndexFormat) {
        (**self).set_index_buffer(buffer, offset, index_format);
    }

    fn draw(&mut self, vertices: Range<u32>, instances: Range<u32>) {
        (**self).draw(vertices, instances);
    }

    fn draw_indexed(&mut self, indices: Range<u32>, base_vertex: i32, instances: Range<u32>) {
        (**self).draw_indexed(indices, base_vertex, instances);
    }
}

/// A command encoder whose passes all append to one [`RecordingPass`].
#[derive(Debug, Default)]
pub struct RecordingEncoder {
    /// Everything recorded so far.
    pub recorded: RecordingPass,
}

impl CommandEncoder for RecordingEncoder {
    fn begin_render_pass<'encoder>(
        &'encoder mut self,
        _descriptor: &RenderPassDescriptor<'encoder>,
    ) -> Box<dyn RenderPass<'encoder> + 'encoder> {
        Box::new(&mut self.recorded)
    }

    fn finish(self: Box<Self>) -> CommandBufferId {
        CommandBufferId(self.recorded.commands.len())
    }
}

/// A [`GraphicsDevice`] that keeps every resource in memory.
#[derive(Debug, Default)]
pub struct RecordingDevice {
    next_id: AtomicUsize,
    fail_buffers: AtomicBool,
    buffers: Mutex<HashMap<BufferId, Vec<u8>>>,
    destroyed_buffers: Mutex<Vec<BufferId>>,
    shader_modules: Mutex<HashSet<ShaderModuleId>>,
    pipelines: Mutex<HashMap<RenderPipelineId, Vec<VertexBufferLayoutDescriptor<'static>>>>,
    bind_group_layouts: Mutex<HashSet<BindGroupLayoutId>>,
    bind_groups: Mutex<HashSet<BindGroupId>>,
    textures: Mutex<HashSet<TextureId>>,
    texture_views: Mutex<HashSet<TextureViewId>>,
    submitted: AtomicUsize,
}

impl RecordingDevice {
    /// Creates an empty device.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent buffer creation fail with a backend error.
    pub fn fail_buffer_creation(&self, fail: bool) {
        self.fail_buffers.store(fail, Ordering::SeqCst);
    }

    /// Returns a copy of the bytes held by a live buffer.
    pub fn buffer_data(&self, id: BufferId) -> Option<Vec<u8>> {
        self.buffers.lock().unwrap_or_else(PoisonError::into_inner).get(&id).cloned()
    }

    /// Number of buffers currently alive.
    pub fn live_buffer_count(&self) -> usize {
        self.buffers.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Buffers destroyed so far, in order.
    pub fn destroyed_buffers(&self) -> Vec<BufferId> {
        self.destroyed_buffers.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Number of pipelines currently alive.
    pub fn pipeline_count(&self) -> usize {
        self.pipelines.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// The vertex buffer layouts a pipeline was created with.
    pub fn pipeline_vertex_layouts(
        &self,
        id: RenderPipelineId,
    ) -> Option<Vec<VertexBufferLayoutDescriptor<'static>>> {
        self.pipelines.lock().unwrap_or_else(PoisonError::into_inner).get(&id).cloned()
    }

    /// Number of submitted command buffers.
    pub fn submitted_count(&self) -> usize {
        self.submitted.load(Ordering::SeqCst)
    }

    fn next(&self) -> usize {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }
}

impl GraphicsDevice for RecordingDevice {
    fn create_shader_module(
        &self,
        descriptor: &ShaderModuleDescriptor,
    ) -> Result<ShaderModuleId, ResourceError> {
        let ShaderSourceData::Wgsl(source) = &descriptor.source;
        if source.trim().is_empty() {
            return Err(ShaderError::CompilationError {
                label: descriptor.label.unwrap_or_default().to_string(),
                details: "empty source".to_string(),
            }
            .into());
        }
        let id = ShaderModuleId(self.next());
        self.shader_modules.lock().unwrap_or_else(PoisonError::into_inner).insert(id);
        Ok(id)
    }

    fn destroy_shader_module(&self, id: ShaderModuleId) -> Result<(), ResourceError> {
        if self.shader_modules.lock().unwrap_or_else(PoisonError::into_inner).remove(&id) {
            Ok(())
        } else {
            Err(ShaderError::NotFound { id }.into())
        }
    }

    fn create_render_pipeline(
        &self,
        descriptor: &RenderPipelineDescriptor,
    ) -> Result<RenderPipelineId, ResourceError> {
        let modules = self.shader_modules.lock().unwrap_or_else(PoisonError::into_inner);
        let referenced = std::iter::once(descriptor.vertex_shader_module)
            .chain(descriptor.fragment_shader_module);
        for module in referenced {
            if !modules.contains(&module) {
                return Err(PipelineError::InvalidShaderModuleForPipeline {
                    id: module,
                    pipeline_label: descriptor.label.as_deref().map(String::from),
                }
                .into());
            }
        }
        let layouts = self.bind_group_layouts.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(missing) = descriptor
            .bind_group_layouts
            .iter()
            .find(|layout| !layouts.contains(layout))
        {
            return Err(PipelineError::InvalidBindGroupLayout { id: *missing }.into());
        }

        let id = RenderPipelineId(self.next());
        let vertex_layouts = descriptor
            .vertex_buffers_layout
            .iter()
            .cloned()
            .map(VertexBufferLayoutDescriptor::into_owned)
            .collect();
        self.pipelines.lock().unwrap_or_else(PoisonError::into_inner).insert(id, vertex_layouts);
        Ok(id)
    }

    fn destroy_render_pipeline(&self, id: RenderPipelineId) -> Result<(), ResourceError> {
        self.pipelines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)
            .map(|_| ())
            .ok_or(PipelineError::InvalidRenderPipeline { id }.into())
    }

    fn create_bind_group_layout(
        &self,
        _descriptor: &BindGroupLayoutDescriptor,
    ) -> Result<BindGroupLayoutId, ResourceError> {
        let id = BindGroupLayoutId(self.next());
        self.bind_group_layouts.lock().unwrap_or_else(PoisonError::into_inner).insert(id);
        Ok(id)
    }

    fn create_bind_group(
        &self,
        descriptor: &BindGroupDescriptor,
    ) -> Result<BindGroupId, ResourceError> {
        if !self
            .bind_group_layouts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&descriptor.layout)
        {
            return Err(ResourceError::NotFound);
        }
        let buffers = self.buffers.lock().unwrap_or_else(PoisonError::into_inner);
        if descriptor
            .entries
            .iter()
            .any(|entry| !buffers.contains_key(&entry.buffer))
        {
            return Err(ResourceError::NotFound);
        }
        let id = BindGroupId(self.next());
        self.bind_groups.lock().unwrap_or_else(PoisonError::into_inner).insert(id);
        Ok(id)
    }

    fn destroy_bind_group(&self, id: BindGroupId) -> Result<(), ResourceError> {
        if self.bind_groups.lock().unwrap_or_else(PoisonError::into_inner).remove(&id) {
            Ok(())
        } else {
            Err(ResourceError::NotFound)
        }
    }

    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<BufferId, ResourceError> {
        self.create_buffer_with_data(descriptor, &vec![0; descriptor.size as usize])
    }

    fn create_buffer_with_data(
        &self,
        _descriptor: &BufferDescriptor,
        data: &[u8],
    ) -> Result<BufferId, ResourceError> {
        if self.fail_buffers.load(Ordering::SeqCst) {
            return Err(ResourceError::BackendError(
                "buffer creation disabled".to_string(),
            ));
        }
        let id = BufferId(self.next());
        self.buffers.lock().unwrap_or_else(PoisonError::into_inner).insert(id, data.to_vec());
        Ok(id)
    }

    fn destroy_buffer(&self, id: BufferId) -> Result<(), ResourceError> {
        match self.buffers.lock().unwrap_or_else(PoisonError::into_inner).remove(&id) {
            Some(_) => {
                self.destroyed_buffers.lock().unwrap_or_else(PoisonError::into_inner).push(id);
                Ok(())
            }
            None => Err(ResourceError::NotFound),
        }
    }

    fn write_buffer(&self, id: BufferId, offset: u64, data: &[u8]) -> Result<(), ResourceError> {
        let mut buffers = self.buffers.lock().unwrap_or_else(PoisonError::into_inner);
        let buffer = buffers.get_mut(&id).ok_or(ResourceError::NotFound)?;
        let start = offset as usize;
        let end = start + data.len();
        if end > buffer.len() {
            return Err(ResourceError::OutOfBounds);
        }
        buffer[start..end].copy_from_slice(data);
        Ok(())
    }

    fn create_texture(&self, _descriptor: &TextureDescriptor) -> Result<TextureId, ResourceError> {
        let id = TextureId(self.next());
        self.textures.lock().unwrap_or_else(PoisonError::into_inner).insert(id);
        Ok(id)
    }

    fn destroy_texture(&self, id: TextureId) -> Result<(), ResourceError> {
        if self.textures.lock().unwrap_or_else(PoisonError::into_inner).remove(&id) {
            Ok(())
        } else {
            Err(ResourceError::NotFound)
        }
    }

    fn create_texture_view(&self, texture: TextureId) -> Result<TextureViewId, ResourceError> {
        if !self.textures.lock().unwrap_or_else(PoisonError::into_inner).contains(&texture) {
            return Err(ResourceError::NotFound);
        }
        let id = TextureViewId(self.next());
        self.texture_views.lock().unwrap_or_else(PoisonError::into_inner).insert(id);
        Ok(id)
    }

    fn destroy_texture_view(&self, id: TextureViewId) -> Result<(), ResourceError> {
        if self.texture_views.lock().unwrap_or_else(PoisonError::into_inner).remove(&id) {
            Ok(())
        } else {
            Err(ResourceError::NotFound)
        }
    }

    fn create_command_encoder(&self, _label: Option<&str>) -> Box<dyn CommandEncoder> {
        Box::new(RecordingEncoder::default())
    }

    fn submit_command_buffer(&self, _command_buffer: CommandBufferId) {
        self.submitted.fetch_add(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::borrow::Cow;

    #[test]
    fn write_buffer_checks_bounds() {
        let device = RecordingDevice::new();
        let id = device
            .create_buffer(&BufferDescriptor {
                label: Some(Cow::Borrowed("uniforms")),
                size: 8,
                usage: BufferUsage::UNIFORM | BufferUsage::COPY_DST,
            })
            .unwrap();
        device.write_buffer(id, 4, &[1, 2, 3, 4]).unwrap();
        assert_eq!(device.buffer_data(id).unwrap(), vec![0, 0, 0, 0, 1, 2, 3, 4]);
        assert!(matches!(
            device.write_buffer(id, 6, &[0; 4]),
            Err(ResourceError::OutOfBounds)
        ));
    }

    #[test]
    fn encoder_passes_share_one_recording() {
        let mut encoder = RecordingEncoder::default();
        {
            let mut pass = encoder.begin_render_pass(&RenderPassDescriptor {
                label: None,
                color_attachments: &[],
                depth_stencil_attachment: None,
            });
            pass.draw(0..3, 0..1);
        }
        assert_eq!(encoder.recorded.commands.len(), 1);
        assert_eq!(Box::new(encoder).finish(), CommandBufferId(1));
    }
}
