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

use std::ops::Range;
use std::sync::Arc;

use prism_core::renderer::{
    BindGroupId, BufferId, CommandBufferId, CommandEncoder, IndexFormat, RenderPass,
    RenderPassDescriptor, RenderPipelineId,
};

use super::conversions::IntoWgpu;
use super::device::WgpuDevice;

/// A recording render pass on top of `wgpu::RenderPass`.
///
/// Handles that the device does not know are skipped with a warning.
pub struct WgpuRenderPass<'a> {
    pub(crate) pass: wgpu::RenderPass<'a>,
    pub(crate) device: &'a WgpuDevice,
}

impl<'pass> RenderPass<'pass> for WgpuRenderPass<'pass> {
    fn set_pipeline(&mut self, pipeline_id: &'pass RenderPipelineId) {
        if let Some(pipeline) = self.device.get_wgpu_render_pipeline(*pipeline_id) {
            self.pass.set_pipeline(&pipeline);
        } else {
            log::warn!("WgpuRenderPass: RenderPipelineId {pipeline_id:?} not found.");
        }
    }

    fn set_bind_group(&mut self, index: u32, bind_group_id: &'pass BindGroupId) {
        if let Some(bind_group) = self.device.get_wgpu_bind_group(*bind_group_id) {
            self.pass.set_bind_group(index, bind_group.as_ref(), &[]);
        } else {
            log::warn!("WgpuRenderPass: BindGroupId {bind_group_id:?} not found.");
        }
    }

    fn set_vertex_buffer(&mut self, slot: u32, buffer_id: &'pass BufferId, offset: u64) {
        if let Some(buffer) = self.device.get_wgpu_buffer(*buffer_id) {
            self.pass.set_vertex_buffer(slot, buffer.slice(offset..));
        } else {
            log::warn!("WgpuRenderPass: Vertex BufferId {buffer_id:?} not found.");
        }
    }

    fn set_index_buffer(&mut self, buffer_id: &'pass BufferId, offset: u64, index_format: IndexFormat) {
        if let Some(buffer) = self.device.get_wgpu_buffer(*buffer_id) {
            self.pass
                .set_index_buffer(buffer.slice(offset..), index_format.into_wgpu());
        } else {
            log::warn!("WgpuRenderPass: Index BufferId {buffer_id:?} not found.");
        }
    }

    fn draw(&mut self, vertices: Range<u32>, instances: Range<u32>) {
        self.pass.draw(vertices, instances);
    }

    fn draw_indexed(&mut self, indices: Range<u32>, base_vertex: i32, instances: Range<u32>) {
        self.pass.draw_indexed(indices, base_vertex, instances);
    }
}

/// Records render passes into a `wgpu::CommandEncoder`.
pub struct WgpuCommandEncoder {
    pub(crate) encoder: wgpu::CommandEncoder,
    pub(crate) device: WgpuDevice,
}

impl WgpuCommandEncoder {
    pub(crate) fn new(device: WgpuDevice, label: Option<&str>) -> Self {
        let encoder = device.create_wgpu_command_encoder(label);
        Self { encoder, device }
    }
}

impl CommandEncoder for WgpuCommandEncoder {
    fn begin_render_pass<'encoder>(
        &'encoder mut self,
        descriptor: &RenderPassDescriptor<'encoder>,
    ) -> Box<dyn RenderPass<'encoder> + 'encoder> {
        // Resolve every view up front so the attachments can borrow them.
        let mut views: Vec<Arc<wgpu::TextureView>> = Vec::new();
        let mut ops = Vec::new();
        for attachment in descriptor.color_attachments {
            match self.device.get_wgpu_texture_view(attachment.view) {
                Some(view) => {
                    views.push(view);
                    ops.push(attachment.ops);
                }
                None => log::warn!(
                    "WgpuCommandEncoder: color attachment view {:?} not found, skipping it.",
                    attachment.view
                ),
            }
        }

        let color_attachments: Vec<Option<wgpu::RenderPassColorAttachment>> = views
            .iter()
            .zip(&ops)
            .map(|(view, ops)| {
                Some(wgpu::RenderPassColorAttachment {
                    view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: ops.load.into_wgpu(),
                        store: ops.store.into_wgpu(),
                    },
                })
            })
            .collect();

        let depth = descriptor.depth_stencil_attachment.and_then(|ds| {
            let view = self.device.get_wgpu_texture_view(ds.view);
            if view.is_none() {
                log::warn!(
                    "WgpuCommandEncoder: depth attachment view {:?} not found, skipping it.",
                    ds.view
                );
            }
            view.map(|view| (view, ds.depth_ops))
        });
        let depth_stencil_attachment =
            depth
                .as_ref()
                .map(|(view, depth_ops)| wgpu::RenderPassDepthStencilAttachment {
                    view,
                    depth_ops: depth_ops.map(|ops| wgpu::Operations {
                        load: ops.load.into_wgpu(),
                        store: ops.store.into_wgpu(),
                    }),
                    stencil_ops: None,
                });

        let pass = self.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: descriptor.label,
            color_attachments: &color_attachments,
            depth_stencil_attachment,
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        Box::new(WgpuRenderPass {
            pass,
            device: &self.device,
        })
    }

    fn finish(self: Box<Self>) -> CommandBufferId {
        let Self { encoder, device } = *self;
        device.register_command_buffer(encoder.finish())
    }
}
