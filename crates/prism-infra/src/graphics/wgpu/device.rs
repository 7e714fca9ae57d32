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

use std::collections::HashMap;
use std::num::NonZeroU64;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex, MutexGuard, PoisonError};

use wgpu::util::DeviceExt;

use prism_core::renderer::{
    BindGroupDescriptor, BindGroupId, BindGroupLayoutDescriptor, BindGroupLayoutId, BindingType,
    BufferDescriptor, BufferId, CommandBufferId, CommandEncoder, GraphicsDevice, PipelineError,
    RenderPipelineDescriptor, RenderPipelineId, ResourceError, ShaderError,
    ShaderModuleDescriptor, ShaderModuleId, ShaderSourceData, TextureDescriptor, TextureFormat,
    TextureId, TextureViewId,
};

use super::command::WgpuCommandEncoder;
use super::context::WgpuGraphicsContext;
use super::conversions::IntoWgpu;

#[derive(Debug)]
struct WgpuBufferEntry {
    wgpu_buffer: Arc<wgpu::Buffer>,
}

#[derive(Debug)]
struct WgpuTextureEntry {
    wgpu_texture: Arc<wgpu::Texture>,
    width: u32,
    height: u32,
    format: TextureFormat,
}

/// The internal, non-clonable state of the WgpuDevice.
/// This struct holds all the GPU resources and state, protected by an Arc.
#[derive(Debug)]
struct WgpuDeviceInternal {
    context: Arc<Mutex<WgpuGraphicsContext>>,
    shader_modules: Mutex<HashMap<ShaderModuleId, Arc<wgpu::ShaderModule>>>,
    pipelines: Mutex<HashMap<RenderPipelineId, Arc<wgpu::RenderPipeline>>>,
    bind_group_layouts: Mutex<HashMap<BindGroupLayoutId, Arc<wgpu::BindGroupLayout>>>,
    bind_groups: Mutex<HashMap<BindGroupId, Arc<wgpu::BindGroup>>>,
    buffers: Mutex<HashMap<BufferId, WgpuBufferEntry>>,
    textures: Mutex<HashMap<TextureId, WgpuTextureEntry>>,
    texture_views: Mutex<HashMap<TextureViewId, Arc<wgpu::TextureView>>>,

    /// Source of every resource ID handed out by this device.
    next_id: AtomicUsize,

    /// Command buffers that have been finished but not yet submitted.
    pending_command_buffers: Mutex<HashMap<CommandBufferId, wgpu::CommandBuffer>>,

    /// Errors raised outside of any error scope since the last `check_errors`.
    uncaptured_errors: Arc<Mutex<Vec<String>>>,
}

/// A clonable, thread-safe handle to the wgpu graphics device.
/// It wraps the actual device state in an Arc, allowing it to be shared with
/// command encoders.
#[derive(Clone, Debug)]
pub struct WgpuDevice {
    internal: Arc<WgpuDeviceInternal>,
}

fn lock<'a, T>(mutex: &'a Mutex<T>, what: &str) -> Result<MutexGuard<'a, T>, ResourceError> {
    mutex
        .lock()
        .map_err(|e| ResourceError::BackendError(format!("Mutex poisoned ({what}): {e}")))
}

impl WgpuDevice {
    pub fn new(context: WgpuGraphicsContext) -> Self {
        let uncaptured_errors = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&uncaptured_errors);
        context.device.on_uncaptured_error(Box::new(move |e| {
            log::error!("WGPU Uncaptured Error: {e}");
            if let Ok(mut errors) = sink.lock() {
                errors.push(e.to_string());
            }
        }));

        Self {
            internal: Arc::new(WgpuDeviceInternal {
                context: Arc::new(Mutex::new(context)),
                shader_modules: Mutex::new(HashMap::new()),
                pipelines: Mutex::new(HashMap::new()),
                bind_group_layouts: Mutex::new(HashMap::new()),
                bind_groups: Mutex::new(HashMap::new()),
                buffers: Mutex::new(HashMap::new()),
                textures: Mutex::new(HashMap::new()),
                texture_views: Mutex::new(HashMap::new()),
                next_id: AtomicUsize::new(0),
                pending_command_buffers: Mutex::new(HashMap::new()),
                uncaptured_errors,
            }),
        }
    }

    fn next_id(&self) -> usize {
        self.internal.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Helper function to execute an operation with the wgpu::Device locked.
    fn with_wgpu_device<F, R>(&self, operation: F) -> Result<R, ResourceError>
    where
        F: FnOnce(&wgpu::Device) -> Result<R, ResourceError>,
    {
        let context = lock(&self.internal.context, "context")?;
        operation(&context.device)
    }

    /// Runs `operation` inside a validation error scope and reports the first
    /// validation error it raised.
    fn with_validation<F, R>(&self, operation: F) -> Result<R, ResourceError>
    where
        F: FnOnce(&wgpu::Device) -> Result<R, ResourceError>,
    {
        self.with_wgpu_device(|device| {
            device.push_error_scope(wgpu::ErrorFilter::Validation);
            let result = operation(device);
            let error = pollster::block_on(device.pop_error_scope());
            match (result, error) {
                (Ok(_), Some(error)) => Err(ResourceError::BackendError(error.to_string())),
                (result, _) => result,
            }
        })
    }

    /// The wgpu render pipeline behind `id`.
    pub fn get_wgpu_render_pipeline(&self, id: RenderPipelineId) -> Option<Arc<wgpu::RenderPipeline>> {
        self.internal.pipelines.lock().ok()?.get(&id).cloned()
    }

    /// The wgpu bind group behind `id`.
    pub fn get_wgpu_bind_group(&self, id: BindGroupId) -> Option<Arc<wgpu::BindGroup>> {
        self.internal.bind_groups.lock().ok()?.get(&id).cloned()
    }

    /// The wgpu buffer behind `id`.
    pub fn get_wgpu_buffer(&self, id: BufferId) -> Option<Arc<wgpu::Buffer>> {
        self.internal
            .buffers
            .lock()
            .ok()?
            .get(&id)
            .map(|entry| Arc::clone(&entry.wgpu_buffer))
    }

    /// The wgpu texture view behind `id`.
    pub fn get_wgpu_texture_view(&self, id: TextureViewId) -> Option<Arc<wgpu::TextureView>> {
        self.internal.texture_views.lock().ok()?.get(&id).cloned()
    }

    /// Reports the errors the device raised outside of an error scope since the
    /// previous call, tagging the log with `location`.
    ///
    /// Waits for submitted work first so that its errors are included.
    pub fn check_errors(&self, location: &str) -> Result<(), ResourceError> {
        {
            let context = lock(&self.internal.context, "context")?;
            context
                .device
                .poll(wgpu::PollType::Wait)
                .map_err(|e| ResourceError::BackendError(format!("Device poll failed: {e}")))?;
        }
        let errors = std::mem::take(&mut *lock(&self.internal.uncaptured_errors, "uncaptured_errors")?);
        if errors.is_empty() {
            return Ok(());
        }
        for error in &errors {
            log::error!("WgpuDevice: error at {location}: {error}");
        }
        Err(ResourceError::BackendError(format!(
            "{} error(s) at {location}: {}",
            errors.len(),
            errors.join("; ")
        )))
    }

    /// Name and backend of the adapter in use.
    pub fn adapter_description(&self) -> String {
        match self.internal.context.lock() {
            Ok(context) => format!("{} ({:?})", context.adapter_name, context.adapter_backend),
            Err(_) => "unknown adapter".to_string(),
        }
    }

    /// Registers a finished wgpu::CommandBuffer and returns an abstract ID for it.
    pub(crate) fn register_command_buffer(&self, buffer: wgpu::CommandBuffer) -> CommandBufferId {
        let id = CommandBufferId(self.next_id());
        match self.internal.pending_command_buffers.lock() {
            Ok(mut pending) => {
                pending.insert(id, buffer);
            }
            Err(e) => log::error!("WgpuDevice: Mutex poisoned (pending_command_buffers): {e}"),
        }
        id
    }

    pub(crate) fn create_wgpu_command_encoder(&self, label: Option<&str>) -> wgpu::CommandEncoder {
        let context = self
            .internal
            .context
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        context
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label })
    }

    /// Copies an RGBA8 texture back to the CPU, row by row without padding.
    ///
    /// Blocks until the GPU has finished all submitted work.
    pub fn read_texture_rgba8(&self, id: TextureId) -> Result<Vec<u8>, ResourceError> {
        let (texture, width, height, format) = {
            let textures = lock(&self.internal.textures, "textures")?;
            let entry = textures.get(&id).ok_or(ResourceError::NotFound)?;
            (
                Arc::clone(&entry.wgpu_texture),
                entry.width,
                entry.height,
                entry.format,
            )
        };
        if format.is_depth() {
            return Err(ResourceError::BackendError(format!(
                "texture {id:?} has depth format {format:?}"
            )));
        }

        let unpadded_bytes_per_row = width * format.bytes_per_pixel();
        let alignment = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let padded_bytes_per_row = unpadded_bytes_per_row.div_ceil(alignment) * alignment;

        let context = lock(&self.internal.context, "context")?;
        let staging = context.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Readback Staging Buffer"),
            size: u64::from(padded_bytes_per_row) * u64::from(height),
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = context
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Readback Encoder"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &staging,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_bytes_per_row),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        context.queue.submit(std::iter::once(encoder.finish()));

        let slice = staging.slice(..);
        let (sender, receiver) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            // The receiver only goes away if the poll below failed.
            let _ = sender.send(result);
        });
        context
            .device
            .poll(wgpu::PollType::Wait)
            .map_err(|e| ResourceError::BackendError(format!("Device poll failed: {e}")))?;
        receiver
            .recv()
            .map_err(|e| ResourceError::BackendError(format!("Readback never completed: {e}")))?
            .map_err(|e| ResourceError::BackendError(format!("Failed to map readback buffer: {e}")))?;

        let mut pixels = Vec::with_capacity((unpadded_bytes_per_row * height) as usize);
        {
            let mapped = slice.get_mapped_range();
            for row in mapped.chunks_exact(padded_bytes_per_row as usize) {
                pixels.extend_from_slice(&row[..unpadded_bytes_per_row as usize]);
            }
        }
        staging.unmap();

        log::debug!("WgpuDevice: Read back {width}x{height} texture {id:?}");
        Ok(pixels)
    }
}

impl GraphicsDevice for WgpuDevice {
    // --- Shader Module Operations ---

    fn create_shader_module(
        &self,
        descriptor: &ShaderModuleDescriptor,
    ) -> Result<ShaderModuleId, ResourceError> {
        let source = match &descriptor.source {
            ShaderSourceData::Wgsl(code) => wgpu::ShaderSource::Wgsl(code.clone()),
        };
        let label = descriptor.label;

        let module = self
            .with_validation(|device| {
                Ok(device.create_shader_module(wgpu::ShaderModuleDescriptor { label, source }))
            })
            .map_err(|e| match e {
                ResourceError::BackendError(details) => ShaderError::CompilationError {
                    label: label.unwrap_or_default().to_string(),
                    details,
                }
                .into(),
                other => other,
            })?;

        let id = ShaderModuleId(self.next_id());
        lock(&self.internal.shader_modules, "shader_modules")?.insert(id, Arc::new(module));
        log::info!(
            "WgpuDevice: Created shader module '{}' with ID: {id:?}",
            label.unwrap_or_default()
        );
        Ok(id)
    }

    fn destroy_shader_module(&self, id: ShaderModuleId) -> Result<(), ResourceError> {
        if lock(&self.internal.shader_modules, "shader_modules")?
            .remove(&id)
            .is_some()
        {
            log::debug!("WgpuDevice: Destroyed shader module with ID: {id:?}");
            Ok(())
        } else {
            Err(ShaderError::NotFound { id }.into())
        }
    }

    // --- Render Pipeline Operations ---

    fn create_render_pipeline(
        &self,
        descriptor: &RenderPipelineDescriptor,
    ) -> Result<RenderPipelineId, ResourceError> {
        let pipeline_label = descriptor.label.as_deref();
        log::debug!("WgpuDevice: Creating render pipeline with label: {pipeline_label:?}");

        // 1. Look up the shader modules and bind group layouts
        let find_module = |id: ShaderModuleId| -> Result<Arc<wgpu::ShaderModule>, ResourceError> {
            lock(&self.internal.shader_modules, "shader_modules")?
                .get(&id)
                .cloned()
                .ok_or_else(|| {
                    PipelineError::InvalidShaderModuleForPipeline {
                        id,
                        pipeline_label: pipeline_label.map(String::from),
                    }
                    .into()
                })
        };
        let vs_module = find_module(descriptor.vertex_shader_module)?;
        let fragment = match descriptor.fragment_shader_module {
            Some(fs_id) => {
                let entry_point = descriptor.fragment_entry_point.clone().ok_or(
                    PipelineError::MissingEntryPointForFragmentShader {
                        pipeline_label: pipeline_label.map(String::from),
                        shader_id: fs_id,
                    },
                )?;
                Some((find_module(fs_id)?, entry_point))
            }
            None => None,
        };

        let bind_group_layouts: Vec<Arc<wgpu::BindGroupLayout>> = {
            let layouts = lock(&self.internal.bind_group_layouts, "bind_group_layouts")?;
            descriptor
                .bind_group_layouts
                .iter()
                .map(|id| {
                    layouts
                        .get(id)
                        .cloned()
                        .ok_or(PipelineError::InvalidBindGroupLayout { id: *id })
                })
                .collect::<Result<_, _>>()?
        };
        let bind_group_layout_refs: Vec<&wgpu::BindGroupLayout> =
            bind_group_layouts.iter().map(|layout| layout.as_ref()).collect();

        // 2. Convert vertex buffers layout
        let vertex_attributes: Vec<Vec<wgpu::VertexAttribute>> = descriptor
            .vertex_buffers_layout
            .iter()
            .map(|layout| {
                layout
                    .attributes
                    .iter()
                    .map(|attribute| wgpu::VertexAttribute {
                        format: attribute.format.into_wgpu(),
                        offset: attribute.offset,
                        shader_location: attribute.shader_location,
                    })
                    .collect()
            })
            .collect();
        let vertex_buffers: Vec<wgpu::VertexBufferLayout> = descriptor
            .vertex_buffers_layout
            .iter()
            .zip(&vertex_attributes)
            .map(|(layout, attributes)| wgpu::VertexBufferLayout {
                array_stride: layout.array_stride,
                step_mode: layout.step_mode.into_wgpu(),
                attributes,
            })
            .collect();

        // 3. Convert fixed function state
        let state = descriptor.primitive_state;
        let topology = state.topology.into_wgpu();
        let primitive = wgpu::PrimitiveState {
            topology,
            strip_index_format: topology
                .is_strip()
                .then_some(wgpu::IndexFormat::Uint32),
            front_face: state.front_face.into_wgpu(),
            cull_mode: state.cull_mode.map(|mode| mode.into_wgpu()),
            ..Default::default()
        };
        let depth_stencil = descriptor
            .depth_stencil_state
            .map(|ds| wgpu::DepthStencilState {
                format: ds.format.into_wgpu(),
                depth_write_enabled: ds.depth_write_enabled,
                depth_compare: ds.depth_compare.into_wgpu(),
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            });
        let color_targets: Vec<Option<wgpu::ColorTargetState>> = descriptor
            .color_target_states
            .iter()
            .map(|target| {
                Some(wgpu::ColorTargetState {
                    format: target.format.into_wgpu(),
                    blend: target
                        .alpha_blending
                        .then_some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })
            })
            .collect();

        // 4. Create pipeline layout and render pipeline
        let pipeline = self
            .with_validation(|device| {
                let layout_label = pipeline_label.map(|s| format!("{s}_Layout"));
                let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                    label: layout_label.as_deref(),
                    bind_group_layouts: &bind_group_layout_refs,
                    push_constant_ranges: &[],
                });
                Ok(device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                    label: pipeline_label,
                    layout: Some(&layout),
                    vertex: wgpu::VertexState {
                        module: &vs_module,
                        entry_point: Some(&*descriptor.vertex_entry_point),
                        buffers: &vertex_buffers,
                        compilation_options: Default::default(),
                    },
                    fragment: fragment.as_ref().map(|(module, entry_point)| wgpu::FragmentState {
                        module,
                        entry_point: Some(&**entry_point),
                        targets: &color_targets,
                        compilation_options: Default::default(),
                    }),
                    primitive,
                    depth_stencil,
                    multisample: wgpu::MultisampleState::default(),
                    multiview: None,
                    cache: None,
                }))
            })
            .map_err(|e| match e {
                ResourceError::BackendError(details) => PipelineError::CompilationFailed {
                    label: pipeline_label.map(String::from),
                    details,
                }
                .into(),
                other => other,
            })?;

        let id = RenderPipelineId(self.next_id());
        lock(&self.internal.pipelines, "pipelines")?.insert(id, Arc::new(pipeline));
        log::info!(
            "WgpuDevice: Created render pipeline '{}' with ID: {id:?}",
            pipeline_label.unwrap_or_default()
        );
        Ok(id)
    }

    fn destroy_render_pipeline(&self, id: RenderPipelineId) -> Result<(), ResourceError> {
        if lock(&self.internal.pipelines, "pipelines")?.remove(&id).is_some() {
            log::debug!("WgpuDevice: Destroyed render pipeline with ID: {id:?}");
            Ok(())
        } else {
            Err(PipelineError::InvalidRenderPipeline { id }.into())
        }
    }

    // --- Bind Group Operations ---

    fn create_bind_group_layout(
        &self,
        descriptor: &BindGroupLayoutDescriptor,
    ) -> Result<BindGroupLayoutId, ResourceError> {
        let entries: Vec<wgpu::BindGroupLayoutEntry> = descriptor
            .entries
            .iter()
            .map(|entry| wgpu::BindGroupLayoutEntry {
                binding: entry.binding,
                visibility: entry.visibility.into_wgpu(),
                ty: match entry.ty {
                    BindingType::UniformBuffer { min_binding_size } => wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: min_binding_size.and_then(NonZeroU64::new),
                    },
                },
                count: None,
            })
            .collect();

        let layout = self.with_wgpu_device(|device| {
            Ok(device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: descriptor.label,
                entries: &entries,
            }))
        })?;

        let id = BindGroupLayoutId(self.next_id());
        lock(&self.internal.bind_group_layouts, "bind_group_layouts")?.insert(id, Arc::new(layout));
        log::debug!(
            "WgpuDevice: Created bind group layout '{}' with ID: {id:?}",
            descriptor.label.unwrap_or_default()
        );
        Ok(id)
    }

    fn create_bind_group(
        &self,
        descriptor: &BindGroupDescriptor,
    ) -> Result<BindGroupId, ResourceError> {
        let layout = lock(&self.internal.bind_group_layouts, "bind_group_layouts")?
            .get(&descriptor.layout)
            .cloned()
            .ok_or(PipelineError::InvalidBindGroupLayout {
                id: descriptor.layout,
            })?;
        let buffers: Vec<Arc<wgpu::Buffer>> = descriptor
            .entries
            .iter()
            .map(|entry| self.get_wgpu_buffer(entry.buffer).ok_or(ResourceError::NotFound))
            .collect::<Result<_, _>>()?;
        let entries: Vec<wgpu::BindGroupEntry> = descriptor
            .entries
            .iter()
            .zip(&buffers)
            .map(|(entry, buffer)| wgpu::BindGroupEntry {
                binding: entry.binding,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer,
                    offset: entry.offset,
                    size: entry.size.and_then(NonZeroU64::new),
                }),
            })
            .collect();

        let bind_group = self.with_validation(|device| {
            Ok(device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: descriptor.label,
                layout: &layout,
                entries: &entries,
            }))
        })?;

        let id = BindGroupId(self.next_id());
        lock(&self.internal.bind_groups, "bind_groups")?.insert(id, Arc::new(bind_group));
        log::debug!(
            "WgpuDevice: Created bind group '{}' with ID: {id:?}",
            descriptor.label.unwrap_or_default()
        );
        Ok(id)
    }

    fn destroy_bind_group(&self, id: BindGroupId) -> Result<(), ResourceError> {
        if lock(&self.internal.bind_groups, "bind_groups")?.remove(&id).is_some() {
            log::debug!("WgpuDevice: Destroyed bind group with ID: {id:?}");
            Ok(())
        } else {
            Err(ResourceError::NotFound)
        }
    }

    // --- Buffer Operations ---

    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<BufferId, ResourceError> {
        let buffer = self.with_wgpu_device(|device| {
            Ok(device.create_buffer(&wgpu::BufferDescriptor {
                label: descriptor.label.as_deref(),
                size: descriptor.size,
                usage: descriptor.usage.into_wgpu(),
                mapped_at_creation: false,
            }))
        })?;
        self.register_buffer(buffer, descriptor)
    }

    fn create_buffer_with_data(
        &self,
        descriptor: &BufferDescriptor,
        data: &[u8],
    ) -> Result<BufferId, ResourceError> {
        let buffer = self.with_wgpu_device(|device| {
            Ok(device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: descriptor.label.as_deref(),
                contents: data,
                usage: descriptor.usage.into_wgpu(),
            }))
        })?;
        self.register_buffer(buffer, descriptor)
    }

    fn destroy_buffer(&self, id: BufferId) -> Result<(), ResourceError> {
        match lock(&self.internal.buffers, "buffers")?.remove(&id) {
            Some(entry) => {
                entry.wgpu_buffer.destroy();
                log::debug!("WgpuDevice: Destroyed buffer with ID: {id:?}");
                Ok(())
            }
            None => Err(ResourceError::NotFound),
        }
    }

    fn write_buffer(&self, id: BufferId, offset: u64, data: &[u8]) -> Result<(), ResourceError> {
        let buffer = self.get_wgpu_buffer(id).ok_or(ResourceError::NotFound)?;
        if offset + data.len() as u64 > buffer.size() {
            return Err(ResourceError::OutOfBounds);
        }
        let context = lock(&self.internal.context, "context")?;
        context.queue.write_buffer(&buffer, offset, data);
        log::trace!(
            "WgpuDevice: Wrote {} bytes to buffer ID: {id:?} at offset {offset}",
            data.len()
        );
        Ok(())
    }

    // --- Texture Operations ---

    fn create_texture(&self, descriptor: &TextureDescriptor) -> Result<TextureId, ResourceError> {
        let texture = self.with_wgpu_device(|device| {
            Ok(device.create_texture(&wgpu::TextureDescriptor {
                label: descriptor.label.as_deref(),
                size: wgpu::Extent3d {
                    width: descriptor.width,
                    height: descriptor.height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: descriptor.format.into_wgpu(),
                usage: descriptor.usage.into_wgpu(),
                view_formats: &[],
            }))
        })?;

        let id = TextureId(self.next_id());
        lock(&self.internal.textures, "textures")?.insert(
            id,
            WgpuTextureEntry {
                wgpu_texture: Arc::new(texture),
                width: descriptor.width,
                height: descriptor.height,
                format: descriptor.format,
            },
        );
        log::info!(
            "WgpuDevice: Created texture '{}' with ID: {id:?}, {}x{} {:?}",
            descriptor.label.as_deref().unwrap_or_default(),
            descriptor.width,
            descriptor.height,
            descriptor.format
        );
        Ok(id)
    }

    fn destroy_texture(&self, id: TextureId) -> Result<(), ResourceError> {
        match lock(&self.internal.textures, "textures")?.remove(&id) {
            Some(entry) => {
                entry.wgpu_texture.destroy();
                log::debug!("WgpuDevice: Destroyed texture with ID: {id:?}");
                Ok(())
            }
            None => Err(ResourceError::NotFound),
        }
    }

    fn create_texture_view(&self, texture: TextureId) -> Result<TextureViewId, ResourceError> {
        let view = lock(&self.internal.textures, "textures")?
            .get(&texture)
            .ok_or(ResourceError::NotFound)?
            .wgpu_texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let id = TextureViewId(self.next_id());
        lock(&self.internal.texture_views, "texture_views")?.insert(id, Arc::new(view));
        log::debug!("WgpuDevice: Created texture view {id:?} for texture {texture:?}");
        Ok(id)
    }

    fn destroy_texture_view(&self, id: TextureViewId) -> Result<(), ResourceError> {
        if lock(&self.internal.texture_views, "texture_views")?
            .remove(&id)
            .is_some()
        {
            log::debug!("WgpuDevice: Destroyed texture view with ID: {id:?}");
            Ok(())
        } else {
            Err(ResourceError::NotFound)
        }
    }

    // --- Command Operations ---

    fn create_command_encoder(&self, label: Option<&str>) -> Box<dyn CommandEncoder> {
        Box::new(WgpuCommandEncoder::new(self.clone(), label))
    }

    fn submit_command_buffer(&self, command_buffer: CommandBufferId) {
        let buffer = match self.internal.pending_command_buffers.lock() {
            Ok(mut pending) => pending.remove(&command_buffer),
            Err(e) => {
                log::error!("WgpuDevice: Mutex poisoned (pending_command_buffers): {e}");
                return;
            }
        };
        let Some(buffer) = buffer else {
            log::warn!("WgpuDevice: Unknown command buffer {command_buffer:?} submitted");
            return;
        };
        match self.internal.context.lock() {
            Ok(context) => {
                context.queue.submit(std::iter::once(buffer));
            }
            Err(e) => log::error!("WgpuDevice: Mutex poisoned (context): {e}"),
        }
    }
}

impl WgpuDevice {
    fn register_buffer(
        &self,
        buffer: wgpu::Buffer,
        descriptor: &BufferDescriptor,
    ) -> Result<BufferId, ResourceError> {
        let size = buffer.size();
        let id = BufferId(self.next_id());
        lock(&self.internal.buffers, "buffers")?.insert(
            id,
            WgpuBufferEntry {
                wgpu_buffer: Arc::new(buffer),
            },
        );
        log::debug!(
            "WgpuDevice: Created buffer '{}' with ID: {id:?}, size: {size} bytes",
            descriptor.label.as_deref().unwrap_or_default()
        );
        Ok(id)
    }
}
