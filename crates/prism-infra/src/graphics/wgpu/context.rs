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

use anyhow::{anyhow, Result};

/// Holds the core wgpu state objects required for rendering.
///
/// The context has no surface: everything is rendered into offscreen textures.
#[derive(Debug)]
pub struct WgpuGraphicsContext {
    pub adapter: wgpu::Adapter,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,

    // Store info for easy access
    pub adapter_name: String,
    pub adapter_backend: wgpu::Backend,
}

impl WgpuGraphicsContext {
    /// Asynchronously picks an adapter and creates a device without a surface.
    ///
    /// The instance honours the usual `WGPU_BACKEND` style environment overrides.
    pub async fn new_headless() -> Result<Self> {
        log::info!("Initializing headless WGPU Graphics Context...");

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::from_env_or_default());
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                force_fallback_adapter: false,
                compatible_surface: None,
            })
            .await
            .map_err(|e| anyhow!("No suitable graphics adapter found: {e}"))?;

        let adapter_info = adapter.get_info();
        log::info!(
            "Using graphics adapter: \"{}\" (Backend: {:?})",
            adapter_info.name,
            adapter_info.backend
        );

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("Prism Logical Device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_defaults(),
                memory_hints: wgpu::MemoryHints::default(),
                trace: wgpu::Trace::default(),
            })
            .await
            .map_err(|e| anyhow!("Failed to create logical device: {e}"))?;
        log::info!("Logical device and command queue created.");

        device.on_uncaptured_error(Box::new(|e| {
            log::error!("WGPU Uncaptured Error: {e:?}");
        }));

        Ok(Self {
            adapter,
            device,
            queue,
            adapter_name: adapter_info.name,
            adapter_backend: adapter_info.backend,
        })
    }

    /// Blocking version of [`Self::new_headless`].
    pub fn new_headless_blocking() -> Result<Self> {
        pollster::block_on(Self::new_headless())
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }
}
