//! WGPU context.
//!
//! `GpuContext` holds device, queue, surface and surface configuration,
//! and owns acquire / reconfigure. Everything else (targets, pipelines)
//! lives above it.

use raw_window_handle::{HasDisplayHandle, HasWindowHandle};

use crate::errors::{EmberError, Result};
use crate::renderer::settings::RenderSettings;

pub struct GpuContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub surface: wgpu::Surface<'static>,
    pub config: wgpu::SurfaceConfiguration,
}

impl GpuContext {
    pub async fn new<W>(
        window: W,
        settings: &RenderSettings,
        width: u32,
        height: u32,
    ) -> Result<Self>
    where
        W: HasWindowHandle + HasDisplayHandle + Send + Sync + 'static,
    {
        let instance = wgpu::Instance::default();
        let surface = instance
            .create_surface(window)
            .map_err(|e| EmberError::AdapterRequestFailed(e.to_string()))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: settings.power_preference,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| EmberError::AdapterRequestFailed(e.to_string()))?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: None,
                required_features: settings.required_features,
                required_limits: settings.required_limits.clone(),
                memory_hints: wgpu::MemoryHints::Performance,
                ..Default::default()
            })
            .await?;

        let mut config = surface
            .get_default_config(&adapter, width.max(1), height.max(1))
            .ok_or_else(|| {
                EmberError::AdapterRequestFailed("Surface not supported by adapter".to_string())
            })?;
        config.usage = wgpu::TextureUsages::RENDER_ATTACHMENT;
        // The composite shader gamma-encodes explicitly; keep the
        // swapchain linear so the encoding happens exactly once.
        config.format = config.format.remove_srgb_suffix();
        config.present_mode = if settings.vsync {
            wgpu::PresentMode::AutoVsync
        } else {
            wgpu::PresentMode::AutoNoVsync
        };
        surface.configure(&device, &config);

        log::info!(
            "GPU context created: {}x{} {:?}",
            config.width,
            config.height,
            config.format
        );

        Ok(Self {
            device,
            queue,
            surface,
            config,
        })
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.config.width = width;
            self.config.height = height;
            self.surface.configure(&self.device, &self.config);
        }
    }

    /// Re-applies the current configuration; the swapchain-recreation step
    /// of the out-of-date recovery path.
    pub fn reconfigure(&self) {
        self.surface.configure(&self.device, &self.config);
    }

    /// Acquires the next surface image, mapping surface errors onto the
    /// engine error taxonomy. Suboptimal acquisition is surfaced as
    /// [`EmberError::SwapchainSuboptimal`] so the caller can recreate at a
    /// convenient point.
    pub fn acquire(&self) -> Result<wgpu::SurfaceTexture> {
        let (frame, suboptimal) =
            crate::errors::classify_surface_texture(self.surface.get_current_texture())?;
        if suboptimal {
            return Err(EmberError::SwapchainSuboptimal);
        }
        Ok(frame)
    }

    /// Acquire variant used right after a recreation: a still-suboptimal
    /// image is accepted (some platforms report it indefinitely) so the
    /// frame loop cannot livelock on recovery.
    pub fn acquire_lenient(&self) -> Result<wgpu::SurfaceTexture> {
        let (frame, _suboptimal) =
            crate::errors::classify_surface_texture(self.surface.get_current_texture())?;
        Ok(frame)
    }

    #[must_use]
    pub fn size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    #[must_use]
    pub fn surface_format(&self) -> wgpu::TextureFormat {
        self.config.format
    }
}
