//! Render-target ownership.
//!
//! [`RenderTargetSet`] owns every intermediate image of the frame graph
//! and is recreated wholesale on resize or surface invalidation (wgpu
//! defers the actual destruction until in-flight work completes). The
//! auto-exposure buffers live in [`ExposureBuffers`], outside the set, so
//! the adaptation state survives a resize.

use crate::renderer::uniforms::{ExposureResult, HISTOGRAM_BINS};

/// Shadow-map resolution per cascade, nearest to farthest.
pub const SHADOW_RESOLUTIONS: [u32; 3] = [2048, 2048, 1536];

/// Mip levels of the bloom downsample chain at full resolution.
pub const BLOOM_CHAIN_LEVELS: u32 = 8;

pub const NORMAL_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba32Float;
pub const COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
pub const LUMINANCE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
pub const BRIGHTNESS_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R16Float;

/// A texture with its default full view.
pub struct Target {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
}

impl Target {
    fn new(
        device: &wgpu::Device,
        label: &str,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
        usage: wgpu::TextureUsages,
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self { texture, view }
    }
}

/// A mip chain with one view per level.
pub struct MipChain {
    pub texture: wgpu::Texture,
    pub mip_views: Vec<wgpu::TextureView>,
    pub extents: Vec<(u32, u32)>,
    pub levels: u32,
}

impl MipChain {
    fn new(
        device: &wgpu::Device,
        label: &str,
        width: u32,
        height: u32,
        max_levels: u32,
        format: wgpu::TextureFormat,
    ) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        let levels = max_levels.min(max_mip_levels(width, height)).max(1);

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: levels,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::STORAGE_BINDING | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });

        let mut mip_views = Vec::with_capacity(levels as usize);
        let mut extents = Vec::with_capacity(levels as usize);
        for level in 0..levels {
            mip_views.push(texture.create_view(&wgpu::TextureViewDescriptor {
                label: Some(label),
                base_mip_level: level,
                mip_level_count: Some(1),
                ..Default::default()
            }));
            extents.push(((width >> level).max(1), (height >> level).max(1)));
        }

        Self {
            texture,
            mip_views,
            extents,
            levels,
        }
    }
}

/// Every render target of the frame graph, for one surface configuration.
pub struct RenderTargetSet {
    pub extent: (u32, u32),

    /// Depth-only cascade maps, 0 → 2 from nearest to farthest.
    pub shadow: [Target; 3],

    // G-buffer MRTs
    pub normal: Target,
    pub albedo: Target,
    pub pbr: Target,
    pub emissive: Target,
    pub depth: Target,

    // Lighting outputs
    pub luminance: Target,
    pub brightness: Target,

    // Bloom pyramid
    pub bloom_down: MipChain,
    pub bloom_up: MipChain,

    /// Tone-mapped LDR image, sampled by FXAA.
    pub composite: Target,

    /// Bumped on every recreation so passes know to rebuild their
    /// target-referencing bind groups.
    pub generation: u64,
}

impl RenderTargetSet {
    #[must_use]
    pub fn new(
        device: &wgpu::Device,
        surface_format: wgpu::TextureFormat,
        width: u32,
        height: u32,
        generation: u64,
    ) -> Self {
        let width = width.max(1);
        let height = height.max(1);

        let attach_sample = wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING;

        let shadow = SHADOW_RESOLUTIONS.map(|res| {
            Target::new(device, "Shadow Cascade", res, res, DEPTH_FORMAT, attach_sample)
        });

        let bloom_down = MipChain::new(
            device,
            "Bloom Downsample Chain",
            width,
            height,
            BLOOM_CHAIN_LEVELS,
            LUMINANCE_FORMAT,
        );
        // The upsample chain is two levels shorter and starts at half
        // resolution, clamped for tiny surfaces.
        let up_levels = bloom_down.levels.saturating_sub(2).max(1);
        let bloom_up = MipChain::new(
            device,
            "Bloom Upsample Chain",
            width / 2,
            height / 2,
            up_levels,
            LUMINANCE_FORMAT,
        );

        log::debug!(
            "Render targets allocated: {width}x{height}, bloom {}+{} levels",
            bloom_down.levels,
            bloom_up.levels
        );

        Self {
            extent: (width, height),
            shadow,
            normal: Target::new(device, "GBuffer Normal", width, height, NORMAL_FORMAT, attach_sample),
            albedo: Target::new(device, "GBuffer Albedo", width, height, COLOR_FORMAT, attach_sample),
            pbr: Target::new(device, "GBuffer PBR", width, height, COLOR_FORMAT, attach_sample),
            emissive: Target::new(device, "GBuffer Emissive", width, height, COLOR_FORMAT, attach_sample),
            depth: Target::new(device, "GBuffer Depth", width, height, DEPTH_FORMAT, attach_sample),
            luminance: Target::new(device, "Luminance", width, height, LUMINANCE_FORMAT, attach_sample),
            brightness: Target::new(device, "Brightness", width, height, BRIGHTNESS_FORMAT, attach_sample),
            bloom_down,
            bloom_up,
            composite: Target::new(device, "Composite", width, height, surface_format, attach_sample),
            generation,
        }
    }
}

/// Auto-exposure storage, created once per device.
///
/// `medium` is the 256-bin histogram, cleared by the command encoder
/// before each histogram dispatch; `result` is the adaptation state,
/// zero-initialized here and from then on written exclusively by the
/// adapt compute shader.
pub struct ExposureBuffers {
    pub medium: wgpu::Buffer,
    pub result: wgpu::Buffer,
}

impl ExposureBuffers {
    #[must_use]
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue) -> Self {
        let medium = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Exposure Histogram Buffer"),
            size: (HISTOGRAM_BINS * std::mem::size_of::<i32>()) as u64,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let result = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Exposure Result Buffer"),
            size: std::mem::size_of::<ExposureResult>() as u64,
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::UNIFORM
                | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        queue.write_buffer(&result, 0, bytemuck::bytes_of(&ExposureResult::default()));

        Self { medium, result }
    }
}

fn max_mip_levels(width: u32, height: u32) -> u32 {
    32 - width.max(height).max(1).leading_zeros()
}
