//! GPU uniform block layouts.
//!
//! Every struct here is `Pod` and laid out to std140 rules so it can be
//! written into a uniform or storage buffer with a single
//! `Queue::write_buffer`. Sizes and alignments are pinned by tests.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec2, Vec4};
use rustc_hash::FxHashMap;

/// Number of shadow cascades.
pub const CASCADE_COUNT: usize = 3;

/// Number of auto-exposure histogram bins.
pub const HISTOGRAM_BINS: usize = 256;

/// Log-luminance domain of the exposure histogram (natural log).
pub const MIN_LOG_LUMINANCE: f32 = -6.0;
pub const MAX_LOG_LUMINANCE: f32 = 15.0;

/// G-buffer and shadow vertex stage, group 0.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable, Default)]
pub struct CameraUniform {
    pub view_projection: Mat4,
}

/// Shadow vertex stage, group 0 (one per cascade, dynamic offset).
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable, Default)]
pub struct ShadowUniform {
    pub view_projection: Mat4,
}

/// Lighting fragment stage parameter block.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable, Default)]
pub struct LightingParams {
    pub view_projection_inv: Mat4,
    pub shadow: [Mat4; CASCADE_COUNT],
    /// Per cascade: `xy` = shadow texel size in UV units, `zw` = shadow
    /// view size in world units.
    pub shadow_size: [Vec4; CASCADE_COUNT],
    /// `xyz` = camera world position.
    pub camera_position: Vec4,
    /// `xyz` = direction toward the sun.
    pub sunlight_direction: Vec4,
    /// `xyz` = sun radiance.
    pub sunlight_color: Vec4,
    pub emissive_brightness: f32,
    pub skybox_brightness: f32,
    pub time: f32,
    pub csm_blend_factor: f32,
}

/// Composite fragment stage parameters.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct CompositeParams {
    /// Manual exposure multiplier (`exp2(exposure_ev)`).
    pub exposure: f32,
    pub bloom_intensity: f32,
    pub _pad: [f32; 2],
}

impl Default for CompositeParams {
    fn default() -> Self {
        Self {
            exposure: 1.0,
            bloom_intensity: 0.02,
            _pad: [0.0; 2],
        }
    }
}

/// Auto-exposure feedback state. Initialized to zero at creation and only
/// ever written by the adapt compute shader.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable, Default)]
pub struct ExposureResult {
    pub luminance: f32,
    pub prev_luminance: f32,
}

/// Histogram dispatch parameters.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable, Default)]
pub struct LuminanceParams {
    pub min_log_luminance: f32,
    pub max_log_luminance: f32,
    pub _pad: [f32; 2],
}

/// Exposure adapt dispatch parameters.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable, Default)]
pub struct LerpParams {
    pub adapt_speed: f32,
    pub delta_time: f32,
    pub min_log_luminance: f32,
    pub max_log_luminance: f32,
    pub texture_size_x: u32,
    pub texture_size_y: u32,
    pub _pad: [u32; 2],
}

/// Bloom filter stage parameters.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable, Default)]
pub struct BloomParams {
    pub start_threshold: f32,
    pub end_threshold: f32,
    /// Manual exposure multiplier; scales the thresholds so bloom follows
    /// the exposed image.
    pub exposure: f32,
    pub _pad: f32,
}

/// Per-draw model transform, allocated from the [`ModelUniformArena`].
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable, Default)]
pub struct ModelUniform {
    pub model: Mat4,
}

/// Material scalar parameters. The layout contract with the mesh loader:
/// this struct backs the uniform at binding 5 of the g-buffer material set
/// and binding 1 of the shadow material set.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct MaterialParams {
    /// `xyz` = emissive factor, `w` = alpha cutoff.
    pub emissive_cutoff: Vec4,
    /// `x` = roughness factor, `y` = metallic factor, `z` = normal scale,
    /// `w` = occlusion strength.
    pub factors: Vec4,
}

impl Default for MaterialParams {
    fn default() -> Self {
        Self {
            emissive_cutoff: Vec4::new(0.0, 0.0, 0.0, 0.5),
            factors: Vec4::new(1.0, 1.0, 1.0, 1.0),
        }
    }
}

/// Packs a shadow-size entry for [`LightingParams::shadow_size`].
#[must_use]
pub fn shadow_size_entry(map_resolution: u32, view_size: Vec2) -> Vec4 {
    let texel = 1.0 / map_resolution as f32;
    Vec4::new(texel, texel, view_size.x, view_size.y)
}

// ============================================================================
// Per-draw model uniform arena
// ============================================================================

/// Dynamic-offset uniform arena for per-draw model matrices.
///
/// Drawlists reference nodes, and a node's matrix is identical across every
/// pass that draws it, so the arena allocates one aligned slot per unique
/// node per frame. All slots are uploaded with a single `write_buffer`.
/// The bind group is rebuilt only when the backing buffer grows.
pub struct ModelUniformArena {
    stride: u32,
    capacity: u32,
    buffer: wgpu::Buffer,
    layout: wgpu::BindGroupLayout,
    bind_group: wgpu::BindGroup,
    staging: Vec<u8>,
    offsets: FxHashMap<u32, u32>,
}

impl ModelUniformArena {
    const INITIAL_CAPACITY: u32 = 64;

    #[must_use]
    pub fn new(device: &wgpu::Device) -> Self {
        let min_alignment = device.limits().min_uniform_buffer_offset_alignment.max(1);
        let stride = align_to(std::mem::size_of::<ModelUniform>() as u32, min_alignment);

        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Model Uniform Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: wgpu::BufferSize::new(
                        std::mem::size_of::<ModelUniform>() as u64
                    ),
                },
                count: None,
            }],
        });

        let capacity = Self::INITIAL_CAPACITY;
        let buffer = Self::create_buffer(device, stride, capacity);
        let bind_group = Self::create_bind_group(device, &layout, &buffer);

        Self {
            stride,
            capacity,
            buffer,
            layout,
            bind_group,
            staging: Vec::new(),
            offsets: FxHashMap::default(),
        }
    }

    fn create_buffer(device: &wgpu::Device, stride: u32, capacity: u32) -> wgpu::Buffer {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Model Uniform Buffer"),
            size: u64::from(stride) * u64::from(capacity),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    fn create_bind_group(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        buffer: &wgpu::Buffer,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Model Uniform BindGroup"),
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer,
                    offset: 0,
                    size: wgpu::BufferSize::new(std::mem::size_of::<ModelUniform>() as u64),
                }),
            }],
        })
    }

    #[must_use]
    pub fn layout(&self) -> &wgpu::BindGroupLayout {
        &self.layout
    }

    #[must_use]
    pub fn bind_group(&self) -> &wgpu::BindGroup {
        &self.bind_group
    }

    /// Discards last frame's allocations.
    pub fn begin_frame(&mut self) {
        self.staging.clear();
        self.offsets.clear();
    }

    /// Returns the dynamic offset for `node_index`, staging `matrix` on
    /// first allocation.
    pub fn allocate(&mut self, node_index: u32, matrix: Mat4) -> u32 {
        if let Some(&offset) = self.offsets.get(&node_index) {
            return offset;
        }
        let offset = self.staging.len() as u32;
        let uniform = ModelUniform { model: matrix };
        self.staging.extend_from_slice(bytemuck::bytes_of(&uniform));
        self.staging.resize(offset as usize + self.stride as usize, 0);
        self.offsets.insert(node_index, offset);
        offset
    }

    /// Dynamic offset of a node staged this frame. Zero for nodes that
    /// were never allocated, which only happens if a drawlist references a
    /// node the fill pass skipped.
    #[must_use]
    pub fn offset_of(&self, node_index: u32) -> u32 {
        self.offsets.get(&node_index).copied().unwrap_or(0)
    }

    /// Uploads the staged matrices, growing the buffer when needed.
    pub fn upload(&mut self, device: &wgpu::Device, queue: &wgpu::Queue) {
        if self.staging.is_empty() {
            return;
        }

        let required = (self.staging.len() as u32).div_ceil(self.stride);
        if required > self.capacity {
            let mut capacity = self.capacity.max(1);
            while capacity < required {
                capacity = capacity.saturating_mul(2);
            }
            log::debug!("Model uniform arena grows to {capacity} slots");
            self.buffer = Self::create_buffer(device, self.stride, capacity);
            self.bind_group = Self::create_bind_group(device, &self.layout, &self.buffer);
            self.capacity = capacity;
        }

        queue.write_buffer(&self.buffer, 0, &self.staging);
    }
}

fn align_to(value: u32, alignment: u32) -> u32 {
    value.div_ceil(alignment) * alignment
}
