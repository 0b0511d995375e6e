//! Frame-graph passes.
//!
//! Each pass is a [`RenderNode`]: constructed once at init (all pipelines
//! compiled eagerly — a failure there is fatal by design), `prepare`d on
//! the host before recording, then `run` into its own command encoder.
//! The renderer finishes the encoders in dependency order — shadow,
//! g-buffer, lighting, compute, composite — and submits them in a single
//! call, which is what establishes the happens-before edges between
//! passes.

pub mod bloom;
pub mod composite;
pub mod exposure;
pub mod fxaa;
pub mod gbuffer;
pub mod lighting;
pub mod shadow;

use glam::Vec3;

use crate::renderer::drawcall::FrustumDrawLists;
use crate::renderer::targets::{ExposureBuffers, RenderTargetSet};
use crate::renderer::uniforms::ModelUniformArena;
use crate::renderer::settings::RenderOptions;
use crate::scene::camera::{CameraParameter, ShadowParameter};
use crate::scene::model::{GpuScene, SceneModel};

/// The drawlists of one frame: one set for the camera, one per cascade.
pub struct FrameDrawLists<'a> {
    pub gbuffer: &'a FrustumDrawLists,
    pub shadow: [&'a FrustumDrawLists; 3],
}

/// Everything a pass can see during `prepare` and `run`.
pub struct FrameContext<'a> {
    pub device: &'a wgpu::Device,
    pub queue: &'a wgpu::Queue,
    pub targets: &'a RenderTargetSet,
    pub exposure: &'a ExposureBuffers,
    pub scene: &'a SceneModel,
    pub gpu_scene: &'a GpuScene,
    pub hdri_bind_group: &'a wgpu::BindGroup,
    pub model_uniforms: &'a ModelUniformArena,
    pub lists: &'a FrameDrawLists<'a>,
    pub camera: &'a CameraParameter,
    pub shadow_params: &'a [ShadowParameter; 3],
    pub options: &'a RenderOptions,
    pub sun_direction: Vec3,
    pub delta_time: f32,
    pub time: f32,
    pub surface_view: &'a wgpu::TextureView,
}

/// The pass protocol: update CPU-side state and GPU uniforms in
/// `prepare`, record commands in `run`.
pub trait RenderNode {
    fn name(&self) -> &'static str;
    fn prepare(&mut self, ctx: &FrameContext<'_>);
    fn run(&self, ctx: &FrameContext<'_>, encoder: &mut wgpu::CommandEncoder);
}

// ============================================================================
// Shared bind-group layouts (the contract with the external loader)
// ============================================================================

/// Bind-group layouts shared between the renderer and the mesh/HDRI
/// loaders. Created once; the loader uses them to pre-populate material,
/// skin and environment bind groups.
pub struct SharedLayouts {
    /// G-buffer material set: albedo, metal-roughness, occlusion, normal,
    /// emissive textures, one sampler, material params uniform.
    pub gbuffer_material: wgpu::BindGroupLayout,
    /// Shadow material set: albedo texture, sampler, material params
    /// uniform.
    pub shadow_material: wgpu::BindGroupLayout,
    /// Skin palette: one storage buffer of joint matrices.
    pub skin: wgpu::BindGroupLayout,
    /// HDRI set: prefiltered environment cube, irradiance cube, BRDF LUT,
    /// sampler.
    pub hdri: wgpu::BindGroupLayout,
}

impl SharedLayouts {
    #[must_use]
    pub fn new(device: &wgpu::Device) -> Self {
        let texture_entry = |binding: u32| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        };

        let gbuffer_material =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("GBuffer Material Layout"),
                entries: &[
                    texture_entry(0), // albedo
                    texture_entry(1), // metal-roughness
                    texture_entry(2), // occlusion
                    texture_entry(3), // normal
                    texture_entry(4), // emissive
                    wgpu::BindGroupLayoutEntry {
                        binding: 5,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 6,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Uniform,
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    },
                ],
            });

        let shadow_material =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Shadow Material Layout"),
                entries: &[
                    texture_entry(0), // albedo
                    wgpu::BindGroupLayoutEntry {
                        binding: 1,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 2,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Uniform,
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    },
                ],
            });

        let skin = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Skin Palette Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Storage { read_only: true },
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let cube_entry = |binding: u32| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::Cube,
                multisampled: false,
            },
            count: None,
        };

        let hdri = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("HDRI Layout"),
            entries: &[
                cube_entry(0),    // prefiltered environment, 6 mips
                cube_entry(1),    // diffuse irradiance
                texture_entry(2), // BRDF LUT
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        Self {
            gbuffer_material,
            shadow_material,
            skin,
            hdri,
        }
    }
}
