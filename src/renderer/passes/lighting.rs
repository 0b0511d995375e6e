//! Lighting pass: full-screen deferred shading.
//!
//! Reads the five g-buffer images, the three cascade maps through a
//! hardware PCF comparison sampler, and the HDRI set (prefiltered
//! environment, irradiance, BRDF LUT). Writes two color attachments:
//! HDR luminance and the log-luminance the exposure histogram consumes.

use crate::renderer::passes::{FrameContext, RenderNode, SharedLayouts};
use crate::renderer::targets::{
    BRIGHTNESS_FORMAT, LUMINANCE_FORMAT, RenderTargetSet, SHADOW_RESOLUTIONS,
};
use crate::renderer::uniforms::{LightingParams, shadow_size_entry};

const SHADER: &str = include_str!("../shaders/lighting.wgsl");

pub struct LightingPass {
    params_buffer: wgpu::Buffer,
    shadow_sampler: wgpu::Sampler,
    input_layout: wgpu::BindGroupLayout,
    pipeline: wgpu::RenderPipeline,

    input_bind_group: Option<wgpu::BindGroup>,
    targets_generation: u64,
}

impl LightingPass {
    #[must_use]
    pub fn new(device: &wgpu::Device, layouts: &SharedLayouts) -> Self {
        let unfilterable = |binding: u32| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: false },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        };
        let depth = |binding: u32| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Depth,
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        };

        let input_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Lighting Input Layout"),
            entries: &[
                unfilterable(0), // normal
                unfilterable(1), // albedo
                unfilterable(2), // pbr
                unfilterable(3), // emissive
                depth(4),        // g-buffer depth
                depth(5),        // shadow cascade 0
                depth(6),        // shadow cascade 1
                depth(7),        // shadow cascade 2
                wgpu::BindGroupLayoutEntry {
                    binding: 8,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Comparison),
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 9,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: wgpu::BufferSize::new(
                            std::mem::size_of::<LightingParams>() as u64,
                        ),
                    },
                    count: None,
                },
            ],
        });

        let params_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Lighting Params Buffer"),
            size: std::mem::size_of::<LightingParams>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        // Hardware PCF: linear filtering on the comparison result.
        let shadow_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Shadow PCF Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            compare: Some(wgpu::CompareFunction::LessEqual),
            ..Default::default()
        });

        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Lighting Shader"),
            source: wgpu::ShaderSource::Wgsl(SHADER.into()),
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Lighting Pipeline Layout"),
            bind_group_layouts: &[Some(&input_layout), Some(&layouts.hdri)],
            immediate_size: 0,
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Lighting Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &module,
                entry_point: Some("vs_main"),
                buffers: &[],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &module,
                entry_point: Some("fs_main"),
                targets: &[
                    Some(wgpu::ColorTargetState {
                        format: LUMINANCE_FORMAT,
                        blend: Some(wgpu::BlendState::REPLACE),
                        write_mask: wgpu::ColorWrites::ALL,
                    }),
                    Some(wgpu::ColorTargetState {
                        format: BRIGHTNESS_FORMAT,
                        blend: Some(wgpu::BlendState::REPLACE),
                        write_mask: wgpu::ColorWrites::ALL,
                    }),
                ],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        });

        Self {
            params_buffer,
            shadow_sampler,
            input_layout,
            pipeline,
            input_bind_group: None,
            targets_generation: u64::MAX,
        }
    }

    fn rebuild_input_bind_group(&mut self, device: &wgpu::Device, targets: &RenderTargetSet) {
        let texture = |view| wgpu::BindingResource::TextureView(view);

        self.input_bind_group = Some(device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Lighting Input BindGroup"),
            layout: &self.input_layout,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: texture(&targets.normal.view) },
                wgpu::BindGroupEntry { binding: 1, resource: texture(&targets.albedo.view) },
                wgpu::BindGroupEntry { binding: 2, resource: texture(&targets.pbr.view) },
                wgpu::BindGroupEntry { binding: 3, resource: texture(&targets.emissive.view) },
                wgpu::BindGroupEntry { binding: 4, resource: texture(&targets.depth.view) },
                wgpu::BindGroupEntry { binding: 5, resource: texture(&targets.shadow[0].view) },
                wgpu::BindGroupEntry { binding: 6, resource: texture(&targets.shadow[1].view) },
                wgpu::BindGroupEntry { binding: 7, resource: texture(&targets.shadow[2].view) },
                wgpu::BindGroupEntry {
                    binding: 8,
                    resource: wgpu::BindingResource::Sampler(&self.shadow_sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 9,
                    resource: self.params_buffer.as_entire_binding(),
                },
            ],
        }));
        self.targets_generation = targets.generation;
    }
}

impl RenderNode for LightingPass {
    fn name(&self) -> &'static str {
        "Lighting Pass"
    }

    fn prepare(&mut self, ctx: &FrameContext<'_>) {
        let mut params = LightingParams {
            view_projection_inv: ctx.camera.view_projection_matrix_inv,
            camera_position: ctx.camera.eye_position.extend(0.0),
            sunlight_direction: ctx.sun_direction.extend(0.0),
            sunlight_color: ctx.options.sun_radiance().extend(0.0),
            emissive_brightness: ctx.options.emissive_brightness,
            skybox_brightness: ctx.options.skybox_brightness,
            time: ctx.time.fract(),
            csm_blend_factor: ctx.options.csm_blend_factor,
            ..Default::default()
        };
        for (cascade, param) in ctx.shadow_params.iter().enumerate() {
            params.shadow[cascade] = param.camera.view_projection_matrix;
            params.shadow_size[cascade] =
                shadow_size_entry(SHADOW_RESOLUTIONS[cascade], param.view_size);
        }
        ctx.queue
            .write_buffer(&self.params_buffer, 0, bytemuck::bytes_of(&params));

        if self.targets_generation != ctx.targets.generation {
            self.rebuild_input_bind_group(ctx.device, ctx.targets);
        }
    }

    fn run(&self, ctx: &FrameContext<'_>, encoder: &mut wgpu::CommandEncoder) {
        let Some(input_bind_group) = &self.input_bind_group else {
            return;
        };

        let clear = |view| {
            Some(wgpu::RenderPassColorAttachment {
                view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })
        };

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Lighting Pass"),
            color_attachments: &[
                clear(&ctx.targets.luminance.view),
                clear(&ctx.targets.brightness.view),
            ],
            ..Default::default()
        });

        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, input_bind_group, &[]);
        pass.set_bind_group(1, ctx.hdri_bind_group, &[]);
        pass.draw(0..3, 0..1);
    }
}
