//! FXAA pass: anti-alias the composite output into the swapchain image.
//!
//! One pipeline per quality preset, all compiled at init; the preset is
//! read from the options each frame. `Off` uses a passthrough fragment so
//! the composite image still reaches the surface through the same path.

use crate::renderer::passes::{FrameContext, RenderNode};
use crate::renderer::settings::FxaaQuality;
use crate::renderer::targets::RenderTargetSet;

const SHADER: &str = include_str!("../shaders/fxaa.wgsl");

pub struct FxaaPass {
    sampler: wgpu::Sampler,
    layout: wgpu::BindGroupLayout,
    /// Indexed by [`FxaaQuality`] discriminant order: off, low, medium,
    /// high.
    pipelines: [wgpu::RenderPipeline; 4],

    bind_group: Option<wgpu::BindGroup>,
    targets_generation: u64,
}

impl FxaaPass {
    #[must_use]
    pub fn new(device: &wgpu::Device, surface_format: wgpu::TextureFormat) -> Self {
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("FXAA Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        // Linear filtering is what the sub-pixel blend rides on.
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("FXAA Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("FXAA Shader"),
            source: wgpu::ShaderSource::Wgsl(SHADER.into()),
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("FXAA Pipeline Layout"),
            bind_group_layouts: &[Some(&layout)],
            immediate_size: 0,
        });

        let make = |entry: &str| {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("FXAA Pipeline"),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &module,
                    entry_point: Some("vs_main"),
                    buffers: &[],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &module,
                    entry_point: Some(entry),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: surface_format,
                        blend: Some(wgpu::BlendState::REPLACE),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                }),
                primitive: wgpu::PrimitiveState::default(),
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview_mask: None,
                cache: None,
            })
        };

        let pipelines = [
            make("fs_passthrough"),
            make("fs_low"),
            make("fs_medium"),
            make("fs_high"),
        ];

        Self {
            sampler,
            layout,
            pipelines,
            bind_group: None,
            targets_generation: u64::MAX,
        }
    }

    fn pipeline_for(&self, quality: FxaaQuality) -> &wgpu::RenderPipeline {
        match quality {
            FxaaQuality::Off => &self.pipelines[0],
            FxaaQuality::Low => &self.pipelines[1],
            FxaaQuality::Medium => &self.pipelines[2],
            FxaaQuality::High => &self.pipelines[3],
        }
    }

    fn rebuild_bind_group(&mut self, device: &wgpu::Device, targets: &RenderTargetSet) {
        self.bind_group = Some(device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("FXAA BindGroup"),
            layout: &self.layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&targets.composite.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        }));
        self.targets_generation = targets.generation;
    }
}

impl RenderNode for FxaaPass {
    fn name(&self) -> &'static str {
        "FXAA Pass"
    }

    fn prepare(&mut self, ctx: &FrameContext<'_>) {
        if self.targets_generation != ctx.targets.generation {
            self.rebuild_bind_group(ctx.device, ctx.targets);
        }
    }

    fn run(&self, ctx: &FrameContext<'_>, encoder: &mut wgpu::CommandEncoder) {
        let Some(bind_group) = &self.bind_group else {
            return;
        };

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("FXAA Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: ctx.surface_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            ..Default::default()
        });

        pass.set_pipeline(self.pipeline_for(ctx.options.fxaa_quality));
        pass.set_bind_group(0, bind_group, &[]);
        pass.draw(0..3, 0..1);
    }
}
