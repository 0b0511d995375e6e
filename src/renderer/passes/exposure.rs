//! Auto-exposure: histogram + exponential adaptation, on the compute
//! timeline.
//!
//! Stage one bins every brightness pixel's log-luminance into 256 atomic
//! counters; stage two walks the histogram for the 50-percentile and
//! blends the exposure toward it with time constant `1 / adapt_speed`.
//! The histogram buffer is cleared by the encoder before each dispatch,
//! never by the host; the result buffer is written exclusively by the
//! adapt shader.

use crate::renderer::passes::{FrameContext, RenderNode};
use crate::renderer::targets::RenderTargetSet;
use crate::renderer::uniforms::{
    LerpParams, LuminanceParams, MAX_LOG_LUMINANCE, MIN_LOG_LUMINANCE,
};

const HISTOGRAM_SHADER: &str = include_str!("../shaders/luminance_histogram.wgsl");
const ADAPT_SHADER: &str = include_str!("../shaders/exposure_adapt.wgsl");

/// Histogram workgroup footprint in pixels.
const WORKGROUP_SIZE: u32 = 16;

fn storage_entry(binding: u32, read_only: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn uniform_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

pub struct AutoExposurePass {
    histogram_pipeline: wgpu::ComputePipeline,
    adapt_pipeline: wgpu::ComputePipeline,

    histogram_layout: wgpu::BindGroupLayout,
    adapt_layout: wgpu::BindGroupLayout,
    histogram_params: wgpu::Buffer,
    adapt_params: wgpu::Buffer,

    histogram_bind_group: Option<wgpu::BindGroup>,
    adapt_bind_group: Option<wgpu::BindGroup>,
    targets_generation: u64,
}

impl AutoExposurePass {
    #[must_use]
    pub fn new(device: &wgpu::Device) -> Self {
        let histogram_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Exposure Histogram Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: false },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                storage_entry(1, false),
                uniform_entry(2),
            ],
        });

        let adapt_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Exposure Adapt Layout"),
            entries: &[
                storage_entry(0, true),
                storage_entry(1, false),
                uniform_entry(2),
            ],
        });

        let histogram_params = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Exposure Histogram Params"),
            size: std::mem::size_of::<LuminanceParams>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let adapt_params = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Exposure Adapt Params"),
            size: std::mem::size_of::<LerpParams>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let histogram_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Exposure Histogram Shader"),
            source: wgpu::ShaderSource::Wgsl(HISTOGRAM_SHADER.into()),
        });
        let adapt_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Exposure Adapt Shader"),
            source: wgpu::ShaderSource::Wgsl(ADAPT_SHADER.into()),
        });

        let histogram_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Exposure Histogram Pipeline Layout"),
                bind_group_layouts: &[Some(&histogram_layout)],
                immediate_size: 0,
            });
        let adapt_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Exposure Adapt Pipeline Layout"),
                bind_group_layouts: &[Some(&adapt_layout)],
                immediate_size: 0,
            });

        let histogram_pipeline =
            device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some("Exposure Histogram Pipeline"),
                layout: Some(&histogram_pipeline_layout),
                module: &histogram_module,
                entry_point: Some("main"),
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                cache: None,
            });
        let adapt_pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Exposure Adapt Pipeline"),
            layout: Some(&adapt_pipeline_layout),
            module: &adapt_module,
            entry_point: Some("main"),
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            cache: None,
        });

        Self {
            histogram_pipeline,
            adapt_pipeline,
            histogram_layout,
            adapt_layout,
            histogram_params,
            adapt_params,
            histogram_bind_group: None,
            adapt_bind_group: None,
            targets_generation: u64::MAX,
        }
    }

    fn rebuild_bind_groups(&mut self, ctx: &FrameContext<'_>, targets: &RenderTargetSet) {
        self.histogram_bind_group = Some(ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Exposure Histogram BindGroup"),
            layout: &self.histogram_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&targets.brightness.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: ctx.exposure.medium.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: self.histogram_params.as_entire_binding(),
                },
            ],
        }));

        self.adapt_bind_group = Some(ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Exposure Adapt BindGroup"),
            layout: &self.adapt_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: ctx.exposure.medium.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: ctx.exposure.result.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: self.adapt_params.as_entire_binding(),
                },
            ],
        }));

        self.targets_generation = targets.generation;
    }
}

impl RenderNode for AutoExposurePass {
    fn name(&self) -> &'static str {
        "Auto Exposure Pass"
    }

    fn prepare(&mut self, ctx: &FrameContext<'_>) {
        let histogram = LuminanceParams {
            min_log_luminance: MIN_LOG_LUMINANCE,
            max_log_luminance: MAX_LOG_LUMINANCE,
            _pad: [0.0; 2],
        };
        ctx.queue
            .write_buffer(&self.histogram_params, 0, bytemuck::bytes_of(&histogram));

        let (width, height) = ctx.targets.extent;
        let adapt = LerpParams {
            adapt_speed: ctx.options.adapt_speed,
            delta_time: ctx.delta_time,
            min_log_luminance: MIN_LOG_LUMINANCE,
            max_log_luminance: MAX_LOG_LUMINANCE,
            texture_size_x: width,
            texture_size_y: height,
            _pad: [0; 2],
        };
        ctx.queue
            .write_buffer(&self.adapt_params, 0, bytemuck::bytes_of(&adapt));

        if self.targets_generation != ctx.targets.generation {
            self.rebuild_bind_groups(ctx, ctx.targets);
        }
    }

    fn run(&self, ctx: &FrameContext<'_>, encoder: &mut wgpu::CommandEncoder) {
        let (Some(histogram_bind_group), Some(adapt_bind_group)) =
            (&self.histogram_bind_group, &self.adapt_bind_group)
        else {
            return;
        };

        // Explicit zero-clear of the histogram before binning.
        encoder.clear_buffer(&ctx.exposure.medium, 0, None);

        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("Auto Exposure"),
            timestamp_writes: None,
        });

        let (width, height) = ctx.targets.extent;
        pass.set_pipeline(&self.histogram_pipeline);
        pass.set_bind_group(0, histogram_bind_group, &[]);
        pass.dispatch_workgroups(
            width.div_ceil(WORKGROUP_SIZE),
            height.div_ceil(WORKGROUP_SIZE),
            1,
        );

        pass.set_pipeline(&self.adapt_pipeline);
        pass.set_bind_group(0, adapt_bind_group, &[]);
        pass.dispatch_workgroups(1, 1, 1);
    }
}
