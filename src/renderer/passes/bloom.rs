//! Bloom: threshold filter, downsample chain, blur, upsample
//! accumulation — four compute pipelines over the two mip-chain images.
//!
//! The downsample chain holds progressively box-filtered copies of the
//! thresholded image; each level is blurred into the half-res upsample
//! chain on the way down, then the accumulation walks back up adding the
//! bilinearly-enlarged coarser level onto each finer one. After the walk,
//! upsample mip 0 holds the bloom result the composite pass samples.
//!
//! Within the single compute pass, dispatch order alone establishes the
//! read-after-write edges between levels.

use crate::renderer::passes::{FrameContext, RenderNode};
use crate::renderer::targets::RenderTargetSet;
use crate::renderer::uniforms::BloomParams;

const FILTER_SHADER: &str = include_str!("../shaders/bloom_filter.wgsl");
const DOWNSAMPLE_SHADER: &str = include_str!("../shaders/bloom_downsample.wgsl");
const BLUR_SHADER: &str = include_str!("../shaders/bloom_blur.wgsl");
const ACCUMULATE_SHADER: &str = include_str!("../shaders/bloom_accumulate.wgsl");

const WORKGROUP_SIZE: u32 = 16;

/// One queued dispatch: bind group plus target extent.
struct Dispatch {
    bind_group: wgpu::BindGroup,
    extent: (u32, u32),
}

impl Dispatch {
    fn record(&self, pass: &mut wgpu::ComputePass<'_>) {
        pass.set_bind_group(0, &self.bind_group, &[]);
        pass.dispatch_workgroups(
            self.extent.0.div_ceil(WORKGROUP_SIZE),
            self.extent.1.div_ceil(WORKGROUP_SIZE),
            1,
        );
    }
}

pub struct BloomPass {
    filter_pipeline: wgpu::ComputePipeline,
    downsample_pipeline: wgpu::ComputePipeline,
    blur_pipeline: wgpu::ComputePipeline,
    accumulate_pipeline: wgpu::ComputePipeline,

    filter_layout: wgpu::BindGroupLayout,
    sample_layout: wgpu::BindGroupLayout,
    accumulate_layout: wgpu::BindGroupLayout,

    sampler: wgpu::Sampler,
    params_buffer: wgpu::Buffer,

    filter_dispatch: Option<Dispatch>,
    /// Interleaved per level: blur into the upsample chain, then box
    /// downsample into the next chain level.
    blur_dispatches: Vec<Dispatch>,
    downsample_dispatches: Vec<Dispatch>,
    accumulate_dispatches: Vec<Dispatch>,

    targets_generation: u64,
}

impl BloomPass {
    #[must_use]
    pub fn new(device: &wgpu::Device) -> Self {
        let texture_entry = |binding: u32| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        };
        let sampler_entry = |binding: u32| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
            count: None,
        };
        let storage_texture_entry = |binding: u32| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::StorageTexture {
                access: wgpu::StorageTextureAccess::WriteOnly,
                format: wgpu::TextureFormat::Rgba16Float,
                view_dimension: wgpu::TextureViewDimension::D2,
            },
            count: None,
        };

        let filter_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Bloom Filter Layout"),
            entries: &[
                texture_entry(0),
                sampler_entry(1),
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: true },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                storage_texture_entry(3),
                storage_texture_entry(4),
                wgpu::BindGroupLayoutEntry {
                    binding: 5,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let sample_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Bloom Sample Layout"),
            entries: &[texture_entry(0), sampler_entry(1), storage_texture_entry(2)],
        });

        let accumulate_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Bloom Accumulate Layout"),
                entries: &[
                    texture_entry(0),
                    sampler_entry(1),
                    texture_entry(2),
                    storage_texture_entry(3),
                ],
            });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Bloom Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let params_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Bloom Params Buffer"),
            size: std::mem::size_of::<BloomParams>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let compute = |label: &str, source: &str, layout: &wgpu::BindGroupLayout| {
            let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(label),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            });
            let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(label),
                bind_group_layouts: &[Some(layout)],
                immediate_size: 0,
            });
            device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(label),
                layout: Some(&pipeline_layout),
                module: &module,
                entry_point: Some("main"),
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                cache: None,
            })
        };

        let filter_pipeline = compute("Bloom Filter Pipeline", FILTER_SHADER, &filter_layout);
        let downsample_pipeline =
            compute("Bloom Downsample Pipeline", DOWNSAMPLE_SHADER, &sample_layout);
        let blur_pipeline = compute("Bloom Blur Pipeline", BLUR_SHADER, &sample_layout);
        let accumulate_pipeline = compute(
            "Bloom Accumulate Pipeline",
            ACCUMULATE_SHADER,
            &accumulate_layout,
        );

        Self {
            filter_pipeline,
            downsample_pipeline,
            blur_pipeline,
            accumulate_pipeline,
            filter_layout,
            sample_layout,
            accumulate_layout,
            sampler,
            params_buffer,
            filter_dispatch: None,
            blur_dispatches: Vec::new(),
            downsample_dispatches: Vec::new(),
            accumulate_dispatches: Vec::new(),
            targets_generation: u64::MAX,
        }
    }

    fn rebuild_dispatches(&mut self, ctx: &FrameContext<'_>, targets: &RenderTargetSet) {
        let device = ctx.device;
        let down = &targets.bloom_down;
        let up = &targets.bloom_up;
        let levels = down.levels;

        // --- Filter: luminance -> down[0] + up[0] ---
        self.filter_dispatch = Some(Dispatch {
            bind_group: device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Bloom Filter BindGroup"),
                layout: &self.filter_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(&targets.luminance.view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::Sampler(&self.sampler),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: ctx.exposure.result.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 3,
                        resource: wgpu::BindingResource::TextureView(&down.mip_views[0]),
                    },
                    wgpu::BindGroupEntry {
                        binding: 4,
                        resource: wgpu::BindingResource::TextureView(&up.mip_views[0]),
                    },
                    wgpu::BindGroupEntry {
                        binding: 5,
                        resource: self.params_buffer.as_entire_binding(),
                    },
                ],
            }),
            extent: down.extents[0],
        });

        let sample_bind_group = |source: &wgpu::TextureView, target: &wgpu::TextureView| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Bloom Sample BindGroup"),
                layout: &self.sample_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(source),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::Sampler(&self.sampler),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: wgpu::BindingResource::TextureView(target),
                    },
                ],
            })
        };

        // --- Downsample chain ---
        // Level 1 comes straight from the filtered root; every later
        // level is fed by the blurred copy one level up.
        self.downsample_dispatches.clear();
        self.blur_dispatches.clear();
        if levels > 1 {
            self.downsample_dispatches.push(Dispatch {
                bind_group: sample_bind_group(&down.mip_views[0], &down.mip_views[1]),
                extent: down.extents[1],
            });
        }
        for level in 1..levels.saturating_sub(1) {
            let blur_target = (level - 1) as usize;
            self.blur_dispatches.push(Dispatch {
                bind_group: sample_bind_group(
                    &down.mip_views[level as usize],
                    &up.mip_views[blur_target],
                ),
                extent: up.extents[blur_target],
            });
            self.downsample_dispatches.push(Dispatch {
                bind_group: sample_bind_group(
                    &up.mip_views[blur_target],
                    &down.mip_views[(level + 1) as usize],
                ),
                extent: down.extents[(level + 1) as usize],
            });
        }

        // --- Accumulation, coarsest to finest ---
        self.accumulate_dispatches.clear();
        if levels >= 3 {
            for level in (0..=(levels - 3) as usize).rev() {
                let coarse = if level == (levels - 3) as usize {
                    &down.mip_views[(levels - 1) as usize]
                } else {
                    &up.mip_views[level + 1]
                };
                self.accumulate_dispatches.push(Dispatch {
                    bind_group: device.create_bind_group(&wgpu::BindGroupDescriptor {
                        label: Some("Bloom Accumulate BindGroup"),
                        layout: &self.accumulate_layout,
                        entries: &[
                            wgpu::BindGroupEntry {
                                binding: 0,
                                resource: wgpu::BindingResource::TextureView(coarse),
                            },
                            wgpu::BindGroupEntry {
                                binding: 1,
                                resource: wgpu::BindingResource::Sampler(&self.sampler),
                            },
                            wgpu::BindGroupEntry {
                                binding: 2,
                                resource: wgpu::BindingResource::TextureView(
                                    &down.mip_views[level + 1],
                                ),
                            },
                            wgpu::BindGroupEntry {
                                binding: 3,
                                resource: wgpu::BindingResource::TextureView(&up.mip_views[level]),
                            },
                        ],
                    }),
                    extent: up.extents[level],
                });
            }
        }

        self.targets_generation = targets.generation;
        log::debug!(
            "Bloom dispatches rebuilt: {} blur, {} downsample, {} accumulate",
            self.blur_dispatches.len(),
            self.downsample_dispatches.len(),
            self.accumulate_dispatches.len(),
        );
    }
}

impl RenderNode for BloomPass {
    fn name(&self) -> &'static str {
        "Bloom Pass"
    }

    fn prepare(&mut self, ctx: &FrameContext<'_>) {
        let params = BloomParams {
            start_threshold: ctx.options.bloom_start,
            end_threshold: ctx.options.bloom_end,
            exposure: ctx.options.exposure_scale(),
            _pad: 0.0,
        };
        ctx.queue
            .write_buffer(&self.params_buffer, 0, bytemuck::bytes_of(&params));

        if self.targets_generation != ctx.targets.generation {
            self.rebuild_dispatches(ctx, ctx.targets);
        }
    }

    fn run(&self, _ctx: &FrameContext<'_>, encoder: &mut wgpu::CommandEncoder) {
        let Some(filter) = &self.filter_dispatch else {
            return;
        };

        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("Bloom"),
            timestamp_writes: None,
        });

        pass.set_pipeline(&self.filter_pipeline);
        filter.record(&mut pass);

        // Walk down: the first downsample has no preceding blur.
        if let Some(first) = self.downsample_dispatches.first() {
            pass.set_pipeline(&self.downsample_pipeline);
            first.record(&mut pass);
        }
        for (blur, downsample) in self
            .blur_dispatches
            .iter()
            .zip(self.downsample_dispatches.iter().skip(1))
        {
            pass.set_pipeline(&self.blur_pipeline);
            blur.record(&mut pass);
            pass.set_pipeline(&self.downsample_pipeline);
            downsample.record(&mut pass);
        }

        // Walk back up, accumulating into the finest mip.
        pass.set_pipeline(&self.accumulate_pipeline);
        for accumulate in &self.accumulate_dispatches {
            accumulate.record(&mut pass);
        }
    }
}
