//! Shadow pass: depth-only render of the three cascades.
//!
//! Per cascade, one render pass with a single depth attachment cleared to
//! 1.0. Pipelines are keyed by (single/double-sided) × (opaque/mask/blend),
//! with skinned vertex variants on top. The vertex stage reads only
//! position (plus UV for the alpha-tested variants and joint data when
//! skinned); the fragment stage is omitted entirely for opaque geometry.
//!
//! Depth bias compensates for the flipped winding of the single-sided
//! (cull-front) variants, hence the sign difference between the two
//! variant families.

use crate::renderer::drawcall::{BucketPipelines, Drawcall, DrawcallBinder};
use crate::renderer::passes::{FrameContext, RenderNode, SharedLayouts};
use crate::renderer::targets::DEPTH_FORMAT;
use crate::renderer::uniforms::{ModelUniformArena, ShadowUniform};
use crate::scene::model::{AlphaMode, GpuScene, SceneModel, JOINT_STRIDE, VEC2_STRIDE, VEC3_STRIDE, WEIGHT_STRIDE};

const SHADER: &str = include_str!("../shaders/shadow.wgsl");

/// Depth bias for single-sided (cull-front) geometry.
const BIAS_SINGLE: wgpu::DepthBiasState = wgpu::DepthBiasState {
    constant: -1,
    slope_scale: -1.75,
    clamp: 0.0,
};

/// Depth bias for double-sided (cull-none) geometry.
const BIAS_DOUBLE: wgpu::DepthBiasState = wgpu::DepthBiasState {
    constant: 2,
    slope_scale: 1.75,
    clamp: 0.0,
};

struct AlphaPipelineSet {
    opaque: wgpu::RenderPipeline,
    mask: wgpu::RenderPipeline,
    blend: wgpu::RenderPipeline,
}

impl AlphaPipelineSet {
    fn buckets(&self) -> BucketPipelines<'_> {
        BucketPipelines {
            opaque: &self.opaque,
            mask: &self.mask,
            blend: &self.blend,
        }
    }
}

pub struct ShadowPass {
    uniform_buffer: wgpu::Buffer,
    uniform_stride: u32,
    bind_group: wgpu::BindGroup,

    /// Indexed by `double_sided as usize + skinned as usize * 2`.
    variants: [AlphaPipelineSet; 4],
}

impl ShadowPass {
    #[must_use]
    pub fn new(device: &wgpu::Device, layouts: &SharedLayouts, model_uniforms: &ModelUniformArena) -> Self {
        let min_alignment = device.limits().min_uniform_buffer_offset_alignment.max(1);
        let stride =
            (std::mem::size_of::<ShadowUniform>() as u32).div_ceil(min_alignment) * min_alignment;

        let shadow_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Shadow Matrix Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: wgpu::BufferSize::new(
                        std::mem::size_of::<ShadowUniform>() as u64
                    ),
                },
                count: None,
            }],
        });

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Shadow Matrix Buffer"),
            size: u64::from(stride) * 3,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Shadow Matrix BindGroup"),
            layout: &shadow_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &uniform_buffer,
                    offset: 0,
                    size: wgpu::BufferSize::new(std::mem::size_of::<ShadowUniform>() as u64),
                }),
            }],
        });

        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Shadow Shader"),
            source: wgpu::ShaderSource::Wgsl(SHADER.into()),
        });

        // Static pipelines bind three groups; only the skinned variants
        // carry the joint-palette group, and every group in a layout must
        // be bound at draw time.
        let static_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Shadow Pipeline Layout"),
            bind_group_layouts: &[
                Some(&shadow_layout),
                Some(&layouts.shadow_material),
                Some(model_uniforms.layout()),
            ],
            immediate_size: 0,
        });
        let skinned_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Shadow Skinned Pipeline Layout"),
            bind_group_layouts: &[
                Some(&shadow_layout),
                Some(&layouts.shadow_material),
                Some(model_uniforms.layout()),
                Some(&layouts.skin),
            ],
            immediate_size: 0,
        });

        let build = |double_sided: bool, skinned: bool| {
            let layout = if skinned { &skinned_layout } else { &static_layout };
            Self::build_variant(device, &module, layout, double_sided, skinned)
        };

        let variants = [
            build(false, false),
            build(true, false),
            build(false, true),
            build(true, true),
        ];

        Self {
            uniform_buffer,
            uniform_stride: stride,
            bind_group,
            variants,
        }
    }

    fn build_variant(
        device: &wgpu::Device,
        module: &wgpu::ShaderModule,
        layout: &wgpu::PipelineLayout,
        double_sided: bool,
        skinned: bool,
    ) -> AlphaPipelineSet {
        let (cull_mode, bias) = if double_sided {
            (None, BIAS_DOUBLE)
        } else {
            (Some(wgpu::Face::Front), BIAS_SINGLE)
        };

        let primitive = wgpu::PrimitiveState {
            cull_mode,
            ..Default::default()
        };

        let depth_stencil = wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: Some(true),
            depth_compare: Some(wgpu::CompareFunction::LessEqual),
            stencil: wgpu::StencilState::default(),
            bias,
        };

        const fn attr(format: wgpu::VertexFormat, location: u32) -> wgpu::VertexAttribute {
            wgpu::VertexAttribute {
                format,
                offset: 0,
                shader_location: location,
            }
        }

        const POSITION_ATTR: [wgpu::VertexAttribute; 1] = [attr(wgpu::VertexFormat::Float32x3, 0)];
        const UV_ATTR_1: [wgpu::VertexAttribute; 1] = [attr(wgpu::VertexFormat::Float32x2, 1)];
        const JOINT_ATTR_1: [wgpu::VertexAttribute; 1] = [attr(wgpu::VertexFormat::Uint16x4, 1)];
        const JOINT_ATTR_2: [wgpu::VertexAttribute; 1] = [attr(wgpu::VertexFormat::Uint16x4, 2)];
        const WEIGHT_ATTR_2: [wgpu::VertexAttribute; 1] = [attr(wgpu::VertexFormat::Float32x4, 2)];
        const WEIGHT_ATTR_3: [wgpu::VertexAttribute; 1] = [attr(wgpu::VertexFormat::Float32x4, 3)];

        let buffer_layout = |stride: u64, attributes: &'static [wgpu::VertexAttribute]| {
            wgpu::VertexBufferLayout {
                array_stride: stride,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes,
            }
        };

        let position = buffer_layout(VEC3_STRIDE, &POSITION_ATTR);

        let (opaque_entry, alpha_entry, opaque_buffers, alpha_buffers): (
            &str,
            &str,
            Vec<wgpu::VertexBufferLayout>,
            Vec<wgpu::VertexBufferLayout>,
        ) = if skinned {
            (
                "vs_opaque_skinned",
                "vs_alpha_skinned",
                vec![
                    position.clone(),
                    buffer_layout(JOINT_STRIDE, &JOINT_ATTR_1),
                    buffer_layout(WEIGHT_STRIDE, &WEIGHT_ATTR_2),
                ],
                vec![
                    position.clone(),
                    buffer_layout(VEC2_STRIDE, &UV_ATTR_1),
                    buffer_layout(JOINT_STRIDE, &JOINT_ATTR_2),
                    buffer_layout(WEIGHT_STRIDE, &WEIGHT_ATTR_3),
                ],
            )
        } else {
            (
                "vs_opaque",
                "vs_alpha",
                vec![position.clone()],
                vec![position.clone(), buffer_layout(VEC2_STRIDE, &UV_ATTR_1)],
            )
        };

        let make = |label: &str, entry: &str, buffers: &[wgpu::VertexBufferLayout], alpha: bool| {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(label),
                layout: Some(layout),
                vertex: wgpu::VertexState {
                    module,
                    entry_point: Some(entry),
                    buffers,
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                },
                fragment: alpha.then(|| wgpu::FragmentState {
                    module,
                    entry_point: Some("fs_alpha"),
                    targets: &[],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                }),
                primitive,
                depth_stencil: Some(depth_stencil.clone()),
                multisample: wgpu::MultisampleState::default(),
                multiview_mask: None,
                cache: None,
            })
        };

        AlphaPipelineSet {
            opaque: make("Shadow Opaque Pipeline", opaque_entry, &opaque_buffers, false),
            mask: make("Shadow Mask Pipeline", alpha_entry, &alpha_buffers, true),
            blend: make("Shadow Blend Pipeline", alpha_entry, &alpha_buffers, true),
        }
    }
}

impl RenderNode for ShadowPass {
    fn name(&self) -> &'static str {
        "Shadow Pass"
    }

    fn prepare(&mut self, ctx: &FrameContext<'_>) {
        let mut data = vec![0u8; self.uniform_stride as usize * 3];
        for (cascade, param) in ctx.shadow_params.iter().enumerate() {
            let uniform = ShadowUniform {
                view_projection: param.camera.view_projection_matrix,
            };
            let offset = cascade * self.uniform_stride as usize;
            data[offset..offset + std::mem::size_of::<ShadowUniform>()]
                .copy_from_slice(bytemuck::bytes_of(&uniform));
        }
        ctx.queue.write_buffer(&self.uniform_buffer, 0, &data);
    }

    fn run(&self, ctx: &FrameContext<'_>, encoder: &mut wgpu::CommandEncoder) {
        for cascade in 0..3 {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Shadow Depth Pass"),
                color_attachments: &[],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &ctx.targets.shadow[cascade].view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                ..Default::default()
            });

            let dynamic_offset = cascade as u32 * self.uniform_stride;
            pass.set_bind_group(0, &self.bind_group, &[dynamic_offset]);

            let lists = ctx.lists.shadow[cascade];

            let mut binder = ShadowBinder {
                scene: ctx.scene,
                gpu_scene: ctx.gpu_scene,
                model_uniforms: ctx.model_uniforms,
                skinned: false,
            };
            lists
                .single_sided
                .draw(&mut pass, &self.variants[0].buckets(), &mut binder);
            lists
                .double_sided
                .draw(&mut pass, &self.variants[1].buckets(), &mut binder);

            binder.skinned = true;
            lists
                .single_sided_skinned
                .draw(&mut pass, &self.variants[2].buckets(), &mut binder);
            lists
                .double_sided_skinned
                .draw(&mut pass, &self.variants[3].buckets(), &mut binder);
        }
    }
}

struct ShadowBinder<'a> {
    scene: &'a SceneModel,
    gpu_scene: &'a GpuScene,
    model_uniforms: &'a ModelUniformArena,
    skinned: bool,
}

impl DrawcallBinder for ShadowBinder<'_> {
    fn bind_node(&mut self, pass: &mut wgpu::RenderPass<'_>, drawcall: &Drawcall) {
        let offset = self.model_uniforms.offset_of(drawcall.node_index);
        pass.set_bind_group(2, self.model_uniforms.bind_group(), &[offset]);

        if self.skinned {
            if let Some(skin) = self
                .scene
                .nodes
                .get(drawcall.node_index as usize)
                .and_then(|n| n.skin)
            {
                if let Some(gpu_skin) = self.gpu_scene.skins.get(skin) {
                    pass.set_bind_group(3, &gpu_skin.bind_group, &[]);
                }
            }
        }
    }

    fn bind_material(&mut self, pass: &mut wgpu::RenderPass<'_>, drawcall: &Drawcall) {
        if let Some(material) = drawcall
            .primitive
            .material
            .and_then(|idx| self.gpu_scene.materials.get(idx as usize))
        {
            pass.set_bind_group(1, &material.shadow, &[]);
        }
    }

    fn bind_vertices(
        &mut self,
        pass: &mut wgpu::RenderPass<'_>,
        drawcall: &Drawcall,
        mode: AlphaMode,
    ) {
        let prim = &drawcall.primitive;
        let position = &self.gpu_scene.vec3_buffers[prim.position_buffer as usize];
        pass.set_vertex_buffer(0, position.slice(u64::from(prim.position_offset) * VEC3_STRIDE..));

        let mut slot = 1;
        if mode != AlphaMode::Opaque {
            let uv = &self.gpu_scene.vec2_buffers[prim.uv_buffer as usize];
            pass.set_vertex_buffer(slot, uv.slice(u64::from(prim.uv_offset) * VEC2_STRIDE..));
            slot += 1;
        }

        if self.skinned {
            if let Some(skin) = prim.skin {
                let joints = &self.gpu_scene.joint_buffers[skin.joints_buffer as usize];
                let weights = &self.gpu_scene.weight_buffers[skin.weights_buffer as usize];
                pass.set_vertex_buffer(
                    slot,
                    joints.slice(u64::from(skin.joints_offset) * JOINT_STRIDE..),
                );
                pass.set_vertex_buffer(
                    slot + 1,
                    weights.slice(u64::from(skin.weights_offset) * WEIGHT_STRIDE..),
                );
            }
        }
    }
}
