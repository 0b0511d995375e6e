//! G-buffer pass: four color MRTs plus depth, all load-clear.
//!
//! Attachment 0 carries the world-space normal (RGBA32F), attachment 1
//! the base color and material alpha, attachment 2 metallic/roughness/AO,
//! attachment 3 pre-multiplied emissive; depth is sampled later by the
//! lighting pass. Pipeline variants mirror the shadow pass: (single/
//! double-sided) × (opaque/mask/blend), with skinned vertex entry points
//! binding the joint-palette storage buffer as an extra group.

use crate::renderer::drawcall::{BucketPipelines, Drawcall, DrawcallBinder};
use crate::renderer::passes::{FrameContext, RenderNode, SharedLayouts};
use crate::renderer::targets::{COLOR_FORMAT, DEPTH_FORMAT, NORMAL_FORMAT};
use crate::renderer::uniforms::{CameraUniform, ModelUniformArena};
use crate::scene::model::{
    AlphaMode, GpuScene, SceneModel, JOINT_STRIDE, VEC2_STRIDE, VEC3_STRIDE, WEIGHT_STRIDE,
};

const SHADER: &str = include_str!("../shaders/gbuffer.wgsl");

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

pub struct GBufferPass {
    camera_buffer: wgpu::Buffer,
    camera_bind_group: wgpu::BindGroup,

    /// Indexed by `double_sided as usize + skinned as usize * 2`.
    variants: [AlphaPipelineSet; 4],
}

impl GBufferPass {
    #[must_use]
    pub fn new(
        device: &wgpu::Device,
        layouts: &SharedLayouts,
        model_uniforms: &ModelUniformArena,
    ) -> Self {
        let camera_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("GBuffer Camera Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: wgpu::BufferSize::new(
                        std::mem::size_of::<CameraUniform>() as u64
                    ),
                },
                count: None,
            }],
        });

        let camera_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("GBuffer Camera Buffer"),
            size: std::mem::size_of::<CameraUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let camera_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("GBuffer Camera BindGroup"),
            layout: &camera_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: camera_buffer.as_entire_binding(),
            }],
        });

        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("GBuffer Shader"),
            source: wgpu::ShaderSource::Wgsl(SHADER.into()),
        });

        // Static pipelines bind three groups; only the skinned variants
        // carry the joint-palette group, and every group in a layout must
        // be bound at draw time.
        let static_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("GBuffer Pipeline Layout"),
            bind_group_layouts: &[
                Some(&camera_layout),
                Some(&layouts.gbuffer_material),
                Some(model_uniforms.layout()),
            ],
            immediate_size: 0,
        });
        let skinned_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("GBuffer Skinned Pipeline Layout"),
            bind_group_layouts: &[
                Some(&camera_layout),
                Some(&layouts.gbuffer_material),
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
            camera_buffer,
            camera_bind_group,
            variants,
        }
    }

    fn build_variant(
        device: &wgpu::Device,
        module: &wgpu::ShaderModule,
        pipeline_layout: &wgpu::PipelineLayout,
        double_sided: bool,
        skinned: bool,
    ) -> AlphaPipelineSet {
        let primitive = wgpu::PrimitiveState {
            cull_mode: if double_sided {
                None
            } else {
                Some(wgpu::Face::Back)
            },
            ..Default::default()
        };

        let depth_stencil = wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: Some(true),
            depth_compare: Some(wgpu::CompareFunction::LessEqual),
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        };

        const fn attr(format: wgpu::VertexFormat, location: u32) -> wgpu::VertexAttribute {
            wgpu::VertexAttribute {
                format,
                offset: 0,
                shader_location: location,
            }
        }

        const POSITION_ATTR: [wgpu::VertexAttribute; 1] = [attr(wgpu::VertexFormat::Float32x3, 0)];
        const NORMAL_ATTR: [wgpu::VertexAttribute; 1] = [attr(wgpu::VertexFormat::Float32x3, 1)];
        const UV_ATTR: [wgpu::VertexAttribute; 1] = [attr(wgpu::VertexFormat::Float32x2, 2)];
        const TANGENT_ATTR: [wgpu::VertexAttribute; 1] = [attr(wgpu::VertexFormat::Float32x3, 3)];
        const JOINT_ATTR: [wgpu::VertexAttribute; 1] = [attr(wgpu::VertexFormat::Uint16x4, 4)];
        const WEIGHT_ATTR: [wgpu::VertexAttribute; 1] = [attr(wgpu::VertexFormat::Float32x4, 5)];

        let buffer_layout = |stride: u64, attributes: &'static [wgpu::VertexAttribute]| {
            wgpu::VertexBufferLayout {
                array_stride: stride,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes,
            }
        };

        let mut buffers = vec![
            buffer_layout(VEC3_STRIDE, &POSITION_ATTR),
            buffer_layout(VEC3_STRIDE, &NORMAL_ATTR),
            buffer_layout(VEC2_STRIDE, &UV_ATTR),
            buffer_layout(VEC3_STRIDE, &TANGENT_ATTR),
        ];
        if skinned {
            buffers.push(buffer_layout(JOINT_STRIDE, &JOINT_ATTR));
            buffers.push(buffer_layout(WEIGHT_STRIDE, &WEIGHT_ATTR));
        }
        let vertex_entry = if skinned { "vs_skinned" } else { "vs_static" };

        let target = |format: wgpu::TextureFormat, blend: Option<wgpu::BlendState>| {
            Some(wgpu::ColorTargetState {
                format,
                blend,
                write_mask: wgpu::ColorWrites::ALL,
            })
        };

        let opaque_targets = [
            target(NORMAL_FORMAT, None),
            target(COLOR_FORMAT, None),
            target(COLOR_FORMAT, None),
            target(COLOR_FORMAT, None),
        ];
        // Blend bucket: alpha-blend the color-like attachments, replace
        // the parameter attachments.
        let blend_targets = [
            target(NORMAL_FORMAT, None),
            target(COLOR_FORMAT, Some(wgpu::BlendState::ALPHA_BLENDING)),
            target(COLOR_FORMAT, None),
            target(COLOR_FORMAT, Some(wgpu::BlendState::ALPHA_BLENDING)),
        ];

        let make = |label: &str,
                    fragment_entry: &str,
                    targets: &[Option<wgpu::ColorTargetState>]| {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(label),
                layout: Some(pipeline_layout),
                vertex: wgpu::VertexState {
                    module,
                    entry_point: Some(vertex_entry),
                    buffers: &buffers,
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module,
                    entry_point: Some(fragment_entry),
                    targets,
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
            opaque: make("GBuffer Opaque Pipeline", "fs_main", &opaque_targets),
            mask: make("GBuffer Mask Pipeline", "fs_mask", &opaque_targets),
            blend: make("GBuffer Blend Pipeline", "fs_main", &blend_targets),
        }
    }
}

impl RenderNode for GBufferPass {
    fn name(&self) -> &'static str {
        "GBuffer Pass"
    }

    fn prepare(&mut self, ctx: &FrameContext<'_>) {
        let uniform = CameraUniform {
            view_projection: ctx.camera.view_projection_matrix,
        };
        ctx.queue
            .write_buffer(&self.camera_buffer, 0, bytemuck::bytes_of(&uniform));
    }

    fn run(&self, ctx: &FrameContext<'_>, encoder: &mut wgpu::CommandEncoder) {
        let clear = |view| {
            Some(wgpu::RenderPassColorAttachment {
                view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })
        };

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("GBuffer Pass"),
            color_attachments: &[
                clear(&ctx.targets.normal.view),
                clear(&ctx.targets.albedo.view),
                clear(&ctx.targets.pbr.view),
                clear(&ctx.targets.emissive.view),
            ],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &ctx.targets.depth.view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            ..Default::default()
        });

        pass.set_bind_group(0, &self.camera_bind_group, &[]);

        let lists = ctx.lists.gbuffer;

        let mut binder = GBufferBinder {
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

struct GBufferBinder<'a> {
    scene: &'a SceneModel,
    gpu_scene: &'a GpuScene,
    model_uniforms: &'a ModelUniformArena,
    skinned: bool,
}

impl DrawcallBinder for GBufferBinder<'_> {
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
            pass.set_bind_group(1, &material.gbuffer, &[]);
        }
    }

    fn bind_vertices(
        &mut self,
        pass: &mut wgpu::RenderPass<'_>,
        drawcall: &Drawcall,
        _mode: AlphaMode,
    ) {
        let prim = &drawcall.primitive;
        let vec3 = &self.gpu_scene.vec3_buffers;
        let vec2 = &self.gpu_scene.vec2_buffers;

        pass.set_vertex_buffer(
            0,
            vec3[prim.position_buffer as usize]
                .slice(u64::from(prim.position_offset) * VEC3_STRIDE..),
        );
        pass.set_vertex_buffer(
            1,
            vec3[prim.normal_buffer as usize].slice(u64::from(prim.normal_offset) * VEC3_STRIDE..),
        );
        pass.set_vertex_buffer(
            2,
            vec2[prim.uv_buffer as usize].slice(u64::from(prim.uv_offset) * VEC2_STRIDE..),
        );
        pass.set_vertex_buffer(
            3,
            vec3[prim.tangent_buffer as usize]
                .slice(u64::from(prim.tangent_offset) * VEC3_STRIDE..),
        );

        if self.skinned {
            if let Some(skin) = prim.skin {
                pass.set_vertex_buffer(
                    4,
                    self.gpu_scene.joint_buffers[skin.joints_buffer as usize]
                        .slice(u64::from(skin.joints_offset) * JOINT_STRIDE..),
                );
                pass.set_vertex_buffer(
                    5,
                    self.gpu_scene.weight_buffers[skin.weights_buffer as usize]
                        .slice(u64::from(skin.weights_offset) * WEIGHT_STRIDE..),
                );
            }
        }
    }
}
