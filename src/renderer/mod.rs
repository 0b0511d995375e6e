//! Rendering System
//!
//! The renderer runs a fixed frame graph of six passes over a consumed
//! scene:
//!
//! ```text
//! shadow ─┐
//! g-buffer ┴─► lighting ──► auto-exposure ──► bloom ──► composite ──► FXAA ──► surface
//! ```
//!
//! Each frame the host-side sequence is:
//!
//! 1. Resolve node world transforms (animation overrides applied).
//! 2. Generate drawcalls for the camera frustum and the three shadow
//!    cascades, culling per-primitive AABBs; derive next frame's
//!    near/far from the surviving geometry.
//! 3. Prepare every pass (uniform uploads, bind-group refresh), record
//!    five command encoders, and submit them in dependency order.
//!
//! Two feedback edges are deliberately one frame stale: the exposure
//! result feeds the bloom threshold and the tone-mapper of the *next*
//! frame, and the auto-adjusted near/far feeds the *next* frame's
//! projection.

pub mod cascade;
pub mod context;
pub mod drawcall;
pub mod passes;
pub mod settings;
pub mod targets;
pub mod uniforms;

use glam::{Mat4, Vec3};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};

use crate::errors::{EmberError, Result};
use crate::scene::animation::{NodeTraverser, TransformOverrides};
use crate::scene::camera::{
    CameraParameter, OrbitController, ShadowParameter, sunlight_direction,
};
use crate::scene::model::{GpuScene, SceneModel};

use self::cascade::{CASCADE_COUNT, projected_depth, shadow_parameter, split_view_depth};
use self::context::GpuContext;
use self::drawcall::{
    DrawcallGenerator, GenSummary, clamp_gbuffer_depth_range, shadow_depth_range,
};
use self::passes::bloom::BloomPass;
use self::passes::composite::CompositePass;
use self::passes::exposure::AutoExposurePass;
use self::passes::fxaa::FxaaPass;
use self::passes::gbuffer::GBufferPass;
use self::passes::lighting::LightingPass;
use self::passes::shadow::ShadowPass;
use self::passes::{FrameContext, FrameDrawLists, RenderNode, SharedLayouts};
use self::settings::{RenderOptions, RenderSettings};
use self::targets::{ExposureBuffers, RenderTargetSet};
use self::uniforms::ModelUniformArena;

/// Per-frame statistics surfaced to the host.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameStats {
    pub gbuffer_objects: u32,
    pub gbuffer_vertices: u64,
    pub shadow_objects: u32,
    pub shadow_vertices: u64,
    /// World bounds of everything that survived side-plane culling.
    pub scene_min_bound: Vec3,
    pub scene_max_bound: Vec3,
    /// Host time spent building and recording the frame, in microseconds.
    pub cpu_time_us: u128,
}

/// The main renderer.
///
/// # Lifecycle
///
/// 1. Create with [`Renderer::new`] (no GPU resources allocated)
/// 2. Initialize GPU with [`Renderer::init`]
/// 3. Render frames with [`Renderer::render_frame`]
pub struct Renderer {
    settings: RenderSettings,
    /// Runtime-adjustable options; the host writes these freely between
    /// frames.
    pub options: RenderOptions,
    /// Orbit camera driven by the host's input handling.
    pub orbit: OrbitController,

    state: Option<RendererState>,
    size: (u32, u32),
}

struct RendererState {
    context: GpuContext,
    layouts: SharedLayouts,
    targets: RenderTargetSet,
    exposure: ExposureBuffers,
    model_uniforms: ModelUniformArena,

    shadow_pass: ShadowPass,
    gbuffer_pass: GBufferPass,
    lighting_pass: LightingPass,
    exposure_pass: AutoExposurePass,
    bloom_pass: BloomPass,
    composite_pass: CompositePass,
    fxaa_pass: FxaaPass,

    traverser: NodeTraverser,
    gbuffer_generator: DrawcallGenerator,
    shadow_generators: [DrawcallGenerator; CASCADE_COUNT],

    /// Light-axis depth range per cascade, fed forward from the previous
    /// frame's shadow drawcall generation.
    shadow_depth_ranges: [(f32, f32); CASCADE_COUNT],
    targets_generation: u64,
}

impl Renderer {
    /// Phase 1: store configuration; GPU resources are allocated in
    /// [`init`](Self::init).
    #[must_use]
    pub fn new(settings: RenderSettings) -> Self {
        Self {
            settings,
            options: RenderOptions::default(),
            orbit: OrbitController::default(),
            state: None,
            size: (0, 0),
        }
    }

    /// Phase 2: create the GPU context, compile every pipeline, allocate
    /// targets. Pipeline or shader failure here is fatal.
    pub async fn init<W>(&mut self, window: W, width: u32, height: u32) -> Result<()>
    where
        W: HasWindowHandle + HasDisplayHandle + Send + Sync + 'static,
    {
        if self.state.is_some() {
            return Ok(());
        }
        self.size = (width, height);

        let context = GpuContext::new(window, &self.settings, width, height).await?;
        let surface_format = context.surface_format();

        let layouts = SharedLayouts::new(&context.device);
        let model_uniforms = ModelUniformArena::new(&context.device);
        let targets = RenderTargetSet::new(&context.device, surface_format, width, height, 0);
        let exposure = ExposureBuffers::new(&context.device, &context.queue);

        let shadow_pass = ShadowPass::new(&context.device, &layouts, &model_uniforms);
        let gbuffer_pass = GBufferPass::new(&context.device, &layouts, &model_uniforms);
        let lighting_pass = LightingPass::new(&context.device, &layouts);
        let exposure_pass = AutoExposurePass::new(&context.device);
        let bloom_pass = BloomPass::new(&context.device);
        let composite_pass = CompositePass::new(&context.device, surface_format);
        let fxaa_pass = FxaaPass::new(&context.device, surface_format);

        self.state = Some(RendererState {
            context,
            layouts,
            targets,
            exposure,
            model_uniforms,
            shadow_pass,
            gbuffer_pass,
            lighting_pass,
            exposure_pass,
            bloom_pass,
            composite_pass,
            fxaa_pass,
            traverser: NodeTraverser::default(),
            gbuffer_generator: DrawcallGenerator::new(),
            shadow_generators: std::array::from_fn(|_| DrawcallGenerator::new()),
            shadow_depth_ranges: [(0.0, 1.0); CASCADE_COUNT],
            targets_generation: 0,
        });

        log::info!("Renderer initialized");
        Ok(())
    }

    /// Resizes the surface and recreates every render target. The
    /// exposure state is kept, so the first frame after a resize keeps
    /// the previous adaptation.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.size = (width, height);
        if let Some(state) = &mut self.state {
            if width == 0 || height == 0 {
                return;
            }
            state.context.resize(width, height);
            state.recreate_targets();
        }
    }

    // === Loader-facing accessors ===

    #[must_use]
    pub fn device(&self) -> Option<&wgpu::Device> {
        self.state.as_ref().map(|s| &s.context.device)
    }

    #[must_use]
    pub fn queue(&self) -> Option<&wgpu::Queue> {
        self.state.as_ref().map(|s| &s.context.queue)
    }

    #[must_use]
    pub fn surface_format(&self) -> Option<wgpu::TextureFormat> {
        self.state.as_ref().map(|s| s.context.surface_format())
    }

    /// Bind-group layouts the mesh/HDRI loaders populate against.
    #[must_use]
    pub fn shared_layouts(&self) -> Option<&SharedLayouts> {
        self.state.as_ref().map(|s| &s.layouts)
    }

    /// Renders one frame.
    ///
    /// `overrides` is the animated local-transform table produced by the
    /// animation player, `time` an absolute clock used for shader time.
    /// Surface invalidation is recovered internally; other errors
    /// propagate.
    pub fn render_frame(
        &mut self,
        scene: &SceneModel,
        gpu_scene: &GpuScene,
        hdri_bind_group: &wgpu::BindGroup,
        overrides: &TransformOverrides,
        delta_time: f32,
        time: f32,
    ) -> Result<FrameStats> {
        if self.size.0 == 0 || self.size.1 == 0 {
            return Ok(FrameStats::default());
        }
        let Some(state) = &mut self.state else {
            return Err(EmberError::InvalidParameter {
                context: "render_frame called before init",
                value: 0,
            });
        };

        self.options.sanitize();
        self.orbit.update(delta_time);

        let frame_start = std::time::Instant::now();

        // ================================================================
        // 1. Node hierarchy -> world transforms
        // ================================================================
        if scene.scenes.is_empty() {
            state.traverser.clear();
        } else {
            state.traverser.traverse(
                scene,
                overrides,
                self.options.scene_index,
                Mat4::IDENTITY,
            )?;
        }

        // ================================================================
        // 2. Drawcall generation + near/far feedback
        // ================================================================
        let (width, height) = state.context.size();
        let aspect = width as f32 / height as f32;

        // Cull against last frame's projection; its near/far feed this
        // frame's.
        let cull_camera = camera_parameter(&self.orbit, &self.options, aspect);
        let gbuffer_summary = state.gbuffer_generator.generate(
            scene,
            &state.traverser,
            &cull_camera.frustum,
            cull_camera.eye_position,
            cull_camera.eye_direction,
        );

        let (near, far) =
            clamp_gbuffer_depth_range(gbuffer_summary.near, gbuffer_summary.far);
        if self.options.auto_adjust_near_plane {
            self.options.near = near;
        }
        if self.options.auto_adjust_far_plane {
            self.options.far = far;
        }

        let mut camera = camera_parameter(&self.orbit, &self.options, aspect);

        // ================================================================
        // 3. Shadow cascade parameters + shadow drawcalls
        // ================================================================
        let sun_direction = sunlight_direction(self.options.sun_yaw, self.options.sun_pitch);
        let shadow_params =
            shadow_parameters(&self.options, &camera, sun_direction, &state.shadow_depth_ranges);

        let mut shadow_summary = GenSummary::default();
        for cascade in 0..CASCADE_COUNT {
            let param = &shadow_params[cascade];
            let summary = state.shadow_generators[cascade].generate(
                scene,
                &state.traverser,
                &param.camera.frustum,
                param.camera.eye_position,
                param.camera.eye_direction,
            );
            state.shadow_depth_ranges[cascade] =
                shadow_depth_range(summary.near, summary.far);
            shadow_summary.merge(&summary);
        }

        if self.options.show_shadow_perspective {
            camera = shadow_params[self.options.shadow_perspective_layer as usize].camera;
        }

        // ================================================================
        // 4. Per-draw uniforms and skin palettes
        // ================================================================
        state.model_uniforms.begin_frame();
        {
            let all_lists = [
                state.gbuffer_generator.lists(),
                state.shadow_generators[0].lists(),
                state.shadow_generators[1].lists(),
                state.shadow_generators[2].lists(),
            ];
            let mut staged: Vec<(u32, Mat4)> = Vec::new();
            for lists in all_lists {
                for drawlist in [
                    &lists.single_sided,
                    &lists.double_sided,
                    &lists.single_sided_skinned,
                    &lists.double_sided_skinned,
                ] {
                    for drawcall in drawlist
                        .opaque
                        .iter()
                        .chain(&drawlist.mask)
                        .chain(&drawlist.blend)
                    {
                        staged.push((drawcall.node_index, drawcall.transform));
                    }
                }
            }
            for (node, transform) in staged {
                let _ = state.model_uniforms.allocate(node, transform);
            }
        }
        state
            .model_uniforms
            .upload(&state.context.device, &state.context.queue);

        upload_skin_palettes(scene, gpu_scene, &state.traverser, &state.context.queue);

        // ================================================================
        // 5. Acquire, record, submit, present
        // ================================================================
        let frame = match state.context.acquire() {
            Ok(frame) => frame,
            Err(
                EmberError::SwapchainOutOfDate
                | EmberError::SwapchainSuboptimal
                | EmberError::SurfaceTimeout,
            ) => {
                state.recover_surface();
                state.context.acquire_lenient()?
            }
            Err(err) => return Err(err),
        };
        let surface_view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let stats = {
            let RendererState {
                context,
                targets,
                exposure,
                model_uniforms,
                shadow_pass,
                gbuffer_pass,
                lighting_pass,
                exposure_pass,
                bloom_pass,
                composite_pass,
                fxaa_pass,
                traverser: _,
                gbuffer_generator,
                shadow_generators,
                ..
            } = state;

            let lists = FrameDrawLists {
                gbuffer: gbuffer_generator.lists(),
                shadow: [
                    shadow_generators[0].lists(),
                    shadow_generators[1].lists(),
                    shadow_generators[2].lists(),
                ],
            };

            let ctx = FrameContext {
                device: &context.device,
                queue: &context.queue,
                targets,
                exposure,
                scene,
                gpu_scene,
                hdri_bind_group,
                model_uniforms,
                lists: &lists,
                camera: &camera,
                shadow_params: &shadow_params,
                options: &self.options,
                sun_direction,
                delta_time,
                time,
                surface_view: &surface_view,
            };

            shadow_pass.prepare(&ctx);
            gbuffer_pass.prepare(&ctx);
            lighting_pass.prepare(&ctx);
            exposure_pass.prepare(&ctx);
            bloom_pass.prepare(&ctx);
            composite_pass.prepare(&ctx);
            fxaa_pass.prepare(&ctx);

            // Five command buffers, one per submission slot of the frame
            // graph. Submission order carries the semaphore edges of the
            // design: lighting after shadow + g-buffer, compute after
            // lighting, composite after compute.
            let encoder_desc = |label| wgpu::CommandEncoderDescriptor { label: Some(label) };

            let mut shadow_encoder =
                context.device.create_command_encoder(&encoder_desc("Shadow Encoder"));
            shadow_pass.run(&ctx, &mut shadow_encoder);

            let mut gbuffer_encoder =
                context.device.create_command_encoder(&encoder_desc("GBuffer Encoder"));
            gbuffer_pass.run(&ctx, &mut gbuffer_encoder);

            let mut lighting_encoder =
                context.device.create_command_encoder(&encoder_desc("Lighting Encoder"));
            lighting_pass.run(&ctx, &mut lighting_encoder);

            let mut compute_encoder =
                context.device.create_command_encoder(&encoder_desc("Compute Encoder"));
            exposure_pass.run(&ctx, &mut compute_encoder);
            bloom_pass.run(&ctx, &mut compute_encoder);

            let mut composite_encoder =
                context.device.create_command_encoder(&encoder_desc("Composite Encoder"));
            composite_pass.run(&ctx, &mut composite_encoder);
            fxaa_pass.run(&ctx, &mut composite_encoder);

            context.queue.submit([
                shadow_encoder.finish(),
                gbuffer_encoder.finish(),
                lighting_encoder.finish(),
                compute_encoder.finish(),
                composite_encoder.finish(),
            ]);

            FrameStats {
                gbuffer_objects: gbuffer_summary.object_count,
                gbuffer_vertices: gbuffer_summary.vertex_count,
                shadow_objects: shadow_summary.object_count,
                shadow_vertices: shadow_summary.vertex_count,
                scene_min_bound: gbuffer_summary.min_bounding,
                scene_max_bound: gbuffer_summary.max_bounding,
                cpu_time_us: frame_start.elapsed().as_micros(),
            }
        };

        frame.present();
        Ok(stats)
    }

}

/// The g-buffer camera from the orbit controller and current options.
fn camera_parameter(
    orbit: &OrbitController,
    options: &RenderOptions,
    aspect: f32,
) -> CameraParameter {
    CameraParameter::perspective(
        orbit.eye_position(),
        orbit.eye_direction(),
        Vec3::Y,
        aspect,
        options.fov.to_radians(),
        options.near,
        options.far,
    )
}

/// Derives the three cascade parameters from the camera and the previous
/// frame's light-axis depth ranges.
fn shadow_parameters(
    options: &RenderOptions,
    camera: &CameraParameter,
    sun_direction: Vec3,
    depth_ranges: &[(f32, f32); CASCADE_COUNT],
) -> [ShadowParameter; CASCADE_COUNT] {
    let near = options.near;
    let far = options.far;
    let blend = options.csm_blend_factor;

    // Depth splits in NDC; cascade 0 starts at the near plane, cascade 2
    // ends at the far plane.
    let mut ndc_splits = [0.0f32; CASCADE_COUNT + 1];
    ndc_splits[CASCADE_COUNT] = 1.0;
    for i in 1..CASCADE_COUNT {
        let view_depth = split_view_depth(near, far, i as f32 / CASCADE_COUNT as f32, blend);
        ndc_splits[i] = projected_depth(&camera.projection_matrix, view_depth);
    }

    std::array::from_fn(|cascade| {
        let (shadow_near, shadow_far) = depth_ranges[cascade];
        shadow_parameter(
            sun_direction,
            camera,
            ndc_splits[cascade],
            ndc_splits[cascade + 1],
            shadow_near,
            shadow_far,
        )
    })
}

impl RendererState {
    fn recreate_targets(&mut self) {
        self.targets_generation += 1;
        let (width, height) = self.context.size();
        self.targets = RenderTargetSet::new(
            &self.context.device,
            self.context.surface_format(),
            width,
            height,
            self.targets_generation,
        );
        log::info!("Render targets recreated at {width}x{height}");
    }

    /// Out-of-date / suboptimal surface recovery: drain in-flight work,
    /// reconfigure the surface, rebuild every target. Pipelines survive.
    fn recover_surface(&mut self) {
        let _ = self.context.device.poll(wgpu::PollType::wait_indefinitely());
        self.context.reconfigure();
        self.recreate_targets();
    }
}

/// Stages `joint_world * inverse_bind` palettes for every skin.
fn upload_skin_palettes(
    scene: &SceneModel,
    gpu_scene: &GpuScene,
    traverser: &NodeTraverser,
    queue: &wgpu::Queue,
) {
    for (skin_idx, skin) in scene.skins.iter().enumerate() {
        let Some(gpu_skin) = gpu_scene.skins.get(skin_idx) else {
            continue;
        };
        let count = skin.joints.len().min(gpu_skin.joint_count as usize);
        let mut palette = Vec::with_capacity(count);
        for joint_slot in 0..count {
            let joint_node = skin.joints[joint_slot];
            palette.push(
                traverser.world_transform(joint_node) * skin.inverse_bind_matrices[joint_slot],
            );
        }
        if !palette.is_empty() {
            queue.write_buffer(&gpu_skin.palette, 0, bytemuck::cast_slice(&palette));
        }
    }
}
