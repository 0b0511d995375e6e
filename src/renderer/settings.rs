//! Render Settings Configuration
//!
//! [`RenderSettings`] holds the init-time configuration (GPU selection,
//! vsync, required device features). [`RenderOptions`] holds everything the
//! host may adjust between frames; every field carries a documented range
//! and [`RenderOptions::sanitize`] clamps the whole set, so sliders can
//! write values directly without pre-validation.

use glam::Vec3;

/// Init-time configuration for the rendering system.
#[derive(Debug, Clone)]
pub struct RenderSettings {
    /// GPU adapter selection preference.
    ///
    /// - `HighPerformance`: Prefer discrete/dedicated GPU
    /// - `LowPower`: Prefer integrated GPU
    pub power_preference: wgpu::PowerPreference,

    /// Enable vertical synchronization (`VSync`).
    pub vsync: bool,

    /// Required wgpu features that must be supported by the adapter.
    pub required_features: wgpu::Features,

    /// Required wgpu limits that must be supported by the adapter.
    pub required_limits: wgpu::Limits,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            power_preference: wgpu::PowerPreference::HighPerformance,
            vsync: true,
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
        }
    }
}

/// FXAA quality preset. Selects the edge-exploration step table compiled
/// into the FXAA fragment entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FxaaQuality {
    /// No anti-aliasing; the composite output is passed through.
    Off,
    Low,
    #[default]
    Medium,
    High,
}

/// Runtime-adjustable rendering options.
///
/// | Field | Range |
/// |-------|-------|
/// | `exposure_ev` | [-6, 6] EV |
/// | `emissive_brightness` | [0.001, 10000] |
/// | `skybox_brightness` | [0.001, 10000] |
/// | `bloom_start` | [0.2, `bloom_end`] |
/// | `bloom_end` | [`bloom_start`, 100] |
/// | `bloom_intensity` | [0.001, 10] |
/// | `adapt_speed` | [0.01, 5] |
/// | `csm_blend_factor` | [0, 1] |
/// | `fov` | [1°, 135°] |
/// | `shadow_perspective_layer` | {0, 1, 2} |
#[derive(Debug, Clone)]
pub struct RenderOptions {
    // === Camera ===
    /// Vertical field of view in degrees.
    pub fov: f32,
    pub near: f32,
    pub far: f32,
    /// Derive `near` each frame from the visible geometry.
    pub auto_adjust_near_plane: bool,
    /// Derive `far` each frame from the visible geometry.
    pub auto_adjust_far_plane: bool,

    // === Lighting & Exposure ===
    /// Manual exposure offset in EV, applied on top of auto-exposure.
    pub exposure_ev: f32,
    pub emissive_brightness: f32,
    pub skybox_brightness: f32,

    pub bloom_start: f32,
    pub bloom_end: f32,
    pub bloom_intensity: f32,
    /// Auto-exposure adaptation speed; the smoothing time constant is its
    /// reciprocal. Zero freezes the exposure.
    pub adapt_speed: f32,

    // === Sun ===
    /// Sun azimuth in degrees.
    pub sun_yaw: f32,
    /// Sun elevation in degrees.
    pub sun_pitch: f32,
    /// Sun color in sRGB; linearized before upload.
    pub sun_color: Vec3,
    pub sun_intensity: f32,

    // === Shadow ===
    /// Blend between logarithmic (0) and linear (1) cascade splits, and
    /// the width of the inter-cascade blending band.
    pub csm_blend_factor: f32,

    // === Anti-aliasing ===
    pub fxaa_quality: FxaaQuality,

    // === Debug ===
    /// Render the scene from the selected shadow cascade's point of view.
    pub show_shadow_perspective: bool,
    pub shadow_perspective_layer: u32,

    /// Which scene of the model to render.
    pub scene_index: usize,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            fov: 45.0,
            near: 0.01,
            far: 100.0,
            auto_adjust_near_plane: true,
            auto_adjust_far_plane: true,

            exposure_ev: 0.0,
            emissive_brightness: 1.0,
            skybox_brightness: 1.0,

            bloom_start: 2.0,
            bloom_end: 15.0,
            bloom_intensity: 0.02,
            adapt_speed: 1.0,

            sun_yaw: 0.0,
            sun_pitch: 45.0,
            sun_color: Vec3::ONE,
            sun_intensity: 20.0,

            csm_blend_factor: 0.5,

            fxaa_quality: FxaaQuality::default(),

            show_shadow_perspective: false,
            shadow_perspective_layer: 0,

            scene_index: 0,
        }
    }
}

impl RenderOptions {
    /// Clamps every option into its documented range. Called by the
    /// renderer at the top of each frame.
    pub fn sanitize(&mut self) {
        self.fov = self.fov.clamp(1.0, 135.0);
        self.far = self.far.clamp(0.02, 1.0e6);
        self.near = self.near.clamp(0.01, self.far);

        self.exposure_ev = self.exposure_ev.clamp(-6.0, 6.0);
        self.emissive_brightness = self.emissive_brightness.clamp(0.001, 10000.0);
        self.skybox_brightness = self.skybox_brightness.clamp(0.001, 10000.0);

        self.bloom_end = self.bloom_end.clamp(0.2, 100.0);
        self.bloom_start = self.bloom_start.clamp(0.2, self.bloom_end);
        self.bloom_intensity = self.bloom_intensity.clamp(0.001, 10.0);
        self.adapt_speed = self.adapt_speed.clamp(0.0, 5.0);

        self.sun_pitch = self.sun_pitch.clamp(0.0, 90.0);
        self.sun_yaw = self.sun_yaw.rem_euclid(360.0);
        self.sun_intensity = self.sun_intensity.clamp(0.0, 10000.0);

        self.csm_blend_factor = self.csm_blend_factor.clamp(0.0, 1.0);
        self.shadow_perspective_layer = self.shadow_perspective_layer.min(2);
    }

    /// Manual exposure multiplier derived from the EV offset.
    #[must_use]
    pub fn exposure_scale(&self) -> f32 {
        self.exposure_ev.exp2()
    }

    /// Sun radiance: sRGB color linearized with gamma 2.2, scaled by
    /// intensity.
    #[must_use]
    pub fn sun_radiance(&self) -> Vec3 {
        self.sun_color.powf(2.2) * self.sun_intensity
    }
}
