//! Render Option Tests
//!
//! Tests for:
//! - Range clamping of every runtime-adjustable option
//! - Mutual clamping of the bloom thresholds
//! - EV-to-scale and sun-radiance conversions

use glam::Vec3;

use ember::{FxaaQuality, RenderOptions};

const EPSILON: f32 = 1e-5;

fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < EPSILON
}

#[test]
fn defaults_are_already_sane() {
    let mut options = RenderOptions::default();
    let before = options.clone();
    options.sanitize();

    assert!(approx(options.fov, before.fov));
    assert!(approx(options.bloom_start, before.bloom_start));
    assert!(approx(options.bloom_end, before.bloom_end));
    assert!(approx(options.adapt_speed, before.adapt_speed));
    assert_eq!(options.fxaa_quality, FxaaQuality::Medium);
}

#[test]
fn fov_clamps_to_documented_range() {
    let mut options = RenderOptions {
        fov: 500.0,
        ..Default::default()
    };
    options.sanitize();
    assert!(approx(options.fov, 135.0));

    options.fov = 0.01;
    options.sanitize();
    assert!(approx(options.fov, 1.0));
}

#[test]
fn exposure_ev_clamps_to_six_stops() {
    let mut options = RenderOptions {
        exposure_ev: -100.0,
        ..Default::default()
    };
    options.sanitize();
    assert!(approx(options.exposure_ev, -6.0));

    options.exposure_ev = 42.0;
    options.sanitize();
    assert!(approx(options.exposure_ev, 6.0));
}

#[test]
fn brightness_options_clamp() {
    let mut options = RenderOptions {
        emissive_brightness: 0.0,
        skybox_brightness: 1.0e9,
        ..Default::default()
    };
    options.sanitize();
    assert!(approx(options.emissive_brightness, 0.001));
    assert!(approx(options.skybox_brightness, 10000.0));
}

#[test]
fn bloom_start_cannot_exceed_bloom_end() {
    let mut options = RenderOptions {
        bloom_start: 50.0,
        bloom_end: 10.0,
        ..Default::default()
    };
    options.sanitize();
    assert!(options.bloom_start <= options.bloom_end);
    assert!(approx(options.bloom_start, 10.0));

    let mut options = RenderOptions {
        bloom_end: 1000.0,
        ..Default::default()
    };
    options.sanitize();
    assert!(approx(options.bloom_end, 100.0));
}

#[test]
fn csm_blend_and_debug_layer_clamp() {
    let mut options = RenderOptions {
        csm_blend_factor: 7.0,
        shadow_perspective_layer: 9,
        ..Default::default()
    };
    options.sanitize();
    assert!(approx(options.csm_blend_factor, 1.0));
    assert_eq!(options.shadow_perspective_layer, 2);
}

#[test]
fn adapt_speed_allows_frozen_exposure() {
    // Zero freezes the exposure loop; the sanitizer must not round it up.
    let mut options = RenderOptions {
        adapt_speed: 0.0,
        ..Default::default()
    };
    options.sanitize();
    assert!(approx(options.adapt_speed, 0.0));

    options.adapt_speed = 80.0;
    options.sanitize();
    assert!(approx(options.adapt_speed, 5.0));
}

#[test]
fn exposure_scale_doubles_per_ev() {
    let mut options = RenderOptions {
        exposure_ev: 1.0,
        ..Default::default()
    };
    assert!(approx(options.exposure_scale(), 2.0));

    options.exposure_ev = -1.0;
    assert!(approx(options.exposure_scale(), 0.5));

    options.exposure_ev = 0.0;
    assert!(approx(options.exposure_scale(), 1.0));
}

#[test]
fn sun_radiance_linearizes_color() {
    let options = RenderOptions {
        sun_color: Vec3::ONE,
        sun_intensity: 2.0,
        ..Default::default()
    };
    // White is a fixed point of the gamma curve.
    assert!(options.sun_radiance().abs_diff_eq(Vec3::splat(2.0), EPSILON));

    let options = RenderOptions {
        sun_color: Vec3::splat(0.5),
        sun_intensity: 1.0,
        ..Default::default()
    };
    let radiance = options.sun_radiance();
    assert!(
        radiance.x < 0.3,
        "Gamma 2.2 should darken mid grey, got {radiance:?}"
    );
}

#[test]
fn near_stays_below_far() {
    let mut options = RenderOptions {
        near: 500.0,
        far: 100.0,
        ..Default::default()
    };
    options.sanitize();
    assert!(options.near <= options.far);
}
