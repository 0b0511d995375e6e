//! Uniform Block Layout Tests
//!
//! The WGSL side declares these blocks with std140-compatible layouts;
//! the Rust structs must match byte for byte since they are uploaded with
//! a single `write_buffer`.

use ember::renderer::uniforms::{
    BloomParams, CameraUniform, CompositeParams, ExposureResult, HISTOGRAM_BINS, LerpParams,
    LightingParams, LuminanceParams, MaterialParams, ModelUniform, ShadowUniform,
};

#[test]
fn matrix_blocks_are_one_mat4() {
    assert_eq!(std::mem::size_of::<CameraUniform>(), 64);
    assert_eq!(std::mem::size_of::<ShadowUniform>(), 64);
    assert_eq!(std::mem::size_of::<ModelUniform>(), 64);
}

#[test]
fn lighting_params_layout() {
    // mat4 + 3 x mat4 + 3 x vec4 + 3 x vec4 + 4 x f32
    assert_eq!(std::mem::size_of::<LightingParams>(), 64 + 192 + 48 + 48 + 16);
    assert_eq!(std::mem::size_of::<LightingParams>() % 16, 0);
}

#[test]
fn small_blocks_are_uniform_aligned() {
    assert_eq!(std::mem::size_of::<CompositeParams>(), 16);
    assert_eq!(std::mem::size_of::<LuminanceParams>(), 16);
    assert_eq!(std::mem::size_of::<BloomParams>(), 16);
    assert_eq!(std::mem::size_of::<LerpParams>(), 32);
    assert_eq!(std::mem::size_of::<MaterialParams>(), 32);
}

#[test]
fn exposure_result_is_two_floats() {
    assert_eq!(std::mem::size_of::<ExposureResult>(), 8);

    let initial = ExposureResult::default();
    assert_eq!(initial.luminance, 0.0);
    assert_eq!(initial.prev_luminance, 0.0);
}

#[test]
fn histogram_has_256_bins() {
    assert_eq!(HISTOGRAM_BINS, 256);
    assert_eq!(HISTOGRAM_BINS * std::mem::size_of::<i32>(), 1024);
}

#[test]
fn blocks_are_pod() {
    // bytemuck round trip: casting to bytes and back preserves values.
    let params = CompositeParams {
        exposure: 2.0,
        bloom_intensity: 0.5,
        _pad: [0.0; 2],
    };
    let bytes = bytemuck::bytes_of(&params);
    let back: &CompositeParams = bytemuck::from_bytes(bytes);
    assert_eq!(back.exposure, 2.0);
    assert_eq!(back.bloom_intensity, 0.5);
}
