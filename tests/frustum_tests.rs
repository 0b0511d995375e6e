//! Frustum Geometry Tests
//!
//! Tests for:
//! - Perspective and orthographic frustum construction
//! - Plane/AABB intersect-or-forward semantics
//! - Full six-plane AABB acceptance
//! - Sunlight direction derivation

use glam::Vec3;

use ember::scene::camera::{Frustum, Plane, sunlight_direction};
use ember::scene::model::Aabb;

const EPSILON: f32 = 1e-4;

fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < EPSILON
}

fn unit_box_at(center: Vec3) -> Aabb {
    Aabb::new(center - Vec3::splat(0.5), center + Vec3::splat(0.5))
}

fn looking_down_z() -> Frustum {
    Frustum::from_perspective(
        Vec3::ZERO,
        Vec3::NEG_Z,
        Vec3::Y,
        1.0,
        90.0_f32.to_radians(),
        0.1,
        100.0,
    )
}

// ============================================================================
// Plane Tests
// ============================================================================

#[test]
fn plane_signed_distance() {
    let plane = Plane::from_point_normal(Vec3::new(0.0, 2.0, 0.0), Vec3::Y);
    assert!(approx(plane.signed_distance(Vec3::new(0.0, 5.0, 0.0)), 3.0));
    assert!(approx(plane.signed_distance(Vec3::new(7.0, 2.0, -3.0)), 0.0));
    assert!(approx(plane.signed_distance(Vec3::new(0.0, 0.0, 0.0)), -2.0));
}

#[test]
fn plane_accepts_box_on_positive_side() {
    let plane = Plane::from_point_normal(Vec3::ZERO, Vec3::Y);
    assert!(plane.intersect_or_forward(&unit_box_at(Vec3::new(0.0, 3.0, 0.0))));
}

#[test]
fn plane_accepts_straddling_box() {
    let plane = Plane::from_point_normal(Vec3::ZERO, Vec3::Y);
    assert!(plane.intersect_or_forward(&unit_box_at(Vec3::ZERO)));
}

#[test]
fn plane_rejects_box_behind() {
    let plane = Plane::from_point_normal(Vec3::ZERO, Vec3::Y);
    assert!(!plane.intersect_or_forward(&unit_box_at(Vec3::new(0.0, -3.0, 0.0))));
}

// ============================================================================
// Perspective Frustum Tests
// ============================================================================

#[test]
fn frustum_accepts_box_in_front() {
    let frustum = looking_down_z();
    assert!(frustum.intersects_aabb(&unit_box_at(Vec3::new(0.0, 0.0, -10.0))));
}

#[test]
fn frustum_rejects_box_behind_camera() {
    let frustum = looking_down_z();
    assert!(!frustum.intersects_aabb(&unit_box_at(Vec3::new(0.0, 0.0, 10.0))));
}

#[test]
fn frustum_rejects_box_beyond_far() {
    let frustum = looking_down_z();
    assert!(!frustum.intersects_aabb(&unit_box_at(Vec3::new(0.0, 0.0, -200.0))));
}

#[test]
fn frustum_rejects_box_far_to_the_side() {
    let frustum = looking_down_z();
    assert!(!frustum.intersects_aabb(&unit_box_at(Vec3::new(1000.0, 0.0, -10.0))));
    assert!(!frustum.intersects_aabb(&unit_box_at(Vec3::new(0.0, 1000.0, -10.0))));
}

#[test]
fn frustum_accepts_box_near_edge_of_fov() {
    // At fov 90 and distance 10, the half-width of the view volume is 10;
    // a box centered at x = 9.8 still touches it.
    let frustum = looking_down_z();
    assert!(frustum.intersects_aabb(&unit_box_at(Vec3::new(9.8, 0.0, -10.0))));
    assert!(!frustum.intersects_aabb(&unit_box_at(Vec3::new(12.0, 0.0, -10.0))));
}

#[test]
fn frustum_side_planes_independent_of_depth_planes() {
    // Laterally inside but beyond far: the four side planes accept, the
    // far plane rejects. This split is what the drawcall generator's
    // near/far accumulation relies on.
    let frustum = looking_down_z();
    let aabb = unit_box_at(Vec3::new(0.0, 0.0, -200.0));
    assert!(
        frustum
            .side_planes()
            .iter()
            .all(|plane| plane.intersect_or_forward(&aabb)),
        "Side planes should accept a box that is only too deep"
    );
    assert!(!frustum.far.intersect_or_forward(&aabb));
}

// ============================================================================
// Orthographic Frustum Tests
// ============================================================================

#[test]
fn ortho_frustum_extents() {
    // x in [0, 2] along camera right (+X), y in [0, 1] along up (+Y).
    let frustum = Frustum::from_ortho(
        Vec3::ZERO,
        Vec3::NEG_Z,
        Vec3::Y,
        0.0,
        2.0,
        0.0,
        1.0,
        0.1,
        10.0,
    );

    assert!(frustum.intersects_aabb(&Aabb::new(
        Vec3::new(0.5, 0.2, -5.0),
        Vec3::new(1.0, 0.5, -4.0),
    )));
    assert!(!frustum.intersects_aabb(&Aabb::new(
        Vec3::new(3.0, 0.2, -5.0),
        Vec3::new(4.0, 0.5, -4.0),
    )));
    assert!(!frustum.intersects_aabb(&Aabb::new(
        Vec3::new(0.5, -2.0, -5.0),
        Vec3::new(1.0, -1.5, -4.0),
    )));
}

// ============================================================================
// Sunlight Direction Tests
// ============================================================================

#[test]
fn sunlight_direction_defaults_to_x() {
    let dir = sunlight_direction(0.0, 0.0);
    assert!(dir.abs_diff_eq(Vec3::X, EPSILON), "Expected +X, got {dir:?}");
}

#[test]
fn sunlight_pitch_raises_toward_zenith() {
    let dir = sunlight_direction(0.0, 90.0);
    assert!(dir.abs_diff_eq(Vec3::Y, EPSILON), "Expected +Y, got {dir:?}");
}

#[test]
fn sunlight_yaw_rotates_about_up() {
    let dir = sunlight_direction(90.0, 0.0);
    assert!(
        dir.abs_diff_eq(Vec3::NEG_Z, EPSILON),
        "Expected -Z, got {dir:?}"
    );
}

#[test]
fn sunlight_direction_is_unit_length() {
    let dir = sunlight_direction(123.0, 37.0);
    assert!(approx(dir.length(), 1.0));
}
