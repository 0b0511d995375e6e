//! Shadow Cascade Math Tests
//!
//! Tests for:
//! - Split depth mixing between logarithmic and linear schemes
//! - NDC projection of view-space split depths
//! - Convex hull construction
//! - Minimum-area oriented rectangle fitting
//! - Cascade shadow-parameter assembly

use glam::{Mat4, Vec2, Vec3, Vec4};

use ember::renderer::cascade::{
    convex_hull, min_area_rect, projected_depth, shadow_parameter, split_view_depth,
};
use ember::scene::camera::CameraParameter;

const EPSILON: f32 = 1e-3;

fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < EPSILON
}

// ============================================================================
// Split scheme
// ============================================================================

#[test]
fn split_blend_zero_is_logarithmic() {
    // near * (far/near)^0.5 = sqrt(near * far)
    let split = split_view_depth(1.0, 100.0, 0.5, 0.0);
    assert!(approx(split, 10.0), "Log split at 1/2: expected 10, got {split}");
}

#[test]
fn split_blend_one_is_linear() {
    let split = split_view_depth(1.0, 100.0, 0.5, 1.0);
    assert!(approx(split, 50.5), "Linear split at 1/2: expected 50.5, got {split}");
}

#[test]
fn split_endpoints_hit_near_and_far() {
    for blend in [0.0, 0.3, 1.0] {
        assert!(approx(split_view_depth(0.5, 80.0, 0.0, blend), 0.5));
        assert!(approx(split_view_depth(0.5, 80.0, 1.0, blend), 80.0));
    }
}

#[test]
fn splits_monotonically_increase() {
    for blend in [0.0, 0.5, 1.0] {
        let s1 = split_view_depth(0.1, 100.0, 1.0 / 3.0, blend);
        let s2 = split_view_depth(0.1, 100.0, 2.0 / 3.0, blend);
        assert!(
            0.1 < s1 && s1 < s2 && s2 < 100.0,
            "Splits out of order at blend {blend}: {s1}, {s2}"
        );
    }
}

// ============================================================================
// NDC projection
// ============================================================================

#[test]
fn projected_depth_maps_near_to_zero_far_to_one() {
    let projection = Mat4::perspective_rh(60.0_f32.to_radians(), 1.0, 1.0, 100.0);
    assert!(approx(projected_depth(&projection, 1.0), 0.0));
    assert!(approx(projected_depth(&projection, 100.0), 1.0));

    let mid = projected_depth(&projection, 10.0);
    assert!(mid > 0.0 && mid < 1.0, "Mid depth must fall inside 0..1, got {mid}");
}

// ============================================================================
// Convex hull
// ============================================================================

#[test]
fn hull_drops_interior_points() {
    let points = [
        Vec2::new(0.0, 0.0),
        Vec2::new(1.0, 0.0),
        Vec2::new(1.0, 1.0),
        Vec2::new(0.0, 1.0),
        Vec2::new(0.5, 0.5),
        Vec2::new(0.25, 0.75),
    ];
    let hull = convex_hull(&points);
    assert_eq!(hull.len(), 4, "Square hull has 4 vertices, got {}", hull.len());
}

#[test]
fn hull_is_counter_clockwise() {
    let points = [
        Vec2::new(0.0, 0.0),
        Vec2::new(2.0, 0.0),
        Vec2::new(2.0, 1.0),
        Vec2::new(0.0, 1.0),
    ];
    let hull = convex_hull(&points);

    // Shoelace area is positive for CCW winding.
    let mut area2 = 0.0;
    for i in 0..hull.len() {
        let a = hull[i];
        let b = hull[(i + 1) % hull.len()];
        area2 += a.x * b.y - b.x * a.y;
    }
    assert!(area2 > 0.0, "Hull winding should be CCW (area2 = {area2})");
    assert!(approx(area2, 4.0), "Rect area 2, shoelace doubles it");
}

#[test]
fn hull_handles_duplicates() {
    let points = [
        Vec2::new(0.0, 0.0),
        Vec2::new(0.0, 0.0),
        Vec2::new(1.0, 0.0),
        Vec2::new(0.0, 1.0),
        Vec2::new(1.0, 0.0),
    ];
    let hull = convex_hull(&points);
    assert_eq!(hull.len(), 3);
}

// ============================================================================
// Minimum-area rectangle
// ============================================================================

#[test]
fn min_rect_of_axis_aligned_square() {
    let hull = convex_hull(&[
        Vec2::new(0.0, 0.0),
        Vec2::new(1.0, 0.0),
        Vec2::new(1.0, 1.0),
        Vec2::new(0.0, 1.0),
    ]);
    let rect = min_area_rect(&hull);
    assert!(approx(rect.width * rect.height, 1.0), "Unit square area");
}

#[test]
fn min_rect_follows_rotated_rectangle() {
    // A 2x1 rectangle rotated by 30 degrees: the minimum-area fit
    // recovers area 2 regardless of orientation; the axis-aligned bound
    // would be larger.
    let angle = 30.0_f32.to_radians();
    let rot = Vec2::new(angle.cos(), angle.sin());
    let corners = [
        Vec2::new(0.0, 0.0),
        Vec2::new(2.0 * rot.x, 2.0 * rot.y),
        Vec2::new(2.0 * rot.x - rot.y, 2.0 * rot.y + rot.x),
        Vec2::new(-rot.y, rot.x),
    ];
    let hull = convex_hull(&corners);
    let rect = min_area_rect(&hull);

    assert!(
        (rect.width * rect.height - 2.0).abs() < 1e-2,
        "Expected area 2, got {}",
        rect.width * rect.height
    );
}

#[test]
fn min_rect_contains_every_hull_point() {
    let hull = convex_hull(&[
        Vec2::new(-1.0, 0.5),
        Vec2::new(2.0, -0.3),
        Vec2::new(3.0, 2.0),
        Vec2::new(0.5, 3.0),
        Vec2::new(-0.5, 1.5),
    ]);
    let rect = min_area_rect(&hull);

    let (sin, cos) = rect.rotation.sin_cos();
    for &p in &hull {
        let rel = p - rect.origin;
        // Rotate into the rectangle frame.
        let local = Vec2::new(rel.x * cos + rel.y * sin, -rel.x * sin + rel.y * cos);
        assert!(
            local.x >= -EPSILON && local.x <= rect.width + EPSILON,
            "Point {p:?} outside rect width: {local:?}"
        );
        assert!(
            local.y >= -EPSILON && local.y <= rect.height + EPSILON,
            "Point {p:?} outside rect height: {local:?}"
        );
    }
}

// ============================================================================
// Shadow parameter assembly
// ============================================================================

fn test_camera() -> CameraParameter {
    CameraParameter::perspective(
        Vec3::new(0.0, 2.0, 5.0),
        Vec3::NEG_Z,
        Vec3::Y,
        16.0 / 9.0,
        60.0_f32.to_radians(),
        0.5,
        50.0,
    )
}

#[test]
fn shadow_parameter_covers_the_frustum_slice() {
    let camera = test_camera();
    let light = Vec3::new(0.3, 1.0, 0.2).normalize();
    let param = shadow_parameter(light, &camera, 0.0, 1.0, -1000.0, 1000.0);

    // Every corner of the camera's NDC box must land inside the shadow
    // clip volume laterally.
    for &x in &[-1.0f32, 1.0] {
        for &y in &[-1.0f32, 1.0] {
            for &z in &[0.0f32, 1.0] {
                let world =
                    camera.view_projection_matrix_inv.project_point3(Vec3::new(x, y, z));
                let clip = param.camera.view_projection_matrix * Vec4::new(world.x, world.y, world.z, 1.0);
                let ndc = clip / clip.w;
                assert!(
                    ndc.x >= -1.0 - EPSILON && ndc.x <= 1.0 + EPSILON,
                    "x out of shadow clip: {ndc:?}"
                );
                assert!(
                    ndc.y >= -1.0 - EPSILON && ndc.y <= 1.0 + EPSILON,
                    "y out of shadow clip: {ndc:?}"
                );
                assert!(
                    ndc.z >= -EPSILON && ndc.z <= 1.0 + EPSILON,
                    "z out of shadow clip: {ndc:?}"
                );
            }
        }
    }

    assert!(param.view_size.x > 0.0 && param.view_size.y > 0.0);
}

#[test]
fn shadow_parameter_is_invertible() {
    let camera = test_camera();
    let param = shadow_parameter(Vec3::Y, &camera, 0.0, 0.4, -100.0, 100.0);

    let det = param.camera.view_projection_matrix.determinant();
    assert!(det.abs() > 1e-12, "Shadow VP must be invertible, det = {det}");
    assert!(param.camera.eye_direction.is_normalized());
}

#[test]
fn vertical_light_uses_fallback_up_axis() {
    // A light straight overhead hits the degenerate look-at case; the
    // parameter must still be finite.
    let camera = test_camera();
    let param = shadow_parameter(Vec3::Y, &camera, 0.0, 1.0, -100.0, 100.0);

    for col in 0..4 {
        let v = param.camera.view_projection_matrix.col(col);
        assert!(v.is_finite(), "Shadow VP contains non-finite values: {v:?}");
    }
}
