//! Cascaded shadow-map parameter derivation.
//!
//! For each cascade the camera frustum slice is taken in NDC, transformed
//! into a light-aligned view space, flattened to its XY convex hull, and
//! wrapped in the minimum-area oriented rectangle. The rectangle's
//! rotation, extent and corner define the cascade's shadow view and
//! orthographic projection, so the shadow map covers exactly the visible
//! slice instead of its axis-aligned bound.

use glam::{Mat4, Vec2, Vec3, Vec4};
use smallvec::SmallVec;

use crate::scene::camera::{CameraParameter, Frustum, ShadowParameter};

/// Number of shadow cascades, nearest to farthest.
pub const CASCADE_COUNT: usize = 3;

/// View-space depth of a cascade split at `fraction` ∈ [0, 1].
///
/// Mixes the logarithmic split `near * (far/near)^fraction` with the
/// linear split `lerp(near, far, fraction)` by `blend` (0 = logarithmic,
/// 1 = linear).
#[must_use]
pub fn split_view_depth(near: f32, far: f32, fraction: f32, blend: f32) -> f32 {
    let log_split = near * (far / near).powf(fraction);
    let linear_split = near + (far - near) * fraction;
    log_split + (linear_split - log_split) * blend
}

/// NDC depth of the view-space plane `z = -view_depth` under `projection`.
#[must_use]
pub fn projected_depth(projection: &Mat4, view_depth: f32) -> f32 {
    let clip = *projection * Vec4::new(0.0, 0.0, -view_depth, 1.0);
    clip.z / clip.w
}

/// 2-D convex hull (Andrew monotone chain), counter-clockwise, without the
/// closing point.
#[must_use]
pub fn convex_hull(points: &[Vec2]) -> SmallVec<[Vec2; 16]> {
    let mut sorted: SmallVec<[Vec2; 16]> = points.iter().copied().collect();
    sorted.sort_by(|a, b| (a.x, a.y).partial_cmp(&(b.x, b.y)).unwrap_or(std::cmp::Ordering::Equal));
    sorted.dedup();

    if sorted.len() < 3 {
        return sorted;
    }

    let cross = |o: Vec2, a: Vec2, b: Vec2| (a - o).perp_dot(b - o);

    let mut hull: SmallVec<[Vec2; 16]> = SmallVec::new();
    // Lower hull
    for &p in &sorted {
        while hull.len() >= 2 && cross(hull[hull.len() - 2], hull[hull.len() - 1], p) <= 0.0 {
            hull.pop();
        }
        hull.push(p);
    }
    // Upper hull
    let lower_len = hull.len() + 1;
    for &p in sorted.iter().rev().skip(1) {
        while hull.len() >= lower_len && cross(hull[hull.len() - 2], hull[hull.len() - 1], p) <= 0.0
        {
            hull.pop();
        }
        hull.push(p);
    }
    hull.pop();
    hull
}

/// A minimum-area oriented bounding rectangle.
///
/// `origin` is the rectangle corner such that rotating the plane by
/// `-rotation` about it maps the rectangle onto `[0, width] × [0, height]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrientedRect {
    pub rotation: f32,
    pub width: f32,
    pub height: f32,
    pub origin: Vec2,
}

/// Finds the minimum-area oriented rectangle of a convex hull by testing
/// each hull edge as a candidate axis.
#[must_use]
pub fn min_area_rect(hull: &[Vec2]) -> OrientedRect {
    let mut best = OrientedRect {
        rotation: 0.0,
        width: 0.0,
        height: 0.0,
        origin: hull.first().copied().unwrap_or(Vec2::ZERO),
    };
    let mut smallest_area = f32::MAX;

    for i in 0..hull.len() {
        let p1 = hull[i];
        let p2 = hull[(i + 1) % hull.len()];
        let edge = p2 - p1;
        if edge.length_squared() < 1.0e-12 {
            continue;
        }
        let axis = edge.normalize();

        let mut min_dot = f32::MAX;
        let mut max_dot = f32::MIN;
        let mut max_height_sqr = f32::MIN;

        for &p in hull {
            let rel = p - p1;
            let dot = rel.dot(axis);
            min_dot = min_dot.min(dot);
            max_dot = max_dot.max(dot);
            max_height_sqr = max_height_sqr.max(rel.length_squared() - dot * dot);
        }

        let width = (max_dot - min_dot).abs();
        let height = max_height_sqr.max(0.0).sqrt();
        let area = width * height;

        if area < smallest_area {
            smallest_area = area;
            best = OrientedRect {
                rotation: axis.y.atan2(axis.x),
                width,
                height,
                origin: p1 + axis * min_dot,
            };
        }
    }

    best
}

/// Derives one cascade's shadow parameters.
///
/// `ndc_z_min..ndc_z_max` is the camera-NDC depth slice covered by the
/// cascade; `shadow_near`/`shadow_far` is the light-axis depth range
/// (previous frame's generator output, widened against z-fighting).
#[must_use]
pub fn shadow_parameter(
    light_direction: Vec3,
    camera: &CameraParameter,
    ndc_z_min: f32,
    ndc_z_max: f32,
    shadow_near: f32,
    shadow_far: f32,
) -> ShadowParameter {
    let light_direction = light_direction.normalize_or(Vec3::Y);
    let up = if light_direction.dot(Vec3::Y).abs() > 0.999 {
        Vec3::Z
    } else {
        Vec3::Y
    };

    // World -> centered light view, looking along the light toward the
    // scene.
    let shadow_view = Mat4::look_at_rh(Vec3::ZERO, -light_direction, up);

    // Camera NDC -> centered light view.
    let camera_to_shadow = shadow_view * camera.view_projection_matrix_inv;

    let mut hull_points: SmallVec<[Vec2; 8]> = SmallVec::new();
    for corner in ndc_box_corners(ndc_z_min, ndc_z_max) {
        let v = camera_to_shadow.project_point3(corner);
        hull_points.push(Vec2::new(v.x, v.y));
    }

    let hull = convex_hull(&hull_points);
    let rect = min_area_rect(&hull);

    // Re-base the light view so the rectangle lands on
    // [0, width] × [0, height].
    let corrected_view = Mat4::from_rotation_z(-rect.rotation)
        * Mat4::from_translation(Vec3::new(-rect.origin.x, -rect.origin.y, 0.0))
        * shadow_view;
    let corrected_view_inv = corrected_view.inverse();

    let width = rect.width.max(1.0e-4);
    let height = rect.height.max(1.0e-4);
    let projection =
        Mat4::orthographic_rh(0.0, width, 0.0, height, shadow_near, shadow_far);
    let view_projection = projection * corrected_view;

    let eye_position = corrected_view_inv.transform_point3(Vec3::ZERO);
    let eye_direction = corrected_view_inv.transform_vector3(-Vec3::Z).normalize();
    let world_up = corrected_view_inv.transform_vector3(Vec3::Y).normalize();

    ShadowParameter {
        camera: CameraParameter {
            view_matrix: corrected_view,
            projection_matrix: projection,
            view_projection_matrix: view_projection,
            view_projection_matrix_inv: view_projection.inverse(),
            eye_position,
            eye_direction,
            frustum: Frustum::from_ortho(
                eye_position,
                eye_direction,
                world_up,
                0.0,
                width,
                0.0,
                height,
                shadow_near,
                shadow_far,
            ),
        },
        view_size: Vec2::new(width, height),
    }
}

/// Corners of the NDC box `[-1, 1]² × [z_min, z_max]`.
fn ndc_box_corners(z_min: f32, z_max: f32) -> [Vec3; 8] {
    [
        Vec3::new(-1.0, -1.0, z_min),
        Vec3::new(1.0, -1.0, z_min),
        Vec3::new(-1.0, 1.0, z_min),
        Vec3::new(1.0, 1.0, z_min),
        Vec3::new(-1.0, -1.0, z_max),
        Vec3::new(1.0, -1.0, z_max),
        Vec3::new(-1.0, 1.0, z_max),
        Vec3::new(1.0, 1.0, z_max),
    ]
}
