//! Camera and frustum derivation.
//!
//! [`CameraParameter`] is the per-frame, stack-only camera object consumed
//! by the drawcall generator and the uniform writers. [`Frustum`] keeps its
//! six planes individually addressable because the generator tests the four
//! side planes first, accumulates near/far from the surviving corners, and
//! only then consults the near and far planes.

use glam::{Mat4, Vec2, Vec3, Vec4};

use crate::scene::model::Aabb;

/// An oriented plane `normal · p + d = 0`, normal pointing into the volume
/// it bounds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    pub normal: Vec3,
    pub d: f32,
}

impl Plane {
    /// Plane through `point` with the given (not necessarily unit) normal.
    #[must_use]
    pub fn from_point_normal(point: Vec3, normal: Vec3) -> Self {
        let normal = normal.normalize_or_zero();
        Self {
            normal,
            d: -normal.dot(point),
        }
    }

    #[must_use]
    pub fn signed_distance(&self, point: Vec3) -> f32 {
        self.normal.dot(point) + self.d
    }

    /// True when `aabb` intersects the plane or lies entirely on the
    /// positive (inside) half-space.
    ///
    /// Uses the p-vertex: the box corner farthest along the plane normal.
    /// If even that corner is behind the plane, the whole box is.
    #[must_use]
    pub fn intersect_or_forward(&self, aabb: &Aabb) -> bool {
        let p = Vec3::new(
            if self.normal.x >= 0.0 { aabb.max.x } else { aabb.min.x },
            if self.normal.y >= 0.0 { aabb.max.y } else { aabb.min.y },
            if self.normal.z >= 0.0 { aabb.max.z } else { aabb.min.z },
        );
        self.signed_distance(p) >= 0.0
    }
}

/// Six oriented planes bounding a view volume, normals pointing inward.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frustum {
    pub left: Plane,
    pub right: Plane,
    pub top: Plane,
    pub bottom: Plane,
    pub near: Plane,
    pub far: Plane,
}

impl Frustum {
    /// Builds a perspective frustum from eye position, view direction, an
    /// up hint, aspect ratio, vertical field of view and near/far planes.
    #[must_use]
    pub fn from_perspective(
        eye: Vec3,
        direction: Vec3,
        up: Vec3,
        aspect: f32,
        fov_y: f32,
        near: f32,
        far: f32,
    ) -> Self {
        let dir = direction.normalize();
        let right = dir.cross(up).normalize();
        let up = right.cross(dir);

        let tan_v = (fov_y * 0.5).tan();
        let tan_h = tan_v * aspect;

        // Side planes pass through the eye; each contains one frustum edge
        // direction and the matching lateral axis.
        let d_top = dir + up * tan_v;
        let d_bottom = dir - up * tan_v;
        let d_right = dir + right * tan_h;
        let d_left = dir - right * tan_h;

        Self {
            left: Plane::from_point_normal(eye, d_left.cross(up)),
            right: Plane::from_point_normal(eye, up.cross(d_right)),
            top: Plane::from_point_normal(eye, d_top.cross(right)),
            bottom: Plane::from_point_normal(eye, right.cross(d_bottom)),
            near: Plane::from_point_normal(eye + dir * near, dir),
            far: Plane::from_point_normal(eye + dir * far, -dir),
        }
    }

    /// Builds an orthographic frustum. The lateral extents are measured
    /// along the camera right/up axes from the eye position, matching an
    /// `orthographic(x_min..x_max, y_min..y_max, near..far)` projection.
    #[must_use]
    pub fn from_ortho(
        eye: Vec3,
        direction: Vec3,
        up: Vec3,
        x_min: f32,
        x_max: f32,
        y_min: f32,
        y_max: f32,
        near: f32,
        far: f32,
    ) -> Self {
        let dir = direction.normalize();
        let right = dir.cross(up).normalize();
        let up = right.cross(dir);

        Self {
            left: Plane::from_point_normal(eye + right * x_min, right),
            right: Plane::from_point_normal(eye + right * x_max, -right),
            bottom: Plane::from_point_normal(eye + up * y_min, up),
            top: Plane::from_point_normal(eye + up * y_max, -up),
            near: Plane::from_point_normal(eye + dir * near, dir),
            far: Plane::from_point_normal(eye + dir * far, -dir),
        }
    }

    /// The four lateral planes in culling order.
    #[must_use]
    pub fn side_planes(&self) -> [&Plane; 4] {
        [&self.left, &self.right, &self.top, &self.bottom]
    }

    /// Full six-plane AABB test.
    #[must_use]
    pub fn intersects_aabb(&self, aabb: &Aabb) -> bool {
        self.left.intersect_or_forward(aabb)
            && self.right.intersect_or_forward(aabb)
            && self.top.intersect_or_forward(aabb)
            && self.bottom.intersect_or_forward(aabb)
            && self.near.intersect_or_forward(aabb)
            && self.far.intersect_or_forward(aabb)
    }
}

/// Per-frame derived camera state.
#[derive(Debug, Clone, Copy)]
pub struct CameraParameter {
    pub view_matrix: Mat4,
    pub projection_matrix: Mat4,
    pub view_projection_matrix: Mat4,
    pub view_projection_matrix_inv: Mat4,
    pub eye_position: Vec3,
    pub eye_direction: Vec3,
    pub frustum: Frustum,
}

impl CameraParameter {
    /// Derives the full parameter set for a perspective camera.
    #[must_use]
    pub fn perspective(
        eye: Vec3,
        direction: Vec3,
        up: Vec3,
        aspect: f32,
        fov_y: f32,
        near: f32,
        far: f32,
    ) -> Self {
        let direction = direction.normalize();
        let view_matrix = Mat4::look_at_rh(eye, eye + direction, up);
        let projection_matrix = Mat4::perspective_rh(fov_y, aspect, near, far);
        let view_projection_matrix = projection_matrix * view_matrix;

        Self {
            view_matrix,
            projection_matrix,
            view_projection_matrix,
            view_projection_matrix_inv: view_projection_matrix.inverse(),
            eye_position: eye,
            eye_direction: direction,
            frustum: Frustum::from_perspective(eye, direction, up, aspect, fov_y, near, far),
        }
    }
}

/// Per-cascade shadow camera: a [`CameraParameter`] plus the orthographic
/// extent in world units, needed by the lighting shader for cascade
/// blending.
#[derive(Debug, Clone, Copy)]
pub struct ShadowParameter {
    pub camera: CameraParameter,
    /// Width/height of the orthographic shadow view in world units.
    pub view_size: Vec2,
}

// ============================================================================
// Orbit controller
// ============================================================================

/// Yaw/pitch/distance orbit around a target point.
///
/// The host owns input handling; this only turns the orbit state into an
/// eye position and direction. The target center eases toward
/// `target_center` a little each update, which is what makes the
/// "frame scene" action glide instead of snap.
#[derive(Debug, Clone)]
pub struct OrbitController {
    /// Horizontal angle in degrees, 0 looking down -X.
    pub yaw: f32,
    /// Vertical angle in degrees, positive above the horizon.
    pub pitch: f32,
    /// Distance from the orbit center.
    pub distance: f32,
    /// Current orbit center.
    pub center: Vec3,
    /// Eased-toward orbit center.
    pub target_center: Vec3,
}

impl Default for OrbitController {
    fn default() -> Self {
        Self {
            yaw: 0.0,
            pitch: 20.0,
            distance: 5.0,
            center: Vec3::ZERO,
            target_center: Vec3::ZERO,
        }
    }
}

impl OrbitController {
    /// Eases the orbit center toward its target. Call once per frame.
    pub fn update(&mut self, delta_time: f32) {
        let t = 1.0 - (-10.0 * delta_time.max(0.0)).exp();
        self.center += (self.target_center - self.center) * t;
    }

    /// Re-centers the orbit on a scene's bounds.
    pub fn frame_scene(&mut self, min_bound: Vec3, max_bound: Vec3) {
        self.target_center = (min_bound + max_bound) * 0.5;
    }

    #[must_use]
    pub fn eye_position(&self) -> Vec3 {
        let yaw = self.yaw.to_radians();
        let pitch = self.pitch.clamp(-89.0, 89.0).to_radians();
        let offset = Vec3::new(
            pitch.cos() * yaw.cos(),
            pitch.sin(),
            pitch.cos() * yaw.sin(),
        );
        self.center + offset * self.distance.max(1.0e-3)
    }

    /// Unit vector from the eye toward the orbit center.
    #[must_use]
    pub fn eye_direction(&self) -> Vec3 {
        (self.center - self.eye_position()).normalize_or(-Vec3::Z)
    }
}

// ============================================================================
// Sunlight direction
// ============================================================================

/// Sun direction from yaw/pitch angles in degrees: the +X axis rotated by
/// `yaw` about +Y, then by `pitch` about +Z.
#[must_use]
pub fn sunlight_direction(yaw: f32, pitch: f32) -> Vec3 {
    let mat = Mat4::from_rotation_y(yaw.to_radians()) * Mat4::from_rotation_z(pitch.to_radians());
    (mat * Vec4::X).truncate().normalize()
}
