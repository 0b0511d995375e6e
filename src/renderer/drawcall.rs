//! Drawcall generation and sorted draw lists.
//!
//! For one frustum the generator walks every mesh-bearing node, culls each
//! primitive's world-space AABB against the four side planes, accumulates a
//! running near/far from the surviving corner points projected onto the eye
//! direction, then finishes the cull with the near and far planes. Accepted
//! primitives are binned by `(double-sided, skinned)` into four
//! [`Drawlist`]s and within each list by alpha mode, then sorted by
//! `(material, position buffer, position offset)` to minimize state changes
//! during recording.
//!
//! Skinned primitives use a deliberate over-approximation: the union over
//! all joints of `(joint_world * inverse_bind) * local_aabb`. This avoids
//! skinning on the CPU at the cost of a looser bound.

use glam::{Mat4, Vec3};
use log::warn;

use crate::scene::animation::NodeTraverser;
use crate::scene::camera::Frustum;
use crate::scene::model::{Aabb, AlphaMode, Primitive, SceneModel};

/// A single draw submission: one primitive of one node, with its resolved
/// world transform and the eye-axis depth range of its bounds.
#[derive(Debug, Clone, Copy)]
pub struct Drawcall {
    pub node_index: u32,
    pub primitive: Primitive,
    pub transform: Mat4,
    pub near: f32,
    pub far: f32,
}

impl Drawcall {
    /// Ordering key: material first, then vertex buffer, then offset.
    #[must_use]
    pub fn sort_key(&self) -> (u32, u32, u32) {
        (
            self.primitive.material.unwrap_or(u32::MAX),
            self.primitive.position_buffer,
            self.primitive.position_offset,
        )
    }
}

/// Three alpha-mode buckets of sorted drawcalls.
#[derive(Debug, Clone, Default)]
pub struct Drawlist {
    pub opaque: Vec<Drawcall>,
    pub mask: Vec<Drawcall>,
    pub blend: Vec<Drawcall>,
}

impl Drawlist {
    pub fn clear(&mut self) {
        self.opaque.clear();
        self.mask.clear();
        self.blend.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.opaque.len() + self.mask.len() + self.blend.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn push(&mut self, drawcall: Drawcall, mode: AlphaMode) {
        match mode {
            AlphaMode::Opaque => self.opaque.push(drawcall),
            AlphaMode::Mask => self.mask.push(drawcall),
            AlphaMode::Blend => self.blend.push(drawcall),
        }
    }

    /// Stable-sorts each bucket by [`Drawcall::sort_key`].
    pub fn sort(&mut self) {
        self.opaque.sort_by_key(Drawcall::sort_key);
        self.mask.sort_by_key(Drawcall::sort_key);
        self.blend.sort_by_key(Drawcall::sort_key);
    }

    /// Records the list into `pass`, visiting buckets opaque → mask →
    /// blend.
    ///
    /// Within a bucket, `bind_node` fires when the node changes,
    /// `bind_material` when the material changes, and `bind_vertices` when
    /// the `(position buffer, position offset)` pair changes, so redundant
    /// state updates are elided on the sorted list.
    pub fn draw<B: DrawcallBinder>(
        &self,
        pass: &mut wgpu::RenderPass<'_>,
        pipelines: &BucketPipelines<'_>,
        binder: &mut B,
    ) {
        let record = |pass: &mut wgpu::RenderPass<'_>,
                      bucket: &[Drawcall],
                      mode: AlphaMode,
                      pipeline: &wgpu::RenderPipeline,
                      binder: &mut B| {
            if bucket.is_empty() {
                return;
            }

            pass.set_pipeline(pipeline);

            let mut prev_node = u32::MAX;
            let mut prev_material: Option<Option<u32>> = None;
            let mut prev_vertex = (u32::MAX, u32::MAX);

            for drawcall in bucket {
                if prev_node != drawcall.node_index {
                    binder.bind_node(pass, drawcall);
                    prev_node = drawcall.node_index;
                }

                if prev_material != Some(drawcall.primitive.material) {
                    binder.bind_material(pass, drawcall);
                    prev_material = Some(drawcall.primitive.material);
                }

                let vertex = (
                    drawcall.primitive.position_buffer,
                    drawcall.primitive.position_offset,
                );
                if prev_vertex != vertex {
                    binder.bind_vertices(pass, drawcall, mode);
                    prev_vertex = vertex;
                }

                pass.draw(0..drawcall.primitive.vertex_count, 0..1);
            }
        };

        record(pass, &self.opaque, AlphaMode::Opaque, pipelines.opaque, binder);
        record(pass, &self.mask, AlphaMode::Mask, pipelines.mask, binder);
        record(pass, &self.blend, AlphaMode::Blend, pipelines.blend, binder);
    }
}

/// The three alpha-mode pipeline variants a drawlist is recorded with.
pub struct BucketPipelines<'a> {
    pub opaque: &'a wgpu::RenderPipeline,
    pub mask: &'a wgpu::RenderPipeline,
    pub blend: &'a wgpu::RenderPipeline,
}

/// Per-drawcall state binding, implemented by each geometry pass.
pub trait DrawcallBinder {
    fn bind_node(&mut self, pass: &mut wgpu::RenderPass<'_>, drawcall: &Drawcall);
    fn bind_material(&mut self, pass: &mut wgpu::RenderPass<'_>, drawcall: &Drawcall);
    fn bind_vertices(&mut self, pass: &mut wgpu::RenderPass<'_>, drawcall: &Drawcall, mode: AlphaMode);
}

/// The four drawlists maintained per frustum:
/// {single, double-sided} × {static, skinned}.
#[derive(Debug, Clone, Default)]
pub struct FrustumDrawLists {
    pub single_sided: Drawlist,
    pub double_sided: Drawlist,
    pub single_sided_skinned: Drawlist,
    pub double_sided_skinned: Drawlist,
}

impl FrustumDrawLists {
    pub fn clear(&mut self) {
        self.single_sided.clear();
        self.double_sided.clear();
        self.single_sided_skinned.clear();
        self.double_sided_skinned.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.single_sided.len()
            + self.double_sided.len()
            + self.single_sided_skinned.len()
            + self.double_sided_skinned.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn sort(&mut self) {
        self.single_sided.sort();
        self.double_sided.sort();
        self.single_sided_skinned.sort();
        self.double_sided_skinned.sort();
    }
}

/// Summary of one generation run: the eye-axis depth range and world
/// bounds of everything that passed the side planes, plus counts of what
/// was actually emitted.
#[derive(Debug, Clone, Copy)]
pub struct GenSummary {
    pub near: f32,
    pub far: f32,
    pub min_bounding: Vec3,
    pub max_bounding: Vec3,
    pub object_count: u32,
    pub vertex_count: u64,
}

impl Default for GenSummary {
    fn default() -> Self {
        Self {
            near: f32::MAX,
            far: f32::MIN,
            min_bounding: Vec3::splat(f32::MAX),
            max_bounding: Vec3::splat(f32::MIN),
            object_count: 0,
            vertex_count: 0,
        }
    }
}

impl GenSummary {
    pub fn merge(&mut self, other: &GenSummary) {
        self.near = self.near.min(other.near);
        self.far = self.far.max(other.far);
        self.min_bounding = self.min_bounding.min(other.min_bounding);
        self.max_bounding = self.max_bounding.max(other.max_bounding);
        self.object_count += other.object_count;
        self.vertex_count += other.vertex_count;
    }
}

/// Clamps the raw g-buffer depth range into a usable projection range.
///
/// `far` gets a small floor; `near` is kept positive, strictly below
/// `far`, and no closer than `far / 200` to preserve depth precision.
#[must_use]
pub fn clamp_gbuffer_depth_range(raw_near: f32, raw_far: f32) -> (f32, f32) {
    let far = raw_far.max(0.02);
    let mut near = raw_near.max(0.01);
    near = near.min(far - 0.01);
    near = near.max(far / 200.0);
    (near, far)
}

/// Widens the raw shadow depth range around its center to avoid
/// z-fighting on cascades that collapse to a plane.
#[must_use]
pub fn shadow_depth_range(raw_near: f32, raw_far: f32) -> (f32, f32) {
    let center = (raw_near + raw_far) * 0.5;
    (raw_near.min(center - 0.01), raw_far.max(center + 0.01))
}

/// Frustum-culls a scene into four drawlists. Reused across frames to keep
/// bucket allocations warm.
#[derive(Debug, Clone, Default)]
pub struct DrawcallGenerator {
    lists: FrustumDrawLists,
}

impl DrawcallGenerator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn lists(&self) -> &FrustumDrawLists {
        &self.lists
    }

    /// Culls `model` against `frustum` and rebuilds the four drawlists.
    ///
    /// `eye_position` / `eye_direction` define the axis along which the
    /// near/far summary is measured; for shadow frustums this is the light
    /// direction.
    pub fn generate(
        &mut self,
        model: &SceneModel,
        traverser: &NodeTraverser,
        frustum: &Frustum,
        eye_position: Vec3,
        eye_direction: Vec3,
    ) -> GenSummary {
        self.lists.clear();
        let mut summary = GenSummary::default();

        for (node_index, node) in model.nodes.iter().enumerate() {
            let Some(mesh_idx) = node.mesh else {
                continue;
            };
            if !traverser.is_traversed(node_index) {
                continue;
            }
            let Some(mesh) = model.meshes.get(mesh_idx) else {
                warn!("Node {node_index} references missing mesh {mesh_idx}");
                continue;
            };

            let node_transform = traverser.world_transform(node_index);

            for primitive in &mesh.primitives {
                let Some(material_idx) = primitive.material else {
                    continue;
                };
                let Some(material) = model.materials.get(material_idx as usize) else {
                    warn!("Primitive references missing material {material_idx}");
                    continue;
                };

                // World-space corner points used for the near/far
                // projection, and the enclosing AABB used for culling.
                let skin = node
                    .skin
                    .and_then(|idx| model.skins.get(idx))
                    .filter(|_| primitive.is_skinned());
                let skinned = skin.is_some();
                let (corners, bounds) = if let Some(skin) = skin {
                    let mut min = Vec3::splat(f32::MAX);
                    let mut max = Vec3::splat(f32::MIN);
                    for (joint_slot, &joint_node) in skin.joints.iter().enumerate() {
                        let joint_transform = traverser.world_transform(joint_node)
                            * skin.inverse_bind_matrices[joint_slot];
                        for pt in primitive.aabb.corners() {
                            let world = joint_transform.project_point3(pt);
                            min = min.min(world);
                            max = max.max(world);
                        }
                    }
                    let bounds = Aabb::new(min, max);
                    (bounds.corners(), bounds)
                } else {
                    let mut corners = primitive.aabb.corners();
                    let mut min = Vec3::splat(f32::MAX);
                    let mut max = Vec3::splat(f32::MIN);
                    for pt in &mut corners {
                        *pt = node_transform.project_point3(*pt);
                        min = min.min(*pt);
                        max = max.max(*pt);
                    }
                    (corners, Aabb::new(min, max))
                };

                // Side planes first; near/far only accumulate for
                // primitives laterally inside the frustum.
                let edge_bounded = frustum
                    .side_planes()
                    .iter()
                    .all(|plane| plane.intersect_or_forward(&bounds));

                let mut near = f32::MAX;
                let mut far = f32::MIN;
                if edge_bounded {
                    for pt in &corners {
                        let depth = eye_direction.dot(*pt - eye_position);
                        near = near.min(depth);
                        far = far.max(depth);
                    }
                }

                summary.near = summary.near.min(near);
                summary.far = summary.far.max(far);
                summary.min_bounding = summary.min_bounding.min(bounds.min);
                summary.max_bounding = summary.max_bounding.max(bounds.max);

                if !edge_bounded
                    || !frustum.near.intersect_or_forward(&bounds)
                    || !frustum.far.intersect_or_forward(&bounds)
                {
                    continue;
                }

                summary.object_count += 1;
                summary.vertex_count += u64::from(primitive.vertex_count);

                let drawcall = Drawcall {
                    node_index: node_index as u32,
                    primitive: *primitive,
                    transform: node_transform,
                    near,
                    far,
                };

                let list = match (material.double_sided, skinned) {
                    (false, false) => &mut self.lists.single_sided,
                    (true, false) => &mut self.lists.double_sided,
                    (false, true) => &mut self.lists.single_sided_skinned,
                    (true, true) => &mut self.lists.double_sided_skinned,
                };
                list.push(drawcall, material.alpha_mode);
            }
        }

        self.lists.sort();
        summary
    }
}
