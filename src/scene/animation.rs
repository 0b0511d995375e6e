//! Keyframe animation and node-hierarchy traversal.
//!
//! Animation samplers are evaluated on the host into a
//! [`TransformOverrides`] table (node index → local TRS). The
//! [`NodeTraverser`] then walks the scene's node DAG, substituting
//! overridden local transforms where present, and produces the per-node
//! world transforms every other frame stage consumes.

use glam::{Mat4, Quat, Vec3};
use rustc_hash::FxHashMap;

use crate::errors::{EmberError, Result};
use crate::scene::model::SceneModel;

// ============================================================================
// Keyframe samplers
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interpolation {
    Step,
    Linear,
    CubicSpline,
}

/// Values that a keyframe track can interpolate.
pub trait Interpolatable: Copy {
    fn lerp(a: Self, b: Self, t: f32) -> Self;
    /// Cubic Hermite interpolation with explicit tangents, over an
    /// interval of length `dt`.
    fn hermite(v0: Self, out_tan0: Self, v1: Self, in_tan1: Self, t: f32, dt: f32) -> Self;
}

impl Interpolatable for Vec3 {
    fn lerp(a: Self, b: Self, t: f32) -> Self {
        a.lerp(b, t)
    }

    fn hermite(v0: Self, m0: Self, v1: Self, m1: Self, t: f32, dt: f32) -> Self {
        let t2 = t * t;
        let t3 = t2 * t;
        v0 * (2.0 * t3 - 3.0 * t2 + 1.0)
            + m0 * (dt * (t3 - 2.0 * t2 + t))
            + v1 * (-2.0 * t3 + 3.0 * t2)
            + m1 * (dt * (t3 - t2))
    }
}

impl Interpolatable for Quat {
    fn lerp(a: Self, b: Self, t: f32) -> Self {
        a.slerp(b, t)
    }

    fn hermite(v0: Self, m0: Self, v1: Self, m1: Self, t: f32, dt: f32) -> Self {
        let c = |q: Quat| glam::Vec4::new(q.x, q.y, q.z, q.w);
        let v = Vec3::hermite(
            c(v0).truncate(),
            c(m0).truncate(),
            c(v1).truncate(),
            c(m1).truncate(),
            t,
            dt,
        );
        let t2 = t * t;
        let t3 = t2 * t;
        let w = c(v0).w * (2.0 * t3 - 3.0 * t2 + 1.0)
            + c(m0).w * (dt * (t3 - 2.0 * t2 + t))
            + c(v1).w * (-2.0 * t3 + 3.0 * t2)
            + c(m1).w * (dt * (t3 - t2));
        Quat::from_xyzw(v.x, v.y, v.z, w).normalize()
    }
}

/// A time-parameterized keyframe track.
///
/// For `CubicSpline`, `values` holds `(in_tangent, value, out_tangent)`
/// triples per keyframe, so its length is `times.len() * 3`.
#[derive(Debug, Clone)]
pub struct Sampler<T: Interpolatable> {
    pub times: Vec<f32>,
    pub values: Vec<T>,
    pub interpolation: Interpolation,
}

impl<T: Interpolatable> Sampler<T> {
    #[must_use]
    pub fn new(times: Vec<f32>, values: Vec<T>, interpolation: Interpolation) -> Self {
        Self {
            times,
            values,
            interpolation,
        }
    }

    fn value_at(&self, keyframe: usize) -> T {
        match self.interpolation {
            Interpolation::CubicSpline => self.values[keyframe * 3 + 1],
            _ => self.values[keyframe],
        }
    }

    /// Samples the track at `time`, clamping outside the keyframe range.
    #[must_use]
    pub fn sample(&self, time: f32) -> Option<T> {
        if self.times.is_empty() {
            return None;
        }
        let last = self.times.len() - 1;
        if time <= self.times[0] {
            return Some(self.value_at(0));
        }
        if time >= self.times[last] {
            return Some(self.value_at(last));
        }

        // First index with t > time; the interval is [next - 1, next).
        let next = self.times.partition_point(|&t| t <= time);
        let prev = next - 1;
        let t0 = self.times[prev];
        let t1 = self.times[next];
        let dt = (t1 - t0).max(1.0e-6);
        let t = (time - t0) / dt;

        let value = match self.interpolation {
            Interpolation::Step => self.value_at(prev),
            Interpolation::Linear => T::lerp(self.value_at(prev), self.value_at(next), t),
            Interpolation::CubicSpline => {
                let v0 = self.values[prev * 3 + 1];
                let out_tan0 = self.values[prev * 3 + 2];
                let in_tan1 = self.values[next * 3];
                let v1 = self.values[next * 3 + 1];
                T::hermite(v0, out_tan0, v1, in_tan1, t, dt)
            }
        };
        Some(value)
    }
}

// ============================================================================
// Channels and clips
// ============================================================================

/// What a channel writes into the target node's local transform.
#[derive(Debug, Clone)]
pub enum ChannelOutput {
    Translation(Sampler<Vec3>),
    Rotation(Sampler<Quat>),
    Scale(Sampler<Vec3>),
}

#[derive(Debug, Clone)]
pub struct Channel {
    pub node: usize,
    pub output: ChannelOutput,
}

/// One named animation: a set of channels over a shared time range.
#[derive(Debug, Clone, Default)]
pub struct AnimationClip {
    pub name: String,
    pub channels: Vec<Channel>,
    pub start_time: f32,
    pub end_time: f32,
}

impl AnimationClip {
    /// Samples every channel at `time` into `overrides`.
    ///
    /// Nodes touched for the first time are seeded from their rest-pose
    /// local transform, so channels that only animate one TRS component
    /// leave the rest intact.
    pub fn apply(&self, time: f32, model: &SceneModel, overrides: &mut TransformOverrides) {
        for channel in &self.channels {
            let Some(node) = model.nodes.get(channel.node) else {
                continue;
            };
            let entry = overrides
                .map
                .entry(channel.node)
                .or_insert_with(|| NodeTransform::from_matrix(node.transform));

            match &channel.output {
                ChannelOutput::Translation(sampler) => {
                    if let Some(v) = sampler.sample(time) {
                        entry.translation = v;
                    }
                }
                ChannelOutput::Rotation(sampler) => {
                    if let Some(q) = sampler.sample(time) {
                        entry.rotation = q;
                    }
                }
                ChannelOutput::Scale(sampler) => {
                    if let Some(v) = sampler.sample(time) {
                        entry.scale = v;
                    }
                }
            }
        }
    }
}

// ============================================================================
// Transform overrides
// ============================================================================

/// A node-local TRS transform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeTransform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl NodeTransform {
    #[must_use]
    pub fn from_matrix(matrix: Mat4) -> Self {
        let (scale, rotation, translation) = matrix.to_scale_rotation_translation();
        Self {
            translation,
            rotation,
            scale,
        }
    }

    #[must_use]
    pub fn to_matrix(self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

/// Animated local-transform overrides, node index → TRS.
#[derive(Debug, Clone, Default)]
pub struct TransformOverrides {
    pub(crate) map: FxHashMap<usize, NodeTransform>,
}

impl TransformOverrides {
    pub fn clear(&mut self) {
        self.map.clear();
    }

    #[must_use]
    pub fn get(&self, node: usize) -> Option<&NodeTransform> {
        self.map.get(&node)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

// ============================================================================
// Animation player
// ============================================================================

/// Playback state for one selected clip.
#[derive(Debug, Clone)]
pub struct AnimationPlayer {
    pub clip: Option<usize>,
    pub time: f32,
    pub rate: f32,
    pub playing: bool,
    pub looping: bool,
}

impl Default for AnimationPlayer {
    fn default() -> Self {
        Self {
            clip: None,
            time: 0.0,
            rate: 1.0,
            playing: false,
            looping: true,
        }
    }
}

impl AnimationPlayer {
    /// Selects a clip (or disables animation) and rewinds.
    pub fn select(&mut self, clip: Option<usize>) {
        self.clip = clip;
        self.time = 0.0;
        self.playing = false;
    }

    /// Advances playback time and refreshes `overrides` from the selected
    /// clip. With no clip selected the overrides are cleared.
    pub fn update(
        &mut self,
        delta_time: f32,
        model: &SceneModel,
        overrides: &mut TransformOverrides,
    ) {
        let Some(clip_idx) = self.clip else {
            overrides.clear();
            return;
        };
        let Some(clip) = model.animations.get(clip_idx) else {
            overrides.clear();
            return;
        };

        if self.playing {
            self.time += delta_time * self.rate;
            if self.time > clip.end_time {
                if self.looping {
                    let span = (clip.end_time - clip.start_time).max(1.0e-6);
                    self.time = clip.start_time + (self.time - clip.start_time) % span;
                } else {
                    self.time = clip.end_time;
                    self.playing = false;
                }
            }
        }

        overrides.clear();
        clip.apply(self.time, model, overrides);
    }
}

// ============================================================================
// Node traversal
// ============================================================================

#[derive(Debug, Clone, Copy)]
struct TraverseNode {
    transform: Mat4,
    traversed: bool,
}

impl Default for TraverseNode {
    fn default() -> Self {
        Self {
            transform: Mat4::IDENTITY,
            traversed: false,
        }
    }
}

/// Resolves world transforms for every node reachable from a scene root.
#[derive(Debug, Clone, Default)]
pub struct NodeTraverser {
    transforms: Vec<TraverseNode>,
}

impl NodeTraverser {
    /// Walks the node hierarchy of `model.scenes[scene_idx]`, applying
    /// `overrides` in place of the rest-pose local transforms.
    ///
    /// Returns [`EmberError::InvalidParameter`] when `scene_idx` is out of
    /// bounds.
    pub fn traverse(
        &mut self,
        model: &SceneModel,
        overrides: &TransformOverrides,
        scene_idx: usize,
        base_transform: Mat4,
    ) -> Result<()> {
        if scene_idx >= model.scenes.len() {
            return Err(EmberError::InvalidParameter {
                context: "scene index exceeds scene count",
                value: scene_idx,
            });
        }

        self.transforms.clear();
        self.transforms
            .resize(model.nodes.len(), TraverseNode::default());

        for &root in &model.scenes[scene_idx].nodes {
            self.visit(model, overrides, root, base_transform);
        }
        Ok(())
    }

    fn visit(
        &mut self,
        model: &SceneModel,
        overrides: &TransformOverrides,
        node_idx: usize,
        parent: Mat4,
    ) {
        let Some(node) = model.nodes.get(node_idx) else {
            return;
        };

        let local = overrides
            .get(node_idx)
            .map_or(node.transform, |trs| trs.to_matrix());
        let world = parent * local;

        self.transforms[node_idx] = TraverseNode {
            transform: world,
            traversed: true,
        };

        for &child in &node.children {
            self.visit(model, overrides, child, world);
        }
    }

    /// Forgets the previous traversal. Used when the model has no scenes.
    pub fn clear(&mut self) {
        self.transforms.clear();
    }

    /// World transform of `node_idx`, identity if the node was not reached.
    #[must_use]
    pub fn world_transform(&self, node_idx: usize) -> Mat4 {
        self.transforms
            .get(node_idx)
            .map_or(Mat4::IDENTITY, |n| n.transform)
    }

    /// Whether `node_idx` was reached by the last traversal.
    #[must_use]
    pub fn is_traversed(&self, node_idx: usize) -> bool {
        self.transforms.get(node_idx).is_some_and(|n| n.traversed)
    }
}
