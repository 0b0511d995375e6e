//! Scene model consumed by the renderer.
//!
//! The external glTF loader produces two halves of a scene:
//!
//! - [`SceneModel`]: the CPU-side hierarchy and metadata the drawcall
//!   generator walks every frame (nodes, meshes, primitives with AABBs,
//!   material classification, skins).
//! - [`GpuScene`]: flat vertex-buffer arrays and pre-populated per-material
//!   bind groups. The renderer defines the bind-group layouts (see the pass
//!   modules); the loader fills them. Scene buffers and material bind
//!   groups are immutable after load, so every pass may read them
//!   concurrently. The skin palettes are the one exception: the host
//!   rewrites them each frame before any pass is submitted.

use glam::{Mat4, Vec3};

/// Axis-aligned bounding box in the primitive's local space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    #[must_use]
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// The 8 corner points, in a fixed order.
    #[must_use]
    pub fn corners(&self) -> [Vec3; 8] {
        let (min, max) = (self.min, self.max);
        [
            Vec3::new(min.x, min.y, min.z),
            Vec3::new(max.x, min.y, min.z),
            Vec3::new(min.x, max.y, min.z),
            Vec3::new(max.x, max.y, min.z),
            Vec3::new(min.x, min.y, max.z),
            Vec3::new(max.x, min.y, max.z),
            Vec3::new(min.x, max.y, max.z),
            Vec3::new(max.x, max.y, max.z),
        ]
    }

    #[must_use]
    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }
}

/// Material alpha handling, mirroring the glTF alpha modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AlphaMode {
    #[default]
    Opaque,
    Mask,
    Blend,
}

/// CPU-side material metadata.
///
/// Texture contents and the material-parameter uniform live in the loader's
/// [`MaterialBindings`]; the generator only needs the classification bits.
#[derive(Debug, Clone)]
pub struct Material {
    pub name: String,
    pub alpha_mode: AlphaMode,
    pub alpha_cutoff: f32,
    pub double_sided: bool,
    pub roughness_factor: f32,
    pub metallic_factor: f32,
    pub emissive_factor: Vec3,
    pub normal_scale: f32,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: String::new(),
            alpha_mode: AlphaMode::Opaque,
            alpha_cutoff: 0.5,
            double_sided: false,
            roughness_factor: 1.0,
            metallic_factor: 1.0,
            emissive_factor: Vec3::ZERO,
            normal_scale: 1.0,
        }
    }
}

/// References into [`GpuScene`]'s joint/weight buffer arrays for a skinned
/// primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SkinAttributes {
    pub joints_buffer: u32,
    pub joints_offset: u32,
    pub weights_buffer: u32,
    pub weights_offset: u32,
}

/// One drawable piece of a mesh.
///
/// Attribute streams are `(buffer index, element offset)` references into
/// the flat buffer arrays of [`GpuScene`]. Offsets count elements, not
/// bytes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Primitive {
    pub position_buffer: u32,
    pub position_offset: u32,
    pub normal_buffer: u32,
    pub normal_offset: u32,
    pub tangent_buffer: u32,
    pub tangent_offset: u32,
    pub uv_buffer: u32,
    pub uv_offset: u32,

    pub vertex_count: u32,
    pub material: Option<u32>,
    pub skin: Option<SkinAttributes>,

    /// Local-space bounds, straight from the accessor min/max.
    pub aabb: Aabb,
}

impl Primitive {
    #[must_use]
    pub fn is_skinned(&self) -> bool {
        self.skin.is_some()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Mesh {
    pub name: String,
    pub primitives: Vec<Primitive>,
}

/// A node in the scene hierarchy.
#[derive(Debug, Clone)]
pub struct Node {
    pub name: String,
    /// Local TRS transform, already composed into a matrix by the loader.
    pub transform: Mat4,
    pub mesh: Option<usize>,
    pub skin: Option<usize>,
    pub children: Vec<usize>,
}

impl Default for Node {
    fn default() -> Self {
        Self {
            name: String::new(),
            transform: Mat4::IDENTITY,
            mesh: None,
            skin: None,
            children: Vec::new(),
        }
    }
}

/// A skin: joint node indices plus one inverse-bind matrix per joint.
#[derive(Debug, Clone, Default)]
pub struct Skin {
    pub joints: Vec<usize>,
    pub inverse_bind_matrices: Vec<Mat4>,
}

/// Root node indices of one glTF scene.
#[derive(Debug, Clone, Default)]
pub struct SceneRoot {
    pub nodes: Vec<usize>,
}

/// The complete CPU-side scene description.
#[derive(Debug, Clone, Default)]
pub struct SceneModel {
    pub nodes: Vec<Node>,
    pub meshes: Vec<Mesh>,
    pub materials: Vec<Material>,
    pub skins: Vec<Skin>,
    pub scenes: Vec<SceneRoot>,
    pub animations: Vec<crate::scene::animation::AnimationClip>,
}

// ============================================================================
// GPU-side handles (populated by the loader)
// ============================================================================

/// Pre-populated descriptor sets for one material.
///
/// `gbuffer` matches the g-buffer material layout (five combined image
/// samplers + one parameter uniform), `shadow` the albedo-only shadow
/// layout (one combined image sampler + the same parameter uniform).
pub struct MaterialBindings {
    pub gbuffer: wgpu::BindGroup,
    pub shadow: wgpu::BindGroup,
}

/// Skin-matrix palette storage for one skin.
///
/// The host stages `joint_world * inverse_bind` matrices into `palette`
/// every frame; the skinned g-buffer and shadow pipelines read it through
/// `bind_group`.
pub struct GpuSkin {
    pub palette: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
    pub joint_count: u32,
}

/// Flat GPU buffer arrays plus per-material and per-skin bindings.
pub struct GpuScene {
    /// vec3 attribute streams (position / normal / tangent).
    pub vec3_buffers: Vec<wgpu::Buffer>,
    /// vec2 attribute streams (UV).
    pub vec2_buffers: Vec<wgpu::Buffer>,
    /// u16vec4 joint-index streams.
    pub joint_buffers: Vec<wgpu::Buffer>,
    /// vec4 joint-weight streams.
    pub weight_buffers: Vec<wgpu::Buffer>,

    pub materials: Vec<MaterialBindings>,
    pub skins: Vec<GpuSkin>,
}

/// Byte size of one vec3 vertex element.
pub const VEC3_STRIDE: u64 = 12;
/// Byte size of one vec2 vertex element.
pub const VEC2_STRIDE: u64 = 8;
/// Byte size of one u16vec4 joint-index element.
pub const JOINT_STRIDE: u64 = 8;
/// Byte size of one vec4 joint-weight element.
pub const WEIGHT_STRIDE: u64 = 16;
