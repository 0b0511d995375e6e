//! Drawcall Generation Tests
//!
//! Tests for:
//! - Binning into the four drawlists and three alpha buckets
//! - Frustum culling of primitives
//! - Near/far derivation along the eye axis and its clamping
//! - Sort order and stability
//! - Skinned AABB over-approximation

use glam::{Mat4, Vec3};

use ember::renderer::drawcall::{
    DrawcallGenerator, clamp_gbuffer_depth_range, shadow_depth_range,
};
use ember::scene::animation::{NodeTraverser, TransformOverrides};
use ember::scene::camera::CameraParameter;
use ember::scene::model::{
    Aabb, AlphaMode, Material, Mesh, Node, Primitive, SceneModel, SceneRoot, Skin,
};

const EPSILON: f32 = 1e-4;

fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < EPSILON
}

// ============================================================================
// Scene construction helpers
// ============================================================================

fn material(alpha_mode: AlphaMode, double_sided: bool) -> Material {
    Material {
        alpha_mode,
        double_sided,
        ..Default::default()
    }
}

fn unit_primitive(material_idx: u32) -> Primitive {
    Primitive {
        position_buffer: 0,
        position_offset: 0,
        normal_buffer: 0,
        normal_offset: 0,
        tangent_buffer: 0,
        tangent_offset: 0,
        uv_buffer: 0,
        uv_offset: 0,
        vertex_count: 36,
        material: Some(material_idx),
        skin: None,
        aabb: Aabb::new(Vec3::splat(-0.5), Vec3::splat(0.5)),
    }
}

fn mesh_node(name: &str, mesh: usize, translation: Vec3) -> Node {
    Node {
        name: name.to_string(),
        transform: Mat4::from_translation(translation),
        mesh: Some(mesh),
        skin: None,
        children: Vec::new(),
    }
}

/// One node per mesh, all nodes roots of scene 0.
fn scene_of(nodes: Vec<Node>, meshes: Vec<Mesh>, materials: Vec<Material>) -> SceneModel {
    let roots = (0..nodes.len()).collect();
    SceneModel {
        nodes,
        meshes,
        materials,
        skins: Vec::new(),
        scenes: vec![SceneRoot { nodes: roots }],
        animations: Vec::new(),
    }
}

/// Camera at (0, 0, 3) looking down -Z.
fn test_camera() -> CameraParameter {
    CameraParameter::perspective(
        Vec3::new(0.0, 0.0, 3.0),
        Vec3::NEG_Z,
        Vec3::Y,
        1.0,
        60.0_f32.to_radians(),
        0.01,
        100.0,
    )
}

fn traversed(model: &SceneModel) -> NodeTraverser {
    let mut traverser = NodeTraverser::default();
    traverser
        .traverse(model, &TransformOverrides::default(), 0, Mat4::IDENTITY)
        .expect("traversal of scene 0 should succeed");
    traverser
}

fn generate(model: &SceneModel, camera: &CameraParameter) -> (DrawcallGenerator, ember::renderer::drawcall::GenSummary) {
    let traverser = traversed(model);
    let mut generator = DrawcallGenerator::new();
    let summary = generator.generate(
        model,
        &traverser,
        &camera.frustum,
        camera.eye_position,
        camera.eye_direction,
    );
    (generator, summary)
}

// ============================================================================
// Binning
// ============================================================================

#[test]
fn visible_primitive_emits_exactly_one_drawcall() {
    let model = scene_of(
        vec![mesh_node("cube", 0, Vec3::ZERO)],
        vec![Mesh {
            name: "cube".into(),
            primitives: vec![unit_primitive(0)],
        }],
        vec![material(AlphaMode::Opaque, false)],
    );

    let (generator, summary) = generate(&model, &test_camera());
    let lists = generator.lists();

    assert_eq!(lists.len(), 1, "Exactly one drawcall expected");
    assert_eq!(lists.single_sided.opaque.len(), 1);
    assert_eq!(summary.object_count, 1);
    assert_eq!(summary.vertex_count, 36);
}

#[test]
fn binning_follows_material_classification() {
    let model = scene_of(
        vec![
            mesh_node("a", 0, Vec3::new(-1.0, 0.0, 0.0)),
            mesh_node("b", 1, Vec3::ZERO),
            mesh_node("c", 2, Vec3::new(1.0, 0.0, 0.0)),
        ],
        vec![
            Mesh {
                name: "a".into(),
                primitives: vec![unit_primitive(0)],
            },
            Mesh {
                name: "b".into(),
                primitives: vec![unit_primitive(1)],
            },
            Mesh {
                name: "c".into(),
                primitives: vec![unit_primitive(2)],
            },
        ],
        vec![
            material(AlphaMode::Opaque, false),
            material(AlphaMode::Mask, true),
            material(AlphaMode::Blend, false),
        ],
    );

    let (generator, _) = generate(&model, &test_camera());
    let lists = generator.lists();

    assert_eq!(lists.single_sided.opaque.len(), 1);
    assert_eq!(lists.double_sided.mask.len(), 1, "Double-sided mask material");
    assert_eq!(lists.single_sided.blend.len(), 1);
    assert!(lists.single_sided_skinned.is_empty());
    assert!(lists.double_sided_skinned.is_empty());
}

#[test]
fn primitive_without_material_is_skipped() {
    let mut primitive = unit_primitive(0);
    primitive.material = None;
    let model = scene_of(
        vec![mesh_node("cube", 0, Vec3::ZERO)],
        vec![Mesh {
            name: "cube".into(),
            primitives: vec![primitive],
        }],
        vec![material(AlphaMode::Opaque, false)],
    );

    let (generator, summary) = generate(&model, &test_camera());
    assert!(generator.lists().is_empty());
    assert_eq!(summary.object_count, 0);
}

// ============================================================================
// Culling
// ============================================================================

#[test]
fn off_screen_primitive_is_culled() {
    let model = scene_of(
        vec![
            mesh_node("visible", 0, Vec3::ZERO),
            mesh_node("left_field", 0, Vec3::new(1000.0, 0.0, 0.0)),
            mesh_node("behind", 0, Vec3::new(0.0, 0.0, 50.0)),
        ],
        vec![Mesh {
            name: "cube".into(),
            primitives: vec![unit_primitive(0)],
        }],
        vec![material(AlphaMode::Opaque, false)],
    );

    let (generator, summary) = generate(&model, &test_camera());
    assert_eq!(generator.lists().len(), 1, "Only the on-screen cube survives");
    assert_eq!(summary.object_count, 1);
}

#[test]
fn empty_scene_produces_empty_lists() {
    let model = scene_of(Vec::new(), Vec::new(), Vec::new());
    let (generator, summary) = generate(&model, &test_camera());

    assert!(generator.lists().is_empty());
    assert_eq!(summary.object_count, 0);
    assert_eq!(summary.vertex_count, 0);

    // The raw range is the empty sentinel; the clamp turns it into a
    // small valid projection range.
    let (near, far) = clamp_gbuffer_depth_range(summary.near, summary.far);
    assert!(near > 0.0 && far > near, "Clamped range must stay valid: {near}..{far}");
}

// ============================================================================
// Near/far derivation
// ============================================================================

#[test]
fn near_far_span_the_visible_bounds() {
    let model = scene_of(
        vec![mesh_node("cube", 0, Vec3::ZERO)],
        vec![Mesh {
            name: "cube".into(),
            primitives: vec![unit_primitive(0)],
        }],
        vec![material(AlphaMode::Opaque, false)],
    );

    let (generator, summary) = generate(&model, &test_camera());

    // Eye at z=3 looking down -Z over a unit cube at the origin: corner
    // depths run 2.5 to 3.5.
    assert!(approx(summary.near, 2.5), "near = {}", summary.near);
    assert!(approx(summary.far, 3.5), "far = {}", summary.far);

    let drawcall = &generator.lists().single_sided.opaque[0];
    assert!(approx(drawcall.near, 2.5));
    assert!(approx(drawcall.far, 3.5));
}

#[test]
fn gbuffer_clamp_keeps_near_positive_and_below_far() {
    let (near, far) = clamp_gbuffer_depth_range(-5.0, 40.0);
    assert!(approx(far, 40.0));
    assert!(approx(near, 0.2), "near should floor at far / 200, got {near}");

    let (near, far) = clamp_gbuffer_depth_range(2.5, 3.5);
    assert!(approx(near, 2.5));
    assert!(approx(far, 3.5));
}

#[test]
fn shadow_range_widens_degenerate_spans() {
    let (near, far) = shadow_depth_range(1.0, 1.0);
    assert!(near <= 0.99 + EPSILON && far >= 1.01 - EPSILON);

    // A healthy span is left alone.
    let (near, far) = shadow_depth_range(1.0, 5.0);
    assert!(approx(near, 1.0));
    assert!(approx(far, 5.0));
}

// ============================================================================
// Sorting
// ============================================================================

#[test]
fn buckets_sort_by_material_then_buffer() {
    let mut prim_mat1 = unit_primitive(1);
    prim_mat1.position_buffer = 2;
    let mut prim_mat0_buf1 = unit_primitive(0);
    prim_mat0_buf1.position_buffer = 1;
    let mut prim_mat0_buf0 = unit_primitive(0);
    prim_mat0_buf0.position_buffer = 0;

    let model = scene_of(
        vec![
            mesh_node("n0", 0, Vec3::new(-1.0, 0.0, 0.0)),
            mesh_node("n1", 1, Vec3::ZERO),
            mesh_node("n2", 2, Vec3::new(1.0, 0.0, 0.0)),
        ],
        vec![
            Mesh {
                name: "m0".into(),
                primitives: vec![prim_mat1],
            },
            Mesh {
                name: "m1".into(),
                primitives: vec![prim_mat0_buf1],
            },
            Mesh {
                name: "m2".into(),
                primitives: vec![prim_mat0_buf0],
            },
        ],
        vec![
            material(AlphaMode::Opaque, false),
            material(AlphaMode::Opaque, false),
        ],
    );

    let (generator, _) = generate(&model, &test_camera());
    let opaque = &generator.lists().single_sided.opaque;

    assert_eq!(opaque.len(), 3);
    let keys: Vec<_> = opaque.iter().map(ember::renderer::drawcall::Drawcall::sort_key).collect();
    let mut sorted = keys.clone();
    sorted.sort_unstable();
    assert_eq!(keys, sorted, "Opaque bucket must be ordered by sort key");
    // Material 0 entries first, ordered by buffer index.
    assert_eq!(opaque[0].primitive.position_buffer, 0);
    assert_eq!(opaque[1].primitive.position_buffer, 1);
    assert_eq!(opaque[2].primitive.material, Some(1));
}

#[test]
fn sort_is_stable_for_equal_keys() {
    // Two nodes sharing mesh 0: identical sort keys, distinct node
    // indices. Stability keeps scene order.
    let model = scene_of(
        vec![
            mesh_node("first", 0, Vec3::new(-0.5, 0.0, 0.0)),
            mesh_node("second", 0, Vec3::new(0.5, 0.0, 0.0)),
        ],
        vec![Mesh {
            name: "shared".into(),
            primitives: vec![unit_primitive(0)],
        }],
        vec![material(AlphaMode::Opaque, false)],
    );

    let (generator, _) = generate(&model, &test_camera());
    let opaque = &generator.lists().single_sided.opaque;
    assert_eq!(opaque.len(), 2);
    assert_eq!(opaque[0].node_index, 0);
    assert_eq!(opaque[1].node_index, 1);

    // Regenerating yields the same order.
    let (generator2, _) = generate(&model, &test_camera());
    let opaque2 = &generator2.lists().single_sided.opaque;
    assert_eq!(opaque2[0].node_index, 0);
    assert_eq!(opaque2[1].node_index, 1);
}

// ============================================================================
// Skinned primitives
// ============================================================================

#[test]
fn skinned_primitive_lands_in_skinned_list() {
    let mut primitive = unit_primitive(0);
    primitive.skin = Some(ember::scene::model::SkinAttributes {
        joints_buffer: 0,
        joints_offset: 0,
        weights_buffer: 0,
        weights_offset: 0,
    });

    let mut node = mesh_node("skinned", 0, Vec3::ZERO);
    node.skin = Some(0);
    // The joint node: carries the actual placement of the skinned bounds.
    let joint = Node {
        name: "joint".into(),
        transform: Mat4::from_translation(Vec3::new(0.0, 1.0, 0.0)),
        mesh: None,
        skin: None,
        children: Vec::new(),
    };

    let mut model = scene_of(
        vec![node, joint],
        vec![Mesh {
            name: "skinned".into(),
            primitives: vec![primitive],
        }],
        vec![material(AlphaMode::Opaque, false)],
    );
    model.skins = vec![Skin {
        joints: vec![1],
        inverse_bind_matrices: vec![Mat4::IDENTITY],
    }];

    let (generator, summary) = generate(&model, &test_camera());
    let lists = generator.lists();

    assert_eq!(lists.single_sided_skinned.opaque.len(), 1);
    assert!(lists.single_sided.is_empty());

    // Bounds follow the joint, not the node: the unit box sits at
    // y in [0.5, 1.5].
    assert!(approx(summary.min_bounding.y, 0.5), "{}", summary.min_bounding.y);
    assert!(approx(summary.max_bounding.y, 1.5), "{}", summary.max_bounding.y);
}
