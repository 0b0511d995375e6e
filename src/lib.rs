#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]

pub mod errors;
pub mod renderer;
pub mod scene;

pub use errors::{EmberError, Result};
pub use renderer::settings::{FxaaQuality, RenderOptions, RenderSettings};
pub use renderer::{FrameStats, Renderer};
pub use scene::animation::{AnimationClip, AnimationPlayer, NodeTraverser, TransformOverrides};
pub use scene::camera::{CameraParameter, Frustum, OrbitController, ShadowParameter};
pub use scene::model::{
    Aabb, AlphaMode, GpuScene, Material, MaterialBindings, Mesh, Node, Primitive, SceneModel, Skin,
};
