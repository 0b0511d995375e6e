//! Scene Data Model
//!
//! The renderer consumes a scene, it does not own one. [`model`] holds the
//! CPU-side description produced by the external mesh loader (nodes, meshes,
//! primitives, materials, skins) together with the opaque GPU handles the
//! loader uploads. [`animation`] applies sampler outputs to node local
//! transforms and resolves world transforms. [`camera`] derives the
//! per-frame camera and shadow parameters.

pub mod animation;
pub mod camera;
pub mod model;
