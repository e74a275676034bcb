//! Ember engine crate.
//!
//! Frame-rendering core: GPU context and descriptor table, shader and
//! pipeline cache, per-frame constant rings, camera, mesh and skybox
//! renderers, and the scene whose render components drive them.

pub mod camera;
pub mod device;
pub mod error;
pub mod logging;
pub mod render;
pub mod scene;
pub mod shader;
pub mod time;

pub use error::{Error, Result};
