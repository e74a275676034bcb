//! Shaders compiled into the engine.

use super::source::EmbeddedSources;

pub const COMMON_PATH: &str = "ember/common.wgsl";
pub const MESH_PATH: &str = "ember/mesh.wgsl";
pub const SKYBOX_PATH: &str = "ember/skybox.wgsl";

/// Defined by mesh pipelines that modulate albedo with the vertex color.
pub const VERTEX_COLOR_MACRO: &str = "VERTEX_COLOR";

/// Sources for every built-in shader, keyed by their `ember/` path.
pub fn builtin_sources() -> EmbeddedSources {
    EmbeddedSources::new()
        .with(COMMON_PATH, include_str!("shaders/common.wgsl"))
        .with(MESH_PATH, include_str!("shaders/mesh.wgsl"))
        .with(SKYBOX_PATH, include_str!("shaders/skybox.wgsl"))
}
