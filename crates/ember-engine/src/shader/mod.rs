//! Shader compilation and pipeline caching.
//!
//! Sources come from a [`ShaderSourceProvider`], go through a small
//! preprocessor (`#include`, `#ifdef`, macro substitution), and are validated
//! with naga before anything reaches the device.

mod builtin;
mod cache;
mod pipeline;
mod program;
mod source;

pub use builtin::{COMMON_PATH, MESH_PATH, SKYBOX_PATH, VERTEX_COLOR_MACRO, builtin_sources};
pub use cache::{DefaultPipeline, ShaderCache};
pub use pipeline::{DepthState, PipelineState, PipelineStateDesc, VertexLayout};
pub use program::{Shader, ShaderDesc, ShaderKey, ShaderMacro, ShaderStage};
pub use source::{
    EmbeddedSources, FileSystemSources, LayeredSources, PreprocessError, ShaderSourceProvider,
    preprocess, resolve_include,
};
