//! Engine error type.
//!
//! Every fallible initialization step in the engine returns [`Result`]. Failures
//! abort the remaining steps and surface the first error unchanged.

use thiserror::Error;

/// Errors produced by the rendering core.
#[derive(Debug, Error)]
pub enum Error {
    /// Adapter, device or queue creation failed, or the device stopped responding.
    #[error("device error: {0}")]
    Device(String),

    /// A GPU resource (buffer, texture, pipeline, bind group) could not be created.
    #[error("failed to create {what}: {reason}")]
    ResourceCreation {
        what: String,
        /// Platform status or reason reported by the backend.
        reason: String,
    },

    /// Shader source could not be read, preprocessed, parsed or validated.
    #[error("shader compilation failed for `{path}` (entry `{entry_point}`):\n{diagnostic}")]
    ShaderCompilation {
        path: String,
        entry_point: String,
        diagnostic: String,
    },

    /// An invalid argument, setting or collaborator was supplied.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The asset loader could not decode the requested file.
    #[error("failed to decode asset `{path}`: {reason}")]
    AssetDecode { path: String, reason: String },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn resource(what: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::ResourceCreation {
            what: what.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }
}
