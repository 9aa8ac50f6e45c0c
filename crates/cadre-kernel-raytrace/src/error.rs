//! Error types for the preview renderer.

use thiserror::Error;

/// Errors from renderer configuration and camera setup.
///
/// Building, tracing and rendering themselves never fail.
#[derive(Error, Debug, PartialEq)]
pub enum RenderError {
    /// Invalid render or BVH settings.
    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    /// Camera parameters do not define an invertible view or projection.
    #[error("degenerate camera: {0}")]
    DegenerateCamera(String),
}

/// Result type for renderer operations.
pub type Result<T> = std::result::Result<T, RenderError>;
