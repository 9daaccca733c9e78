/// Error types shared by the viewer components
use thiserror::Error;

use crate::controller::ViewerState;

/// Fatal viewer errors. Any of these ends the current session.
#[derive(Debug, Error)]
pub enum ViewerError {
    #[error("drawing surface unavailable: {0}")]
    SurfaceUnavailable(String),

    #[error("render engine used after dispose")]
    EngineDisposed,

    #[error("viewer must be inactive to activate (currently {0:?})")]
    NotInactive(ViewerState),
}

/// Asset load failures. `Network` and `Decode` are recoverable at the viewer
/// level; `Cancelled` marks a load abandoned by its own session.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LoadError {
    #[error("network error: {0}")]
    Network(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("load cancelled")]
    Cancelled,
}

/// Errors raised while reading a viewer configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
