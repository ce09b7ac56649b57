//! Error types for gql-load.

use thiserror::Error;

/// Result type alias using LoadError.
pub type LoadResult<T> = Result<T, LoadError>;

/// Errors that stop a run from starting or a component from working.
///
/// Per-request failures never surface here; they are folded into the
/// request outcome and counted.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid load test spec: {0}")]
    InvalidSpec(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Transport setup failed: {0}")]
    Transport(String),

    #[error("Run cancelled")]
    Cancelled,
}
