use thiserror::Error;

/// Failures at the I/O edge. Analysis and synthesis themselves never fail.
#[derive(Debug, Error)]
pub enum ApiscopeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

pub type Result<T> = std::result::Result<T, ApiscopeError>;
