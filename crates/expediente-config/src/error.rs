//! Errors raised while resolving paths or loading client configuration.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    /// A configuration value is present but unusable.
    #[error("Invalid configuration for `{field}`: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid API URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Malformed config file: {0}")]
    Json(#[from] serde_json::Error),

    /// No home directory to anchor `~/.expediente`.
    #[error("Path error: {0}")]
    Path(String),
}

pub type CoreResult<T> = Result<T, CoreError>;
