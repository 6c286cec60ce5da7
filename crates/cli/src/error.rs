//! CLI error types.

use thiserror::Error;

use crate::config::ConfigError;

/// CLI errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Configuration is invalid or missing required fields.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Tool arguments were not a JSON object.
    #[error("invalid tool arguments: {0}")]
    InvalidArguments(String),

    /// The tool ran but reported a failure.
    #[error("tool {tool} reported an error: {message}")]
    ToolFailed { tool: String, message: String },

    /// An error occurred in the runtime layer.
    #[error(transparent)]
    Runtime(#[from] runtime::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
