use thiserror::Error;

use crate::mcp::TransportError;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to connect to provider {provider}: {source}")]
    Connect {
        provider: String,
        source: TransportError,
    },

    #[error("provider {provider} failed to list tools: {source}")]
    ListTools {
        provider: String,
        source: TransportError,
    },

    #[error("tool {tool} on provider {provider} failed: {source}")]
    ToolCall {
        provider: String,
        tool: String,
        source: TransportError,
    },

    #[error("failed to close provider {provider}: {source}")]
    Close {
        provider: String,
        source: TransportError,
    },

    #[error("no active session for provider {0}")]
    SessionUnavailable(String),

    #[error("tool not found: {0}")]
    ToolNotFound(String),

    #[error("tool {tool} is missing required argument: {argument}")]
    MissingArgument { tool: String, argument: String },

    #[error("tool {tool} is provided by both {first} and {second}")]
    ToolConflict {
        tool: String,
        first: String,
        second: String,
    },

    #[error("duplicate tool name: {0}")]
    DuplicateTool(String),

    #[error("duplicate provider name: {0}")]
    DuplicateProvider(String),
}

impl Error {
    /// Failures caused by the provider side. The session has been reset, so the
    /// same call may succeed on a fresh connection.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::Connect { .. } | Error::ListTools { .. } | Error::ToolCall { .. }
        )
    }

    /// Name of the provider involved, if any.
    pub fn provider(&self) -> Option<&str> {
        match self {
            Error::Connect { provider, .. }
            | Error::ListTools { provider, .. }
            | Error::ToolCall { provider, .. }
            | Error::Close { provider, .. } => Some(provider.as_str()),
            Error::SessionUnavailable(provider) => Some(provider.as_str()),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
