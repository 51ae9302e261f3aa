//! Tool provider error types.
//!
//! These never cross the `ToolProvider` boundary; providers render them into
//! explanatory tool results.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ToolError {
    /// The script file does not exist; nothing was launched.
    #[error("server '{name}' is not installed (missing {path})")]
    NotInstalled { name: String, path: String },

    /// A server process failed to start.
    #[error("failed to spawn server '{name}': {reason}")]
    SpawnFailed { name: String, reason: String },

    /// The initialization handshake failed.
    #[error("server '{name}' initialization failed: {reason}")]
    InitFailed { name: String, reason: String },

    /// JSON-RPC communication error (malformed message, I/O error).
    #[error("transport error for server '{server}': {reason}")]
    Transport { server: String, reason: String },

    /// Server returned a JSON-RPC error response.
    #[error("server error [{code}]: {message}")]
    Server {
        code: i32,
        message: String,
        data: Option<serde_json::Value>,
    },

    /// A call did not finish within its deadline.
    #[error("'{operation}' on server '{server}' timed out after {timeout_ms}ms")]
    Timeout {
        server: String,
        operation: String,
        timeout_ms: u64,
    },

    /// The proxy answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// A payload did not have the expected shape.
    #[error("invalid payload: {0}")]
    Decode(String),
}

impl ToolError {
    /// Whether the server process should be discarded after this error
    pub const fn poisons_session(&self) -> bool {
        !matches!(self, Self::Server { .. } | Self::Decode(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_errors_keep_session() {
        let err = ToolError::Server {
            code: -32602,
            message: "Invalid params".into(),
            data: None,
        };
        assert!(!err.poisons_session());
        assert_eq!(err.to_string(), "server error [-32602]: Invalid params");

        let err = ToolError::Transport {
            server: "weather".into(),
            reason: "server stdout closed".into(),
        };
        assert!(err.poisons_session());
    }
}
