//! Error Types

use thiserror::Error;

use crate::provider::BackendError;
use crate::reply::ReplyParseError;

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;

/// Agent error types
///
/// Every failure path of a conversation turn ends up here as a tagged value.
/// Tool failures never do: providers turn them into explanatory results.
#[derive(Error, Debug)]
pub enum AgentError {
    /// Backend has no credentials; detected before any network call
    #[error("Completion backend is not configured")]
    NotConfigured,

    /// The backend call (or something it wrapped) timed out
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Backend answered HTTP 429
    #[error("Rate limited: {message}")]
    RateLimited {
        message: String,
        code: Option<String>,
        error_type: Option<String>,
    },

    /// The model returned an `{"error": ...}` object
    #[error("{0}")]
    AgentReported(String),

    /// The model output was not valid JSON
    #[error("Invalid JSON in model response: {0}")]
    InvalidJson(String),

    /// The model output was JSON but not the expected shape
    #[error("Invalid model response: {0}")]
    InvalidResponse(String),

    /// Any other backend failure
    #[error("Backend error: {0}")]
    Backend(String),

    /// The owning session was torn down while the reply was in flight
    #[error("Reply cancelled")]
    Cancelled,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other/unknown error
    #[error("{0}")]
    Other(String),
}

impl AgentError {
    /// Check if error is retryable
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout(_) | Self::RateLimited { .. } | Self::Backend(_)
        )
    }

    /// Convert to a user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            Self::NotConfigured => {
                "The assistant is not configured yet. Add an API key in the settings.".into()
            }
            Self::Timeout(_) => {
                "The assistant took too long to respond. Please try again later.".into()
            }
            Self::RateLimited { .. } => {
                "You've made too many requests. Please slow down and try again in a moment.".into()
            }
            Self::AgentReported(reason) => reason.clone(),
            Self::InvalidJson(_) | Self::InvalidResponse(_) => {
                "The assistant returned a response that could not be read. Please try again."
                    .into()
            }
            Self::Backend(msg) => format!("The AI service encountered an error: {msg}"),
            Self::Cancelled => "The request was cancelled.".into(),
            _ => "An unexpected error occurred.".into(),
        }
    }
}

impl From<ReplyParseError> for AgentError {
    fn from(err: ReplyParseError) -> Self {
        match err {
            ReplyParseError::AgentReported(reason) => Self::AgentReported(reason),
            ReplyParseError::InvalidJson(msg) => Self::InvalidJson(msg),
            ReplyParseError::NotAnObject => Self::InvalidResponse(err.to_string()),
        }
    }
}

impl From<BackendError> for AgentError {
    fn from(err: BackendError) -> Self {
        if crate::provider::is_timeout(&err) {
            return Self::Timeout(err.to_string());
        }
        match err {
            BackendError::NotConfigured => Self::NotConfigured,
            BackendError::RateLimited {
                message,
                code,
                error_type,
            } => Self::RateLimited {
                message,
                code,
                error_type,
            },
            other => Self::Backend(other.to_string()),
        }
    }
}

impl From<anyhow::Error> for AgentError {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_carries_code() {
        let err: AgentError = BackendError::RateLimited {
            message: "slow down".into(),
            code: Some("rate_limit_exceeded".into()),
            error_type: Some("requests".into()),
        }
        .into();

        match &err {
            AgentError::RateLimited { code, error_type, .. } => {
                assert_eq!(code.as_deref(), Some("rate_limit_exceeded"));
                assert_eq!(error_type.as_deref(), Some("requests"));
            }
            other => panic!("expected RateLimited, got {other:?}"),
        }
        assert!(err.is_retryable());
        assert!(err.user_message().contains("slow down"));
    }

    #[test]
    fn test_timeout_classification() {
        let err: AgentError = BackendError::Timeout("read".into()).into();
        assert!(matches!(err, AgentError::Timeout(_)));
        assert!(err.user_message().contains("try again"));
    }

    #[test]
    fn test_agent_reported_message_is_reason() {
        let err: AgentError = ReplyParseError::AgentReported("missing field".into()).into();
        assert_eq!(err.to_string(), "missing field");
        assert_eq!(err.user_message(), "missing field");
    }
}
