//! Completion Backend Strategy
//!
//! Defines a common interface for the completion backends (the cloud chat
//! completions API and a self-hosted local model server) so the reply
//! orchestrator works with either without code changes.

use std::error::Error as StdError;
use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::message::Message;

/// Reasoning effort hint for models that deliberate before answering
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningEffort {
    Minimal,
    Low,
    Medium,
    High,
}

impl ReasoningEffort {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Minimal => "minimal",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for ReasoningEffort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReasoningEffort {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "minimal" => Ok(Self::Minimal),
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(format!("unknown reasoning effort '{other}'")),
        }
    }
}

/// A single chat completion request
#[derive(Clone, Debug)]
pub struct CompletionRequest {
    /// Messages in order; the first one is the only system message
    pub messages: Vec<Message>,

    /// Model identifier (e.g., "gpt-4o-mini", "llama3.2")
    pub model: String,

    /// Sampling temperature, 0.0 to 2.0
    pub temperature: f32,

    /// Optional reasoning effort (ignored by backends/models that lack it)
    pub reasoning_effort: Option<ReasoningEffort>,
}

impl CompletionRequest {
    pub fn new(messages: Vec<Message>, model: impl Into<String>, temperature: f32) -> Self {
        Self {
            messages,
            model: model.into(),
            temperature,
            reasoning_effort: None,
        }
    }

    #[must_use]
    pub fn with_reasoning_effort(mut self, effort: Option<ReasoningEffort>) -> Self {
        self.reasoning_effort = effort;
        self
    }
}

/// Response from a chat completion
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Completion {
    /// The generated text
    pub content: String,

    /// Model that generated this response
    pub model_id: String,

    /// Wall-clock duration of the network round trip(s)
    pub duration_ms: u64,

    /// Token usage statistics (if available)
    pub usage: Option<TokenUsage>,
}

/// Token usage statistics
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl TokenUsage {
    /// Sum usage across several round trips of one reply
    #[must_use]
    pub const fn add(self, other: Self) -> Self {
        Self {
            prompt_tokens: self.prompt_tokens.saturating_add(other.prompt_tokens),
            completion_tokens: self.completion_tokens.saturating_add(other.completion_tokens),
            total_tokens: self.total_tokens.saturating_add(other.total_tokens),
        }
    }
}

/// Backend-level failures
#[derive(Error, Debug)]
pub enum BackendError {
    /// No API key (or equivalent) available
    #[error("backend is not configured")]
    NotConfigured,

    /// Connect, request or socket timeout
    #[error("timed out: {0}")]
    Timeout(String),

    /// HTTP 429 with whatever the provider told us
    #[error("rate limited: {message}")]
    RateLimited {
        message: String,
        code: Option<String>,
        error_type: Option<String>,
    },

    /// Non-success HTTP status
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// Network failure below HTTP
    #[error("transport error: {0}")]
    Transport(#[source] Box<dyn StdError + Send + Sync>),

    /// Response body could not be decoded
    #[error("decode error: {0}")]
    Decode(String),

    /// The backend answered but produced no text
    #[error("model returned no content")]
    NoContent,
}

/// Strategy trait for completion backends
///
/// Implement this trait to add support for new LLM backends.
/// The orchestrator works exclusively through this interface.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Human-readable backend name for logs
    fn name(&self) -> &str;

    /// Whether the backend can be called at all (e.g. an API key is present)
    fn is_configured(&self) -> bool {
        true
    }

    /// Run one chat completion, including any tool round trips
    async fn chat_completion(
        &self,
        request: &CompletionRequest,
    ) -> Result<Completion, BackendError>;
}

/// Walk an error and all of its sources, returning true if any link matches.
pub fn error_chain_any(
    err: &(dyn StdError + 'static),
    pred: &dyn Fn(&(dyn StdError + 'static)) -> bool,
) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if pred(e) {
            return true;
        }
        current = e.source();
    }
    false
}

/// Timeout errors are usually wrapped several layers deep, so the whole
/// cause chain is inspected rather than the top-level type.
pub fn is_timeout(err: &(dyn StdError + 'static)) -> bool {
    error_chain_any(err, &is_timeout_link)
}

fn is_timeout_link(e: &(dyn StdError + 'static)) -> bool {
    if let Some(backend) = e.downcast_ref::<BackendError>() {
        return matches!(backend, BackendError::Timeout(_));
    }
    if let Some(io) = e.downcast_ref::<std::io::Error>() {
        return io.kind() == std::io::ErrorKind::TimedOut;
    }
    e.downcast_ref::<tokio::time::error::Elapsed>().is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reasoning_effort_parse() {
        assert_eq!("HIGH".parse::<ReasoningEffort>().unwrap(), ReasoningEffort::High);
        assert_eq!(ReasoningEffort::Minimal.to_string(), "minimal");
        assert!("extreme".parse::<ReasoningEffort>().is_err());
    }

    #[test]
    fn test_is_timeout_walks_sources() {
        let io = std::io::Error::new(std::io::ErrorKind::TimedOut, "socket read");
        let wrapped = BackendError::Transport(Box::new(io));
        assert!(is_timeout(&wrapped));

        let refused = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        assert!(!is_timeout(&BackendError::Transport(Box::new(refused))));
    }

    #[test]
    fn test_is_timeout_nested_backend_error() {
        let inner = BackendError::Timeout("connect".into());
        let outer = BackendError::Transport(Box::new(inner));
        assert!(is_timeout(&outer));
    }

    #[tokio::test]
    async fn test_is_timeout_elapsed() {
        let elapsed = tokio::time::timeout(
            std::time::Duration::from_millis(1),
            futures::future::pending::<()>(),
        )
        .await
        .unwrap_err();
        assert!(is_timeout(&BackendError::Transport(Box::new(elapsed))));
    }

    #[test]
    fn test_usage_add() {
        let a = TokenUsage { prompt_tokens: 10, completion_tokens: 2, total_tokens: 12 };
        let b = TokenUsage { prompt_tokens: 5, completion_tokens: 3, total_tokens: 8 };
        assert_eq!(a.add(b).total_tokens, 20);

        let near_max = TokenUsage { prompt_tokens: u32::MAX - 1, completion_tokens: 2, total_tokens: u32::MAX };
        let sum = near_max.add(b);
        assert_eq!(sum.prompt_tokens, u32::MAX);
        assert_eq!(sum.completion_tokens, 5);
        assert_eq!(sum.total_tokens, u32::MAX);
    }
}
