//! Conversation Messages
//!
//! Two shapes live here: [`Message`], the role/content pair sent to a
//! completion backend, and [`ConversationMessage`], the persisted chat record
//! the UI renders.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::provider::TokenUsage;
use crate::reply::AgentStructuredResponse;

/// Role of a message sent to the model
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System prompt/instructions
    System,
    /// User input
    User,
    /// Assistant (LLM) response
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::System => write!(f, "system"),
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
        }
    }
}

/// A single message in a completion request
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Message role
    pub role: Role,

    /// Text content
    pub content: String,
}

impl Message {
    /// Create a new message
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Who wrote a conversation message
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Author {
    User,
    Agent,
}

/// Timing and token metrics attached to agent messages
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageMetrics {
    pub duration_ms: u64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_tokens: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion_tokens: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<u32>,
}

impl MessageMetrics {
    pub fn new(duration_ms: u64, usage: Option<TokenUsage>) -> Self {
        Self {
            duration_ms,
            prompt_tokens: usage.map(|u| u.prompt_tokens),
            completion_tokens: usage.map(|u| u.completion_tokens),
            total_tokens: usage.map(|u| u.total_tokens),
        }
    }
}

/// A chat record as stored by the external message store
///
/// Created on send/receive and never mutated afterwards, except for
/// [`attach_metrics`](Self::attach_metrics) when metrics arrive late.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub thread_id: Uuid,
    pub id: Uuid,
    pub author: Author,
    pub text: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub structured: Option<AgentStructuredResponse>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub timestamp: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<MessageMetrics>,
}

impl ConversationMessage {
    fn new(thread_id: Uuid, author: Author, text: impl Into<String>) -> Self {
        Self {
            thread_id,
            id: Uuid::new_v4(),
            author,
            text: text.into(),
            structured: None,
            error: None,
            timestamp: Utc::now(),
            model_id: None,
            metrics: None,
        }
    }

    /// A message typed by the user
    pub fn user(thread_id: Uuid, text: impl Into<String>) -> Self {
        Self::new(thread_id, Author::User, text)
    }

    /// A successful agent reply; `text` mirrors the structured summary
    pub fn agent(
        thread_id: Uuid,
        response: AgentStructuredResponse,
        model_id: impl Into<String>,
    ) -> Self {
        let mut msg = Self::new(thread_id, Author::Agent, response.summary.clone());
        msg.structured = Some(response);
        msg.model_id = Some(model_id.into());
        msg
    }

    /// A failed agent turn carrying the user-visible error
    pub fn agent_error(thread_id: Uuid, error: impl Into<String>) -> Self {
        let error = error.into();
        let mut msg = Self::new(thread_id, Author::Agent, String::new());
        msg.error = Some(error);
        msg
    }

    /// Attach metrics that arrived after the message was created
    pub fn attach_metrics(&mut self, metrics: MessageMetrics) {
        self.metrics = Some(metrics);
    }

    /// Blank messages (and failed turns with no text) are not sent to the model
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    /// Convert to a completion message
    pub fn to_message(&self) -> Message {
        match self.author {
            Author::User => Message::user(self.text.clone()),
            Author::Agent => Message::assistant(self.text.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_creation() {
        let msg = Message::user("Hello");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.content, "Hello");
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let json = serde_json::to_string(&Message::system("x")).unwrap();
        assert!(json.contains(r#""role":"system""#));
    }

    #[test]
    fn test_agent_message_uses_summary() {
        let thread = Uuid::new_v4();
        let reply = AgentStructuredResponse::sanitized("Title", "  The answer ", 0.5);
        let msg = ConversationMessage::agent(thread, reply, "gpt-4o-mini");

        assert_eq!(msg.author, Author::Agent);
        assert_eq!(msg.text, "The answer");
        assert_eq!(msg.model_id.as_deref(), Some("gpt-4o-mini"));
        assert_eq!(msg.to_message().role, Role::Assistant);
    }

    #[test]
    fn test_attach_metrics() {
        let mut msg = ConversationMessage::user(Uuid::new_v4(), "hi");
        assert!(msg.metrics.is_none());

        msg.attach_metrics(MessageMetrics::new(
            420,
            Some(TokenUsage { prompt_tokens: 3, completion_tokens: 4, total_tokens: 7 }),
        ));
        let metrics = msg.metrics.unwrap();
        assert_eq!(metrics.duration_ms, 420);
        assert_eq!(metrics.total_tokens, Some(7));
    }

    #[test]
    fn test_error_message_is_blank() {
        let msg = ConversationMessage::agent_error(Uuid::new_v4(), "boom");
        assert!(msg.is_blank());
        assert_eq!(msg.error.as_deref(), Some("boom"));
    }
}
