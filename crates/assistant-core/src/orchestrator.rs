//! Agent Reply Orchestration
//!
//! Assembles history, system prompt and the fixed response-format contract,
//! hands the request to a [`CompletionBackend`], and threads the raw output
//! through the structured reply parser. Every failure comes back as a tagged
//! [`AgentError`].

use std::sync::Arc;

use uuid::Uuid;

use crate::error::{AgentError, Result};
use crate::message::{ConversationMessage, Message, MessageMetrics};
use crate::provider::{CompletionBackend, CompletionRequest, ReasoningEffort, TokenUsage};
use crate::reply::{AgentStructuredResponse, parse_structured_reply};

/// Response-format contract appended to every system prompt.
///
/// The reply parser depends on the model honoring this block; keep it verbatim.
pub const RESPONSE_FORMAT_INSTRUCTIONS: &str = r#"Response format:
Reply with exactly one JSON object and nothing else. Use this shape:
{"title": "<short title, at most 120 characters>", "answer": "<your full answer for the user>", "confidence": <number between 0 and 1>}
Do not use Markdown or code fences. Do not add extra fields and do not omit any field.
If you cannot answer, reply with {"error": "<error code>", "reason": "<short explanation>"}."#;

/// Default sampling temperature
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Successful reply plus the metrics the UI shows next to it
#[derive(Clone, Debug)]
pub struct AgentReply {
    pub response: AgentStructuredResponse,
    pub model_id: String,
    pub duration_ms: u64,
    pub usage: Option<TokenUsage>,
}

impl AgentReply {
    /// Build the agent-authored conversation message for this reply
    pub fn into_message(self, thread_id: Uuid) -> ConversationMessage {
        let metrics = MessageMetrics::new(self.duration_ms, self.usage);
        let mut msg = ConversationMessage::agent(thread_id, self.response, self.model_id);
        msg.attach_metrics(metrics);
        msg
    }
}

/// Top-level coordinator for one conversational turn
pub struct AgentReplyOrchestrator {
    backend: Arc<dyn CompletionBackend>,
}

impl AgentReplyOrchestrator {
    pub fn new(backend: Arc<dyn CompletionBackend>) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &Arc<dyn CompletionBackend> {
        &self.backend
    }

    /// Generate a structured reply for `history`.
    pub async fn generate_reply(
        &self,
        history: &[ConversationMessage],
        model: &str,
        temperature: f32,
        system_prompt: &str,
        reasoning_effort: Option<ReasoningEffort>,
    ) -> Result<AgentReply> {
        if !self.backend.is_configured() {
            tracing::warn!(backend = %self.backend.name(), "completion backend not configured");
            return Err(AgentError::NotConfigured);
        }

        let request = CompletionRequest::new(
            build_messages(history, system_prompt),
            model,
            clamp_temperature(temperature),
        )
        .with_reasoning_effort(reasoning_effort);

        tracing::debug!(
            backend = %self.backend.name(),
            model = %model,
            messages = request.messages.len(),
            "requesting agent reply"
        );

        let completion = self
            .backend
            .chat_completion(&request)
            .await
            .map_err(|e| {
                let err = AgentError::from(e);
                tracing::warn!(error = %err, "completion failed");
                err
            })?;

        let response = parse_structured_reply(&completion.content).map_err(|e| {
            tracing::warn!(error = %e, model = %completion.model_id, "unusable model reply");
            AgentError::from(e)
        })?;

        Ok(AgentReply {
            response,
            model_id: completion.model_id,
            duration_ms: completion.duration_ms,
            usage: completion.usage,
        })
    }
}

/// Exactly one system message first, then the non-blank history in order.
pub fn build_messages(history: &[ConversationMessage], system_prompt: &str) -> Vec<Message> {
    let system = if system_prompt.trim().is_empty() {
        RESPONSE_FORMAT_INSTRUCTIONS.to_string()
    } else {
        format!("{}\n\n{RESPONSE_FORMAT_INSTRUCTIONS}", system_prompt.trim_end())
    };

    std::iter::once(Message::system(system))
        .chain(
            history
                .iter()
                .filter(|m| !m.is_blank())
                .map(ConversationMessage::to_message),
        )
        .collect()
}

fn clamp_temperature(temperature: f32) -> f32 {
    if temperature.is_nan() {
        DEFAULT_TEMPERATURE
    } else {
        temperature.clamp(0.0, 2.0)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::message::Role;
    use crate::provider::{BackendError, Completion};

    /// Backend that returns canned results and records requests
    struct ScriptedBackend {
        configured: bool,
        reply: Mutex<Option<std::result::Result<String, BackendError>>>,
        seen: Mutex<Vec<CompletionRequest>>,
    }

    impl ScriptedBackend {
        fn replying(content: &str) -> Arc<Self> {
            Arc::new(Self {
                configured: true,
                reply: Mutex::new(Some(Ok(content.to_string()))),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn failing(err: BackendError) -> Arc<Self> {
            Arc::new(Self {
                configured: true,
                reply: Mutex::new(Some(Err(err))),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl CompletionBackend for ScriptedBackend {
        fn name(&self) -> &str {
            "scripted"
        }

        fn is_configured(&self) -> bool {
            self.configured
        }

        async fn chat_completion(
            &self,
            request: &CompletionRequest,
        ) -> std::result::Result<Completion, BackendError> {
            self.seen.lock().unwrap().push(request.clone());
            let content = self.reply.lock().unwrap().take().unwrap_or(Err(BackendError::NoContent))?;
            Ok(Completion {
                content,
                model_id: request.model.clone(),
                duration_ms: 12,
                usage: Some(TokenUsage { prompt_tokens: 5, completion_tokens: 7, total_tokens: 12 }),
            })
        }
    }

    fn history() -> Vec<ConversationMessage> {
        let thread = Uuid::new_v4();
        vec![
            ConversationMessage::user(thread, "What's the weather?"),
            ConversationMessage::agent_error(thread, "timed out"),
            ConversationMessage::user(thread, "   "),
            ConversationMessage::user(thread, "In Lisbon please"),
        ]
    }

    #[tokio::test]
    async fn test_generate_reply_success() {
        let backend = ScriptedBackend::replying(
            "```json\n{\"title\":\"Weather\",\"answer\":\"Sunny, 24°C\",\"confidence\":0.9}\n```",
        );
        let orchestrator = AgentReplyOrchestrator::new(backend.clone());

        let reply = orchestrator
            .generate_reply(&history(), "gpt-4o-mini", 3.5, "You are helpful.", None)
            .await
            .unwrap();

        assert_eq!(reply.response.title, "Weather");
        assert_eq!(reply.response.summary, "Sunny, 24°C");
        assert_eq!(reply.model_id, "gpt-4o-mini");

        let seen = backend.seen.lock().unwrap();
        let request = &seen[0];
        assert!((request.temperature - 2.0).abs() < f32::EPSILON);
        assert_eq!(request.messages.len(), 3);
        assert_eq!(
            request.messages.iter().filter(|m| m.role == Role::System).count(),
            1
        );
        assert!(request.messages[0].content.starts_with("You are helpful."));
        assert!(request.messages[0].content.ends_with(RESPONSE_FORMAT_INSTRUCTIONS));
        assert_eq!(request.messages[2].content, "In Lisbon please");
    }

    #[tokio::test]
    async fn test_agent_reported_error() {
        let backend =
            ScriptedBackend::replying(r#"{"error":"bad_request","reason":"missing field"}"#);
        let orchestrator = AgentReplyOrchestrator::new(backend);

        let err = orchestrator
            .generate_reply(&history(), "gpt-4o-mini", 0.2, "", None)
            .await
            .unwrap_err();

        assert!(matches!(err, AgentError::AgentReported(_)));
        assert_eq!(err.to_string(), "missing field");
    }

    #[tokio::test]
    async fn test_not_configured_short_circuits() {
        let backend = Arc::new(ScriptedBackend {
            configured: false,
            reply: Mutex::new(None),
            seen: Mutex::new(Vec::new()),
        });
        let orchestrator = AgentReplyOrchestrator::new(backend.clone());

        let err = orchestrator
            .generate_reply(&history(), "gpt-4o-mini", 0.7, "", None)
            .await
            .unwrap_err();

        assert!(matches!(err, AgentError::NotConfigured));
        assert!(backend.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_wrapped_timeout_is_classified() {
        let io = std::io::Error::new(std::io::ErrorKind::TimedOut, "read timed out");
        let backend = ScriptedBackend::failing(BackendError::Transport(Box::new(io)));
        let orchestrator = AgentReplyOrchestrator::new(backend);

        let err = orchestrator
            .generate_reply(&history(), "m", 0.7, "", None)
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Timeout(_)), "{err:?}");
    }

    #[tokio::test]
    async fn test_rate_limit_is_classified() {
        let backend = ScriptedBackend::failing(BackendError::RateLimited {
            message: "Rate limit reached".into(),
            code: Some("rate_limit_exceeded".into()),
            error_type: None,
        });
        let orchestrator = AgentReplyOrchestrator::new(backend);

        let err = orchestrator
            .generate_reply(&history(), "m", 0.7, "", None)
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::RateLimited { .. }));
    }

    #[tokio::test]
    async fn test_invalid_json_fails_turn() {
        let backend = ScriptedBackend::replying("I think it will rain.");
        let orchestrator = AgentReplyOrchestrator::new(backend);

        let err = orchestrator
            .generate_reply(&history(), "m", 0.7, "", None)
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::InvalidJson(_)));
    }

    #[test]
    fn test_into_message_attaches_metrics() {
        let reply = AgentReply {
            response: AgentStructuredResponse::sanitized("t", "s", 0.5),
            model_id: "m".into(),
            duration_ms: 99,
            usage: None,
        };
        let msg = reply.into_message(Uuid::new_v4());
        assert_eq!(msg.metrics.unwrap().duration_ms, 99);
        assert_eq!(msg.text, "s");
    }
}
