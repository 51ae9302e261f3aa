//! Ollama Completion Backend
//!
//! Implementation of `CompletionBackend` for local Ollama inference over
//! `POST /api/chat`. The server may answer with one JSON object or an NDJSON
//! stream; both are reassembled into a single completion.

use std::sync::Arc;
use std::time::{Duration, Instant};

use assistant_core::message::{Message, Role};
use assistant_core::provider::{
    BackendError, Completion, CompletionBackend, CompletionRequest, TokenUsage,
};
use assistant_core::tool::ToolProvider;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::config::OllamaConfig;
use crate::http::{classify, error_for_status};
use crate::tool_calls::{function_definitions, parse_arguments, run_tool_call};

const MAX_TOOL_ROUNDS: usize = 4;

/// Sampling options forwarded as Ollama `options`
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct LocalTuning {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_ctx: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_predict: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repeat_penalty: Option<f32>,

    /// Overridden by the per-request temperature
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    #[serde(default)]
    content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<ToolCall>,
}

impl ChatMessage {
    fn new(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ToolCall {
    function: ToolCallFunction,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ToolCallFunction {
    name: String,
    #[serde(default)]
    arguments: Value,
}

/// One response object (or one NDJSON line)
#[derive(Debug, Default, Deserialize)]
struct ChatChunk {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    message: Option<ChatMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
    #[serde(default)]
    error: Option<String>,
}

/// A reply reassembled from one or more chunks
#[derive(Debug, Default)]
struct Assembled {
    model: Option<String>,
    content: String,
    tool_calls: Vec<ToolCall>,
    usage: Option<TokenUsage>,
}

impl Assembled {
    fn push(&mut self, chunk: ChatChunk) -> Result<(), BackendError> {
        if let Some(error) = chunk.error {
            return Err(BackendError::Decode(error));
        }
        if chunk.model.is_some() {
            self.model = chunk.model;
        }
        if let Some(message) = chunk.message {
            self.content.push_str(&message.content);
            self.tool_calls.extend(message.tool_calls);
        }
        if chunk.done || chunk.prompt_eval_count.is_some() || chunk.eval_count.is_some() {
            let prompt = chunk.prompt_eval_count.unwrap_or(0);
            let completion = chunk.eval_count.unwrap_or(0);
            if prompt > 0 || completion > 0 {
                self.usage = Some(TokenUsage {
                    prompt_tokens: prompt,
                    completion_tokens: completion,
                    total_tokens: prompt.saturating_add(completion),
                });
            }
        }
        Ok(())
    }

    fn push_line(&mut self, line: &str) -> Result<(), BackendError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(());
        }
        let chunk: ChatChunk = serde_json::from_str(line)
            .map_err(|e| BackendError::Decode(format!("bad response line: {e}")))?;
        self.push(chunk)
    }
}

/// Local Ollama completion backend
pub struct LocalBackend {
    client: Client,
    config: OllamaConfig,
    tools: Option<Arc<dyn ToolProvider>>,
}

impl LocalBackend {
    /// Create a new backend with custom host/port
    pub fn new(host: impl Into<String>, port: u16) -> Result<Self, BackendError> {
        Self::from_config(OllamaConfig {
            host: host.into(),
            port,
            ..OllamaConfig::default()
        })
    }

    /// Create from configuration
    pub fn from_config(config: OllamaConfig) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| BackendError::Transport(Box::new(e)))?;

        Ok(Self {
            client,
            config,
            tools: None,
        })
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self, BackendError> {
        Self::from_config(OllamaConfig::from_env())
    }

    /// Create with default localhost settings
    pub fn localhost() -> Result<Self, BackendError> {
        Self::from_config(OllamaConfig::default())
    }

    #[must_use]
    pub fn with_tools(mut self, tools: Arc<dyn ToolProvider>) -> Self {
        self.tools = Some(tools);
        self
    }

    pub const fn config(&self) -> &OllamaConfig {
        &self.config
    }

    /// Convert conversation messages to Ollama format
    fn convert_messages(messages: &[Message]) -> Vec<ChatMessage> {
        messages
            .iter()
            .map(|m| {
                let role = match m.role {
                    Role::System => "system",
                    Role::User => "user",
                    Role::Assistant => "assistant",
                };
                ChatMessage::new(role, m.content.clone())
            })
            .collect()
    }

    fn options(&self, request: &CompletionRequest) -> LocalTuning {
        LocalTuning {
            temperature: Some(request.temperature),
            ..self.config.tuning.clone()
        }
    }

    async fn round_trip(&self, body: &Value) -> Result<Assembled, BackendError> {
        let url = format!("{}/api/chat", self.config.base_url());
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(classify)?;

        if !response.status().is_success() {
            return Err(error_for_status(response).await);
        }

        // Lines may be split across network chunks
        let mut assembled = Assembled::default();
        let mut pending: Vec<u8> = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(bytes) = stream.next().await {
            pending.extend_from_slice(&bytes.map_err(classify)?);
            while let Some(pos) = pending.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = pending.drain(..=pos).collect();
                assembled.push_line(&String::from_utf8_lossy(&line))?;
            }
        }
        assembled.push_line(&String::from_utf8_lossy(&pending))?;

        Ok(assembled)
    }
}

#[async_trait]
impl CompletionBackend for LocalBackend {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn chat_completion(
        &self,
        request: &CompletionRequest,
    ) -> Result<Completion, BackendError> {
        let mut network = Duration::ZERO;
        let catalog = self
            .tools
            .as_ref()
            .map(|t| t.tool_definitions())
            .unwrap_or_default();
        let functions = function_definitions(&catalog);

        let mut messages = Self::convert_messages(&request.messages);
        let mut usage: Option<TokenUsage> = None;

        for round in 0..=MAX_TOOL_ROUNDS {
            let offer_tools = !functions.is_empty() && round < MAX_TOOL_ROUNDS;
            let mut body = json!({
                "model": request.model,
                "messages": messages,
                "format": "json",
                "stream": true,
                "options": self.options(request),
            });
            if offer_tools {
                body["tools"] = json!(functions);
            }

            tracing::debug!(model = %request.model, round, tools = offer_tools, "ollama chat");
            let sent = Instant::now();
            let reply = self.round_trip(&body).await?;
            network += sent.elapsed();
            if let Some(u) = reply.usage {
                usage = Some(usage.map_or(u, |acc| acc.add(u)));
            }

            let first_call = reply.tool_calls.into_iter().next();
            if let (Some(call), Some(tools)) = (first_call.filter(|_| offer_tools), &self.tools) {
                let arguments = parse_arguments(&call.function.arguments);
                let output = run_tool_call(tools.as_ref(), &call.function.name, &arguments).await;

                messages.push(ChatMessage {
                    role: "assistant".into(),
                    content: reply.content,
                    tool_calls: vec![call],
                });
                messages.push(ChatMessage::new("tool", output));
                continue;
            }

            if reply.content.trim().is_empty() {
                return Err(BackendError::NoContent);
            }

            return Ok(Completion {
                content: reply.content,
                model_id: reply.model.unwrap_or_else(|| request.model.clone()),
                duration_ms: u64::try_from(network.as_millis()).unwrap_or(u64::MAX),
                usage,
            });
        }

        Err(BackendError::NoContent)
    }
}
