//! OpenAI-compatible chat completions backend.
//!
//! Requests a JSON-object response, attaches the tool catalog when one is
//! available and runs the tool loop: at most one tool executes per model
//! turn, and after `max_tool_rounds` turns the tools are withheld so the
//! model has to answer.

use std::sync::Arc;
use std::time::{Duration, Instant};

use assistant_core::message::{Message, Role};
use assistant_core::provider::{
    BackendError, Completion, CompletionBackend, CompletionRequest, TokenUsage,
};
use assistant_core::tool::ToolProvider;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::config::CloudConfig;
use crate::http::{classify, error_for_status};
use crate::tool_calls::{function_definitions, parse_arguments, run_tool_call};

/// Model families that take `reasoning_effort` instead of `temperature`
const REASONING_MODEL_PREFIXES: &[&str] = &["o1", "o3", "o4", "gpt-5"];

pub fn is_reasoning_model(model: &str) -> bool {
    let model = model.trim().to_ascii_lowercase();
    let model = model.rsplit('/').next().unwrap_or(&model);
    REASONING_MODEL_PREFIXES
        .iter()
        .any(|prefix| model.starts_with(prefix))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireMessage {
    role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<WireToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

impl From<&Message> for WireMessage {
    fn from(message: &Message) -> Self {
        let role = match message.role {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        };
        Self {
            role: role.into(),
            content: Some(message.content.clone()),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireToolCall {
    id: String,
    #[serde(rename = "type", default = "function_type")]
    kind: String,
    function: WireFunction,
}

fn function_type() -> String {
    "function".into()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireFunction {
    name: String,
    #[serde(default)]
    arguments: Value,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: WireMessage,
}

#[derive(Debug, Clone, Copy, Deserialize)]
struct WireUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

impl From<WireUsage> for TokenUsage {
    fn from(u: WireUsage) -> Self {
        Self {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        }
    }
}

/// Cloud completion backend
pub struct CloudBackend {
    client: Client,
    config: CloudConfig,
    tools: Option<Arc<dyn ToolProvider>>,
}

impl CloudBackend {
    /// Build the HTTP client with distinct connect / request / read timeouts.
    pub fn new(config: CloudConfig) -> Result<Self, BackendError> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .read_timeout(config.socket_timeout)
            .build()
            .map_err(|e| BackendError::Transport(Box::new(e)))?;

        Ok(Self {
            client,
            config,
            tools: None,
        })
    }

    pub fn from_env() -> Result<Self, BackendError> {
        Self::new(CloudConfig::from_env())
    }

    /// Attach a tool catalog (usually the aggregator)
    #[must_use]
    pub fn with_tools(mut self, tools: Arc<dyn ToolProvider>) -> Self {
        self.tools = Some(tools);
        self
    }

    fn request_body(
        &self,
        request: &CompletionRequest,
        messages: &[WireMessage],
        functions: Option<&[Value]>,
    ) -> Value {
        let mut body = json!({
            "model": request.model,
            "messages": messages,
            "response_format": {"type": "json_object"},
        });

        if is_reasoning_model(&request.model) {
            if let Some(effort) = request.reasoning_effort {
                body["reasoning_effort"] = json!(effort.as_str());
            }
        } else {
            body["temperature"] = json!(request.temperature);
        }

        if let Some(functions) = functions {
            body["tools"] = json!(functions);
            body["parallel_tool_calls"] = json!(false);
        }

        body
    }

    async fn send(&self, api_key: &str, body: &Value) -> Result<ChatResponse, BackendError> {
        let url = format!("{}/chat/completions", self.config.base_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(body)
            .send()
            .await
            .map_err(classify)?;

        if !response.status().is_success() {
            return Err(error_for_status(response).await);
        }

        let body = response.text().await.map_err(classify)?;
        serde_json::from_str(&body).map_err(|e| BackendError::Decode(e.to_string()))
    }
}

#[async_trait]
impl CompletionBackend for CloudBackend {
    fn name(&self) -> &str {
        "openai"
    }

    fn is_configured(&self) -> bool {
        self.config.api_key.is_some()
    }

    async fn chat_completion(
        &self,
        request: &CompletionRequest,
    ) -> Result<Completion, BackendError> {
        let Some(api_key) = self.config.api_key.as_deref() else {
            return Err(BackendError::NotConfigured);
        };

        let mut network = Duration::ZERO;
        let catalog = self
            .tools
            .as_ref()
            .map(|t| t.tool_definitions())
            .unwrap_or_default();
        let functions = function_definitions(&catalog);

        let mut messages: Vec<WireMessage> = request.messages.iter().map(WireMessage::from).collect();
        let mut usage: Option<TokenUsage> = None;

        for round in 0..=self.config.max_tool_rounds {
            let offer_tools = !functions.is_empty() && round < self.config.max_tool_rounds;
            let body = self.request_body(request, &messages, offer_tools.then_some(functions.as_slice()));

            tracing::debug!(model = %request.model, round, tools = offer_tools, "cloud chat completion");
            let sent = Instant::now();
            let response = self.send(api_key, &body).await?;
            network += sent.elapsed();

            if let Some(u) = response.usage {
                let u = TokenUsage::from(u);
                usage = Some(usage.map_or(u, |acc| acc.add(u)));
            }
            let model_id = response.model.unwrap_or_else(|| request.model.clone());
            let message = response
                .choices
                .into_iter()
                .next()
                .map(|c| c.message)
                .ok_or(BackendError::NoContent)?;

            let first_call = message.tool_calls.into_iter().next();
            if let (Some(call), Some(tools)) = (first_call.filter(|_| offer_tools), &self.tools) {
                let arguments = parse_arguments(&call.function.arguments);
                let output = run_tool_call(tools.as_ref(), &call.function.name, &arguments).await;

                // Echo only the executed call so every call id gets a reply
                messages.push(WireMessage {
                    role: "assistant".into(),
                    content: message.content,
                    tool_calls: vec![call.clone()],
                    tool_call_id: None,
                });
                messages.push(WireMessage {
                    role: "tool".into(),
                    content: Some(output),
                    tool_calls: Vec::new(),
                    tool_call_id: Some(call.id),
                });
                continue;
            }

            let content = message
                .content
                .filter(|c| !c.trim().is_empty())
                .ok_or(BackendError::NoContent)?;

            return Ok(Completion {
                content,
                model_id,
                duration_ms: u64::try_from(network.as_millis()).unwrap_or(u64::MAX),
                usage,
            });
        }

        Err(BackendError::NoContent)
    }
}
