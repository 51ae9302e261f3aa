//! MCP servers reached through the HTTP proxy.

use std::sync::OnceLock;
use std::time::Duration;

use assistant_core::tool::{JsonObject, ToolDescriptor, ToolExecutionResult, ToolProvider};
use async_trait::async_trait;
use reqwest::Client;

use super::errors::ToolError;
use super::types::{McpToolDefinition, RemoteToolCallRequest, RemoteToolCallResponse};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Tool provider for one server hosted by the proxy
pub struct HttpToolProvider {
    client: Client,
    base_url: String,
    server: String,
    tools: OnceLock<Vec<ToolDescriptor>>,
}

impl HttpToolProvider {
    pub fn new(base_url: impl Into<String>, server: impl Into<String>) -> Self {
        Self::with_timeout(base_url, server, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: impl Into<String>, server: impl Into<String>, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "falling back to default HTTP client");
                Client::new()
            });
        Self::with_client(client, base_url, server)
    }

    pub fn with_client(client: Client, base_url: impl Into<String>, server: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            server: server.into(),
            tools: OnceLock::new(),
        }
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    async fn fetch_tools(&self) -> Result<Vec<ToolDescriptor>, ToolError> {
        let url = format!("{}/mcp/{}/tools", self.base_url, self.server);
        let response = self.client.get(&url).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ToolError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let defs: Vec<McpToolDefinition> = response
            .json()
            .await
            .map_err(|e| ToolError::Decode(e.to_string()))?;
        Ok(defs.into_iter().map(ToolDescriptor::from).collect())
    }

    async fn call(&self, tool_name: &str, arguments: &JsonObject) -> Result<ToolExecutionResult, ToolError> {
        let url = format!("{}/mcp/{}/tool/{tool_name}", self.base_url, self.server);
        let response = self
            .client
            .post(&url)
            .json(&RemoteToolCallRequest {
                arguments: arguments.clone(),
            })
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        let parsed = serde_json::from_str::<RemoteToolCallResponse>(&body);

        match parsed {
            Ok(reply) if reply.success => Ok(ToolExecutionResult {
                text: if reply.text.trim().is_empty() {
                    format!("Tool '{tool_name}' returned no output.")
                } else {
                    reply.text
                },
                structured: reply.structured,
            }),
            // The proxy reports tool failures in-band; surface its wording
            Ok(reply) => {
                let detail = reply.error.filter(|e| !e.is_empty()).unwrap_or(reply.text);
                Ok(ToolExecutionResult::text(format!("Tool '{tool_name}' failed: {detail}")))
            }
            Err(_) if !status.is_success() => Err(ToolError::Status {
                status: status.as_u16(),
                body,
            }),
            Err(e) => Err(ToolError::Decode(e.to_string())),
        }
    }
}

#[async_trait]
impl ToolProvider for HttpToolProvider {
    fn tool_definitions(&self) -> Vec<ToolDescriptor> {
        self.tools.get().cloned().unwrap_or_default()
    }

    async fn execute(&self, tool_name: &str, arguments: &JsonObject) -> Option<ToolExecutionResult> {
        if !self.has_tool(tool_name) {
            return None;
        }

        Some(self.call(tool_name, arguments).await.unwrap_or_else(|e| {
            tracing::warn!(server = %self.server, tool = %tool_name, error = %e, "remote tool call failed");
            ToolExecutionResult::text(format!("Tool '{tool_name}' failed: {e}"))
        }))
    }

    async fn initialize(&self) {
        if self.tools.get().is_some() {
            return;
        }
        match self.fetch_tools().await {
            Ok(tools) => {
                tracing::info!(server = %self.server, tools = tools.len(), "remote MCP tools loaded");
                if self.tools.set(tools).is_err() {
                    tracing::debug!(server = %self.server, "catalog already loaded, keeping it");
                }
            }
            Err(e) => {
                tracing::warn!(server = %self.server, error = %e, "remote MCP server unavailable");
            }
        }
    }

    fn unavailable_message(&self) -> Option<String> {
        if self.tools.get().is_some() {
            return None;
        }
        Some(format!(
            "The {} tool server could not be reached at {}.",
            self.server, self.base_url
        ))
    }
}
