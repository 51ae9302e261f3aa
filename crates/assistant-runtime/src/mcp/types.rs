//! Wire types for the MCP stdio protocol and the HTTP proxy protocol.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use assistant_core::tool::{JsonObject, ToolDescriptor, ToolExecutionResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// MCP protocol revision sent in the `initialize` handshake
pub const MCP_PROTOCOL_VERSION: &str = "2024-11-05";

// ─── JSON-RPC 2.0 ───────────────────────────────────────────────────────────

/// JSON-RPC 2.0 request message.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcRequest<'a> {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl<'a> JsonRpcRequest<'a> {
    pub const fn new(id: u64, method: &'a str, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method,
            params,
        }
    }
}

/// JSON-RPC 2.0 notification (no id, no response)
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcNotification<'a> {
    pub jsonrpc: &'static str,
    pub method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

/// JSON-RPC 2.0 response message (success or error).
///
/// Lines without a numeric `id` (server notifications, log output) fail to
/// deserialize into this type and are skipped by the transport.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcResponse {
    pub id: u64,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<JsonRpcError>,
}

/// JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
}

// ─── MCP Protocol Types ──────────────────────────────────────────────────────

/// One entry of a `tools/list` result (also the proxy `/tools` element)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpToolDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, rename = "inputSchema", alias = "input_schema")]
    pub input_schema: Value,
}

impl From<McpToolDefinition> for ToolDescriptor {
    fn from(def: McpToolDefinition) -> Self {
        Self::new(def.name, def.description.unwrap_or_default(), def.input_schema)
    }
}

impl From<&ToolDescriptor> for McpToolDefinition {
    fn from(tool: &ToolDescriptor) -> Self {
        Self {
            name: tool.name.clone(),
            description: Some(tool.description.clone()).filter(|d| !d.is_empty()),
            input_schema: tool.input_schema.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ToolsListResult {
    #[serde(default)]
    pub tools: Vec<McpToolDefinition>,
}

/// Content block of a `tools/call` result; only text is rendered
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

/// `tools/call` result
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallToolResult {
    #[serde(default)]
    pub content: Vec<ContentBlock>,
    #[serde(default)]
    pub structured_content: Option<JsonObject>,
    #[serde(default)]
    pub is_error: bool,
}

impl CallToolResult {
    /// Normalize into a tool result whose text is never empty
    pub fn into_execution_result(self, tool_name: &str) -> ToolExecutionResult {
        let text = self
            .content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.trim()),
                ContentBlock::Other => None,
            })
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join("\n");

        let body = if text.is_empty() {
            self.structured_content
                .as_ref()
                .map(|structured| Value::Object(structured.clone()).to_string())
        } else {
            Some(text)
        };

        let failed = format!("Tool '{tool_name}' failed");
        let text = match body {
            Some(body) if self.is_error && !body.starts_with(&failed) => format!("{failed}: {body}"),
            Some(body) => body,
            None if self.is_error => format!("Tool '{tool_name}' reported an error."),
            None => format!("Tool '{tool_name}' returned no output."),
        };

        ToolExecutionResult {
            text,
            structured: self.structured_content,
        }
    }
}

// ─── Server Configuration ────────────────────────────────────────────────────

/// How to launch one script server
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,

    /// Script passed as the last argument; must exist or the server is
    /// treated as not installed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<PathBuf>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<PathBuf>,
}

/// Proxy configuration file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct McpServersConfig {
    pub servers: BTreeMap<String, ServerConfig>,
}

// ─── HTTP Proxy Protocol ─────────────────────────────────────────────────────

/// Body of `POST /mcp/{server}/tool/{toolName}`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemoteToolCallRequest {
    #[serde(default)]
    pub arguments: JsonObject,
}

/// Response of `POST /mcp/{server}/tool/{toolName}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteToolCallResponse {
    pub success: bool,
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured: Option<JsonObject>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RemoteToolCallResponse {
    pub fn failure(text: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            text: text.into(),
            structured: None,
            error: Some(error.into()),
        }
    }
}

impl From<ToolExecutionResult> for RemoteToolCallResponse {
    fn from(result: ToolExecutionResult) -> Self {
        Self {
            success: true,
            text: result.text,
            structured: result.structured,
            error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_request_serialization() {
        let req = JsonRpcRequest::new(7, "tools/list", None);
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json, json!({"jsonrpc": "2.0", "id": 7, "method": "tools/list"}));
    }

    #[test]
    fn test_notification_is_not_a_response() {
        let line = r#"{"jsonrpc":"2.0","method":"notifications/message","params":{}}"#;
        assert!(serde_json::from_str::<JsonRpcResponse>(line).is_err());
    }

    #[test]
    fn test_tool_definition_to_descriptor() {
        let def: McpToolDefinition = serde_json::from_value(json!({
            "name": "weather_current",
            "description": "Current conditions",
            "inputSchema": {
                "type": "object",
                "properties": {"city": {"type": "string"}},
                "required": ["city"]
            }
        }))
        .unwrap();
        let descriptor = ToolDescriptor::from(def);
        assert_eq!(descriptor.required, vec!["city".to_string()]);
    }

    #[test]
    fn test_call_result_text_blocks() {
        let result: CallToolResult = serde_json::from_value(json!({
            "content": [
                {"type": "text", "text": "Lisbon: 24°C"},
                {"type": "image", "data": "...", "mimeType": "image/png"},
                {"type": "text", "text": "sunny"}
            ]
        }))
        .unwrap();
        let normalized = result.into_execution_result("weather_current");
        assert_eq!(normalized.text, "Lisbon: 24°C\nsunny");
        assert!(normalized.structured.is_none());
    }

    #[test]
    fn test_call_result_structured_only() {
        let result: CallToolResult = serde_json::from_value(json!({
            "content": [],
            "structuredContent": {"tasks": []}
        }))
        .unwrap();
        let normalized = result.into_execution_result("reminder_list_tasks");
        assert_eq!(normalized.text, r#"{"tasks":[]}"#);
        assert!(normalized.structured.is_some());
    }

    #[test]
    fn test_call_result_error_flag() {
        let result: CallToolResult = serde_json::from_value(json!({
            "content": [{"type": "text", "text": "city not found"}],
            "isError": true
        }))
        .unwrap();
        let normalized = result.into_execution_result("weather_current");
        assert_eq!(normalized.text, "Tool 'weather_current' failed: city not found");
    }

    #[test]
    fn test_call_result_error_prefix_only_skipped_for_own_failure() {
        let quoted: CallToolResult = serde_json::from_value(json!({
            "content": [{"type": "text", "text": "Tool 'hammer' is a hammer"}],
            "isError": true
        }))
        .unwrap();
        assert_eq!(
            quoted.into_execution_result("weather_current").text,
            "Tool 'weather_current' failed: Tool 'hammer' is a hammer"
        );

        let already: CallToolResult = serde_json::from_value(json!({
            "content": [{"type": "text", "text": "Tool 'weather_current' failed: timeout"}],
            "isError": true
        }))
        .unwrap();
        assert_eq!(
            already.into_execution_result("weather_current").text,
            "Tool 'weather_current' failed: timeout"
        );

        let empty: CallToolResult = serde_json::from_value(json!({"isError": true})).unwrap();
        assert_eq!(
            empty.into_execution_result("weather_current").text,
            "Tool 'weather_current' reported an error."
        );
    }

    #[test]
    fn test_servers_config() {
        let config: McpServersConfig = serde_json::from_value(json!({
            "servers": {
                "support": {"command": "python3", "script": "mcp/support/server.py"},
                "docs": {"command": "uvx", "args": ["docs-mcp"], "env": {"DOCS_ROOT": "/srv/docs"}}
            }
        }))
        .unwrap();
        let names: Vec<&String> = config.servers.keys().collect();
        assert_eq!(names, vec!["docs", "support"]);
        assert_eq!(config.servers["docs"].env["DOCS_ROOT"], "/srv/docs");
    }
}
