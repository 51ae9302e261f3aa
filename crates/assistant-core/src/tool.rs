//! Tool System
//!
//! A [`ToolProvider`] wraps one tool backend (a script server, a remote
//! proxy, or in-process [`Tool`]s) and exposes its catalog plus
//! execute-by-name. Providers never fail loudly: a broken backend degrades
//! into an explanatory [`ToolExecutionResult`].

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::error::{AgentError, Result};

/// JSON object used for tool arguments and structured payloads
pub type JsonObject = Map<String, Value>;

/// Tool definition as shown to the model
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Unique within its provider
    pub name: String,

    /// Human-readable description (shown to LLM)
    #[serde(default)]
    pub description: String,

    /// JSON-schema-like argument description
    #[serde(default = "empty_object_schema", alias = "inputSchema")]
    pub input_schema: Value,

    /// Names of required arguments
    #[serde(default)]
    pub required: Vec<String>,
}

fn empty_object_schema() -> Value {
    json!({"type": "object", "properties": {}})
}

impl ToolDescriptor {
    /// Build a descriptor, reading required names from the schema's `required` array.
    pub fn new(name: impl Into<String>, description: impl Into<String>, input_schema: Value) -> Self {
        let required = input_schema
            .get("required")
            .and_then(Value::as_array)
            .map(|names| {
                names
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let input_schema = if input_schema.is_object() {
            input_schema
        } else {
            empty_object_schema()
        };

        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
            required,
        }
    }
}

/// Result of executing a tool
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolExecutionResult {
    /// Always human-readable; never empty on success
    pub text: String,

    /// Machine-readable payload (e.g. a created ticket)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured: Option<JsonObject>,
}

impl ToolExecutionResult {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            structured: None,
        }
    }

    #[must_use]
    pub fn with_structured(mut self, structured: JsonObject) -> Self {
        self.structured = Some(structured);
        self
    }
}

/// Capability interface shared by every tool backend
#[async_trait]
pub trait ToolProvider: Send + Sync {
    /// Read-only snapshot of the catalog; empty when the backend is unreachable
    fn tool_definitions(&self) -> Vec<ToolDescriptor>;

    /// Execute a tool by name.
    ///
    /// Returns `None` only when this provider does not know `tool_name`.
    /// Failures are reported through the result text.
    async fn execute(&self, tool_name: &str, arguments: &JsonObject) -> Option<ToolExecutionResult>;

    /// One-time async setup (catalog fetch). Must not fail loudly.
    async fn initialize(&self) {}

    /// Whether the catalog contains `tool_name`
    fn has_tool(&self, tool_name: &str) -> bool {
        self.tool_definitions().iter().any(|t| t.name == tool_name)
    }

    /// Explanation to show instead of a result while the backend is missing
    /// or unreachable. `None` means the catalog can be trusted.
    fn unavailable_message(&self) -> Option<String> {
        None
    }
}

/// In-process tool - implement to add new capabilities without a server
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the tool's descriptor for LLM function calling
    fn schema(&self) -> ToolDescriptor;

    /// Execute the tool with given arguments
    async fn execute(&self, arguments: &JsonObject) -> Result<ToolExecutionResult>;

    /// Validate arguments before execution
    fn validate(&self, arguments: &JsonObject) -> Result<()> {
        let schema = self.schema();

        for name in &schema.required {
            if !arguments.contains_key(name) {
                return Err(AgentError::Other(format!(
                    "Missing required parameter: {name}"
                )));
            }
        }

        Ok(())
    }
}

/// Provider backed by in-process [`Tool`]s
pub struct LocalToolProvider {
    tools: Vec<Arc<dyn Tool>>,
    by_name: HashMap<String, usize>,
}

impl Default for LocalToolProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalToolProvider {
    pub fn new() -> Self {
        Self {
            tools: Vec::new(),
            by_name: HashMap::new(),
        }
    }

    /// Register a new tool
    #[must_use]
    pub fn with_tool<T: Tool + 'static>(mut self, tool: T) -> Self {
        self.register(Arc::new(tool));
        self
    }

    /// Register a shared tool; a later tool with the same name replaces the earlier one
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.schema().name;
        if let Some(&idx) = self.by_name.get(&name) {
            self.tools[idx] = tool;
        } else {
            self.by_name.insert(name, self.tools.len());
            self.tools.push(tool);
        }
    }

    /// Number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[async_trait]
impl ToolProvider for LocalToolProvider {
    fn tool_definitions(&self) -> Vec<ToolDescriptor> {
        self.tools.iter().map(|t| t.schema()).collect()
    }

    async fn execute(&self, tool_name: &str, arguments: &JsonObject) -> Option<ToolExecutionResult> {
        let tool = self.tools.get(*self.by_name.get(tool_name)?)?;

        let outcome = match tool.validate(arguments) {
            Ok(()) => tool.execute(arguments).await,
            Err(e) => Err(e),
        };

        Some(outcome.unwrap_or_else(|e| {
            tracing::warn!(tool = %tool_name, error = %e, "in-process tool failed");
            ToolExecutionResult::text(format!("Tool '{tool_name}' failed: {e}"))
        }))
    }
}

// ============================================================================
// Built-in Tools
// ============================================================================

/// DateTime tool - returns current time so the model can reason about "today"
pub struct DateTimeTool;

#[async_trait]
impl Tool for DateTimeTool {
    fn schema(&self) -> ToolDescriptor {
        ToolDescriptor::new(
            "current_datetime",
            "Get the current date and time",
            json!({
                "type": "object",
                "properties": {
                    "format": {
                        "type": "string",
                        "description": "Output format: 'iso', 'human', or 'unix'",
                        "enum": ["iso", "human", "unix"],
                        "default": "human"
                    }
                }
            }),
        )
    }

    async fn execute(&self, arguments: &JsonObject) -> Result<ToolExecutionResult> {
        let format = arguments
            .get("format")
            .and_then(Value::as_str)
            .unwrap_or("human");

        let now = chrono::Utc::now();

        let output = match format {
            "iso" => now.to_rfc3339(),
            "unix" => now.timestamp().to_string(),
            _ => now.format("%A, %B %d, %Y at %H:%M:%S UTC").to_string(),
        };

        let mut structured = JsonObject::new();
        structured.insert("iso".into(), Value::String(now.to_rfc3339()));
        structured.insert("unix".into(), json!(now.timestamp()));

        Ok(ToolExecutionResult::text(output).with_structured(structured))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn schema(&self) -> ToolDescriptor {
            ToolDescriptor::new(
                "echo",
                "Echo the message back",
                json!({
                    "type": "object",
                    "properties": {"message": {"type": "string"}},
                    "required": ["message"]
                }),
            )
        }

        async fn execute(&self, arguments: &JsonObject) -> Result<ToolExecutionResult> {
            let message = arguments
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or_default();
            Ok(ToolExecutionResult::text(message))
        }
    }

    #[test]
    fn test_descriptor_reads_required() {
        let descriptor = EchoTool.schema();
        assert_eq!(descriptor.required, vec!["message".to_string()]);
    }

    #[test]
    fn test_descriptor_accepts_input_schema_alias() {
        let descriptor: ToolDescriptor = serde_json::from_value(json!({
            "name": "get_weather",
            "inputSchema": {"type": "object", "properties": {"city": {"type": "string"}}}
        }))
        .unwrap();
        assert_eq!(descriptor.name, "get_weather");
        assert!(descriptor.input_schema["properties"]["city"].is_object());
        assert!(descriptor.description.is_empty());
    }

    #[test]
    fn test_structured_round_trip() {
        let structured: JsonObject = serde_json::from_value(json!({
            "ticket": {"id": 42, "subject": "Printer on fire", "tags": ["urgent", "hardware"]},
            "created": true
        }))
        .unwrap();
        let result = ToolExecutionResult::text("Created ticket #42").with_structured(structured);

        let encoded = serde_json::to_string(&result).unwrap();
        let decoded: ToolExecutionResult = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, result);
        assert_eq!(decoded.structured.unwrap()["ticket"]["tags"][1], "hardware");
    }

    #[tokio::test]
    async fn test_local_provider_executes() {
        let provider = LocalToolProvider::new().with_tool(EchoTool).with_tool(DateTimeTool);
        assert_eq!(provider.len(), 2);
        assert!(provider.has_tool("echo"));

        let mut args = JsonObject::new();
        args.insert("message".into(), json!("hi"));
        let result = provider.execute("echo", &args).await.unwrap();
        assert_eq!(result.text, "hi");
    }

    #[tokio::test]
    async fn test_local_provider_unknown_and_invalid() {
        let provider = LocalToolProvider::new().with_tool(EchoTool);

        assert!(provider.execute("nope", &JsonObject::new()).await.is_none());

        let result = provider.execute("echo", &JsonObject::new()).await.unwrap();
        assert!(result.text.contains("Missing required parameter: message"));
    }

    #[tokio::test]
    async fn test_datetime_unix_format() {
        let mut args = JsonObject::new();
        args.insert("format".into(), json!("unix"));
        let result = DateTimeTool.execute(&args).await.unwrap();
        assert!(result.text.parse::<i64>().is_ok());
        assert!(result.structured.is_some());
    }
}
