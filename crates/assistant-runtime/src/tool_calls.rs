//! Tool-calling helpers shared by the cloud and local backends.
//!
//! Both backends offer the aggregator catalog as function definitions and
//! execute only the first tool call of a model turn.

use assistant_core::tool::{JsonObject, ToolDescriptor, ToolProvider};
use serde_json::{Value, json};

/// Function definitions in the shape both chat APIs accept
pub(crate) fn function_definitions(catalog: &[ToolDescriptor]) -> Vec<Value> {
    catalog
        .iter()
        .map(|tool| {
            json!({
                "type": "function",
                "function": {
                    "name": tool.name,
                    "description": tool.description,
                    "parameters": tool.input_schema,
                }
            })
        })
        .collect()
}

/// Arguments arrive as a JSON-encoded string (cloud) or an object (local)
pub(crate) fn parse_arguments(raw: &Value) -> JsonObject {
    match raw {
        Value::Object(map) => map.clone(),
        Value::String(s) if s.trim().is_empty() => JsonObject::new(),
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(Value::Object(map)) => map,
            _ => {
                tracing::warn!(arguments = %s, "tool arguments are not a JSON object");
                JsonObject::new()
            }
        },
        _ => JsonObject::new(),
    }
}

/// Execute one call and render its result as the tool message content
pub(crate) async fn run_tool_call(tools: &dyn ToolProvider, name: &str, arguments: &JsonObject) -> String {
    tracing::info!(tool = %name, "model requested tool");
    match tools.execute(name, arguments).await {
        Some(result) => match result.structured {
            Some(structured) => format!("{}\n\n{}", result.text, Value::Object(structured)),
            None => result.text,
        },
        None => format!("Tool '{name}' is not available."),
    }
}
