//! Structured Reply Parsing
//!
//! Turns raw model output into an [`AgentStructuredResponse`]. The model is
//! asked for `{"title", "answer", "confidence"}` but real output arrives
//! wrapped in code fences, with string-encoded numbers, out-of-range
//! confidences or an explicit `{"error": ...}` object. Parsing is pure so it
//! can be exercised without a model.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Maximum title length, in characters
pub const MAX_TITLE_CHARS: usize = 120;

/// The reply contract every conversational turn must satisfy
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AgentStructuredResponse {
    pub title: String,
    pub summary: String,
    pub confidence: f64,
}

impl AgentStructuredResponse {
    /// Build a response with every field sanitized
    pub fn sanitized(title: impl Into<String>, summary: impl Into<String>, confidence: f64) -> Self {
        let title: String = title.into();
        Self {
            title: truncate_chars(&title, MAX_TITLE_CHARS),
            summary: summary.into().trim().to_string(),
            confidence: clamp_confidence(confidence),
        }
    }
}

/// Reasons a model reply could not be turned into a structured response
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReplyParseError {
    #[error("invalid JSON: {0}")]
    InvalidJson(String),

    /// The model itself reported a failure
    #[error("{0}")]
    AgentReported(String),

    #[error("expected a JSON object")]
    NotAnObject,
}

/// Parse raw model output into a sanitized structured response.
pub fn parse_structured_reply(raw: &str) -> Result<AgentStructuredResponse, ReplyParseError> {
    let body = strip_code_fence(raw);

    let value: Value =
        serde_json::from_str(body).map_err(|e| ReplyParseError::InvalidJson(e.to_string()))?;

    let Value::Object(obj) = value else {
        return Err(ReplyParseError::NotAnObject);
    };

    if let Some(error) = obj.get("error") {
        return Err(ReplyParseError::AgentReported(error_reason(&obj, error)));
    }

    let title = string_field(&obj, "title").unwrap_or_default();
    let summary = string_field(&obj, "summary")
        .or_else(|| string_field(&obj, "answer"))
        .unwrap_or_default();
    let confidence = obj.get("confidence").map_or(0.0, number_value);

    Ok(AgentStructuredResponse::sanitized(title, summary, confidence))
}

/// Remove a surrounding Markdown code fence, if any.
///
/// The opening fence may carry a language tag (```` ```json ````).
pub fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    // Drop the rest of the opening line (language tag)
    let rest = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric()),
    };

    rest.trim_end()
        .strip_suffix("```")
        .unwrap_or(rest)
        .trim()
}

/// Clamp into [0, 1]. NaN and -inf become 0, +inf becomes 1.
pub fn clamp_confidence(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

fn string_field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    match obj.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

fn number_value(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => parse_lenient_f64(s).unwrap_or(0.0),
        _ => 0.0,
    }
}

fn parse_lenient_f64(s: &str) -> Option<f64> {
    let s = s.trim();
    match s.to_ascii_lowercase().as_str() {
        "infinity" | "+infinity" => Some(f64::INFINITY),
        "-infinity" => Some(f64::NEG_INFINITY),
        _ => s.parse().ok(),
    }
}

fn error_reason(obj: &Map<String, Value>, error: &Value) -> String {
    let non_empty = |key: &str| {
        obj.get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    non_empty("reason")
        .or_else(|| non_empty("message"))
        .unwrap_or_else(|| match error {
            Value::String(s) => s.clone(),
            Value::Object(inner) => inner
                .get("message")
                .and_then(Value::as_str)
                .map_or_else(|| error.to_string(), str::to_string),
            other => other.to_string(),
        })
}
