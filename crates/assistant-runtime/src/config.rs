//! Environment configuration
//!
//! Every section has a `from_env()` constructor and a `from_lookup()` variant
//! taking any `Fn(&str) -> Option<String>`, so tests can feed a map instead
//! of mutating the process environment.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::mcp::script::ScriptServerConfig;
use crate::mcp::types::ServerConfig;
use crate::ollama::LocalTuning;

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_SUPPORT_MCP_URL: &str = "http://localhost:8765";

fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn non_empty<L: Fn(&str) -> Option<String>>(lookup: &L, key: &str) -> Option<String> {
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse a variable, falling back when it is absent or malformed
fn parsed<L, T>(lookup: &L, key: &str) -> Option<T>
where
    L: Fn(&str) -> Option<String>,
    T: FromStr,
{
    let raw = non_empty(lookup, key)?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(var = %key, value = %raw, "ignoring malformed environment variable");
            None
        }
    }
}

fn secs<L: Fn(&str) -> Option<String>>(lookup: &L, key: &str, default: u64) -> Duration {
    Duration::from_secs(parsed(lookup, key).unwrap_or(default))
}

/// OpenAI-compatible cloud backend settings
#[derive(Clone)]
pub struct CloudConfig {
    /// Absent key means the backend reports itself as not configured
    pub api_key: Option<String>,
    pub base_url: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub socket_timeout: Duration,

    /// Model turns allowed to request tools before tools are withheld
    pub max_tool_rounds: usize,
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_OPENAI_BASE_URL.into(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(60),
            socket_timeout: Duration::from_secs(60),
            max_tool_rounds: 4,
        }
    }
}

impl fmt::Debug for CloudConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloudConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("connect_timeout", &self.connect_timeout)
            .field("request_timeout", &self.request_timeout)
            .field("socket_timeout", &self.socket_timeout)
            .field("max_tool_rounds", &self.max_tool_rounds)
            .finish()
    }
}

impl CloudConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup<L: Fn(&str) -> Option<String>>(lookup: L) -> Self {
        Self {
            api_key: non_empty(&lookup, "OPENAI_API_KEY"),
            base_url: non_empty(&lookup, "OPENAI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.into())
                .trim_end_matches('/')
                .to_string(),
            connect_timeout: secs(&lookup, "OPENAI_CONNECT_TIMEOUT_SECS", 10),
            request_timeout: secs(&lookup, "OPENAI_REQUEST_TIMEOUT_SECS", 60),
            socket_timeout: secs(&lookup, "OPENAI_SOCKET_TIMEOUT_SECS", 60),
            ..Self::default()
        }
    }
}

/// Ollama server settings
#[derive(Clone, Debug)]
pub struct OllamaConfig {
    /// Ollama host URL
    pub host: String,

    /// Ollama port
    pub port: u16,

    /// Whole-request timeout in seconds
    pub timeout_secs: u64,

    /// Sampling options sent with every request
    pub tuning: LocalTuning,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: "http://localhost".into(),
            port: 11434,
            timeout_secs: 120,
            tuning: LocalTuning::default(),
        }
    }
}

impl OllamaConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup<L: Fn(&str) -> Option<String>>(lookup: L) -> Self {
        let defaults = Self::default();
        Self {
            host: non_empty(&lookup, "OLLAMA_HOST")
                .unwrap_or(defaults.host)
                .trim_end_matches('/')
                .to_string(),
            port: parsed(&lookup, "OLLAMA_PORT").unwrap_or(defaults.port),
            timeout_secs: parsed(&lookup, "OLLAMA_TIMEOUT_SECS").unwrap_or(defaults.timeout_secs),
            tuning: LocalTuning {
                num_ctx: parsed(&lookup, "OLLAMA_NUM_CTX"),
                num_predict: parsed(&lookup, "OLLAMA_NUM_PREDICT"),
                top_p: parsed(&lookup, "OLLAMA_TOP_P"),
                top_k: parsed(&lookup, "OLLAMA_TOP_K"),
                repeat_penalty: parsed(&lookup, "OLLAMA_REPEAT_PENALTY"),
                temperature: None,
            },
        }
    }

    /// Base URL, e.g. `http://localhost:11434`
    pub fn base_url(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Tool server locations
#[derive(Clone, Debug)]
pub struct ToolsConfig {
    /// Interpreter used to launch script servers
    pub python: String,
    pub weather_script: PathBuf,
    pub reminder_script: PathBuf,
    pub docs_script: PathBuf,

    /// Base URL of the HTTP MCP proxy hosting the support server
    pub support_url: String,
    pub call_timeout: Duration,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl ToolsConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup<L: Fn(&str) -> Option<String>>(lookup: L) -> Self {
        let script = |key: &str, name: &str| {
            non_empty(&lookup, key)
                .map_or_else(|| PathBuf::from("mcp").join(name).join("server.py"), PathBuf::from)
        };

        Self {
            python: non_empty(&lookup, "MCP_PYTHON").unwrap_or_else(|| "python3".into()),
            weather_script: script("WEATHER_MCP_SCRIPT", "weather"),
            reminder_script: script("REMINDER_MCP_SCRIPT", "reminder"),
            docs_script: script("DOCS_MCP_SCRIPT", "docs"),
            support_url: non_empty(&lookup, "SUPPORT_MCP_URL")
                .unwrap_or_else(|| DEFAULT_SUPPORT_MCP_URL.into())
                .trim_end_matches('/')
                .to_string(),
            call_timeout: secs(&lookup, "MCP_CALL_TIMEOUT_SECS", 30),
        }
    }

    /// Launch settings for one script server run by the configured interpreter
    pub fn script_server(&self, name: &str, script: &Path) -> ScriptServerConfig {
        let server = ServerConfig {
            command: self.python.clone(),
            script: Some(script.to_path_buf()),
            ..ServerConfig::default()
        };
        ScriptServerConfig::new(name, server).call_timeout(self.call_timeout)
    }

    /// The script servers this deployment knows about, in display order
    pub fn script_servers(&self) -> Vec<ScriptServerConfig> {
        vec![
            self.script_server("weather", &self.weather_script),
            self.script_server("reminder", &self.reminder_script),
            self.script_server("docs", &self.docs_script),
        ]
    }
}
