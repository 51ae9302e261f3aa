//! Wiring from configuration to a ready tool aggregator and backend.

use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use assistant_core::aggregator::{ToolAggregator, ToolProviderEntry};
use assistant_core::error::Result;
use assistant_core::provider::{BackendError, CompletionBackend};
use assistant_core::tool::{DateTimeTool, LocalToolProvider, ToolProvider};

use crate::cloud::CloudBackend;
use crate::config::{CloudConfig, OllamaConfig, ToolsConfig};
use crate::mcp::{HttpToolProvider, ScriptToolProvider};
use crate::ollama::LocalBackend;

/// Provider entries for the standard tool set, in display order.
///
/// Nothing is launched here; script servers start during initialization.
pub fn default_entries(config: &ToolsConfig) -> Vec<ToolProviderEntry> {
    let script = |name: &str, path: &Path| -> Arc<dyn ToolProvider> {
        Arc::new(ScriptToolProvider::new(config.script_server(name, path)))
    };

    vec![
        ToolProviderEntry::new(
            "datetime",
            "Date & time",
            Arc::new(LocalToolProvider::new().with_tool(DateTimeTool)),
        )
        .description("Current date and time")
        .always_available(),
        ToolProviderEntry::new("weather", "Weather", script("weather", config.weather_script.as_path()))
            .description("Current conditions and forecasts"),
        ToolProviderEntry::new("reminder", "Reminders", script("reminder", config.reminder_script.as_path()))
            .description("Create and list tasks"),
        ToolProviderEntry::new("docs", "Documents", script("docs", config.docs_script.as_path()))
            .description("Search local documents")
            .default_enabled(false),
        ToolProviderEntry::new(
            "support",
            "Support tickets",
            Arc::new(HttpToolProvider::with_timeout(
                config.support_url.clone(),
                "support",
                config.call_timeout,
            )),
        )
        .description("Open and track support tickets")
        .default_enabled(false),
    ]
}

/// Build an aggregator and wait for every provider to initialize.
pub async fn initialize_aggregator(entries: Vec<ToolProviderEntry>) -> Result<Arc<ToolAggregator>> {
    let aggregator = Arc::new(ToolAggregator::new(entries)?);
    aggregator.initialize_all().await;
    Ok(aggregator)
}

/// Standard tool set, without reminder formatting
pub async fn bootstrap(config: &ToolsConfig) -> Result<Arc<ToolAggregator>> {
    initialize_aggregator(default_entries(config)).await
}

/// Which completion backend to run
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackendKind {
    Cloud,
    Local,
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cloud" | "openai" => Ok(Self::Cloud),
            "local" | "ollama" => Ok(Self::Local),
            other => Err(format!("unknown backend '{other}'")),
        }
    }
}

/// Backend of `kind` from the environment, with `tools` attached
pub fn backend_from_env(
    kind: BackendKind,
    tools: Arc<dyn ToolProvider>,
) -> std::result::Result<Arc<dyn CompletionBackend>, BackendError> {
    let backend: Arc<dyn CompletionBackend> = match kind {
        BackendKind::Cloud => Arc::new(CloudBackend::new(CloudConfig::from_env())?.with_tools(tools)),
        BackendKind::Local => {
            Arc::new(LocalBackend::from_config(OllamaConfig::from_env())?.with_tools(tools))
        }
    };
    Ok(backend)
}
