//! Application State

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use assistant_runtime::mcp::McpServersConfig;
use assistant_runtime::{ScriptServerConfig, ScriptToolProvider, ToolsConfig};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Script servers by name
    pub servers: Arc<BTreeMap<String, Arc<ScriptToolProvider>>>,
}

impl AppState {
    pub fn new(servers: impl IntoIterator<Item = Arc<ScriptToolProvider>>) -> Self {
        let servers = servers
            .into_iter()
            .map(|provider| (provider.name().to_string(), provider))
            .collect();
        Self {
            servers: Arc::new(servers),
        }
    }

    pub fn server(&self, name: &str) -> Option<&Arc<ScriptToolProvider>> {
        self.servers.get(name)
    }

    /// Start every configured server. Servers that fail to start are kept
    /// with an empty catalog and retried on their first call.
    pub async fn start(configs: Vec<ScriptServerConfig>) -> Self {
        let providers = futures::future::join_all(
            configs
                .into_iter()
                .map(|config| async move { Arc::new(ScriptToolProvider::spawn(config).await) }),
        )
        .await;
        Self::new(providers)
    }
}

/// Server list from `MCP_PROXY_CONFIG`, or the standard script servers.
pub fn server_configs(config_file: Option<&Path>, tools: &ToolsConfig) -> anyhow::Result<Vec<ScriptServerConfig>> {
    let Some(path) = config_file else {
        return Ok(tools.script_servers());
    };

    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading MCP proxy config {}", path.display()))?;
    let parsed: McpServersConfig = serde_json::from_str(&raw)
        .with_context(|| format!("parsing MCP proxy config {}", path.display()))?;

    Ok(parsed
        .servers
        .into_iter()
        .map(|(name, server)| ScriptServerConfig::new(name, server).call_timeout(tools.call_timeout))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_fallback_to_tool_settings() {
        let configs = server_configs(None, &ToolsConfig::default()).unwrap();
        let names: Vec<&str> = configs.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["weather", "reminder", "docs"]);
    }

    #[test]
    fn test_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("servers.json");
        std::fs::write(
            &path,
            r#"{"servers": {
                "support": {"command": "node", "args": ["dist/index.js"], "env": {"API_TOKEN": "t"}},
                "docs": {"command": "python3", "script": "/srv/docs/server.py"}
            }}"#,
        )
        .unwrap();
        let tools = ToolsConfig {
            call_timeout: Duration::from_secs(5),
            ..ToolsConfig::default()
        };

        let configs = server_configs(Some(&path), &tools).unwrap();

        assert_eq!(configs.len(), 2);
        assert_eq!(configs[0].name, "docs");
        assert_eq!(configs[1].name, "support");
        assert_eq!(configs[1].server.args, vec!["dist/index.js".to_string()]);
        assert_eq!(configs[1].server.env["API_TOKEN"], "t");
        assert_eq!(configs[1].call_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_bad_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("servers.json");
        std::fs::write(&path, "{not json").unwrap();

        let err = server_configs(Some(&path), &ToolsConfig::default()).unwrap_err();
        assert!(err.to_string().contains("parsing MCP proxy config"));
    }
}
