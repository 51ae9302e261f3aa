//! Script-backed MCP servers.
//!
//! Each [`ScriptToolProvider`] owns at most one child process. The catalog is
//! fetched once during initialization; afterwards the process is only needed
//! for `tools/call`. A call that times out or breaks the pipe discards the
//! process, and the next call starts a fresh one.

use std::process::Stdio;
use std::sync::OnceLock;
use std::time::Duration;

use assistant_core::tool::{JsonObject, ToolDescriptor, ToolExecutionResult, ToolProvider};
use async_trait::async_trait;
use serde_json::json;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, Command};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::LinesStream;

use super::errors::ToolError;
use super::transport::StdioTransport;
use super::types::{CallToolResult, MCP_PROTOCOL_VERSION, ServerConfig, ToolsListResult};

const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Generous because some servers import heavy libraries at startup
const DEFAULT_INIT_TIMEOUT: Duration = Duration::from_secs(30);

/// Launch and call settings for one script server
#[derive(Debug, Clone)]
pub struct ScriptServerConfig {
    pub name: String,
    pub server: ServerConfig,
    pub call_timeout: Duration,
    pub init_timeout: Duration,

    /// Returned by every call when the script is missing
    pub missing_message: Option<String>,
}

impl ScriptServerConfig {
    pub fn new(name: impl Into<String>, server: ServerConfig) -> Self {
        Self {
            name: name.into(),
            server,
            call_timeout: DEFAULT_CALL_TIMEOUT,
            init_timeout: DEFAULT_INIT_TIMEOUT,
            missing_message: None,
        }
    }

    #[must_use]
    pub const fn call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    #[must_use]
    pub const fn init_timeout(mut self, timeout: Duration) -> Self {
        self.init_timeout = timeout;
        self
    }

    #[must_use]
    pub fn missing_message(mut self, message: impl Into<String>) -> Self {
        self.missing_message = Some(message.into());
        self
    }

    /// The configured script, if it does not exist on disk
    fn missing_script(&self) -> Option<String> {
        let script = self.server.script.as_ref()?;
        (!script.is_file()).then(|| script.display().to_string())
    }

    fn not_installed_text(&self, path: &str) -> String {
        self.missing_message.clone().unwrap_or_else(|| {
            format!(
                "The {} tool server is not installed (expected a script at {path}).",
                self.name
            )
        })
    }
}

/// A running server process. Dropping it kills the child and stops the
/// stderr forwarder.
pub struct ServerSession {
    _child: Child,
    transport: StdioTransport,
    stderr_task: Option<JoinHandle<()>>,
}

impl Drop for ServerSession {
    fn drop(&mut self) {
        if let Some(task) = self.stderr_task.take() {
            task.abort();
        }
    }
}

impl ServerSession {
    /// Spawn the process and perform the MCP handshake.
    pub async fn start(config: &ScriptServerConfig) -> Result<(Self, Vec<ToolDescriptor>), ToolError> {
        let name = config.name.as_str();
        let server = &config.server;

        let mut cmd = Command::new(&server.command);
        cmd.args(&server.args);
        if let Some(script) = &server.script {
            cmd.arg(script);
        }
        cmd.envs(&server.env);
        if let Some(dir) = &server.cwd {
            cmd.current_dir(dir);
        }
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| ToolError::SpawnFailed {
            name: name.to_string(),
            reason: e.to_string(),
        })?;

        let stdin = child.stdin.take().ok_or_else(|| ToolError::SpawnFailed {
            name: name.to_string(),
            reason: "failed to capture stdin".into(),
        })?;
        let stdout = child.stdout.take().ok_or_else(|| ToolError::SpawnFailed {
            name: name.to_string(),
            reason: "failed to capture stdout".into(),
        })?;
        let stderr_task = child
            .stderr
            .take()
            .map(|stderr| forward_stderr(name.to_string(), stderr));

        let session = Self {
            _child: child,
            transport: StdioTransport::new(name, Box::new(stdin), Box::new(stdout)),
            stderr_task,
        };

        let tools = tokio::time::timeout(config.init_timeout, handshake(&session.transport))
            .await
            .map_err(|_| ToolError::InitFailed {
                name: name.to_string(),
                reason: format!(
                    "initialization timed out after {}s",
                    config.init_timeout.as_secs()
                ),
            })?
            .map_err(|e| ToolError::InitFailed {
                name: name.to_string(),
                reason: e.to_string(),
            })?;

        tracing::info!(server = %name, tools = tools.len(), "MCP server started");
        Ok((session, tools))
    }

    pub const fn transport(&self) -> &StdioTransport {
        &self.transport
    }
}

fn forward_stderr(server: String, stderr: ChildStderr) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut lines = LinesStream::new(BufReader::new(stderr).lines());
        while let Some(Ok(line)) = lines.next().await {
            tracing::debug!(server = %server, "{line}");
        }
    })
}

/// `initialize` → `notifications/initialized` → `tools/list`
pub async fn handshake(transport: &StdioTransport) -> Result<Vec<ToolDescriptor>, ToolError> {
    transport
        .request(
            "initialize",
            Some(json!({
                "protocolVersion": MCP_PROTOCOL_VERSION,
                "capabilities": {},
                "clientInfo": {
                    "name": env!("CARGO_PKG_NAME"),
                    "version": env!("CARGO_PKG_VERSION"),
                },
            })),
        )
        .await?;

    transport.notify("notifications/initialized", None).await?;

    let listed = transport.request("tools/list", Some(json!({}))).await?;
    let listed: ToolsListResult =
        serde_json::from_value(listed).map_err(|e| ToolError::Decode(e.to_string()))?;

    Ok(listed.tools.into_iter().map(ToolDescriptor::from).collect())
}

/// Issue one `tools/call` and normalize the result
pub async fn call_tool(
    transport: &StdioTransport,
    tool_name: &str,
    arguments: &JsonObject,
) -> Result<ToolExecutionResult, ToolError> {
    let result = transport
        .request(
            "tools/call",
            Some(json!({"name": tool_name, "arguments": arguments})),
        )
        .await?;
    let result: CallToolResult =
        serde_json::from_value(result).map_err(|e| ToolError::Decode(e.to_string()))?;
    Ok(result.into_execution_result(tool_name))
}

/// Tool provider backed by a script server speaking MCP over stdio
pub struct ScriptToolProvider {
    config: ScriptServerConfig,
    tools: OnceLock<Vec<ToolDescriptor>>,
    session: Mutex<Option<ServerSession>>,
}

impl ScriptToolProvider {
    /// Create without launching anything; `initialize()` starts the server.
    pub fn new(config: ScriptServerConfig) -> Self {
        Self {
            config,
            tools: OnceLock::new(),
            session: Mutex::new(None),
        }
    }

    /// Create and initialize.
    pub async fn spawn(config: ScriptServerConfig) -> Self {
        let provider = Self::new(config);
        provider.initialize().await;
        provider
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Whether a server process is currently held
    pub async fn is_running(&self) -> bool {
        self.session.lock().await.is_some()
    }

    /// Script present and catalog loaded
    pub fn is_available(&self) -> bool {
        self.config.missing_script().is_none() && self.tools.get().is_some()
    }

    /// Like `execute`, but failures come back as errors rather than text.
    pub async fn try_execute(
        &self,
        tool_name: &str,
        arguments: &JsonObject,
    ) -> Result<ToolExecutionResult, ToolError> {
        if let Some(path) = self.config.missing_script() {
            return Err(ToolError::NotInstalled {
                name: self.config.name.clone(),
                path,
            });
        }
        self.call(tool_name, arguments).await
    }

    /// The first catalog wins; a restarted server keeps the one already shown to the model.
    fn store_catalog(&self, tools: Vec<ToolDescriptor>) {
        if self.tools.set(tools).is_err() {
            tracing::debug!(server = %self.config.name, "catalog already loaded, keeping it");
        }
    }

    async fn call(&self, tool_name: &str, arguments: &JsonObject) -> Result<ToolExecutionResult, ToolError> {
        let mut guard = self.session.lock().await;

        if guard.is_none() {
            tracing::info!(server = %self.config.name, "starting MCP server for tool call");
            let (session, tools) = ServerSession::start(&self.config).await?;
            self.store_catalog(tools);
            *guard = Some(session);
        }
        let Some(session) = guard.as_ref() else {
            return Err(ToolError::Transport {
                server: self.config.name.clone(),
                reason: "no server session".into(),
            });
        };

        let outcome = tokio::time::timeout(
            self.config.call_timeout,
            call_tool(session.transport(), tool_name, arguments),
        )
        .await;

        let err = match outcome {
            Ok(Ok(result)) => return Ok(result),
            Ok(Err(e)) => e,
            Err(_) => ToolError::Timeout {
                server: self.config.name.clone(),
                operation: format!("tools/call {tool_name}"),
                timeout_ms: u64::try_from(self.config.call_timeout.as_millis()).unwrap_or(u64::MAX),
            },
        };

        if err.poisons_session() {
            tracing::warn!(server = %self.config.name, error = %err, "discarding MCP server process");
            *guard = None;
        }
        Err(err)
    }
}

#[async_trait]
impl ToolProvider for ScriptToolProvider {
    fn tool_definitions(&self) -> Vec<ToolDescriptor> {
        self.tools.get().cloned().unwrap_or_default()
    }

    async fn execute(&self, tool_name: &str, arguments: &JsonObject) -> Option<ToolExecutionResult> {
        if let Some(path) = self.config.missing_script() {
            return Some(ToolExecutionResult::text(self.config.not_installed_text(&path)));
        }
        if !self.has_tool(tool_name) {
            return None;
        }

        Some(self.call(tool_name, arguments).await.unwrap_or_else(|e| {
            tracing::warn!(server = %self.config.name, tool = %tool_name, error = %e, "tool call failed");
            ToolExecutionResult::text(format!("Tool '{tool_name}' failed: {e}"))
        }))
    }

    fn unavailable_message(&self) -> Option<String> {
        self.config
            .missing_script()
            .map(|path| self.config.not_installed_text(&path))
    }

    async fn initialize(&self) {
        if self.tools.get().is_some() {
            return;
        }
        if let Some(path) = self.config.missing_script() {
            let err = ToolError::NotInstalled {
                name: self.config.name.clone(),
                path,
            };
            tracing::warn!(server = %self.config.name, error = %err, "MCP server unavailable");
            return;
        }

        let mut guard = self.session.lock().await;
        match ServerSession::start(&self.config).await {
            Ok((session, tools)) => {
                self.store_catalog(tools);
                *guard = Some(session);
            }
            Err(e) => {
                tracing::warn!(server = %self.config.name, error = %e, "MCP server failed to start");
            }
        }
    }
}
