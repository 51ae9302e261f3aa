//! JSON-RPC over stdio transport.
//!
//! One JSON object per line in each direction. The reader skips blank
//! lines, non-JSON output and responses whose id does not match the
//! pending request, so a response left behind by a dropped call is
//! discarded on the next one.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;

use super::errors::ToolError;
use super::types::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};

pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Bi-directional JSON-RPC transport over a byte stream pair.
pub struct StdioTransport {
    server_name: String,
    writer: Mutex<BoxedWriter>,
    reader: Mutex<BufReader<BoxedReader>>,
    next_id: AtomicU64,
}

impl StdioTransport {
    pub fn new(server_name: &str, writer: BoxedWriter, reader: BoxedReader) -> Self {
        Self {
            server_name: server_name.to_string(),
            writer: Mutex::new(writer),
            reader: Mutex::new(BufReader::new(reader)),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn server_name(&self) -> &str {
        &self.server_name
    }

    fn transport_error(&self, reason: String) -> ToolError {
        ToolError::Transport {
            server: self.server_name.clone(),
            reason,
        }
    }

    async fn write_line<T: Serialize + Sync>(&self, message: &T) -> Result<(), ToolError> {
        let mut json = serde_json::to_string(message)
            .map_err(|e| self.transport_error(format!("failed to serialize message: {e}")))?;
        json.push('\n');

        let mut writer = self.writer.lock().await;
        writer
            .write_all(json.as_bytes())
            .await
            .map_err(|e| self.transport_error(format!("failed to write to stdin: {e}")))?;
        writer
            .flush()
            .await
            .map_err(|e| self.transport_error(format!("failed to flush stdin: {e}")))
    }

    /// Send a request and return its `result`, or the server's error.
    pub async fn request(&self, method: &str, params: Option<Value>) -> Result<Value, ToolError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        // Held for the whole exchange so concurrent callers cannot steal
        // each other's responses.
        let mut reader = self.reader.lock().await;
        self.write_line(&JsonRpcRequest::new(id, method, params)).await?;

        let mut line = String::new();
        loop {
            line.clear();
            let bytes_read = reader
                .read_line(&mut line)
                .await
                .map_err(|e| self.transport_error(format!("failed to read from stdout: {e}")))?;

            if bytes_read == 0 {
                return Err(self.transport_error(
                    "server stdout closed (process may have exited)".into(),
                ));
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            match serde_json::from_str::<JsonRpcResponse>(trimmed) {
                Ok(resp) if resp.id == id => return extract_result(resp),
                Ok(resp) => {
                    tracing::debug!(server = %self.server_name, id = resp.id, expected = id, "skipping stale response");
                }
                Err(_) => {
                    tracing::trace!(server = %self.server_name, line = %trimmed, "skipping non-response line");
                }
            }
        }
    }

    /// Send a notification (no response expected).
    pub async fn notify(&self, method: &str, params: Option<Value>) -> Result<(), ToolError> {
        self.write_line(&JsonRpcNotification {
            jsonrpc: "2.0",
            method,
            params,
        })
        .await
    }
}

/// Extract the result from a response, converting errors to [`ToolError`].
pub fn extract_result(response: JsonRpcResponse) -> Result<Value, ToolError> {
    if let Some(err) = response.error {
        return Err(ToolError::Server {
            code: err.code,
            message: err.message,
            data: err.data,
        });
    }

    response.result.ok_or(ToolError::Server {
        code: -32603,
        message: "response missing both result and error".into(),
        data: None,
    })
}
