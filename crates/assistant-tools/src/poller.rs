//! Background tool polling.
//!
//! Runs one tool on an interval and publishes the latest successful result
//! on a `watch` channel, e.g. a weather widget refreshing current conditions.
//! Failures are logged and double the delay up to `max_backoff`; the next
//! success restores the normal interval. The loop ends when the token is
//! cancelled or every receiver is gone.

use std::sync::Arc;
use std::time::Duration;

use assistant_core::tool::{JsonObject, ToolExecutionResult, ToolProvider};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(300);

pub struct ToolPoller {
    provider: Arc<dyn ToolProvider>,
    tool_name: String,
    arguments: JsonObject,
    interval: Duration,
    max_backoff: Duration,
}

impl ToolPoller {
    pub fn new(provider: Arc<dyn ToolProvider>, tool_name: impl Into<String>, interval: Duration) -> Self {
        Self {
            provider,
            tool_name: tool_name.into(),
            arguments: JsonObject::new(),
            interval,
            max_backoff: DEFAULT_MAX_BACKOFF.max(interval),
        }
    }

    #[must_use]
    pub fn arguments(mut self, arguments: JsonObject) -> Self {
        self.arguments = arguments;
        self
    }

    /// Upper bound for the failure delay; never below the interval
    #[must_use]
    pub fn max_backoff(mut self, max_backoff: Duration) -> Self {
        self.max_backoff = max_backoff.max(self.interval);
        self
    }

    /// Start polling on a new task. The first poll happens immediately.
    pub fn spawn(
        self,
        cancel: CancellationToken,
    ) -> (watch::Receiver<Option<ToolExecutionResult>>, JoinHandle<()>) {
        let (tx, rx) = watch::channel(None);
        let handle = tokio::spawn(self.run(tx, cancel));
        (rx, handle)
    }

    async fn run(self, tx: watch::Sender<Option<ToolExecutionResult>>, cancel: CancellationToken) {
        let mut delay = self.interval;
        loop {
            let outcome = tokio::select! {
                () = cancel.cancelled() => break,
                outcome = self.provider.execute(&self.tool_name, &self.arguments) => outcome,
            };

            match outcome {
                Some(result) if !is_failure(&result) => {
                    tx.send_replace(Some(result));
                    delay = self.interval;
                }
                other => {
                    delay = (delay * 2).min(self.max_backoff);
                    tracing::warn!(
                        tool = %self.tool_name,
                        retry_in_secs = delay.as_secs(),
                        error = other.as_ref().map_or("tool not available", |r| r.text.as_str()),
                        "Poll failed"
                    );
                }
            }

            if tx.is_closed() {
                tracing::debug!(tool = %self.tool_name, "No subscribers left, stopping poller");
                break;
            }

            tokio::select! {
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(delay) => {}
            }
        }
    }
}

/// Providers report failures in the text rather than as errors
fn is_failure(result: &ToolExecutionResult) -> bool {
    let text = result.text.trim_start();
    text.starts_with("Tool '")
        && (text.contains("' failed") || text.contains("not enabled") || text.contains("not available"))
}
