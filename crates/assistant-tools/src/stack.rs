//! The assistant's standard tool stack.
//!
//! Same providers as the runtime's default set, with the reminders entry
//! wrapped in [`ReminderFormatting`](crate::ReminderFormatting) so task lists
//! reach the model as bucketed summaries.

use std::sync::Arc;
use std::time::Duration;

use assistant_core::aggregator::{ToolAggregator, ToolProviderEntry};
use assistant_core::error::Result;
use assistant_core::session::SessionSettings;
use assistant_core::tool::ToolProvider;
use assistant_runtime::ToolsConfig;
use assistant_runtime::bootstrap::{default_entries, initialize_aggregator};

use crate::ASSISTANT_PROMPT;
use crate::poller::ToolPoller;
use crate::reminders::{Clock, SystemClock, with_reminder_formatting};

/// Tool the reminder poller refreshes
pub const REMINDER_LIST_TOOL: &str = "reminder_list_tasks";

/// Default entries with reminder formatting applied. Nothing is launched.
pub fn standard_entries(config: &ToolsConfig, clock: Arc<dyn Clock>) -> Vec<ToolProviderEntry> {
    with_reminder_formatting(default_entries(config), clock)
}

/// Standard tool set, initialized, bucketing against the system clock
pub async fn bootstrap(config: &ToolsConfig) -> Result<Arc<ToolAggregator>> {
    bootstrap_with_clock(config, Arc::new(SystemClock)).await
}

pub async fn bootstrap_with_clock(
    config: &ToolsConfig,
    clock: Arc<dyn Clock>,
) -> Result<Arc<ToolAggregator>> {
    initialize_aggregator(standard_entries(config, clock)).await
}

/// Session settings for `model` using [`ASSISTANT_PROMPT`]
pub fn session_settings(model: impl Into<String>) -> SessionSettings {
    SessionSettings {
        model: model.into(),
        system_prompt: ASSISTANT_PROMPT.to_string(),
        ..SessionSettings::default()
    }
}

/// Poller that keeps the latest task summary from `tools`
pub fn reminder_poller(tools: Arc<dyn ToolProvider>, interval: Duration) -> ToolPoller {
    ToolPoller::new(tools, REMINDER_LIST_TOOL, interval)
}
