//! # assistant-tools
//!
//! Domain pieces layered over the tool providers:
//!
//! - **Reminder formatting** - task lists become bucketed summaries
//! - **Background polling** - refresh a tool result on an interval
//! - **Assistant prompt** - default system prompt for chat sessions
//! - **Standard stack** - the runtime's default tools with all of the above
//!
//! ```text
//! ┌──────────────┐   execute   ┌────────────────────┐   execute   ┌──────────────┐
//! │  Aggregator  │────────────▶│ ReminderFormatting │────────────▶│ reminders    │
//! │              │◀────────────│  dedup + buckets   │◀────────────│ MCP server   │
//! └──────────────┘  summary    └────────────────────┘  {"tasks"}  └──────────────┘
//! ```

pub mod error;
pub mod model;
pub mod poller;
pub mod reminders;
pub mod stack;

pub use error::{Result, TaskError};
pub use model::{Due, Task};
pub use poller::ToolPoller;
pub use reminders::{Clock, FixedClock, ReminderFormatting, SystemClock, with_reminder_formatting};
pub use stack::{bootstrap, bootstrap_with_clock, reminder_poller, session_settings, standard_entries};

/// Default system prompt for the assistant
pub const ASSISTANT_PROMPT: &str = r"You are a friendly, concise personal assistant.

## What you can do

- `current_datetime` - the current date and time
- Weather tools - current conditions and forecasts
- Reminder tools - create, list and complete tasks
- Document search and support tickets, when the user has enabled them

## How to work

1. Use a tool whenever the answer depends on live data; never guess dates, weather or task lists
2. Call one tool at a time and read its result before deciding on the next step
3. If a tool says it is not enabled, tell the user which setting to turn on
4. If a tool fails, say so plainly and offer what you can without it

Keep answers short. Prefer bullet lists for tasks and forecasts.";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_names_builtin_tool() {
        assert!(ASSISTANT_PROMPT.contains("`current_datetime`"));
        assert!(!ASSISTANT_PROMPT.contains("JSON"));
    }
}
