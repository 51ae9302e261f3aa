//! Reminder result formatting.
//!
//! Wraps the reminders provider so that list results read well both to the
//! model and to a person. When a result carries `{"tasks": [...]}` the text is
//! rebuilt from the structured payload:
//!
//! ```text
//! You have 3 open tasks.
//!
//! Overdue:
//! - Pay rent (due 2024-05-01)
//!
//! Due today:
//! - Call mom
//!
//! Upcoming:
//! - Dentist (due 2024-05-10)
//! ```
//!
//! The structured payload is passed through untouched.

use std::collections::HashSet;
use std::fmt::Write as _;
use std::sync::Arc;

use assistant_core::aggregator::ToolProviderEntry;
use assistant_core::tool::{JsonObject, ToolDescriptor, ToolExecutionResult, ToolProvider};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::model::{Due, Task, tasks_from_structured};

/// Entry id of the reminders provider in the default tool set
pub const REMINDER_ENTRY_ID: &str = "reminder";

/// Source of "now" for bucketing
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock pinned to one instant
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Bucket {
    Overdue,
    DueToday,
    Upcoming,
    NoDueDate,
}

impl Bucket {
    const ORDER: [Self; 4] = [Self::Overdue, Self::DueToday, Self::Upcoming, Self::NoDueDate];

    pub const fn heading(self) -> &'static str {
        match self {
            Self::Overdue => "Overdue",
            Self::DueToday => "Due today",
            Self::Upcoming => "Upcoming",
            Self::NoDueDate => "No due date",
        }
    }

    pub fn classify(due: Option<&Due>, now: DateTime<Utc>) -> Self {
        let today = now.date_naive();
        match due {
            None => Self::NoDueDate,
            Some(Due::At(at)) if *at < now => Self::Overdue,
            Some(due) if due.date() < today => Self::Overdue,
            Some(due) if due.date() == today => Self::DueToday,
            Some(_) => Self::Upcoming,
        }
    }
}

/// Open tasks with duplicates removed, first occurrence wins
pub fn open_tasks(tasks: Vec<Task>) -> Vec<Task> {
    let mut seen = HashSet::new();
    tasks
        .into_iter()
        .filter(|task| !task.completed)
        .filter(|task| seen.insert(task.normalized_title()))
        .collect()
}

/// Readable summary of `tasks` relative to `now`
pub fn summarize(tasks: Vec<Task>, now: DateTime<Utc>) -> String {
    let open = open_tasks(tasks);
    if open.is_empty() {
        return "You have no open tasks.".to_string();
    }

    let plural = if open.len() == 1 { "" } else { "s" };
    let mut out = format!("You have {} open task{plural}.", open.len());

    for bucket in Bucket::ORDER {
        let mut members: Vec<&Task> = open
            .iter()
            .filter(|task| Bucket::classify(task.due.as_ref(), now) == bucket)
            .collect();
        if members.is_empty() {
            continue;
        }
        members.sort_by_key(|task| task.due.map(|due| due.sort_key()));

        let _ = write!(out, "\n\n{}:", bucket.heading());
        for task in members {
            match (bucket, task.due) {
                (Bucket::Overdue | Bucket::Upcoming, Some(due)) => {
                    let _ = write!(out, "\n- {} (due {})", task.title, due.label());
                }
                (Bucket::DueToday, Some(Due::At(at))) => {
                    let _ = write!(out, "\n- {} (at {})", task.title, at.format("%H:%M UTC"));
                }
                _ => {
                    let _ = write!(out, "\n- {}", task.title);
                }
            }
        }
    }
    out
}

/// Decorator that rewrites task-list results into bucketed summaries
pub struct ReminderFormatting {
    inner: Arc<dyn ToolProvider>,
    clock: Arc<dyn Clock>,
}

impl ReminderFormatting {
    pub fn new(inner: Arc<dyn ToolProvider>) -> Self {
        Self::with_clock(inner, Arc::new(SystemClock))
    }

    pub fn with_clock(inner: Arc<dyn ToolProvider>, clock: Arc<dyn Clock>) -> Self {
        Self { inner, clock }
    }

    fn format(&self, result: ToolExecutionResult) -> ToolExecutionResult {
        let Some(structured) = result.structured.as_ref() else {
            return result;
        };
        match tasks_from_structured(structured) {
            Ok(tasks) => ToolExecutionResult {
                text: summarize(tasks, self.clock.now()),
                structured: result.structured,
            },
            Err(_) => result,
        }
    }
}

#[async_trait]
impl ToolProvider for ReminderFormatting {
    fn tool_definitions(&self) -> Vec<ToolDescriptor> {
        self.inner.tool_definitions()
    }

    async fn execute(&self, tool_name: &str, arguments: &JsonObject) -> Option<ToolExecutionResult> {
        let result = self.inner.execute(tool_name, arguments).await?;
        Some(self.format(result))
    }

    async fn initialize(&self) {
        self.inner.initialize().await;
    }

    fn has_tool(&self, tool_name: &str) -> bool {
        self.inner.has_tool(tool_name)
    }

    fn unavailable_message(&self) -> Option<String> {
        self.inner.unavailable_message()
    }
}

/// Wrap the reminders entry of `entries` with [`ReminderFormatting`].
///
/// Other entries are left alone; a list without a reminders entry is
/// returned unchanged.
pub fn with_reminder_formatting(
    entries: Vec<ToolProviderEntry>,
    clock: Arc<dyn Clock>,
) -> Vec<ToolProviderEntry> {
    entries
        .into_iter()
        .map(|mut entry| {
            if entry.id == REMINDER_ENTRY_ID {
                entry.provider = Arc::new(ReminderFormatting::with_clock(entry.provider, clock.clone()));
            }
            entry
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    /// Returns a canned result for `list_tasks`
    struct CannedReminders(ToolExecutionResult);

    #[async_trait]
    impl ToolProvider for CannedReminders {
        fn tool_definitions(&self) -> Vec<ToolDescriptor> {
            vec![ToolDescriptor::new("list_tasks", "List tasks", json!({"type": "object"}))]
        }

        async fn execute(&self, tool_name: &str, _arguments: &JsonObject) -> Option<ToolExecutionResult> {
            (tool_name == "list_tasks").then(|| self.0.clone())
        }
    }

    fn noon() -> Arc<dyn Clock> {
        Arc::new(FixedClock(Utc.with_ymd_and_hms(2024, 5, 3, 12, 0, 0).unwrap()))
    }

    fn structured(value: serde_json::Value) -> JsonObject {
        value.as_object().cloned().unwrap()
    }

    fn formatted(result: ToolExecutionResult) -> ReminderFormatting {
        ReminderFormatting::with_clock(Arc::new(CannedReminders(result)), noon())
    }

    #[tokio::test]
    async fn test_buckets_and_dedup() {
        let payload = structured(json!({
            "tasks": [
                {"title": "Dentist", "due": "2024-05-10"},
                {"title": "Pay rent", "due": "2024-05-01"},
                {"title": "Call mom", "due": "2024-05-03"},
                {"title": "call  MOM", "due": "2024-05-04"},
                {"title": "Read book"},
                {"title": "Standup", "due": "2024-05-03T09:00:00Z"},
                {"title": "Old", "due": "2024-04-01", "completed": true}
            ]
        }));
        let provider = formatted(ToolExecutionResult::text("raw").with_structured(payload.clone()));

        let result = provider.execute("list_tasks", &JsonObject::new()).await.unwrap();

        assert_eq!(
            result.text,
            "You have 5 open tasks.\n\n\
             Overdue:\n- Pay rent (due 2024-05-01)\n- Standup (due 2024-05-03 09:00 UTC)\n\n\
             Due today:\n- Call mom\n\n\
             Upcoming:\n- Dentist (due 2024-05-10)\n\n\
             No due date:\n- Read book"
        );
        assert_eq!(result.structured, Some(payload));
    }

    #[tokio::test]
    async fn test_later_today_is_due_today() {
        let payload = structured(json!({"tasks": [{"title": "Demo", "due": "2024-05-03T15:30:00Z"}]}));
        let provider = formatted(ToolExecutionResult::text("raw").with_structured(payload));

        let result = provider.execute("list_tasks", &JsonObject::new()).await.unwrap();
        assert_eq!(result.text, "You have 1 open task.\n\nDue today:\n- Demo (at 15:30 UTC)");
    }

    #[tokio::test]
    async fn test_nothing_open() {
        let payload = structured(json!({"tasks": [{"title": "Done", "done": true}]}));
        let provider = formatted(ToolExecutionResult::text("raw").with_structured(payload));

        let result = provider.execute("list_tasks", &JsonObject::new()).await.unwrap();
        assert_eq!(result.text, "You have no open tasks.");
    }

    #[tokio::test]
    async fn test_other_results_pass_through() {
        let plain = ToolExecutionResult::text("Task created.")
            .with_structured(structured(json!({"id": 7})));
        let provider = formatted(plain.clone());

        assert_eq!(provider.execute("list_tasks", &JsonObject::new()).await, Some(plain));
        assert_eq!(provider.execute("unknown", &JsonObject::new()).await, None);
        assert!(provider.has_tool("list_tasks"));
    }

    #[test]
    fn test_wraps_only_reminder_entry() {
        let canned = || -> Arc<dyn ToolProvider> {
            Arc::new(CannedReminders(ToolExecutionResult::text("x")))
        };
        let entries = vec![
            ToolProviderEntry::new("weather", "Weather", canned()),
            ToolProviderEntry::new(REMINDER_ENTRY_ID, "Reminders", canned()),
        ];
        let originals: Vec<Arc<dyn ToolProvider>> = entries.iter().map(|e| e.provider.clone()).collect();

        let wrapped = with_reminder_formatting(entries, noon());

        assert!(Arc::ptr_eq(&wrapped[0].provider, &originals[0]));
        assert!(!Arc::ptr_eq(&wrapped[1].provider, &originals[1]));
        assert_eq!(wrapped[1].id, REMINDER_ENTRY_ID);
    }
}
