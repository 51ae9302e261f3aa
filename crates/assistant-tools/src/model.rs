//! Task payloads returned by the reminders server.
//!
//! The server reports tasks as `{"tasks": [...]}` in `structuredContent`.
//! Field names vary between server versions, so the common spellings are
//! accepted.

use assistant_core::tool::JsonObject;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;

use crate::error::{Result, TaskError};

/// When a task is due
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Due {
    /// All-day deadline
    Date(NaiveDate),

    /// Deadline at a specific instant
    At(DateTime<Utc>),
}

impl Due {
    /// Accepts `YYYY-MM-DD` or RFC 3339
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
            return Ok(Self::Date(date));
        }
        DateTime::parse_from_rfc3339(raw)
            .map(|at| Self::At(at.with_timezone(&Utc)))
            .map_err(|_| TaskError::InvalidDue(raw.to_string()))
    }

    pub fn date(&self) -> NaiveDate {
        match self {
            Self::Date(date) => *date,
            Self::At(at) => at.date_naive(),
        }
    }

    /// Ordering key; all-day deadlines sort to the start of their day
    pub fn sort_key(&self) -> DateTime<Utc> {
        match self {
            Self::Date(date) => date.and_time(chrono::NaiveTime::MIN).and_utc(),
            Self::At(at) => *at,
        }
    }

    pub fn label(&self) -> String {
        match self {
            Self::Date(date) => date.format("%Y-%m-%d").to_string(),
            Self::At(at) => at.format("%Y-%m-%d %H:%M UTC").to_string(),
        }
    }
}

#[derive(Deserialize)]
struct RawTask {
    #[serde(alias = "name", alias = "text")]
    title: String,

    #[serde(default, alias = "due_date", alias = "dueDate")]
    due: Option<String>,

    #[serde(default, alias = "done")]
    completed: bool,
}

/// A single reminder
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Task {
    pub title: String,
    pub due: Option<Due>,
    pub completed: bool,
}

impl Task {
    /// Lowercased title with whitespace collapsed, used for deduplication
    pub fn normalized_title(&self) -> String {
        self.title
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase()
    }
}

impl TryFrom<RawTask> for Task {
    type Error = TaskError;

    fn try_from(raw: RawTask) -> Result<Self> {
        let due = match raw.due.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(value) => Some(Due::parse(value)?),
        };
        Ok(Self {
            title: raw.title.trim().to_string(),
            due,
            completed: raw.completed,
        })
    }
}

/// Extract the task list from a structured tool result.
///
/// Entries that fail to parse are skipped with a warning; a payload with no
/// `tasks` array is an error.
pub fn tasks_from_structured(structured: &JsonObject) -> Result<Vec<Task>> {
    let entries = structured
        .get("tasks")
        .and_then(serde_json::Value::as_array)
        .ok_or(TaskError::MissingTasks)?;

    let mut tasks = Vec::with_capacity(entries.len());
    for entry in entries {
        let parsed = serde_json::from_value::<RawTask>(entry.clone())
            .map_err(TaskError::from)
            .and_then(Task::try_from);
        match parsed {
            Ok(task) => tasks.push(task),
            Err(e) => tracing::warn!(error = %e, "Skipping task entry"),
        }
    }
    Ok(tasks)
}
