//! Error types for task payload handling

use thiserror::Error;

pub type Result<T> = std::result::Result<T, TaskError>;

#[derive(Error, Debug)]
pub enum TaskError {
    #[error("structured result has no task list")]
    MissingTasks,

    #[error("invalid due date '{0}'")]
    InvalidDue(String),

    #[error("malformed task entry: {0}")]
    Malformed(#[from] serde_json::Error),
}
