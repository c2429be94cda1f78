//! Error types for the orchestration core.

use std::path::PathBuf;

use thiserror::Error;

use syncflow_protocols::{JobId, RepositoryError};

/// Cron registration errors.
#[derive(Debug, Error)]
pub enum ScheduleError {
    /// The expression does not parse under the 5-field grammar.
    #[error("Invalid cron expression '{expression}' for task {task_id}: {message}")]
    InvalidExpression {
        task_id: String,
        expression: String,
        message: String,
    },

    #[error("Task catalog error: {0}")]
    Catalog(#[from] RepositoryError),
}

/// Filesystem watch errors.
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("Watch source does not exist: {0}")]
    SourceMissing(PathBuf),

    #[error("Failed to watch {path}: {message}")]
    Watch { path: PathBuf, message: String },
}

/// Runner errors.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// The task already has a running Job.
    #[error("Task {task_id} is already running as job {running_job}")]
    ConcurrentRunRejected { task_id: String, running_job: JobId },

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Runner is shutting down")]
    ShuttingDown,

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

impl RunnerError {
    /// Whether this is a concurrency gate rejection.
    pub fn is_rejection(&self) -> bool {
        matches!(self, RunnerError::ConcurrentRunRejected { .. })
    }
}

/// Errors surfaced by the [`Orchestrator`](crate::Orchestrator).
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Schedule(#[from] ScheduleError),

    #[error(transparent)]
    Watch(#[from] WatchError),

    #[error(transparent)]
    Runner(#[from] RunnerError),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}
