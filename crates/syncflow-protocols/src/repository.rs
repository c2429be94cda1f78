//! Persistence interfaces for tasks and job history.

use async_trait::async_trait;

use crate::error::RepositoryError;
use crate::job::{Job, JobCounters, JobId, JobLog, JobStatus};
use crate::task::{Task, TaskId};

/// Read-only task view consulted by triggers.
#[async_trait]
pub trait TaskCatalog: Send + Sync {
    /// All task definitions, ordered by id.
    async fn list_all_tasks(&self) -> Result<Vec<Task>, RepositoryError>;

    /// Current definition of one task.
    async fn get_task(&self, id: &str) -> Result<Option<Task>, RepositoryError>;
}

/// Task writes, owned by the task-management domain.
#[async_trait]
pub trait TaskStore: TaskCatalog {
    /// Insert or replace a task definition.
    async fn upsert_task(&self, task: &Task) -> Result<(), RepositoryError>;

    /// Delete a task and, with it, its job history.
    async fn delete_task(&self, id: &str) -> Result<(), RepositoryError>;
}

/// Filter for history queries.
#[derive(Debug, Clone)]
pub struct JobQuery {
    pub task_id: Option<TaskId>,
    pub status: Option<JobStatus>,
    /// Maximum rows, newest first.
    pub limit: usize,
}

impl Default for JobQuery {
    fn default() -> Self {
        Self {
            task_id: None,
            status: None,
            limit: 50,
        }
    }
}

impl JobQuery {
    pub fn for_task(task_id: impl Into<TaskId>) -> Self {
        Self {
            task_id: Some(task_id.into()),
            ..Self::default()
        }
    }

    pub fn with_status(mut self, status: JobStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }
}

/// Durable Job / JobLog store.
///
/// Must accept concurrent appends from several in-flight Jobs. Writes to one
/// Job never affect rows of another.
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Persist a newly started Job.
    async fn create_job(&self, job: &Job) -> Result<(), RepositoryError>;

    /// Append one log row. Rows of a Job keep their append order.
    async fn append_log(&self, log: &JobLog) -> Result<(), RepositoryError>;

    /// Overwrite the running counters of a non-terminal Job.
    async fn update_progress(
        &self,
        job_id: JobId,
        counters: &JobCounters,
    ) -> Result<(), RepositoryError>;

    /// Persist the terminal state of a Job.
    ///
    /// Fails with [`RepositoryError::AlreadyFinished`] if the stored Job is
    /// already terminal.
    async fn finish_job(&self, job: &Job) -> Result<(), RepositoryError>;

    async fn get_job(&self, id: JobId) -> Result<Option<Job>, RepositoryError>;

    async fn list_jobs(&self, query: &JobQuery) -> Result<Vec<Job>, RepositoryError>;

    /// Logs of a Job in emission order.
    async fn list_logs(&self, job_id: JobId) -> Result<Vec<JobLog>, RepositoryError>;

    /// Delete a Job and its logs.
    async fn delete_job(&self, id: JobId) -> Result<(), RepositoryError>;

    /// Mark every Job still `running` as failed with `reason`.
    ///
    /// Called once at startup, before any trigger can fire, to close Jobs
    /// orphaned by a previous process. Returns the number of Jobs closed.
    async fn fail_orphaned_jobs(&self, reason: &str) -> Result<u64, RepositoryError>;
}
