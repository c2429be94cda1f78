//! SQLite task catalog and job repository.

use std::path::Path;

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, OptionalExtension};
use tokio_rusqlite::Connection;
use tracing::debug;

use syncflow_protocols::{
    Job, JobCounters, JobId, JobLog, JobQuery, JobRepository, JobStatus, RepositoryError, Task,
    TaskCatalog, TaskStore,
};

use crate::rows::{
    format_time, job_from_row, log_from_row, task_from_row, JOB_COLUMNS, LOG_COLUMNS,
    TASK_COLUMNS,
};
use crate::schema::init_schema;

#[cfg(test)]
#[path = "repository_tests.rs"]
mod tests;

const NOT_TERMINAL: &str = "status IN ('pending', 'running')";

fn query_error(e: tokio_rusqlite::Error) -> RepositoryError {
    RepositoryError::QueryError(e.to_string())
}

/// Result of a guarded update on a Job row.
enum Guarded {
    Updated,
    Missing,
    Terminal(String),
}

/// SQLite-backed [`TaskStore`] and [`JobRepository`].
pub struct SqliteRepository {
    conn: Connection,
}

impl SqliteRepository {
    /// Create a new in-memory database.
    pub async fn in_memory() -> Result<Self, RepositoryError> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| RepositoryError::ConnectionError(e.to_string()))?;
        Self::init(conn).await
    }

    /// Open (or create) a file-backed database.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, RepositoryError> {
        let path = path.as_ref().to_path_buf();
        debug!("Opening job database at {}", path.display());
        let conn = Connection::open(path)
            .await
            .map_err(|e| RepositoryError::ConnectionError(e.to_string()))?;
        Self::init(conn).await
    }

    async fn init(conn: Connection) -> Result<Self, RepositoryError> {
        conn.call(|conn| Ok(init_schema(conn)?))
            .await
            .map_err(query_error)?;
        Ok(Self { conn })
    }

    fn guarded_result(job_id: JobId, outcome: Guarded) -> Result<(), RepositoryError> {
        match outcome {
            Guarded::Updated => Ok(()),
            Guarded::Missing => Err(RepositoryError::JobNotFound(job_id.to_string())),
            Guarded::Terminal(status) => Err(RepositoryError::AlreadyFinished {
                id: job_id.to_string(),
                status: status
                    .parse::<JobStatus>()
                    .map_err(RepositoryError::SerializationError)?,
            }),
        }
    }
}

/// Classify a guarded UPDATE that touched `updated` rows.
fn guard_outcome(
    conn: &rusqlite::Connection,
    id: &str,
    updated: usize,
) -> Result<Guarded, rusqlite::Error> {
    if updated > 0 {
        return Ok(Guarded::Updated);
    }
    let status: Option<String> = conn
        .query_row("SELECT status FROM jobs WHERE id = ?1", [id], |row| row.get(0))
        .optional()?;
    Ok(match status {
        Some(status) => Guarded::Terminal(status),
        None => Guarded::Missing,
    })
}

#[async_trait]
impl TaskCatalog for SqliteRepository {
    async fn list_all_tasks(&self) -> Result<Vec<Task>, RepositoryError> {
        self.conn
            .call(|conn| {
                let mut stmt =
                    conn.prepare(&format!("SELECT {} FROM tasks ORDER BY id", TASK_COLUMNS))?;
                let tasks = stmt
                    .query_map([], task_from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(tasks)
            })
            .await
            .map_err(query_error)
    }

    async fn get_task(&self, id: &str) -> Result<Option<Task>, RepositoryError> {
        let id = id.to_string();
        self.conn
            .call(move |conn| {
                let task = conn
                    .query_row(
                        &format!("SELECT {} FROM tasks WHERE id = ?1", TASK_COLUMNS),
                        [&id],
                        task_from_row,
                    )
                    .optional()?;
                Ok(task)
            })
            .await
            .map_err(query_error)
    }
}

#[async_trait]
impl TaskStore for SqliteRepository {
    async fn upsert_task(&self, task: &Task) -> Result<(), RepositoryError> {
        let options = serde_json::to_string(&task.options)
            .map_err(|e| RepositoryError::SerializationError(e.to_string()))?;
        let task = task.clone();
        let now = format_time(&Utc::now());

        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO tasks (id, source, connection, remote_path, direction, schedule, realtime, options, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                     ON CONFLICT(id) DO UPDATE SET
                        source = excluded.source,
                        connection = excluded.connection,
                        remote_path = excluded.remote_path,
                        direction = excluded.direction,
                        schedule = excluded.schedule,
                        realtime = excluded.realtime,
                        options = excluded.options,
                        updated_at = excluded.updated_at",
                    params![
                        task.id,
                        task.source.to_string_lossy().into_owned(),
                        task.connection.as_str(),
                        task.remote_path,
                        task.direction.as_str(),
                        task.schedule,
                        task.realtime,
                        options,
                        now
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(query_error)
    }

    async fn delete_task(&self, id: &str) -> Result<(), RepositoryError> {
        let id = id.to_string();
        let key = id.clone();
        let deleted = self
            .conn
            .call(move |conn| Ok(conn.execute("DELETE FROM tasks WHERE id = ?1", [&key])?))
            .await
            .map_err(query_error)?;
        if deleted == 0 {
            return Err(RepositoryError::TaskNotFound(id));
        }
        Ok(())
    }
}

#[async_trait]
impl JobRepository for SqliteRepository {
    async fn create_job(&self, job: &Job) -> Result<(), RepositoryError> {
        let job = job.clone();
        self.conn
            .call(move |conn| {
                conn.execute(
                    &format!(
                        "INSERT INTO jobs ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                        JOB_COLUMNS
                    ),
                    params![
                        job.id.to_string(),
                        job.task_id,
                        job.status.as_str(),
                        job.trigger.as_str(),
                        format_time(&job.started_at),
                        job.finished_at.as_ref().map(format_time),
                        job.counters.files_transferred as i64,
                        job.counters.bytes_transferred as i64,
                        job.counters.files_deleted as i64,
                        job.counters.error_count as i64,
                        job.error
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(query_error)
    }

    async fn append_log(&self, log: &JobLog) -> Result<(), RepositoryError> {
        let log = log.clone();
        self.conn
            .call(move |conn| {
                conn.execute(
                    &format!(
                        "INSERT INTO job_logs ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                        LOG_COLUMNS
                    ),
                    params![
                        log.job_id.to_string(),
                        log.level.as_str(),
                        format_time(&log.timestamp),
                        log.path,
                        log.action.as_str(),
                        log.size.map(|s| s as i64),
                        log.message
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(query_error)
    }

    async fn update_progress(
        &self,
        job_id: JobId,
        counters: &JobCounters,
    ) -> Result<(), RepositoryError> {
        let counters = *counters;
        let outcome = self
            .conn
            .call(move |conn| {
                let id = job_id.to_string();
                let updated = conn.execute(
                    &format!(
                        "UPDATE jobs SET files_transferred = ?1, bytes_transferred = ?2,
                         files_deleted = ?3, error_count = ?4
                         WHERE id = ?5 AND {}",
                        NOT_TERMINAL
                    ),
                    params![
                        counters.files_transferred as i64,
                        counters.bytes_transferred as i64,
                        counters.files_deleted as i64,
                        counters.error_count as i64,
                        id
                    ],
                )?;
                Ok(guard_outcome(conn, &id, updated)?)
            })
            .await
            .map_err(query_error)?;
        Self::guarded_result(job_id, outcome)
    }

    async fn finish_job(&self, job: &Job) -> Result<(), RepositoryError> {
        let job = job.clone();
        let job_id = job.id;
        let outcome = self
            .conn
            .call(move |conn| {
                let id = job.id.to_string();
                let updated = conn.execute(
                    &format!(
                        "UPDATE jobs SET status = ?1, finished_at = ?2, files_transferred = ?3,
                         bytes_transferred = ?4, files_deleted = ?5, error_count = ?6, error = ?7
                         WHERE id = ?8 AND {}",
                        NOT_TERMINAL
                    ),
                    params![
                        job.status.as_str(),
                        job.finished_at.as_ref().map(format_time),
                        job.counters.files_transferred as i64,
                        job.counters.bytes_transferred as i64,
                        job.counters.files_deleted as i64,
                        job.counters.error_count as i64,
                        job.error,
                        id
                    ],
                )?;
                Ok(guard_outcome(conn, &id, updated)?)
            })
            .await
            .map_err(query_error)?;
        Self::guarded_result(job_id, outcome)
    }

    async fn get_job(&self, id: JobId) -> Result<Option<Job>, RepositoryError> {
        self.conn
            .call(move |conn| {
                let job = conn
                    .query_row(
                        &format!("SELECT {} FROM jobs WHERE id = ?1", JOB_COLUMNS),
                        [id.to_string()],
                        job_from_row,
                    )
                    .optional()?;
                Ok(job)
            })
            .await
            .map_err(query_error)
    }

    async fn list_jobs(&self, query: &JobQuery) -> Result<Vec<Job>, RepositoryError> {
        let task_id = query.task_id.clone();
        let status = query.status.map(|s| s.as_str().to_string());
        let limit = i64::try_from(query.limit).unwrap_or(i64::MAX);

        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM jobs
                     WHERE (?1 IS NULL OR task_id = ?1) AND (?2 IS NULL OR status = ?2)
                     ORDER BY started_at DESC, rowid DESC
                     LIMIT ?3",
                    JOB_COLUMNS
                ))?;
                let jobs = stmt
                    .query_map(params![task_id, status, limit], job_from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(jobs)
            })
            .await
            .map_err(query_error)
    }

    async fn list_logs(&self, job_id: JobId) -> Result<Vec<JobLog>, RepositoryError> {
        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM job_logs WHERE job_id = ?1 ORDER BY seq",
                    LOG_COLUMNS
                ))?;
                let logs = stmt
                    .query_map([job_id.to_string()], log_from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(logs)
            })
            .await
            .map_err(query_error)
    }

    async fn delete_job(&self, id: JobId) -> Result<(), RepositoryError> {
        let deleted = self
            .conn
            .call(move |conn| Ok(conn.execute("DELETE FROM jobs WHERE id = ?1", [id.to_string()])?))
            .await
            .map_err(query_error)?;
        if deleted == 0 {
            return Err(RepositoryError::JobNotFound(id.to_string()));
        }
        Ok(())
    }

    async fn fail_orphaned_jobs(&self, reason: &str) -> Result<u64, RepositoryError> {
        let reason = reason.to_string();
        let now = format_time(&Utc::now());
        let closed = self
            .conn
            .call(move |conn| {
                Ok(conn.execute(
                    "UPDATE jobs SET status = 'failed', finished_at = ?1, error = ?2
                     WHERE status = 'running'",
                    params![now, reason],
                )?)
            })
            .await
            .map_err(query_error)?;
        Ok(closed as u64)
    }
}
