//! Row mapping between SQLite and domain types.

use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::Row;
use uuid::Uuid;

use syncflow_protocols::{ConnectionRef, Job, JobCounters, JobLog, Task, TransferOptions};

pub(crate) const TASK_COLUMNS: &str =
    "id, source, connection, remote_path, direction, schedule, realtime, options";

pub(crate) const JOB_COLUMNS: &str = "id, task_id, status, trigger_kind, started_at, finished_at, \
     files_transferred, bytes_transferred, files_deleted, error_count, error";

pub(crate) const LOG_COLUMNS: &str = "job_id, level, timestamp, path, action, size, message";

/// Fixed-width UTC timestamps so text ordering matches time ordering.
pub(crate) fn format_time(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn conversion_error(
    idx: usize,
    err: impl Into<Box<dyn std::error::Error + Send + Sync>>,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, err.into())
}

fn parse_column<T: FromStr<Err = String>>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|e: String| conversion_error(idx, e))
}

fn parse_uuid(row: &Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    Uuid::parse_str(&raw).map_err(|e| conversion_error(idx, e))
}

fn parse_time(raw: &str, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

fn count(row: &Row<'_>, idx: usize) -> rusqlite::Result<u64> {
    let value: i64 = row.get(idx)?;
    Ok(value.max(0) as u64)
}

pub(crate) fn task_from_row(row: &Row<'_>) -> rusqlite::Result<Task> {
    let source: String = row.get(1)?;
    let connection: String = row.get(2)?;
    let options: String = row.get(7)?;
    let options: TransferOptions =
        serde_json::from_str(&options).map_err(|e| conversion_error(7, e))?;

    Ok(Task {
        id: row.get(0)?,
        source: source.into(),
        connection: ConnectionRef::new(connection),
        remote_path: row.get(3)?,
        direction: parse_column(row, 4)?,
        schedule: row.get(5)?,
        realtime: row.get(6)?,
        options,
    })
}

pub(crate) fn job_from_row(row: &Row<'_>) -> rusqlite::Result<Job> {
    let started_at: String = row.get(4)?;
    let finished_at: Option<String> = row.get(5)?;
    let finished_at = match finished_at {
        Some(raw) => Some(parse_time(&raw, 5)?),
        None => None,
    };

    Ok(Job {
        id: parse_uuid(row, 0)?,
        task_id: row.get(1)?,
        status: parse_column(row, 2)?,
        trigger: parse_column(row, 3)?,
        started_at: parse_time(&started_at, 4)?,
        finished_at,
        counters: JobCounters {
            files_transferred: count(row, 6)?,
            bytes_transferred: count(row, 7)?,
            files_deleted: count(row, 8)?,
            error_count: count(row, 9)?,
        },
        error: row.get(10)?,
    })
}

pub(crate) fn log_from_row(row: &Row<'_>) -> rusqlite::Result<JobLog> {
    let timestamp: String = row.get(2)?;
    let size: Option<i64> = row.get(5)?;
    Ok(JobLog {
        job_id: parse_uuid(row, 0)?,
        level: parse_column(row, 1)?,
        timestamp: parse_time(&timestamp, 2)?,
        path: row.get(3)?,
        action: parse_column(row, 4)?,
        size: size.map(|s| s.max(0) as u64),
        message: row.get(6)?,
    })
}
