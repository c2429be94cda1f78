//! Job and JobLog records.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::engine::EngineEvent;
use crate::task::TaskId;

/// Job identity.
pub type JobId = Uuid;

/// Origin of a Job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerKind {
    Schedule,
    Realtime,
    Manual,
}

impl TriggerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerKind::Schedule => "schedule",
            TriggerKind::Realtime => "realtime",
            TriggerKind::Manual => "manual",
        }
    }
}

impl fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TriggerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "schedule" => Ok(TriggerKind::Schedule),
            "realtime" => Ok(TriggerKind::Realtime),
            "manual" => Ok(TriggerKind::Manual),
            other => Err(format!("unknown trigger kind: {}", other)),
        }
    }
}

/// Job status.
///
/// `pending -> running -> {success | failed | cancelled}`. Terminal states
/// never change again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    #[default]
    Pending,
    Running,
    Success,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Success => "success",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Success | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    /// Whether `self -> next` is a legal transition.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        match (self, next) {
            (JobStatus::Pending, JobStatus::Running) => true,
            (JobStatus::Pending | JobStatus::Running, n) => n.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "running" => Ok(JobStatus::Running),
            "success" => Ok(JobStatus::Success),
            "failed" => Ok(JobStatus::Failed),
            "cancelled" => Ok(JobStatus::Cancelled),
            other => Err(format!("unknown job status: {}", other)),
        }
    }
}

/// Rejected status change.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Invalid job transition from {from} to {to}")]
pub struct JobTransitionError {
    pub from: JobStatus,
    pub to: JobStatus,
}

/// Running counters of a Job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobCounters {
    pub files_transferred: u64,
    pub bytes_transferred: u64,
    pub files_deleted: u64,
    pub error_count: u64,
}

impl JobCounters {
    /// Fold one engine event into the counters.
    ///
    /// `error_count` counts per-file errors only.
    pub fn apply(&mut self, event: &EngineEvent) {
        match event.action {
            LogAction::Transferred => {
                self.files_transferred += 1;
                self.bytes_transferred += event.size.unwrap_or(0);
            }
            LogAction::Deleted => self.files_deleted += 1,
            LogAction::Error => self.error_count += 1,
            // Run-level messages stay in the log but are not file errors.
            LogAction::Skipped | LogAction::Unknown => {}
        }
    }
}

/// One execution of a Task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub task_id: TaskId,
    pub status: JobStatus,
    pub trigger: TriggerKind,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub counters: JobCounters,
    /// Aggregated error text, present when errors occurred.
    pub error: Option<String>,
}

impl Job {
    /// Create a Job in `running` state, started now.
    pub fn start(task_id: impl Into<TaskId>, trigger: TriggerKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            task_id: task_id.into(),
            status: JobStatus::Running,
            trigger,
            started_at: Utc::now(),
            finished_at: None,
            counters: JobCounters::default(),
            error: None,
        }
    }

    /// Fold an engine event into the counters.
    pub fn apply_event(&mut self, event: &EngineEvent) {
        self.counters.apply(event);
    }

    /// Move to a terminal status and stamp the end time.
    pub fn finish(
        &mut self,
        status: JobStatus,
        error: Option<String>,
    ) -> Result<(), JobTransitionError> {
        if !status.is_terminal() || !self.status.can_transition_to(status) {
            return Err(JobTransitionError {
                from: self.status,
                to: status,
            });
        }
        self.status = status;
        self.finished_at = Some(Utc::now());
        self.error = error;
        Ok(())
    }

    pub fn is_finished(&self) -> bool {
        self.status.is_terminal()
    }

    /// Wall time between start and end, if finished.
    pub fn duration(&self) -> Option<chrono::Duration> {
        self.finished_at.map(|end| end - self.started_at)
    }
}

/// JobLog severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warning,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warning",
            LogLevel::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warning" | "warn" => Ok(LogLevel::Warning),
            "error" => Ok(LogLevel::Error),
            other => Err(format!("unknown log level: {}", other)),
        }
    }
}

/// What happened to a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogAction {
    Transferred,
    Deleted,
    Error,
    Skipped,
    #[default]
    Unknown,
}

impl LogAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogAction::Transferred => "transferred",
            LogAction::Deleted => "deleted",
            LogAction::Error => "error",
            LogAction::Skipped => "skipped",
            LogAction::Unknown => "unknown",
        }
    }
}

impl fmt::Display for LogAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "transferred" => Ok(LogAction::Transferred),
            "deleted" => Ok(LogAction::Deleted),
            "error" => Ok(LogAction::Error),
            "skipped" => Ok(LogAction::Skipped),
            "unknown" => Ok(LogAction::Unknown),
            other => Err(format!("unknown log action: {}", other)),
        }
    }
}

/// One append-only event of a Job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobLog {
    pub job_id: JobId,
    pub level: LogLevel,
    pub timestamp: DateTime<Utc>,
    pub path: Option<String>,
    pub action: LogAction,
    pub size: Option<u64>,
    pub message: Option<String>,
}

impl JobLog {
    /// Record an engine event for a Job, stamped now.
    pub fn from_event(job_id: JobId, event: &EngineEvent) -> Self {
        Self {
            job_id,
            level: event.level,
            timestamp: Utc::now(),
            path: event.path.clone(),
            action: event.action,
            size: event.size,
            message: event.message.clone(),
        }
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
