//! Sync engine trait definition.
//!
//! The engine performs diffing, transfer and conflict resolution. The
//! orchestration core only starts it and consumes its event stream.

use std::fmt;
use std::path::PathBuf;
use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::EngineError;
use crate::job::{LogAction, LogLevel};
use crate::task::{ConnectionRef, Direction, Task, TaskId, TransferOptions};

/// A path on a named remote connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteLocation {
    pub connection: ConnectionRef,
    pub path: String,
}

impl fmt::Display for RemoteLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.connection, self.path)
    }
}

/// Input of one engine invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncRequest {
    pub task_id: TaskId,
    pub source: PathBuf,
    pub destination: RemoteLocation,
    pub direction: Direction,
    pub options: TransferOptions,
}

impl SyncRequest {
    pub fn for_task(task: &Task) -> Self {
        Self {
            task_id: task.id.clone(),
            source: task.source.clone(),
            destination: RemoteLocation {
                connection: task.connection.clone(),
                path: task.remote_path.clone(),
            },
            direction: task.direction,
            options: task.options.clone(),
        }
    }
}

/// One progress event emitted by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineEvent {
    pub level: LogLevel,
    pub action: LogAction,
    pub path: Option<String>,
    pub size: Option<u64>,
    pub message: Option<String>,
}

impl EngineEvent {
    pub fn transferred(path: impl Into<String>, size: u64) -> Self {
        Self {
            level: LogLevel::Info,
            action: LogAction::Transferred,
            path: Some(path.into()),
            size: Some(size),
            message: None,
        }
    }

    pub fn deleted(path: impl Into<String>) -> Self {
        Self {
            level: LogLevel::Info,
            action: LogAction::Deleted,
            path: Some(path.into()),
            size: None,
            message: None,
        }
    }

    pub fn skipped(path: impl Into<String>) -> Self {
        Self {
            level: LogLevel::Debug,
            action: LogAction::Skipped,
            path: Some(path.into()),
            size: None,
            message: None,
        }
    }

    /// Non-fatal per-file error (locked, permission denied, ...).
    pub fn file_error(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: LogLevel::Error,
            action: LogAction::Error,
            path: Some(path.into()),
            size: None,
            message: Some(message.into()),
        }
    }

    /// Free-form engine message not tied to a path.
    pub fn message(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            action: LogAction::Unknown,
            path: None,
            size: None,
            message: Some(message.into()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.action == LogAction::Error || self.level == LogLevel::Error
    }
}

/// Lazy, finite, non-restartable sequence of engine events.
///
/// Ends with `None` on a clean finish; an `Err` item is fatal and ends the run.
pub type EngineStream = Pin<Box<dyn Stream<Item = Result<EngineEvent, EngineError>> + Send>>;

/// The external transfer engine.
///
/// Must be safe to call concurrently for different task ids.
#[async_trait]
pub trait SyncEngine: Send + Sync {
    /// Engine identifier, for logs.
    fn id(&self) -> &str;

    /// Start a synchronization. Cancelling `cancel` must stop the transfer.
    async fn synchronize(
        &self,
        request: SyncRequest,
        cancel: CancellationToken,
    ) -> Result<EngineStream, EngineError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_for_task() {
        let task = Task::new("docs", "/home/me/docs", "gdrive", "backup/docs")
            .with_direction(Direction::Bidirectional);
        let request = SyncRequest::for_task(&task);
        assert_eq!(request.task_id, "docs");
        assert_eq!(request.destination.to_string(), "gdrive:backup/docs");
        assert_eq!(request.direction, Direction::Bidirectional);
    }

    #[test]
    fn test_event_error_detection() {
        assert!(EngineEvent::file_error("a", "denied").is_error());
        assert!(EngineEvent::message(LogLevel::Error, "boom").is_error());
        assert!(!EngineEvent::transferred("a", 1).is_error());
        assert!(!EngineEvent::skipped("a").is_error());
    }
}
