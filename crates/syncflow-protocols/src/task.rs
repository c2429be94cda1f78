//! Task definitions.
//!
//! A task is owned by the task-management domain. The orchestration core
//! reads it to decide when to trigger and what to hand to the sync engine.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Task identity.
pub type TaskId = String;

/// Reference to a named remote connection.
///
/// The connection itself (credentials, endpoint) is stored encrypted by the
/// task-management domain. The core only passes this name through to the
/// sync engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionRef(pub String);

impl ConnectionRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Transfer direction between the local source and the remote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Local -> remote.
    #[default]
    Upload,
    /// Remote -> local.
    Download,
    /// Both ways.
    Bidirectional,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Upload => "upload",
            Direction::Download => "download",
            Direction::Bidirectional => "bidirectional",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "upload" => Ok(Direction::Upload),
            "download" => Ok(Direction::Download),
            "bidirectional" => Ok(Direction::Bidirectional),
            other => Err(format!("unknown direction: {}", other)),
        }
    }
}

/// When files missing on the source side are removed from the destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeletePolicy {
    /// Never delete on the destination.
    #[default]
    Never,
    Before,
    During,
    After,
}

impl FromStr for DeletePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "never" => Ok(DeletePolicy::Never),
            "before" => Ok(DeletePolicy::Before),
            "during" => Ok(DeletePolicy::During),
            "after" => Ok(DeletePolicy::After),
            other => Err(format!("unknown delete policy: {}", other)),
        }
    }
}

/// How the engine resolves a file changed on both sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictPolicy {
    /// Keep the newer modification time.
    #[default]
    Newer,
    Older,
    Larger,
    Smaller,
    /// Keep both copies, renaming the loser.
    Rename,
}

impl FromStr for ConflictPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "newer" => Ok(ConflictPolicy::Newer),
            "older" => Ok(ConflictPolicy::Older),
            "larger" => Ok(ConflictPolicy::Larger),
            "smaller" => Ok(ConflictPolicy::Smaller),
            "rename" => Ok(ConflictPolicy::Rename),
            other => Err(format!("unknown conflict policy: {}", other)),
        }
    }
}

/// Transfer options forwarded verbatim to the sync engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferOptions {
    /// Filter rules (engine syntax, e.g. `- *.tmp`).
    #[serde(default)]
    pub filters: Vec<String>,
    /// Number of parallel transfers.
    #[serde(default = "default_parallelism")]
    pub parallelism: u32,
    #[serde(default)]
    pub delete_policy: DeletePolicy,
    #[serde(default)]
    pub conflict_policy: ConflictPolicy,
}

fn default_parallelism() -> u32 {
    4
}

impl Default for TransferOptions {
    fn default() -> Self {
        Self {
            filters: Vec::new(),
            parallelism: default_parallelism(),
            delete_policy: DeletePolicy::default(),
            conflict_policy: ConflictPolicy::default(),
        }
    }
}

/// A synchronization definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    /// Local path.
    pub source: PathBuf,
    pub connection: ConnectionRef,
    /// Path on the remote connection.
    pub remote_path: String,
    #[serde(default)]
    pub direction: Direction,
    /// Cron expression; empty means no recurring trigger.
    #[serde(default)]
    pub schedule: String,
    /// Trigger on filesystem changes under `source`.
    #[serde(default)]
    pub realtime: bool,
    #[serde(default)]
    pub options: TransferOptions,
}

impl Task {
    /// Create a task with default direction, no schedule and no realtime trigger.
    pub fn new(
        id: impl Into<String>,
        source: impl Into<PathBuf>,
        connection: impl Into<String>,
        remote_path: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            connection: ConnectionRef::new(connection),
            remote_path: remote_path.into(),
            direction: Direction::default(),
            schedule: String::new(),
            realtime: false,
            options: TransferOptions::default(),
        }
    }

    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    pub fn with_schedule(mut self, schedule: impl Into<String>) -> Self {
        self.schedule = schedule.into();
        self
    }

    pub fn with_realtime(mut self, realtime: bool) -> Self {
        self.realtime = realtime;
        self
    }

    pub fn with_options(mut self, options: TransferOptions) -> Self {
        self.options = options;
        self
    }

    /// Whether the task has a recurring trigger.
    pub fn has_schedule(&self) -> bool {
        !self.schedule.trim().is_empty()
    }
}

/// Notification emitted by the task-management domain.
#[derive(Debug, Clone)]
pub enum TaskChange {
    Created(Task),
    Updated(Task),
    Deleted(TaskId),
}

impl TaskChange {
    pub fn task_id(&self) -> &str {
        match self {
            TaskChange::Created(task) | TaskChange::Updated(task) => &task.id,
            TaskChange::Deleted(id) => id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_new_defaults() {
        let task = Task::new("docs", "/home/me/docs", "gdrive", "backup/docs");
        assert_eq!(task.direction, Direction::Upload);
        assert!(!task.has_schedule());
        assert!(!task.realtime);
        assert_eq!(task.options.parallelism, 4);
    }

    #[test]
    fn test_blank_schedule_is_no_schedule() {
        let task = Task::new("t", "/tmp", "remote", "").with_schedule("   ");
        assert!(!task.has_schedule());
        let task = task.with_schedule("@daily");
        assert!(task.has_schedule());
    }

    #[test]
    fn test_direction_round_trip_str() {
        for d in [Direction::Upload, Direction::Download, Direction::Bidirectional] {
            assert_eq!(d.as_str().parse::<Direction>().unwrap(), d);
        }
        assert!("sideways".parse::<Direction>().is_err());
    }

    #[test]
    fn test_task_deserialize_with_defaults() {
        let json = r#"{
            "id": "photos",
            "source": "/data/photos",
            "connection": "s3",
            "remote_path": "photos",
            "realtime": true
        }"#;
        let task: Task = serde_json::from_str(json).unwrap();
        assert_eq!(task.connection.as_str(), "s3");
        assert!(task.realtime);
        assert_eq!(task.options.delete_policy, DeletePolicy::Never);
        assert_eq!(task.options.conflict_policy, ConflictPolicy::Newer);
    }

    #[test]
    fn test_task_change_id() {
        let task = Task::new("a", "/tmp", "r", "p");
        assert_eq!(TaskChange::Created(task.clone()).task_id(), "a");
        assert_eq!(TaskChange::Updated(task).task_id(), "a");
        assert_eq!(TaskChange::Deleted("b".to_string()).task_id(), "b");
    }
}
