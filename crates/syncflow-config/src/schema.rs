//! Configuration schema definitions.

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub runner: RunnerConfig,

    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub watcher: WatcherConfig,

    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Task definitions imported into the task view at startup.
    #[serde(default)]
    pub tasks: Vec<TaskConfig>,
}

pub(crate) fn default_true() -> bool {
    true
}

/// Job history storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite database path (`~` is expanded).
    #[serde(default = "default_database")]
    pub database: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database: default_database(),
        }
    }
}

fn default_database() -> String {
    "~/.syncflow/syncflow.db".to_string()
}

/// Runner failure policy.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Fail a Job whose file-level error count exceeds this (0 = never).
    #[serde(default)]
    pub max_file_errors: u64,
}

/// Cron trigger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
        }
    }
}

/// Filesystem trigger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatcherConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Quiet period that collapses a burst of changes.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Upper bound between the first change of a burst and its trigger.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Bounded event queue per watched task.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_debounce_ms() -> u64 {
    3_000
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_queue_capacity() -> usize {
    1024
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            debounce_ms: default_debounce_ms(),
            max_delay_ms: default_max_delay_ms(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

/// External sync engine invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Engine binary name or path.
    #[serde(default = "default_engine_binary")]
    pub binary: String,

    /// Extra arguments appended to every invocation.
    #[serde(default)]
    pub extra_args: Vec<String>,
}

fn default_engine_binary() -> String {
    "rclone".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            binary: default_engine_binary(),
            extra_args: Vec::new(),
        }
    }
}

/// Log output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Directory for daily-rolling log files (`~` is expanded).
    #[serde(default = "default_log_directory")]
    pub directory: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_directory() -> String {
    "~/.syncflow/logs".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            directory: default_log_directory(),
        }
    }
}

/// A task definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskConfig {
    pub id: String,
    pub source: String,
    pub connection: String,
    #[serde(default)]
    pub remote_path: String,
    #[serde(default = "default_direction")]
    pub direction: String,
    /// Cron expression; empty or absent means manual/realtime only.
    #[serde(default)]
    pub schedule: String,
    #[serde(default)]
    pub realtime: bool,
    #[serde(default)]
    pub options: TaskOptionsConfig,
}

fn default_direction() -> String {
    "upload".to_string()
}

/// Transfer options of a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskOptionsConfig {
    #[serde(default)]
    pub filters: Vec<String>,
    #[serde(default = "default_parallelism")]
    pub parallelism: u32,
    #[serde(default = "default_delete_policy")]
    pub delete_policy: String,
    #[serde(default = "default_conflict_policy")]
    pub conflict_policy: String,
}

fn default_parallelism() -> u32 {
    4
}

fn default_delete_policy() -> String {
    "never".to_string()
}

fn default_conflict_policy() -> String {
    "newer".to_string()
}

impl Default for TaskOptionsConfig {
    fn default() -> Self {
        Self {
            filters: Vec::new(),
            parallelism: default_parallelism(),
            delete_policy: default_delete_policy(),
            conflict_policy: default_conflict_policy(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.storage.database, "~/.syncflow/syncflow.db");
        assert_eq!(config.runner.max_file_errors, 0);
        assert!(config.scheduler.enabled);
        assert!(config.watcher.enabled);
        assert_eq!(config.watcher.debounce_ms, 3_000);
        assert_eq!(config.watcher.max_delay_ms, 30_000);
        assert_eq!(config.engine.binary, "rclone");
        assert_eq!(config.logging.level, "info");
        assert!(config.tasks.is_empty());
    }

    #[test]
    fn test_task_defaults() {
        let task: TaskConfig = toml::from_str(
            r#"
            id = "docs"
            source = "/home/me/docs"
            connection = "gdrive"
            "#,
        )
        .unwrap();
        assert_eq!(task.direction, "upload");
        assert!(task.schedule.is_empty());
        assert!(!task.realtime);
        assert_eq!(task.options.delete_policy, "never");
        assert_eq!(task.options.conflict_policy, "newer");
    }
}
