//! Orchestrator configuration.

use std::time::Duration;

/// Runner failure policy.
#[derive(Debug, Clone, Default)]
pub struct RunnerOptions {
    /// Fail a Job whose file-level error count exceeds this (0 = never).
    pub max_file_errors: u64,
}

/// Filesystem trigger tuning.
#[derive(Debug, Clone)]
pub struct WatcherOptions {
    /// Quiet period that collapses a burst of changes into one trigger.
    pub debounce: Duration,
    /// Upper bound between the first change of a burst and its trigger.
    pub max_delay: Duration,
    /// Bounded event queue per watched task.
    pub queue_capacity: usize,
}

impl Default for WatcherOptions {
    fn default() -> Self {
        Self {
            debounce: Duration::from_secs(3),
            max_delay: Duration::from_secs(30),
            queue_capacity: 1024,
        }
    }
}

/// Top-level orchestrator configuration.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub scheduler_enabled: bool,
    pub watcher_enabled: bool,
    pub runner: RunnerOptions,
    pub watcher: WatcherOptions,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            scheduler_enabled: true,
            watcher_enabled: true,
            runner: RunnerOptions::default(),
            watcher: WatcherOptions::default(),
        }
    }
}

impl OrchestratorConfig {
    pub fn with_runner(mut self, runner: RunnerOptions) -> Self {
        self.runner = runner;
        self
    }

    pub fn with_watcher(mut self, watcher: WatcherOptions) -> Self {
        self.watcher = watcher;
        self
    }

    pub fn with_scheduler_enabled(mut self, enabled: bool) -> Self {
        self.scheduler_enabled = enabled;
        self
    }

    pub fn with_watcher_enabled(mut self, enabled: bool) -> Self {
        self.watcher_enabled = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = OrchestratorConfig::default();
        assert!(config.scheduler_enabled);
        assert!(config.watcher_enabled);
        assert_eq!(config.runner.max_file_errors, 0);
        assert_eq!(config.watcher.debounce, Duration::from_secs(3));
        assert_eq!(config.watcher.max_delay, Duration::from_secs(30));
    }

    #[test]
    fn test_builder() {
        let config = OrchestratorConfig::default()
            .with_scheduler_enabled(false)
            .with_runner(RunnerOptions { max_file_errors: 5 });
        assert!(!config.scheduler_enabled);
        assert_eq!(config.runner.max_file_errors, 5);
    }
}
