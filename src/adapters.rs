//! Conversions from configuration to orchestrator and domain types.

use std::time::Duration;

use syncflow_config::{
    Config, ConfigLoader, ConfigValidator, TaskConfig, ValidationError, ValidationResult,
};
use syncflow_orchestrator::{cron_expr, OrchestratorConfig, RunnerOptions, WatcherOptions};
use syncflow_protocols::{Task, TransferOptions};

/// Build a domain task from its configuration entry.
pub(crate) fn task_from_config(config: &TaskConfig) -> Result<Task, String> {
    let options = TransferOptions {
        filters: config.options.filters.clone(),
        parallelism: config.options.parallelism,
        delete_policy: config.options.delete_policy.parse()?,
        conflict_policy: config.options.conflict_policy.parse()?,
    };

    Ok(Task::new(
        config.id.trim(),
        ConfigLoader::expand_path(&config.source),
        config.connection.trim(),
        config.remote_path.clone(),
    )
    .with_direction(config.direction.parse()?)
    .with_schedule(config.schedule.trim())
    .with_realtime(config.realtime)
    .with_options(options))
}

/// Validate the configuration, including every task's cron schedule.
pub(crate) fn validate_config(config: &Config) -> ValidationResult {
    let mut result = ConfigValidator::validate(config);
    for (i, task) in config.tasks.iter().enumerate() {
        if task.schedule.trim().is_empty() {
            continue;
        }
        if let Err(e) = cron_expr::validate(&task.schedule) {
            result.add_error(ValidationError::new(
                format!("tasks[{}].schedule", i),
                format!("Invalid cron expression '{}': {}", task.schedule, e),
            ));
        }
    }
    result
}

pub(crate) fn orchestrator_config(config: &Config) -> OrchestratorConfig {
    OrchestratorConfig::default()
        .with_scheduler_enabled(config.scheduler.enabled)
        .with_watcher_enabled(config.watcher.enabled)
        .with_runner(RunnerOptions {
            max_file_errors: config.runner.max_file_errors,
        })
        .with_watcher(WatcherOptions {
            debounce: Duration::from_millis(config.watcher.debounce_ms),
            max_delay: Duration::from_millis(config.watcher.max_delay_ms),
            queue_capacity: config.watcher.queue_capacity,
        })
}
