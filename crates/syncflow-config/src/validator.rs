//! Configuration validation.

use std::collections::HashSet;

use crate::schema::{Config, TaskConfig};

/// Validation result.
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }
}

/// A validation error.
#[derive(Debug)]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// A validation warning.
#[derive(Debug)]
pub struct ValidationWarning {
    pub path: String,
    pub message: String,
}

impl ValidationWarning {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

const DIRECTIONS: &[&str] = &["upload", "download", "bidirectional"];
const DELETE_POLICIES: &[&str] = &["never", "before", "during", "after"];
const CONFLICT_POLICIES: &[&str] = &["newer", "older", "larger", "smaller", "rename"];

/// Configuration validator.
///
/// Cron expressions are not checked here; the grammar lives with the
/// scheduler, and the binary checks schedules with it on top of this result.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration.
    pub fn validate(config: &Config) -> ValidationResult {
        let mut result = ValidationResult::default();

        Self::validate_storage(config, &mut result);
        Self::validate_watcher(config, &mut result);
        Self::validate_engine(config, &mut result);
        Self::validate_tasks(config, &mut result);

        result
    }

    fn validate_storage(config: &Config, result: &mut ValidationResult) {
        if config.storage.database.trim().is_empty() {
            result.add_error(ValidationError::new(
                "storage.database",
                "Database path cannot be empty",
            ));
        }
    }

    fn validate_watcher(config: &Config, result: &mut ValidationResult) {
        let watcher = &config.watcher;
        if watcher.debounce_ms == 0 {
            result.add_error(ValidationError::new(
                "watcher.debounce_ms",
                "Debounce window must be greater than 0",
            ));
        }
        if watcher.max_delay_ms < watcher.debounce_ms {
            result.add_error(ValidationError::new(
                "watcher.max_delay_ms",
                "Maximum delay must not be shorter than the debounce window",
            ));
        }
        if watcher.queue_capacity == 0 {
            result.add_error(ValidationError::new(
                "watcher.queue_capacity",
                "Event queue capacity must be greater than 0",
            ));
        }
        if watcher.max_delay_ms > 30_000 {
            result.add_warning(ValidationWarning::new(
                "watcher.max_delay_ms",
                "Realtime triggers may fire later than 30 seconds after a change",
            ));
        }
    }

    fn validate_engine(config: &Config, result: &mut ValidationResult) {
        if config.engine.binary.trim().is_empty() {
            result.add_error(ValidationError::new(
                "engine.binary",
                "Engine binary cannot be empty",
            ));
        }
    }

    fn validate_tasks(config: &Config, result: &mut ValidationResult) {
        let mut seen = HashSet::new();

        for (i, task) in config.tasks.iter().enumerate() {
            let path = format!("tasks[{}]", i);

            if task.id.trim().is_empty() {
                result.add_error(ValidationError::new(
                    format!("{}.id", path),
                    "Task id cannot be empty",
                ));
            } else if !seen.insert(task.id.as_str()) {
                result.add_error(ValidationError::new(
                    format!("{}.id", path),
                    format!("Duplicate task id '{}'", task.id),
                ));
            }

            Self::validate_task(task, &path, result);
        }
    }

    fn validate_task(task: &TaskConfig, path: &str, result: &mut ValidationResult) {
        if task.source.trim().is_empty() {
            result.add_error(ValidationError::new(
                format!("{}.source", path),
                "Source path cannot be empty",
            ));
        }
        if task.connection.trim().is_empty() {
            result.add_error(ValidationError::new(
                format!("{}.connection", path),
                "Connection cannot be empty",
            ));
        }
        if !DIRECTIONS.contains(&task.direction.as_str()) {
            result.add_error(ValidationError::new(
                format!("{}.direction", path),
                format!("Unknown direction '{}'", task.direction),
            ));
        }
        if !DELETE_POLICIES.contains(&task.options.delete_policy.as_str()) {
            result.add_error(ValidationError::new(
                format!("{}.options.delete_policy", path),
                format!("Unknown delete policy '{}'", task.options.delete_policy),
            ));
        }
        if !CONFLICT_POLICIES.contains(&task.options.conflict_policy.as_str()) {
            result.add_error(ValidationError::new(
                format!("{}.options.conflict_policy", path),
                format!("Unknown conflict policy '{}'", task.options.conflict_policy),
            ));
        }
        if task.options.parallelism == 0 {
            result.add_error(ValidationError::new(
                format!("{}.options.parallelism", path),
                "Parallelism must be greater than 0",
            ));
        }
        if task.schedule.trim().is_empty() && !task.realtime {
            result.add_warning(ValidationWarning::new(
                path,
                format!("Task '{}' has no schedule and no realtime trigger; it only runs manually", task.id),
            ));
        }
    }
}

#[cfg(test)]
#[path = "validator_tests.rs"]
mod tests;
