use super::*;
use crate::schema::TaskOptionsConfig;

fn task(id: &str) -> TaskConfig {
    TaskConfig {
        id: id.to_string(),
        source: "/home/me/docs".to_string(),
        connection: "gdrive".to_string(),
        remote_path: "docs".to_string(),
        direction: "upload".to_string(),
        schedule: "0 * * * *".to_string(),
        realtime: false,
        options: TaskOptionsConfig::default(),
    }
}

#[test]
fn test_default_config_is_valid() {
    let result = ConfigValidator::validate(&Config::default());
    assert!(result.is_valid());
    assert!(result.warnings.is_empty());
}

#[test]
fn test_zero_debounce_is_error() {
    let mut config = Config::default();
    config.watcher.debounce_ms = 0;
    let result = ConfigValidator::validate(&config);
    assert!(!result.is_valid());
    assert!(result.errors.iter().any(|e| e.path == "watcher.debounce_ms"));
}

#[test]
fn test_max_delay_shorter_than_debounce() {
    let mut config = Config::default();
    config.watcher.debounce_ms = 5_000;
    config.watcher.max_delay_ms = 1_000;
    let result = ConfigValidator::validate(&config);
    assert!(result.errors.iter().any(|e| e.path == "watcher.max_delay_ms"));
}

#[test]
fn test_long_max_delay_warns() {
    let mut config = Config::default();
    config.watcher.max_delay_ms = 60_000;
    let result = ConfigValidator::validate(&config);
    assert!(result.is_valid());
    assert_eq!(result.warnings.len(), 1);
}

#[test]
fn test_duplicate_task_ids() {
    let mut config = Config::default();
    config.tasks = vec![task("docs"), task("docs")];
    let result = ConfigValidator::validate(&config);
    assert!(!result.is_valid());
    assert!(result.errors[0].message.contains("Duplicate"));
}

#[test]
fn test_unknown_direction_and_policies() {
    let mut bad = task("docs");
    bad.direction = "sideways".to_string();
    bad.options.delete_policy = "sometimes".to_string();
    bad.options.conflict_policy = "coinflip".to_string();
    let mut config = Config::default();
    config.tasks = vec![bad];

    let result = ConfigValidator::validate(&config);
    assert_eq!(result.errors.len(), 3);
}

#[test]
fn test_empty_source_and_connection() {
    let mut bad = task("docs");
    bad.source = String::new();
    bad.connection = " ".to_string();
    let mut config = Config::default();
    config.tasks = vec![bad];

    let result = ConfigValidator::validate(&config);
    assert!(result.errors.iter().any(|e| e.path == "tasks[0].source"));
    assert!(result.errors.iter().any(|e| e.path == "tasks[0].connection"));
}

#[test]
fn test_manual_only_task_warns() {
    let mut manual = task("docs");
    manual.schedule = String::new();
    let mut config = Config::default();
    config.tasks = vec![manual];

    let result = ConfigValidator::validate(&config);
    assert!(result.is_valid());
    assert!(result.warnings[0].message.contains("only runs manually"));
}
