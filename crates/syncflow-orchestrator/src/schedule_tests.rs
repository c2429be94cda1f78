use super::*;
use crate::dispatch::{trigger_channel, TriggerReceiver};
use crate::store::MemoryRepository;

fn task(id: &str, schedule: &str) -> Task {
    Task::new(id, "/tmp/src", "remote", "backup").with_schedule(schedule)
}

fn manager(tasks: Vec<Task>) -> (ScheduleManager, TriggerReceiver) {
    let (tx, rx) = trigger_channel();
    let catalog = Arc::new(MemoryRepository::with_tasks(tasks));
    (ScheduleManager::new(catalog, tx), rx)
}

#[tokio::test]
async fn test_start_registers_scheduled_tasks() {
    let (manager, _rx) = manager(vec![
        task("hourly", "@hourly"),
        task("manual", ""),
        task("broken", "invalid cron"),
        task("weekdays", "0 9 * * 1-5"),
    ]);

    let registered = manager.start().await.unwrap();
    assert_eq!(registered, 2);
    assert!(manager.is_running());
    assert!(manager.contains("hourly"));
    assert!(manager.contains("weekdays"));
    assert!(!manager.contains("manual"));
    assert!(!manager.contains("broken"));
}

#[tokio::test]
async fn test_start_twice_is_noop() {
    let (manager, _rx) = manager(vec![task("hourly", "@hourly")]);
    assert_eq!(manager.start().await.unwrap(), 1);
    assert_eq!(manager.start().await.unwrap(), 0);
    assert_eq!(manager.len(), 1);
}

#[tokio::test]
async fn test_add_task_replaces_existing_entry() {
    let (manager, _rx) = manager(vec![]);
    manager.start().await.unwrap();

    assert!(manager.add_task(&task("docs", "@hourly")).unwrap());
    assert!(manager.add_task(&task("docs", "@hourly")).unwrap());
    assert_eq!(manager.len(), 1);

    assert!(manager.add_task(&task("docs", "*/5 * * * *")).unwrap());
    assert_eq!(manager.len(), 1);
    assert_eq!(manager.expression("docs").as_deref(), Some("*/5 * * * *"));
}

#[tokio::test]
async fn test_invalid_update_keeps_previous_timer() {
    let (manager, _rx) = manager(vec![]);
    manager.start().await.unwrap();
    manager.add_task(&task("docs", "@daily")).unwrap();

    let err = manager.add_task(&task("docs", "invalid cron")).unwrap_err();
    assert!(matches!(err, ScheduleError::InvalidExpression { .. }));
    assert_eq!(manager.expression("docs").as_deref(), Some("@daily"));
}

#[tokio::test]
async fn test_six_field_expression_rejected() {
    let (manager, _rx) = manager(vec![]);
    manager.start().await.unwrap();
    let err = manager.add_task(&task("docs", "0 */5 * * * *")).unwrap_err();
    assert!(err.to_string().contains("0 */5 * * * *"));
    assert!(manager.is_empty());
}

#[tokio::test]
async fn test_empty_schedule_is_noop() {
    let (manager, _rx) = manager(vec![]);
    manager.start().await.unwrap();
    assert!(!manager.add_task(&task("docs", "   ")).unwrap());
    assert!(manager.is_empty());
}

#[tokio::test]
async fn test_remove_and_stop() {
    let (manager, _rx) = manager(vec![task("a", "@hourly"), task("b", "@daily")]);
    manager.start().await.unwrap();

    assert!(manager.remove_task("a"));
    assert!(!manager.remove_task("a"));
    assert_eq!(manager.len(), 1);

    assert!(manager.stop());
    assert!(!manager.stop());
    assert!(manager.is_empty());
    assert!(!manager.is_running());
}

#[tokio::test]
async fn test_add_while_stopped_validates_only() {
    let (manager, _rx) = manager(vec![]);
    assert!(!manager.add_task(&task("docs", "@hourly")).unwrap());
    assert!(manager.add_task(&task("docs", "bogus")).is_err());
    assert!(manager.is_empty());
}

#[tokio::test]
async fn test_next_fire_time() {
    let (manager, _rx) = manager(vec![task("docs", "*/1 * * * *")]);
    manager.start().await.unwrap();

    let next = manager.next_fire_time("docs").unwrap();
    let until = next - Local::now();
    assert!(until <= chrono::Duration::seconds(60));
    assert!(manager.next_fire_time("missing").is_none());
}

#[tokio::test(start_paused = true)]
async fn test_timer_emits_schedule_trigger() {
    let (manager, mut rx) = manager(vec![task("docs", "*/1 * * * *")]);
    manager.start().await.unwrap();

    let request = tokio::time::timeout(Duration::from_secs(61), rx.recv())
        .await
        .expect("timer should fire within a minute")
        .unwrap();
    assert_eq!(request, TriggerRequest::new("docs", TriggerKind::Schedule));

    // Next firing is at least a minute of wall time away.
    assert!(
        tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .is_err()
    );
}

#[tokio::test(start_paused = true)]
async fn test_removed_timer_stops_firing() {
    let (manager, mut rx) = manager(vec![task("docs", "*/1 * * * *")]);
    manager.start().await.unwrap();
    manager.remove_task("docs");

    assert!(
        tokio::time::timeout(Duration::from_secs(180), rx.recv())
            .await
            .is_err()
    );
}
