//! Tests for Job lifecycle and counters.

use super::*;

#[test]
fn test_job_start_is_running() {
    let job = Job::start("docs", TriggerKind::Manual);
    assert_eq!(job.status, JobStatus::Running);
    assert_eq!(job.trigger, TriggerKind::Manual);
    assert!(job.finished_at.is_none());
    assert_eq!(job.counters, JobCounters::default());
}

#[test]
fn test_job_finish_success() {
    let mut job = Job::start("docs", TriggerKind::Schedule);
    job.finish(JobStatus::Success, None).unwrap();
    assert_eq!(job.status, JobStatus::Success);
    assert!(job.finished_at.is_some());
    assert!(job.duration().is_some());
}

#[test]
fn test_terminal_status_is_final() {
    let mut job = Job::start("docs", TriggerKind::Schedule);
    job.finish(JobStatus::Failed, Some("unreachable".to_string()))
        .unwrap();

    let err = job.finish(JobStatus::Success, None).unwrap_err();
    assert_eq!(err.from, JobStatus::Failed);
    assert_eq!(err.to, JobStatus::Success);
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.error.as_deref(), Some("unreachable"));
}

#[test]
fn test_finish_rejects_non_terminal() {
    let mut job = Job::start("docs", TriggerKind::Realtime);
    assert!(job.finish(JobStatus::Running, None).is_err());
    assert!(job.finish(JobStatus::Pending, None).is_err());
    assert_eq!(job.status, JobStatus::Running);
}

#[test]
fn test_status_transitions() {
    assert!(JobStatus::Pending.can_transition_to(JobStatus::Running));
    assert!(JobStatus::Running.can_transition_to(JobStatus::Cancelled));
    assert!(!JobStatus::Running.can_transition_to(JobStatus::Pending));
    for terminal in [JobStatus::Success, JobStatus::Failed, JobStatus::Cancelled] {
        assert!(terminal.is_terminal());
        assert!(!terminal.can_transition_to(JobStatus::Running));
        assert!(!terminal.can_transition_to(JobStatus::Success));
    }
}

#[test]
fn test_counters_apply_events() {
    let mut counters = JobCounters::default();
    counters.apply(&EngineEvent::transferred("a.txt", 100));
    counters.apply(&EngineEvent::transferred("b.txt", 50));
    counters.apply(&EngineEvent::deleted("old.txt"));
    counters.apply(&EngineEvent::file_error("locked.db", "file is locked"));
    counters.apply(&EngineEvent::skipped("same.txt"));

    assert_eq!(counters.files_transferred, 2);
    assert_eq!(counters.bytes_transferred, 150);
    assert_eq!(counters.files_deleted, 1);
    assert_eq!(counters.error_count, 1);
}

#[test]
fn test_run_level_error_is_not_a_file_error() {
    let mut counters = JobCounters::default();
    counters.apply(&EngineEvent::file_error("locked.db", "file is locked"));
    counters.apply(&EngineEvent::message(LogLevel::Error, "Attempt 1/1 failed with 1 errors"));
    assert_eq!(counters.error_count, 1);
}

#[test]
fn test_job_log_from_event() {
    let job = Job::start("docs", TriggerKind::Manual);
    let log = JobLog::from_event(job.id, &EngineEvent::transferred("x/y.bin", 42));
    assert_eq!(log.job_id, job.id);
    assert_eq!(log.action, LogAction::Transferred);
    assert_eq!(log.path.as_deref(), Some("x/y.bin"));
    assert_eq!(log.size, Some(42));
    assert_eq!(log.level, LogLevel::Info);
}

#[test]
fn test_enum_strings_parse() {
    assert_eq!("realtime".parse::<TriggerKind>().unwrap(), TriggerKind::Realtime);
    assert_eq!("cancelled".parse::<JobStatus>().unwrap(), JobStatus::Cancelled);
    assert_eq!("warn".parse::<LogLevel>().unwrap(), LogLevel::Warning);
    assert_eq!("skipped".parse::<LogAction>().unwrap(), LogAction::Skipped);
    assert!("later".parse::<TriggerKind>().is_err());
}

#[test]
fn test_job_serializes_flat_counters() {
    let job = Job::start("docs", TriggerKind::Schedule);
    let value = serde_json::to_value(&job).unwrap();
    assert_eq!(value["status"], "running");
    assert_eq!(value["trigger"], "schedule");
    assert_eq!(value["files_transferred"], 0);
}
