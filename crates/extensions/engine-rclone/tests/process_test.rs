//! Runs the engine against stand-in rclone scripts.
#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use futures::StreamExt;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use syncflow_engine_rclone::RcloneEngine;
use syncflow_protocols::{
    EngineError, EngineEvent, JobCounters, LogAction, LogLevel, SyncEngine, SyncRequest, Task,
};

fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path
}

async fn run(
    script: &Path,
    cancel: CancellationToken,
) -> (Vec<EngineEvent>, Option<EngineError>) {
    let engine = RcloneEngine::new(script.to_string_lossy());
    let request = SyncRequest::for_task(&Task::new("docs", "/tmp", "remote", "backup"));
    let mut stream = engine.synchronize(request, cancel).await.unwrap();

    let mut events = Vec::new();
    while let Some(item) = stream.next().await {
        match item {
            Ok(event) => events.push(event),
            Err(e) => return (events, Some(e)),
        }
    }
    (events, None)
}

// Scripts are all written before the first spawn; one test keeps
// concurrent forks from holding a script open for writing.
#[tokio::test]
async fn test_scripted_rclone_runs() {
    let dir = TempDir::new().unwrap();
    let clean = write_script(
        dir.path(),
        "clean.sh",
        r#"echo '{"level":"info","msg":"Copied (new)","object":"a.txt","size":5}' >&2
echo '{"level":"error","msg":"Failed to copy: permission denied","object":"b.lock"}' >&2
echo '{"level":"info","msg":"Deleted","object":"old.txt"}' >&2
exit 6"#,
    );
    let fatal = write_script(
        dir.path(),
        "fatal.sh",
        r#"echo '{"level":"error","msg":"Failed to create file system: did not find section in config file"}' >&2
exit 1"#,
    );
    let hang = write_script(
        dir.path(),
        "hang.sh",
        r#"echo '{"level":"info","msg":"Copied (new)","object":"first.txt"}' >&2
exec sleep 30"#,
    );
    let partial = write_script(
        dir.path(),
        "partial.sh",
        r#"echo '{"level":"error","msg":"Failed to copy: file is locked","object":"a.db"}' >&2
echo '{"level":"error","msg":"Failed to copy: permission denied","object":"b.db"}' >&2
echo '{"level":"error","msg":"Failed to copy: permission denied","object":"c.db"}' >&2
echo '{"level":"error","msg":"Attempt 1/1 failed with 3 errors and: permission denied"}' >&2
echo '{"level":"error","msg":"Failed to copy with 3 errors: last error was: permission denied"}' >&2
exit 6"#,
    );
    let args = write_script(dir.path(), "args.sh", r#"echo "$@" >&2"#);

    // Per-file errors with a partial-failure exit end cleanly.
    let (events, err) = run(&clean, CancellationToken::new()).await;
    assert!(err.is_none());
    let actions: Vec<_> = events.iter().map(|e| e.action).collect();
    assert_eq!(
        actions,
        vec![LogAction::Transferred, LogAction::Error, LogAction::Deleted]
    );
    assert_eq!(events[0].size, Some(5));

    // Attempt and summary lines are logged but only files count as errors.
    let (events, err) = run(&partial, CancellationToken::new()).await;
    assert!(err.is_none());
    assert_eq!(events.len(), 5);
    let mut counters = JobCounters::default();
    for event in &events {
        counters.apply(event);
    }
    assert_eq!(counters.error_count, 3);
    assert_eq!(events[3].level, LogLevel::Error);
    assert_eq!(events[3].action, LogAction::Unknown);

    // A run-level failure becomes fatal with the logged reason.
    let (events, err) = run(&fatal, CancellationToken::new()).await;
    assert_eq!(events.len(), 1);
    match err {
        Some(EngineError::Fatal(message)) => {
            assert!(message.contains("status 1"));
            assert!(message.contains("did not find section"));
        }
        other => panic!("unexpected outcome: {:?}", other),
    }

    // Cancellation stops the process.
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        trigger.cancel();
    });
    let (events, err) = tokio::time::timeout(Duration::from_secs(10), run(&hang, cancel))
        .await
        .expect("cancelled run should end promptly");
    assert_eq!(events.len(), 1);
    assert!(matches!(err, Some(EngineError::Cancelled)));

    // The command line reaches the process.
    let (events, err) = run(&args, CancellationToken::new()).await;
    assert!(err.is_none());
    let line = events[0].message.clone().unwrap();
    assert!(line.starts_with("copy /tmp remote:backup"));
    assert!(line.contains("--use-json-log"));
    assert!(line.contains("--retries 1"));
}
