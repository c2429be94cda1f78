//! rclone process engine.

use std::process::{ExitStatus, Stdio};

use async_stream::stream;
use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use syncflow_protocols::{
    EngineError, EngineEvent, EngineStream, LogAction, LogLevel, SyncEngine, SyncRequest,
};

use crate::args::build_args;
use crate::log_line::parse_line;

/// Exit codes rclone uses when some files failed but the run itself completed.
const PARTIAL_FAILURE_CODES: [i32; 2] = [2, 6];

/// What a finished process means for the Job.
#[derive(Debug, Default)]
struct RunOutcome {
    file_errors: u64,
    last_error: Option<String>,
}

impl RunOutcome {
    fn observe(&mut self, event: &EngineEvent) {
        if event.action == LogAction::Error {
            self.file_errors += 1;
        } else if event.level == LogLevel::Error {
            self.last_error = event.message.clone();
        }
    }

    fn exit_error(&self, status: ExitStatus) -> Option<EngineError> {
        match status.code() {
            Some(0) => None,
            // File-level errors were already reported as events.
            Some(code) if self.file_errors > 0 && PARTIAL_FAILURE_CODES.contains(&code) => None,
            code => {
                let detail = match code {
                    Some(code) => format!("rclone exited with status {}", code),
                    None => "rclone terminated by signal".to_string(),
                };
                Some(EngineError::Fatal(match &self.last_error {
                    Some(message) => format!("{}: {}", detail, message),
                    None => detail,
                }))
            }
        }
    }
}

enum Step {
    Line(std::io::Result<Option<String>>),
    Cancelled,
}

async fn stop(child: &mut Child) {
    if let Err(e) = child.kill().await {
        warn!("Failed to stop rclone process: {}", e);
    }
}

/// Runs `rclone` once per synchronization.
pub struct RcloneEngine {
    binary: String,
    extra_args: Vec<String>,
}

impl RcloneEngine {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            extra_args: Vec::new(),
        }
    }

    /// Arguments appended to every invocation.
    pub fn with_extra_args(mut self, args: Vec<String>) -> Self {
        self.extra_args = args;
        self
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }
}

impl Default for RcloneEngine {
    fn default() -> Self {
        Self::new("rclone")
    }
}

#[async_trait]
impl SyncEngine for RcloneEngine {
    fn id(&self) -> &str {
        "rclone"
    }

    async fn synchronize(
        &self,
        request: SyncRequest,
        cancel: CancellationToken,
    ) -> Result<EngineStream, EngineError> {
        let args = build_args(&request, &self.extra_args);
        debug!(task_id = %request.task_id, "Running {} {}", self.binary, args.join(" "));

        let mut child = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| EngineError::Launch(format!("{}: {}", self.binary, e)))?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| EngineError::Launch("Failed to capture rclone output".to_string()))?;

        Ok(Box::pin(stream! {
            let mut lines = BufReader::new(stderr).lines();
            let mut outcome = RunOutcome::default();

            loop {
                let step = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Step::Cancelled,
                    line = lines.next_line() => Step::Line(line),
                };
                match step {
                    Step::Cancelled => {
                        stop(&mut child).await;
                        yield Err(EngineError::Cancelled);
                        return;
                    }
                    Step::Line(Ok(Some(line))) => {
                        if let Some(event) = parse_line(&line) {
                            outcome.observe(&event);
                            yield Ok(event);
                        }
                    }
                    Step::Line(Ok(None)) => break,
                    Step::Line(Err(e)) => {
                        stop(&mut child).await;
                        yield Err(EngineError::Fatal(format!("Failed to read rclone output: {}", e)));
                        return;
                    }
                }
            }

            let status = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                status = child.wait() => Some(status),
            };
            match status {
                None => {
                    stop(&mut child).await;
                    yield Err(EngineError::Cancelled);
                }
                Some(Ok(status)) => {
                    if let Some(err) = outcome.exit_error(status) {
                        yield Err(err);
                    }
                }
                Some(Err(e)) => {
                    yield Err(EngineError::Fatal(format!("Failed to wait for rclone: {}", e)));
                }
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use syncflow_protocols::Task;

    #[cfg(unix)]
    fn exit_status(code: i32) -> ExitStatus {
        use std::os::unix::process::ExitStatusExt;
        ExitStatus::from_raw(code << 8)
    }

    #[cfg(unix)]
    #[test]
    fn test_exit_status_mapping() {
        let clean = RunOutcome::default();
        assert!(clean.exit_error(exit_status(0)).is_none());
        assert!(matches!(
            clean.exit_error(exit_status(2)),
            Some(EngineError::Fatal(_))
        ));

        let mut partial = RunOutcome::default();
        partial.observe(&EngineEvent::file_error("a", "locked"));
        assert!(partial.exit_error(exit_status(6)).is_none());
        assert!(partial.exit_error(exit_status(7)).is_some());
    }

    #[cfg(unix)]
    #[test]
    fn test_run_error_message_used_for_fatal() {
        let mut outcome = RunOutcome::default();
        outcome.observe(&EngineEvent::message(
            LogLevel::Error,
            "Failed to sync: directory not found",
        ));
        assert_eq!(outcome.file_errors, 0);

        let text = outcome.exit_error(exit_status(3)).unwrap().to_string();
        assert!(text.contains("status 3"));
        assert!(text.contains("directory not found"));
    }

    #[tokio::test]
    async fn test_missing_binary_is_launch_error() {
        let engine = RcloneEngine::new("/nonexistent/syncflow-rclone");
        let request = SyncRequest::for_task(&Task::new("docs", "/tmp", "remote", "p"));
        let err = engine
            .synchronize(request, CancellationToken::new())
            .await
            .err()
            .unwrap();
        match err {
            EngineError::Launch(message) => assert!(message.contains("/nonexistent/syncflow-rclone")),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_engine_defaults() {
        let engine = RcloneEngine::default();
        assert_eq!(engine.binary(), "rclone");
        assert_eq!(engine.id(), "rclone");
    }
}
