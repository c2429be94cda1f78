//! Job runner.
//!
//! Starts one engine invocation per accepted trigger, streams its events into
//! the job history and records the terminal status. The per-task gate is held
//! for the whole run and released when the run task ends, even on panic.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::{FutureExt, StreamExt};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use syncflow_protocols::{
    EngineError, EngineEvent, Job, JobId, JobLog, JobRepository, JobStatus, SyncEngine,
    SyncRequest, Task, TaskId, TriggerKind,
};

use crate::config::RunnerOptions;
use crate::error::RunnerError;
use crate::gate::{ConcurrencyGate, GatePermit};

/// Per-file error messages kept in the aggregated error text.
const MAX_ERROR_LINES: usize = 20;

const UPDATE_CHANNEL_CAPACITY: usize = 256;

/// Snapshot of a Job published to subscribers.
#[derive(Debug, Clone)]
pub enum JobUpdate {
    Started(Job),
    Progress(Job),
    Finished(Job),
}

impl JobUpdate {
    pub fn job(&self) -> &Job {
        match self {
            JobUpdate::Started(job) | JobUpdate::Progress(job) | JobUpdate::Finished(job) => job,
        }
    }
}

/// Handle on a started run.
#[derive(Debug)]
pub struct RunningJob {
    pub job_id: JobId,
    pub task_id: TaskId,
    handle: JoinHandle<JobStatus>,
}

impl RunningJob {
    /// Wait for the run to end and return its terminal status.
    pub async fn wait(self) -> JobStatus {
        match self.handle.await {
            Ok(status) => status,
            Err(e) => {
                error!(job_id = %self.job_id, "Run task aborted: {}", e);
                JobStatus::Failed
            }
        }
    }
}

/// Executes Jobs against a [`SyncEngine`].
pub struct Runner {
    repository: Arc<dyn JobRepository>,
    engine: Arc<dyn SyncEngine>,
    gate: ConcurrencyGate,
    options: RunnerOptions,
    updates: broadcast::Sender<JobUpdate>,
    shutdown: CancellationToken,
    tracker: TaskTracker,
}

impl Runner {
    pub fn new(repository: Arc<dyn JobRepository>, engine: Arc<dyn SyncEngine>) -> Self {
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        Self {
            repository,
            engine,
            gate: ConcurrencyGate::new(),
            options: RunnerOptions::default(),
            updates,
            shutdown: CancellationToken::new(),
            tracker: TaskTracker::new(),
        }
    }

    pub fn with_options(mut self, options: RunnerOptions) -> Self {
        self.options = options;
        self
    }

    /// Start a run of `task`.
    ///
    /// Fails with [`RunnerError::ConcurrentRunRejected`] without touching the
    /// history if the task already has a running Job.
    pub async fn start_task(
        &self,
        task: &Task,
        trigger: TriggerKind,
    ) -> Result<RunningJob, RunnerError> {
        if self.shutdown.is_cancelled() {
            return Err(RunnerError::ShuttingDown);
        }

        let job = Job::start(task.id.clone(), trigger);
        let cancel = self.shutdown.child_token();
        let permit = self
            .gate
            .try_acquire(&task.id, job.id, cancel.clone())
            .map_err(|running_job| {
                warn!(
                    task_id = %task.id,
                    trigger = %trigger,
                    running_job = %running_job,
                    "Run rejected, task already running"
                );
                RunnerError::ConcurrentRunRejected {
                    task_id: task.id.clone(),
                    running_job,
                }
            })?;

        // On failure the permit drops here and the gate is released.
        self.repository.create_job(&job).await?;

        info!(
            job_id = %job.id,
            task_id = %task.id,
            trigger = %trigger,
            engine = self.engine.id(),
            "Job started"
        );
        let _ = self.updates.send(JobUpdate::Started(job.clone()));

        let job_id = job.id;
        let execution = JobExecution {
            repository: self.repository.clone(),
            engine: self.engine.clone(),
            updates: self.updates.clone(),
            options: self.options.clone(),
            request: SyncRequest::for_task(task),
            cancel,
            errors: ErrorSummary::default(),
            job,
        };
        let handle = self.tracker.spawn(execution.run(permit));

        Ok(RunningJob {
            job_id,
            task_id: task.id.clone(),
            handle,
        })
    }

    /// Cancel the running Job of `task_id`, if any.
    pub fn cancel(&self, task_id: &str) -> bool {
        let cancelled = self.gate.cancel(task_id);
        if cancelled {
            info!(task_id, "Cancellation requested");
        }
        cancelled
    }

    pub fn is_running(&self, task_id: &str) -> bool {
        self.gate.is_busy(task_id)
    }

    pub fn running_job(&self, task_id: &str) -> Option<JobId> {
        self.gate.running_job(task_id)
    }

    pub fn active_count(&self) -> usize {
        self.gate.active_count()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobUpdate> {
        self.updates.subscribe()
    }

    pub fn repository(&self) -> &Arc<dyn JobRepository> {
        &self.repository
    }

    /// Refuse new runs, cancel running ones and wait until all have ended.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        self.tracker.close();
        let active = self.tracker.len();
        if active > 0 {
            info!("Waiting for {} running jobs to stop", active);
        }
        self.tracker.wait().await;
    }
}

/// Capped list of per-file error messages.
#[derive(Debug, Default)]
struct ErrorSummary {
    lines: Vec<String>,
    omitted: u64,
}

impl ErrorSummary {
    fn record(&mut self, event: &EngineEvent) {
        if self.lines.len() >= MAX_ERROR_LINES {
            self.omitted += 1;
            return;
        }
        let message = event.message.as_deref().unwrap_or("unknown error");
        let line = match &event.path {
            Some(path) => format!("{}: {}", path, message),
            None => message.to_string(),
        };
        self.lines.push(line);
    }

    fn render(&self, fatal: Option<&str>) -> Option<String> {
        let mut lines: Vec<String> = Vec::new();
        if let Some(fatal) = fatal {
            lines.push(fatal.to_string());
        }
        lines.extend(self.lines.iter().cloned());
        if self.omitted > 0 {
            lines.push(format!("... and {} more errors", self.omitted));
        }
        if lines.is_empty() {
            None
        } else {
            Some(lines.join("\n"))
        }
    }
}

enum Outcome {
    Completed,
    Cancelled,
    Fatal(String),
}

/// State of one in-flight Job.
struct JobExecution {
    repository: Arc<dyn JobRepository>,
    engine: Arc<dyn SyncEngine>,
    updates: broadcast::Sender<JobUpdate>,
    options: RunnerOptions,
    request: SyncRequest,
    cancel: CancellationToken,
    errors: ErrorSummary,
    job: Job,
}

impl JobExecution {
    async fn run(mut self, permit: GatePermit) -> JobStatus {
        let result = AssertUnwindSafe(self.consume()).catch_unwind().await;
        let outcome = match result {
            Ok(outcome) => outcome,
            Err(_) => {
                error!(job_id = %self.job.id, task_id = %self.job.task_id, "Job execution panicked");
                Outcome::Fatal("job execution panicked".to_string())
            }
        };
        let (status, error) = self.resolve(outcome);
        self.complete(status, error, permit).await
    }

    async fn consume(&mut self) -> Outcome {
        let started = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Outcome::Cancelled,
            started = self.engine.synchronize(self.request.clone(), self.cancel.clone()) => started,
        };
        let mut stream = match started {
            Ok(stream) => stream,
            Err(EngineError::Cancelled) => return Outcome::Cancelled,
            Err(e) => return Outcome::Fatal(e.to_string()),
        };

        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Outcome::Cancelled,
                next = stream.next() => next,
            };
            match next {
                None => return Outcome::Completed,
                Some(Ok(event)) => self.record(event).await,
                Some(Err(EngineError::Cancelled)) => return Outcome::Cancelled,
                Some(Err(e)) => return Outcome::Fatal(e.to_string()),
            }
        }
    }

    /// Persist one event. History write failures are logged, not fatal.
    async fn record(&mut self, event: EngineEvent) {
        self.job.apply_event(&event);
        if event.is_error() {
            debug!(job_id = %self.job.id, path = ?event.path, "File error reported");
            self.errors.record(&event);
        }

        let log = JobLog::from_event(self.job.id, &event);
        if let Err(e) = self.repository.append_log(&log).await {
            error!(job_id = %self.job.id, "Failed to append job log: {}", e);
        }
        if let Err(e) = self
            .repository
            .update_progress(self.job.id, &self.job.counters)
            .await
        {
            error!(job_id = %self.job.id, "Failed to update job progress: {}", e);
        }
        let _ = self.updates.send(JobUpdate::Progress(self.job.clone()));
    }

    fn resolve(&self, outcome: Outcome) -> (JobStatus, Option<String>) {
        let error_count = self.job.counters.error_count;
        match outcome {
            Outcome::Cancelled => (JobStatus::Cancelled, self.errors.render(None)),
            Outcome::Fatal(message) => (JobStatus::Failed, self.errors.render(Some(&message))),
            Outcome::Completed => {
                let limit = self.options.max_file_errors;
                if limit > 0 && error_count > limit {
                    let summary = format!("{} file errors exceeded the limit of {}", error_count, limit);
                    (JobStatus::Failed, self.errors.render(Some(&summary)))
                } else {
                    (JobStatus::Success, self.errors.render(None))
                }
            }
        }
    }

    async fn complete(
        mut self,
        status: JobStatus,
        error: Option<String>,
        permit: GatePermit,
    ) -> JobStatus {
        if let Err(e) = self.job.finish(status, error) {
            warn!(job_id = %self.job.id, "Cannot finish job: {}", e);
            return self.job.status;
        }
        if let Err(e) = self.repository.finish_job(&self.job).await {
            error!(job_id = %self.job.id, "Failed to persist job result: {}", e);
        }
        // Released before `Finished` so subscribers can start the task again.
        drop(permit);

        let counters = &self.job.counters;
        info!(
            job_id = %self.job.id,
            task_id = %self.job.task_id,
            status = %status,
            files = counters.files_transferred,
            bytes = counters.bytes_transferred,
            deleted = counters.files_deleted,
            errors = counters.error_count,
            "Job finished"
        );
        let _ = self.updates.send(JobUpdate::Finished(self.job.clone()));
        status
    }
}

#[cfg(test)]
#[path = "runner_tests.rs"]
mod tests;
