//! Per-task concurrency gate.
//!
//! At most one Job per task runs at a time. Acquisition checks and marks the
//! task busy under a single lock; release happens when the [`GatePermit`] is
//! dropped, whatever way the run ended.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use syncflow_protocols::{JobId, TaskId};

struct ActiveRun {
    job_id: JobId,
    cancel: CancellationToken,
}

/// Shared busy-set keyed by task id.
#[derive(Clone, Default)]
pub struct ConcurrencyGate {
    active: Arc<Mutex<HashMap<TaskId, ActiveRun>>>,
}

impl ConcurrencyGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `task_id` busy for `job_id`.
    ///
    /// Fails with the id of the Job already holding the task.
    pub fn try_acquire(
        &self,
        task_id: &str,
        job_id: JobId,
        cancel: CancellationToken,
    ) -> Result<GatePermit, JobId> {
        let mut active = self.active.lock();
        if let Some(run) = active.get(task_id) {
            return Err(run.job_id);
        }
        active.insert(task_id.to_string(), ActiveRun { job_id, cancel });
        Ok(GatePermit {
            gate: self.clone(),
            task_id: task_id.to_string(),
            job_id,
        })
    }

    pub fn is_busy(&self, task_id: &str) -> bool {
        self.active.lock().contains_key(task_id)
    }

    /// Job currently holding `task_id`.
    pub fn running_job(&self, task_id: &str) -> Option<JobId> {
        self.active.lock().get(task_id).map(|r| r.job_id)
    }

    /// Request cancellation of the run holding `task_id`.
    pub fn cancel(&self, task_id: &str) -> bool {
        match self.active.lock().get(task_id) {
            Some(run) => {
                run.cancel.cancel();
                true
            }
            None => false,
        }
    }

    pub fn active_count(&self) -> usize {
        self.active.lock().len()
    }

    fn release(&self, task_id: &str, job_id: JobId) {
        let mut active = self.active.lock();
        if active.get(task_id).is_some_and(|r| r.job_id == job_id) {
            active.remove(task_id);
        }
    }
}

/// Proof of holding the gate for one task. Releases on drop.
pub struct GatePermit {
    gate: ConcurrencyGate,
    task_id: TaskId,
    job_id: JobId,
}

impl GatePermit {
    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn job_id(&self) -> JobId {
        self.job_id
    }
}

impl Drop for GatePermit {
    fn drop(&mut self) {
        self.gate.release(&self.task_id, self.job_id);
    }
}
