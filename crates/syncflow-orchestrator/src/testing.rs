//! Scripted sync engine for tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use syncflow_protocols::{EngineError, EngineEvent, EngineStream, SyncEngine, SyncRequest, TaskId};

/// How a scripted run ends after its events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptEnd {
    Complete,
    Fatal(String),
    /// Block until cancelled.
    Hang,
    Panic,
}

/// Events replayed by one invocation.
#[derive(Debug, Clone)]
pub struct Script {
    pub events: Vec<EngineEvent>,
    pub end: ScriptEnd,
    pub event_delay: Duration,
}

impl Script {
    pub fn new(events: Vec<EngineEvent>) -> Self {
        Self {
            events,
            end: ScriptEnd::Complete,
            event_delay: Duration::ZERO,
        }
    }

    pub fn ending_with_fatal(mut self, message: impl Into<String>) -> Self {
        self.end = ScriptEnd::Fatal(message.into());
        self
    }

    pub fn hanging(mut self) -> Self {
        self.end = ScriptEnd::Hang;
        self
    }

    pub fn panicking(mut self) -> Self {
        self.end = ScriptEnd::Panic;
        self
    }

    pub fn with_event_delay(mut self, delay: Duration) -> Self {
        self.event_delay = delay;
        self
    }
}

impl Default for Script {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

#[derive(Default)]
struct Activity {
    active: HashMap<TaskId, usize>,
    max_overlap: usize,
}

/// Sync engine that replays per-task scripts and records invocations.
#[derive(Default)]
pub struct ScriptedEngine {
    default_script: Script,
    scripts: Mutex<HashMap<TaskId, Script>>,
    launch_error: Mutex<Option<String>>,
    requests: Mutex<Vec<SyncRequest>>,
    activity: Arc<Mutex<Activity>>,
    invocations: AtomicUsize,
}

impl ScriptedEngine {
    pub fn new(default_script: Script) -> Self {
        Self {
            default_script,
            ..Self::default()
        }
    }

    /// Script used for `task_id` instead of the default.
    pub fn set_script(&self, task_id: &str, script: Script) {
        self.scripts.lock().insert(task_id.to_string(), script);
    }

    /// Make every following invocation fail to launch.
    pub fn fail_launch(&self, message: impl Into<String>) {
        *self.launch_error.lock() = Some(message.into());
    }

    pub fn invocations(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<SyncRequest> {
        self.requests.lock().clone()
    }

    /// Highest number of simultaneous runs observed for a single task.
    pub fn max_overlap(&self) -> usize {
        self.activity.lock().max_overlap
    }
}

/// Tracks one live stream; dropping it ends the run.
struct ActiveGuard {
    task_id: TaskId,
    activity: Arc<Mutex<Activity>>,
}

impl ActiveGuard {
    fn enter(task_id: TaskId, activity: Arc<Mutex<Activity>>) -> Self {
        {
            let mut state = activity.lock();
            let count = state.active.entry(task_id.clone()).or_default();
            *count += 1;
            let count = *count;
            state.max_overlap = state.max_overlap.max(count);
        }
        Self { task_id, activity }
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        if let Some(count) = self.activity.lock().active.get_mut(&self.task_id) {
            *count = count.saturating_sub(1);
        }
    }
}

#[async_trait]
impl SyncEngine for ScriptedEngine {
    fn id(&self) -> &str {
        "scripted"
    }

    async fn synchronize(
        &self,
        request: SyncRequest,
        cancel: CancellationToken,
    ) -> Result<EngineStream, EngineError> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request.clone());

        if let Some(message) = self.launch_error.lock().clone() {
            return Err(EngineError::Launch(message));
        }

        let script = self
            .scripts
            .lock()
            .get(&request.task_id)
            .cloned()
            .unwrap_or_else(|| self.default_script.clone());
        let guard = ActiveGuard::enter(request.task_id.clone(), self.activity.clone());

        let stream = async_stream::stream! {
            let _guard = guard;
            for event in script.events {
                if !script.event_delay.is_zero() {
                    tokio::time::sleep(script.event_delay).await;
                }
                yield Ok(event);
            }
            match script.end {
                ScriptEnd::Complete => {}
                ScriptEnd::Fatal(message) => {
                    yield Err(EngineError::Fatal(message));
                }
                ScriptEnd::Hang => {
                    cancel.cancelled().await;
                    yield Err(EngineError::Cancelled);
                }
                ScriptEnd::Panic => panic!("scripted engine panic"),
            }
        };
        Ok(Box::pin(stream))
    }
}
