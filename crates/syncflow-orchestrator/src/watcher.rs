//! Filesystem trigger.
//!
//! Watches the source root of every realtime task and emits one
//! [`TriggerKind::Realtime`] request per debounced burst of changes.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use syncflow_protocols::{Task, TaskId, TriggerKind};

use crate::config::WatcherOptions;
use crate::debounce::{Burst, Debouncer, WatchSignal};
use crate::dispatch::{TriggerRequest, TriggerSender};
use crate::error::WatchError;

struct WatchEntry {
    source: PathBuf,
    cancel: CancellationToken,
    // Dropping the watcher unregisters it from the OS backend.
    _watcher: RecommendedWatcher,
}

/// Registry of recursive watches, one per realtime task.
pub struct FsWatcher {
    triggers: TriggerSender,
    options: WatcherOptions,
    watches: Mutex<HashMap<TaskId, WatchEntry>>,
}

impl FsWatcher {
    pub fn new(triggers: TriggerSender, options: WatcherOptions) -> Self {
        Self {
            triggers,
            options,
            watches: Mutex::new(HashMap::new()),
        }
    }

    /// Watch the source of `task` recursively.
    ///
    /// Idempotent per task id: an existing watch on the same path is kept,
    /// a watch on a different path is replaced. Returns whether a new watch
    /// was installed.
    pub fn enable(&self, task: &Task) -> Result<bool, WatchError> {
        if !task.realtime {
            return Ok(false);
        }

        let mut watches = self.watches.lock();
        if let Some(existing) = watches.get(&task.id) {
            if existing.source == task.source {
                debug!(task_id = %task.id, "Watch already active");
                return Ok(false);
            }
        }
        if let Some(previous) = watches.remove(&task.id) {
            previous.cancel.cancel();
        }

        if !task.source.exists() {
            return Err(WatchError::SourceMissing(task.source.clone()));
        }

        let (signal_tx, signal_rx) = mpsc::channel(self.options.queue_capacity.max(1));
        let dropped = Arc::new(AtomicU64::new(0));
        let watcher = create_watcher(&task.source, signal_tx, dropped.clone())?;

        let cancel = CancellationToken::new();
        let debouncer = Debouncer::new(self.options.debounce, self.options.max_delay);
        let on_fire = burst_handler(task.id.clone(), self.triggers.clone(), dropped);
        tokio::spawn(debouncer.run(signal_rx, cancel.clone(), on_fire));

        info!(task_id = %task.id, "Watching {}", task.source.display());
        watches.insert(
            task.id.clone(),
            WatchEntry {
                source: task.source.clone(),
                cancel,
                _watcher: watcher,
            },
        );
        Ok(true)
    }

    /// Stop watching for `task_id`. Returns whether a watch existed.
    pub fn disable(&self, task_id: &str) -> bool {
        match self.watches.lock().remove(task_id) {
            Some(entry) => {
                entry.cancel.cancel();
                info!(task_id, "Stopped watching {}", entry.source.display());
                true
            }
            None => false,
        }
    }

    /// Stop every watch.
    pub fn disable_all(&self) {
        let mut watches = self.watches.lock();
        for (_, entry) in watches.drain() {
            entry.cancel.cancel();
        }
    }

    pub fn is_watching(&self, task_id: &str) -> bool {
        self.watches.lock().contains_key(task_id)
    }

    pub fn len(&self) -> usize {
        self.watches.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Drop for FsWatcher {
    fn drop(&mut self) {
        self.disable_all();
    }
}

fn create_watcher(
    source: &std::path::Path,
    signals: mpsc::Sender<WatchSignal>,
    dropped: Arc<AtomicU64>,
) -> Result<RecommendedWatcher, WatchError> {
    let watch_error = |e: notify::Error| WatchError::Watch {
        path: source.to_path_buf(),
        message: e.to_string(),
    };

    let mut watcher = RecommendedWatcher::new(
        move |result: notify::Result<Event>| {
            let Some(signal) = classify(&result) else {
                return;
            };
            // Never block the backend thread; a full queue already holds
            // enough signals to fire the pending burst.
            if let Err(TrySendError::Full(_)) = signals.try_send(signal) {
                dropped.fetch_add(1, Ordering::Relaxed);
            }
        },
        Config::default(),
    )
    .map_err(watch_error)?;

    watcher
        .watch(source, RecursiveMode::Recursive)
        .map_err(watch_error)?;
    Ok(watcher)
}

/// Map a backend notification to a signal. Access events do not qualify.
fn classify(result: &notify::Result<Event>) -> Option<WatchSignal> {
    match result {
        Err(_) => Some(WatchSignal::Overflow),
        Ok(event) if event.need_rescan() => Some(WatchSignal::Overflow),
        Ok(event) => match event.kind {
            EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) | EventKind::Any => {
                Some(WatchSignal::Changed)
            }
            EventKind::Access(_) | EventKind::Other => None,
        },
    }
}

fn burst_handler(
    task_id: TaskId,
    triggers: TriggerSender,
    dropped: Arc<AtomicU64>,
) -> impl FnMut(Burst) + Send + 'static {
    move |burst: Burst| {
        let lost = dropped.swap(0, Ordering::Relaxed);
        if burst.overflowed || lost > 0 {
            warn!(
                task_id = %task_id,
                lost,
                "Change events were lost, triggering a full sync"
            );
        }
        debug!(task_id = %task_id, signals = burst.signals, "Change burst settled");
        if triggers
            .send(TriggerRequest::new(task_id.clone(), TriggerKind::Realtime))
            .is_err()
        {
            debug!(task_id = %task_id, "Trigger channel closed");
        }
    }
}

#[cfg(test)]
#[path = "watcher_tests.rs"]
mod tests;
