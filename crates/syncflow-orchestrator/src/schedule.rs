//! Schedule manager - cron triggers for tasks.
//!
//! Each scheduled task owns one timer loop. The loop sleeps until the next
//! cron time point and then emits a [`TriggerRequest`] with
//! [`TriggerKind::Schedule`]. Firings missed while the process was suspended
//! or the wall clock jumped are skipped, not replayed.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local};
use cron::Schedule;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use syncflow_protocols::{Task, TaskCatalog, TaskId, TriggerKind};

use crate::cron_expr;
use crate::dispatch::{TriggerRequest, TriggerSender};
use crate::error::ScheduleError;

/// A next fire time further in the past than this (in ms) counts as missed.
const MISSED_FIRE_TOLERANCE_MS: i64 = 1_000;

struct ScheduleEntry {
    expression: String,
    schedule: Schedule,
    cancel: CancellationToken,
}

#[derive(Default)]
struct ScheduleState {
    /// Root token while running; every timer is a child of it.
    running: Option<CancellationToken>,
    entries: HashMap<TaskId, ScheduleEntry>,
}

/// Registry of cron timers, one per task.
pub struct ScheduleManager {
    catalog: Arc<dyn TaskCatalog>,
    triggers: TriggerSender,
    state: Mutex<ScheduleState>,
}

impl ScheduleManager {
    pub fn new(catalog: Arc<dyn TaskCatalog>, triggers: TriggerSender) -> Self {
        Self {
            catalog,
            triggers,
            state: Mutex::new(ScheduleState::default()),
        }
    }

    /// Load every task and register those with a schedule.
    ///
    /// Invalid expressions are logged and skipped. Returns the number of
    /// registered timers; calling `start` on a running manager is a no-op.
    pub async fn start(&self) -> Result<usize, ScheduleError> {
        {
            let mut state = self.state.lock();
            if state.running.is_some() {
                warn!("Schedule manager already running");
                return Ok(0);
            }
            state.running = Some(CancellationToken::new());
        }

        let tasks = match self.catalog.list_all_tasks().await {
            Ok(tasks) => tasks,
            Err(e) => {
                self.state.lock().running = None;
                return Err(e.into());
            }
        };

        let mut registered = 0;
        for task in tasks.iter().filter(|t| t.has_schedule()) {
            match self.add_task(task) {
                Ok(true) => registered += 1,
                Ok(false) => {}
                Err(e) => warn!("Skipping schedule: {}", e),
            }
        }

        info!("Schedule manager started with {} timers", registered);
        Ok(registered)
    }

    /// Cancel every timer and clear the registry.
    pub fn stop(&self) -> bool {
        let mut state = self.state.lock();
        let Some(root) = state.running.take() else {
            warn!("Schedule manager is not running");
            return false;
        };
        root.cancel();
        let count = state.entries.len();
        state.entries.clear();
        info!("Schedule manager stopped, {} timers cancelled", count);
        true
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().running.is_some()
    }

    /// Register (or replace) the timer of `task`.
    ///
    /// The expression is validated before the existing timer is touched, so
    /// an invalid update keeps the previous schedule active. Returns whether
    /// a timer was registered: tasks without a schedule, and calls while
    /// the manager is stopped, register nothing.
    pub fn add_task(&self, task: &Task) -> Result<bool, ScheduleError> {
        if !task.has_schedule() {
            return Ok(false);
        }

        let expression = task.schedule.trim().to_string();
        let schedule =
            cron_expr::parse(&expression).map_err(|message| ScheduleError::InvalidExpression {
                task_id: task.id.clone(),
                expression: expression.clone(),
                message,
            })?;

        let mut state = self.state.lock();
        let Some(root) = state.running.clone() else {
            debug!(task_id = %task.id, "Schedule manager stopped, not registering timer");
            return Ok(false);
        };

        if let Some(previous) = state.entries.remove(&task.id) {
            previous.cancel.cancel();
        }

        let cancel = root.child_token();
        tokio::spawn(run_timer(
            task.id.clone(),
            schedule.clone(),
            self.triggers.clone(),
            cancel.clone(),
        ));

        debug!(task_id = %task.id, schedule = %expression, "Registered cron timer");
        state.entries.insert(
            task.id.clone(),
            ScheduleEntry {
                expression,
                schedule,
                cancel,
            },
        );
        Ok(true)
    }

    /// Cancel the timer of `task_id`. Returns whether one existed.
    pub fn remove_task(&self, task_id: &str) -> bool {
        match self.state.lock().entries.remove(task_id) {
            Some(entry) => {
                entry.cancel.cancel();
                debug!(task_id, "Removed cron timer");
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, task_id: &str) -> bool {
        self.state.lock().entries.contains_key(task_id)
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The registered expression of `task_id`.
    pub fn expression(&self, task_id: &str) -> Option<String> {
        self.state
            .lock()
            .entries
            .get(task_id)
            .map(|e| e.expression.clone())
    }

    /// Next local time the timer of `task_id` fires.
    pub fn next_fire_time(&self, task_id: &str) -> Option<DateTime<Local>> {
        let state = self.state.lock();
        state.entries.get(task_id)?.schedule.upcoming(Local).next()
    }
}

impl Drop for ScheduleManager {
    fn drop(&mut self) {
        if let Some(root) = self.state.get_mut().running.take() {
            root.cancel();
        }
    }
}

/// Timer loop of one task, evaluated in local time.
async fn run_timer(
    task_id: TaskId,
    schedule: Schedule,
    triggers: TriggerSender,
    cancel: CancellationToken,
) {
    let mut cursor = Local::now();
    loop {
        let Some(next) = schedule.after(&cursor).next() else {
            debug!(task_id = %task_id, "Cron schedule has no upcoming time");
            break;
        };

        let now = Local::now();
        let delay = match (next - now).to_std() {
            Ok(delay) => delay,
            Err(_) if (now - next).num_milliseconds() > MISSED_FIRE_TOLERANCE_MS => {
                warn!(task_id = %task_id, missed = %next, "Skipping missed cron firing");
                cursor = now;
                continue;
            }
            Err(_) => Duration::ZERO,
        };

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }
        cursor = next;

        debug!(task_id = %task_id, "Cron timer fired");
        if triggers
            .send(TriggerRequest::new(task_id.clone(), TriggerKind::Schedule))
            .is_err()
        {
            debug!(task_id = %task_id, "Trigger channel closed, stopping timer");
            break;
        }
    }
}

#[cfg(test)]
#[path = "schedule_tests.rs"]
mod tests;
