//! Trigger dispatch.
//!
//! Triggers never call the runner directly. They send a [`TriggerRequest`]
//! naming the task and the trigger kind; the dispatcher resolves the current
//! task definition and starts it.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use syncflow_protocols::{TaskCatalog, TaskId, TriggerKind};

use crate::error::RunnerError;
use crate::runner::{Runner, RunningJob};

/// Request to run a task, emitted by a trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerRequest {
    pub task_id: TaskId,
    pub kind: TriggerKind,
}

impl TriggerRequest {
    pub fn new(task_id: impl Into<TaskId>, kind: TriggerKind) -> Self {
        Self {
            task_id: task_id.into(),
            kind,
        }
    }
}

pub type TriggerSender = mpsc::UnboundedSender<TriggerRequest>;
pub type TriggerReceiver = mpsc::UnboundedReceiver<TriggerRequest>;

/// Create a trigger channel.
pub fn trigger_channel() -> (TriggerSender, TriggerReceiver) {
    mpsc::unbounded_channel()
}

/// Resolves trigger requests against the task catalog and starts runs.
pub struct TriggerDispatcher {
    catalog: Arc<dyn TaskCatalog>,
    runner: Arc<Runner>,
}

impl TriggerDispatcher {
    pub fn new(catalog: Arc<dyn TaskCatalog>, runner: Arc<Runner>) -> Self {
        Self { catalog, runner }
    }

    /// Consume requests until the channel closes or `cancel` fires.
    ///
    /// Each request is handled on its own task so a slow catalog lookup
    /// never delays other triggers.
    pub async fn run(self: Arc<Self>, mut requests: TriggerReceiver, cancel: CancellationToken) {
        debug!("Trigger dispatcher started");
        loop {
            let request = tokio::select! {
                _ = cancel.cancelled() => break,
                request = requests.recv() => match request {
                    Some(request) => request,
                    None => break,
                },
            };

            let dispatcher = self.clone();
            tokio::spawn(async move {
                if let Err(e) = dispatcher.dispatch(request).await {
                    error!("Trigger dispatch failed: {}", e);
                }
            });
        }
        debug!("Trigger dispatcher stopped");
    }

    /// Start the task named by `request`.
    ///
    /// Returns `Ok(None)` when the trigger is stale (task deleted, or the
    /// trigger no longer configured) or when the task is already running.
    pub async fn dispatch(
        &self,
        request: TriggerRequest,
    ) -> Result<Option<RunningJob>, RunnerError> {
        let Some(task) = self.catalog.get_task(&request.task_id).await? else {
            debug!(task_id = %request.task_id, "Dropping trigger for deleted task");
            return Ok(None);
        };

        let still_configured = match request.kind {
            TriggerKind::Schedule => task.has_schedule(),
            TriggerKind::Realtime => task.realtime,
            TriggerKind::Manual => true,
        };
        if !still_configured {
            debug!(
                task_id = %task.id,
                trigger = %request.kind,
                "Dropping trigger no longer configured on task"
            );
            return Ok(None);
        }

        match self.runner.start_task(&task, request.kind).await {
            Ok(running) => Ok(Some(running)),
            Err(e) if e.is_rejection() => {
                info!(task_id = %task.id, trigger = %request.kind, "Skipped trigger: {}", e);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}
