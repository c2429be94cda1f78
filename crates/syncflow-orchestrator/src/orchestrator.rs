//! Orchestrator - wires triggers, dispatcher and runner together.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use syncflow_protocols::{JobRepository, SyncEngine, Task, TaskCatalog, TaskChange, TriggerKind};

use crate::config::OrchestratorConfig;
use crate::dispatch::{trigger_channel, TriggerDispatcher, TriggerReceiver, TriggerRequest, TriggerSender};
use crate::error::{OrchestratorError, RunnerError};
use crate::runner::{JobUpdate, Runner, RunningJob};
use crate::schedule::ScheduleManager;
use crate::watcher::FsWatcher;

/// Reason recorded on Jobs left `running` by a previous process.
pub const INTERRUPTED_REASON: &str = "interrupted";

/// Owns the trigger sources and the runner for one process.
pub struct Orchestrator {
    config: OrchestratorConfig,
    catalog: Arc<dyn TaskCatalog>,
    repository: Arc<dyn JobRepository>,
    runner: Arc<Runner>,
    schedules: Arc<ScheduleManager>,
    watcher: Arc<FsWatcher>,
    dispatcher: Arc<TriggerDispatcher>,
    triggers: TriggerSender,
    pending_triggers: Mutex<Option<TriggerReceiver>>,
    cancel: CancellationToken,
}

impl Orchestrator {
    pub fn new(
        config: OrchestratorConfig,
        catalog: Arc<dyn TaskCatalog>,
        repository: Arc<dyn JobRepository>,
        engine: Arc<dyn SyncEngine>,
    ) -> Self {
        let (triggers, receiver) = trigger_channel();
        let runner = Arc::new(
            Runner::new(repository.clone(), engine).with_options(config.runner.clone()),
        );
        let schedules = Arc::new(ScheduleManager::new(catalog.clone(), triggers.clone()));
        let watcher = Arc::new(FsWatcher::new(triggers.clone(), config.watcher.clone()));
        let dispatcher = Arc::new(TriggerDispatcher::new(catalog.clone(), runner.clone()));

        Self {
            config,
            catalog,
            repository,
            runner,
            schedules,
            watcher,
            dispatcher,
            triggers,
            pending_triggers: Mutex::new(Some(receiver)),
            cancel: CancellationToken::new(),
        }
    }

    /// Recover orphaned Jobs, then start dispatching and the trigger sources.
    pub async fn start(&self) -> Result<(), OrchestratorError> {
        let pending = self.pending_triggers.lock().take();
        let Some(receiver) = pending else {
            warn!("Orchestrator already started");
            return Ok(());
        };

        let recovered = self.repository.fail_orphaned_jobs(INTERRUPTED_REASON).await?;
        if recovered > 0 {
            warn!("Marked {} interrupted jobs as failed", recovered);
        }

        tokio::spawn(self.dispatcher.clone().run(receiver, self.cancel.child_token()));

        if self.config.scheduler_enabled {
            self.schedules.start().await?;
        } else {
            info!("Scheduler disabled");
        }

        if self.config.watcher_enabled {
            let tasks = self.catalog.list_all_tasks().await?;
            for task in tasks.iter().filter(|t| t.realtime) {
                if let Err(e) = self.watcher.enable(task) {
                    error!(task_id = %task.id, "Cannot watch task source: {}", e);
                }
            }
            info!("Watching {} task sources", self.watcher.len());
        } else {
            info!("Filesystem watcher disabled");
        }

        Ok(())
    }

    /// Reconcile triggers with a task definition change.
    ///
    /// A running Job of the task is not affected.
    pub async fn apply_task_change(&self, change: TaskChange) -> Result<(), OrchestratorError> {
        match change {
            TaskChange::Created(task) | TaskChange::Updated(task) => self.reconcile(&task),
            TaskChange::Deleted(task_id) => {
                self.schedules.remove_task(&task_id);
                self.watcher.disable(&task_id);
                info!(task_id = %task_id, "Task removed from triggers");
                Ok(())
            }
        }
    }

    fn reconcile(&self, task: &Task) -> Result<(), OrchestratorError> {
        let schedule_result = if task.has_schedule() && self.config.scheduler_enabled {
            self.schedules.add_task(task).map(|_| ())
        } else {
            self.schedules.remove_task(&task.id);
            Ok(())
        };

        let watch_result = if task.realtime && self.config.watcher_enabled {
            self.watcher.enable(task).map(|_| ())
        } else {
            self.watcher.disable(&task.id);
            Ok(())
        };

        schedule_result?;
        watch_result?;
        Ok(())
    }

    /// Manual trigger: run `task_id` now, subject to the concurrency gate.
    pub async fn run_now(&self, task_id: &str) -> Result<RunningJob, OrchestratorError> {
        let task = self
            .catalog
            .get_task(task_id)
            .await?
            .ok_or_else(|| RunnerError::TaskNotFound(task_id.to_string()))?;
        Ok(self.runner.start_task(&task, TriggerKind::Manual).await?)
    }

    /// Inject a trigger as if a trigger source had fired.
    pub fn trigger(&self, request: TriggerRequest) -> bool {
        self.triggers.send(request).is_ok()
    }

    /// Cancel the running Job of `task_id`.
    pub fn cancel_job(&self, task_id: &str) -> bool {
        self.runner.cancel(task_id)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobUpdate> {
        self.runner.subscribe()
    }

    pub fn runner(&self) -> &Arc<Runner> {
        &self.runner
    }

    pub fn schedules(&self) -> &Arc<ScheduleManager> {
        &self.schedules
    }

    pub fn watcher(&self) -> &Arc<FsWatcher> {
        &self.watcher
    }

    pub fn repository(&self) -> &Arc<dyn JobRepository> {
        &self.repository
    }

    /// Stop the trigger sources, cancel running Jobs and wait for them.
    pub async fn shutdown(&self) {
        info!("Shutting down orchestrator");
        if self.schedules.is_running() {
            self.schedules.stop();
        }
        self.watcher.disable_all();
        self.cancel.cancel();
        self.runner.shutdown().await;
        info!("Orchestrator stopped");
    }
}
