//! `serve` and `run` subcommand handlers.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{error, info, warn};

use syncflow_config::Config;
use syncflow_engine_rclone::RcloneEngine;
use syncflow_orchestrator::{JobUpdate, Orchestrator, Runner, RunnerError, RunnerOptions};
use syncflow_protocols::{
    JobQuery, JobRepository, JobStatus, TaskCatalog, TaskId, TaskStore, TriggerKind,
};
use syncflow_store_sqlite::SqliteRepository;

use crate::adapters::{orchestrator_config, task_from_config};
use crate::open_store;

fn engine(config: &Config) -> Arc<RcloneEngine> {
    Arc::new(RcloneEngine::new(&config.engine.binary).with_extra_args(config.engine.extra_args.clone()))
}

/// Upsert every configured task into the stored task view.
///
/// Returns the configured task ids.
pub(crate) async fn import_tasks(
    config: &Config,
    store: &SqliteRepository,
) -> Result<HashSet<TaskId>, Box<dyn std::error::Error>> {
    let mut configured = HashSet::new();
    for entry in &config.tasks {
        let task = task_from_config(entry)
            .map_err(|e| format!("Invalid task '{}': {}", entry.id, e))?;
        store.upsert_task(&task).await?;
        configured.insert(task.id);
    }
    info!("Loaded {} tasks", configured.len());
    Ok(configured)
}

/// Delete stored tasks that are no longer configured, with their job history.
pub(crate) async fn prune_tasks(
    store: &SqliteRepository,
    configured: &HashSet<TaskId>,
) -> Result<usize, Box<dyn std::error::Error>> {
    let mut removed = 0;
    for task in store.list_all_tasks().await? {
        if !configured.contains(&task.id) {
            warn!(task_id = %task.id, "Task removed from configuration, deleting its history");
            store.delete_task(&task.id).await?;
            removed += 1;
        }
    }
    Ok(removed)
}

/// Refuse to start a task that already has a running Job in the database,
/// possibly owned by another process.
pub(crate) async fn ensure_idle(
    store: &SqliteRepository,
    task_id: &str,
) -> Result<(), RunnerError> {
    let running = store
        .list_jobs(&JobQuery::for_task(task_id).with_status(JobStatus::Running).with_limit(1))
        .await?;
    match running.first() {
        Some(job) => Err(RunnerError::ConcurrentRunRejected {
            task_id: task_id.to_string(),
            running_job: job.id,
        }),
        None => Ok(()),
    }
}

/// Run triggers until Ctrl+C.
pub(crate) async fn serve(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    info!("Starting syncflow v{}", env!("CARGO_PKG_VERSION"));

    let store = Arc::new(open_store(&config).await?);
    let configured = import_tasks(&config, &store).await?;
    prune_tasks(&store, &configured).await?;

    let orchestrator = Orchestrator::new(
        orchestrator_config(&config),
        store.clone(),
        store.clone(),
        engine(&config),
    );
    orchestrator.start().await?;
    info!(
        scheduled = orchestrator.schedules().len(),
        watched = orchestrator.watcher().len(),
        "syncflow running, press Ctrl+C to stop"
    );

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }

    orchestrator.shutdown().await;
    info!("syncflow stopped");
    Ok(())
}

/// Run one task in the foreground and report the outcome.
pub(crate) async fn run_once(
    config: Config,
    task_id: String,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(open_store(&config).await?);
    import_tasks(&config, &store).await?;

    let task = store
        .get_task(&task_id)
        .await?
        .ok_or_else(|| format!("Task not found: {}", task_id))?;
    ensure_idle(&store, &task_id).await?;

    let runner = Runner::new(store.clone(), engine(&config)).with_options(RunnerOptions {
        max_file_errors: config.runner.max_file_errors,
    });
    let mut updates = runner.subscribe();
    let running = runner.start_task(&task, TriggerKind::Manual).await?;
    println!("Started job {} for task {}", running.job_id, task_id);

    let printer = tokio::spawn(async move {
        while let Ok(update) = updates.recv().await {
            match update {
                JobUpdate::Started(_) => {}
                JobUpdate::Progress(job) => {
                    let c = job.counters;
                    println!(
                        "  transferred {} files ({} bytes), deleted {}, errors {}",
                        c.files_transferred, c.bytes_transferred, c.files_deleted, c.error_count
                    );
                }
                JobUpdate::Finished(_) => break,
            }
        }
    });

    let job_id = running.job_id;
    let status = tokio::select! {
        status = running.wait() => status,
        _ = tokio::signal::ctrl_c() => {
            runner.cancel(&task_id);
            runner.shutdown().await;
            JobStatus::Cancelled
        }
    };
    printer.abort();

    let job = store.get_job(job_id).await?;
    println!("Job {} finished: {}", job_id, status);
    if let Some(error) = job.and_then(|j| j.error) {
        println!("{}", error);
    }

    if status == JobStatus::Success {
        Ok(())
    } else {
        Err(format!("Job {} ended with status {}", job_id, status).into())
    }
}
