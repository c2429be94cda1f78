//! `tasks`, `jobs` and `logs` subcommand handlers.

use chrono::{Local, Utc};
use uuid::Uuid;

use syncflow_config::Config;
use syncflow_orchestrator::cron_expr;
use syncflow_protocols::{Job, JobQuery, JobRepository, JobStatus};

use crate::adapters::task_from_config;
use crate::open_store;

fn is_json(format: &str) -> Result<bool, Box<dyn std::error::Error>> {
    match format {
        "json" => Ok(true),
        "table" => Ok(false),
        other => Err(format!("Unknown output format '{}'", other).into()),
    }
}

fn next_run(schedule: &str) -> String {
    if schedule.trim().is_empty() {
        return "-".to_string();
    }
    match cron_expr::parse(schedule) {
        Ok(parsed) => parsed
            .upcoming(Local)
            .next()
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "never".to_string()),
        Err(e) => format!("invalid: {}", e),
    }
}

fn duration_text(job: &Job) -> String {
    let elapsed = job
        .duration()
        .unwrap_or_else(|| Utc::now() - job.started_at);
    let secs = elapsed.num_seconds().max(0);
    if secs >= 3600 {
        format!("{}h{:02}m", secs / 3600, (secs % 3600) / 60)
    } else if secs >= 60 {
        format!("{}m{:02}s", secs / 60, secs % 60)
    } else {
        format!("{}s", secs)
    }
}

/// List configured tasks with their next scheduled run.
pub(crate) fn list_tasks(config: &Config, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let json = is_json(format)?;
    let tasks = config
        .tasks
        .iter()
        .map(|entry| task_from_config(entry).map_err(|e| format!("Invalid task '{}': {}", entry.id, e)))
        .collect::<Result<Vec<_>, _>>()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&tasks)?);
        return Ok(());
    }
    if tasks.is_empty() {
        println!("No tasks configured.");
        return Ok(());
    }

    println!(
        "{:<16} {:<14} {:<16} {:<9} {:<18} DESTINATION",
        "ID", "DIRECTION", "SCHEDULE", "REALTIME", "NEXT RUN"
    );
    for task in &tasks {
        let schedule = if task.has_schedule() { task.schedule.as_str() } else { "-" };
        println!(
            "{:<16} {:<14} {:<16} {:<9} {:<18} {}:{}",
            task.id,
            task.direction.as_str(),
            schedule,
            if task.realtime { "yes" } else { "no" },
            next_run(&task.schedule),
            task.connection,
            task.remote_path
        );
    }
    Ok(())
}

pub(crate) async fn list_jobs(
    config: Config,
    task: Option<String>,
    status: Option<String>,
    limit: usize,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let json = is_json(format)?;
    let mut query = JobQuery::default().with_limit(limit);
    query.task_id = task;
    if let Some(status) = status {
        query = query.with_status(status.parse::<JobStatus>()?);
    }

    let store = open_store(&config).await?;
    let jobs = store.list_jobs(&query).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&jobs)?);
        return Ok(());
    }
    if jobs.is_empty() {
        println!("No jobs found.");
        return Ok(());
    }

    println!(
        "{:<36}  {:<16} {:<10} {:<9} {:<17} {:>8} {:>6} {:>7} {:>6}",
        "JOB", "TASK", "STATUS", "TRIGGER", "STARTED", "DURATION", "FILES", "DELETED", "ERRORS"
    );
    for job in &jobs {
        println!(
            "{:<36}  {:<16} {:<10} {:<9} {:<17} {:>8} {:>6} {:>7} {:>6}",
            job.id.to_string(),
            job.task_id,
            job.status.as_str(),
            job.trigger.as_str(),
            job.started_at.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string(),
            duration_text(job),
            job.counters.files_transferred,
            job.counters.files_deleted,
            job.counters.error_count
        );
    }
    Ok(())
}

pub(crate) async fn show_logs(
    config: Config,
    job_id: &str,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let json = is_json(format)?;
    let job_id = Uuid::parse_str(job_id).map_err(|e| format!("Invalid job id '{}': {}", job_id, e))?;

    let store = open_store(&config).await?;
    let job = store
        .get_job(job_id)
        .await?
        .ok_or_else(|| format!("Job not found: {}", job_id))?;
    let logs = store.list_logs(job_id).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&logs)?);
        return Ok(());
    }

    println!(
        "Job {} ({}, {}, started {})",
        job.id,
        job.task_id,
        job.status,
        job.started_at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S")
    );
    for log in &logs {
        let size = log.size.map(|s| format!(" ({} bytes)", s)).unwrap_or_default();
        println!(
            "{} {:<7} {:<11} {}{}{}",
            log.timestamp.with_timezone(&Local).format("%H:%M:%S"),
            log.level.as_str(),
            log.action.as_str(),
            log.path.as_deref().unwrap_or("-"),
            size,
            log.message
                .as_deref()
                .map(|m| format!(": {}", m))
                .unwrap_or_default()
        );
    }
    if let Some(error) = &job.error {
        println!("\n{}", error);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use syncflow_protocols::TriggerKind;

    #[test]
    fn test_output_format() {
        assert!(is_json("json").unwrap());
        assert!(!is_json("table").unwrap());
        assert!(is_json("yaml").is_err());
    }

    #[test]
    fn test_next_run_text() {
        assert_eq!(next_run(""), "-");
        assert!(next_run("bogus").starts_with("invalid"));
        assert_ne!(next_run("@daily"), "-");
    }

    #[test]
    fn test_duration_text() {
        let mut job = Job::start("docs", TriggerKind::Manual);
        job.finish(JobStatus::Success, None).unwrap();
        job.finished_at = Some(job.started_at + chrono::Duration::seconds(75));
        assert_eq!(duration_text(&job), "1m15s");
        job.finished_at = Some(job.started_at + chrono::Duration::seconds(3_900));
        assert_eq!(duration_text(&job), "1h05m");
    }
}
