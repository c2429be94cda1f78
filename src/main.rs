//! syncflow - sync job orchestration
//!
//! Main entry point for the syncflow CLI and trigger service.

mod adapters;
mod cli;
mod cmd_history;
mod cmd_serve;

use std::path::Path;

use clap::Parser;
use tracing::{info, warn};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use syncflow_config::{Config, ConfigLoader, LoggingConfig};
use syncflow_store_sqlite::SqliteRepository;

use crate::adapters::validate_config;
use crate::cli::{Cli, Commands};

fn init_tracing(logging: &LoggingConfig) -> Result<(), Box<dyn std::error::Error>> {
    let log_dir = ConfigLoader::expand_path(&logging.directory);
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("syncflow")
        .filename_suffix("log")
        .max_log_files(30)
        .build(&log_dir)?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // Flushes the file writer on exit; must outlive every log call.
    static GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
        std::sync::OnceLock::new();
    let _ = GUARD.set(guard);

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true).with_ansi(true))
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<Config, Box<dyn std::error::Error>> {
    let config = match path {
        Some(path) => ConfigLoader::load(path)?,
        None => ConfigLoader::load_or_default(&ConfigLoader::default_path())?,
    };
    Ok(config)
}

/// Open the job database, creating its directory when needed.
pub(crate) async fn open_store(
    config: &Config,
) -> Result<SqliteRepository, Box<dyn std::error::Error>> {
    let path = ConfigLoader::expand_path(&config.storage.database);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(SqliteRepository::open(&path).await?)
}

/// Print validation results; fails when the configuration has errors.
fn validate(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let result = validate_config(config);
    for warning in &result.warnings {
        println!("warning: {}: {}", warning.path, warning.message);
    }
    for error in &result.errors {
        println!("error: {}: {}", error.path, error.message);
    }

    if result.is_valid() {
        println!("Configuration OK ({} tasks)", config.tasks.len());
        Ok(())
    } else {
        Err(format!("Configuration has {} errors", result.errors.len()).into())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    if let Some(Commands::Validate) = cli.command {
        return validate(&config);
    }

    init_tracing(&config.logging)?;

    let result = validate_config(&config);
    for warning in &result.warnings {
        warn!("{}: {}", warning.path, warning.message);
    }
    if !result.is_valid() {
        return validate(&config);
    }

    match cli.command {
        None | Some(Commands::Serve) => cmd_serve::serve(config).await,
        Some(Commands::Run { task_id }) => cmd_serve::run_once(config, task_id).await,
        Some(Commands::Tasks { format }) => cmd_history::list_tasks(&config, &format),
        Some(Commands::Jobs {
            task,
            status,
            limit,
            format,
        }) => cmd_history::list_jobs(config, task, status, limit, &format).await,
        Some(Commands::Logs { job_id, format }) => {
            cmd_history::show_logs(config, &job_id, &format).await
        }
        Some(Commands::Validate) => {
            info!("Configuration validated");
            Ok(())
        }
    }
}
