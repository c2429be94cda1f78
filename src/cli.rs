//! CLI definitions for syncflow.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// syncflow CLI.
#[derive(Parser)]
#[command(name = "syncflow")]
#[command(about = "Scheduled, realtime and manual sync job orchestration")]
#[command(version)]
pub(crate) struct Cli {
    /// Configuration file path (default: ~/.syncflow/config.toml)
    #[arg(short, long, global = true, env = "SYNCFLOW_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Run schedules and filesystem watches in the foreground (default)
    Serve,

    /// Run one task now and wait for its job to finish
    Run {
        /// Task ID
        task_id: String,
    },

    /// List configured tasks
    Tasks {
        /// Output format (table, json)
        #[arg(long, default_value = "table")]
        format: String,
    },

    /// Show job history, newest first
    Jobs {
        /// Only jobs of this task
        #[arg(long)]
        task: Option<String>,

        /// Only jobs with this status (running, success, failed, cancelled)
        #[arg(long)]
        status: Option<String>,

        /// Maximum number of jobs
        #[arg(long, default_value_t = 20)]
        limit: usize,

        /// Output format (table, json)
        #[arg(long, default_value = "table")]
        format: String,
    },

    /// Show the log of one job in emission order
    Logs {
        /// Job ID
        job_id: String,

        /// Output format (table, json)
        #[arg(long, default_value = "table")]
        format: String,
    },

    /// Validate the configuration file
    Validate,
}
