//! Sync job orchestration core.
//!
//! Three trigger sources (cron schedules, filesystem changes and manual
//! requests) feed a dispatcher that starts runs through a [`Runner`]. The
//! runner admits at most one Job per task and records every run in a
//! [`JobRepository`](syncflow_protocols::JobRepository).

pub mod config;
pub mod cron_expr;
pub mod debounce;
pub mod dispatch;
pub mod error;
pub mod gate;
pub mod orchestrator;
pub mod runner;
pub mod schedule;
pub mod store;
#[cfg(any(test, feature = "test-util"))]
pub mod testing;
pub mod watcher;

pub use config::{OrchestratorConfig, RunnerOptions, WatcherOptions};
pub use dispatch::{trigger_channel, TriggerDispatcher, TriggerRequest, TriggerSender};
pub use error::{OrchestratorError, RunnerError, ScheduleError, WatchError};
pub use gate::{ConcurrencyGate, GatePermit};
pub use orchestrator::{Orchestrator, INTERRUPTED_REASON};
pub use runner::{JobUpdate, Runner, RunningJob};
pub use schedule::ScheduleManager;
pub use store::MemoryRepository;
pub use watcher::FsWatcher;
