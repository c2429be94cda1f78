//! # syncflow rclone engine
//!
//! [`SyncEngine`](syncflow_protocols::SyncEngine) adapter that runs the
//! `rclone` binary once per Job and turns its JSON log lines into
//! [`EngineEvent`](syncflow_protocols::EngineEvent)s.
//!
//! Diffing, transfer and conflict resolution stay inside rclone. This crate
//! only builds the command line, streams stderr and maps the exit status.

mod args;
mod engine;
mod log_line;

pub use args::build_args;
pub use engine::RcloneEngine;
pub use log_line::parse_line;
