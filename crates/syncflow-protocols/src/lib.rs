//! # syncflow Protocols
//!
//! Domain types and collaborator traits for the syncflow orchestration core.
//! Contains only data definitions and interfaces - no implementations.
//!
//! ## Core Traits
//!
//! - [`SyncEngine`] - the external transfer engine invoked once per Job
//! - [`TaskCatalog`] - read-only view of task definitions
//! - [`TaskStore`] - task writes owned by the task-management domain
//! - [`JobRepository`] - durable Job / JobLog history
//!
//! Jobs and logs refer to their owners by identity ([`TaskId`], [`JobId`]),
//! never by reference; repositories resolve by id lookup.

pub mod engine;
pub mod error;
pub mod job;
pub mod repository;
pub mod task;

pub use engine::{EngineEvent, EngineStream, RemoteLocation, SyncEngine, SyncRequest};
pub use error::{EngineError, RepositoryError};
pub use job::{
    Job, JobCounters, JobId, JobLog, JobStatus, JobTransitionError, LogAction, LogLevel,
    TriggerKind,
};
pub use repository::{JobQuery, JobRepository, TaskCatalog, TaskStore};
pub use task::{
    ConflictPolicy, ConnectionRef, DeletePolicy, Direction, Task, TaskChange, TaskId,
    TransferOptions,
};
