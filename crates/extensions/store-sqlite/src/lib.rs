//! SQLite storage for syncflow.
//!
//! Persists task definitions, Jobs and JobLogs in one database file.
//! Deleting a task removes its Jobs, and deleting a Job removes its logs.

mod repository;
mod rows;
mod schema;

pub use repository::SqliteRepository;
