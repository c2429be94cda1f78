//! Error types for collaborator interfaces.

mod engine;
mod repository;

pub use engine::EngineError;
pub use repository::RepositoryError;
