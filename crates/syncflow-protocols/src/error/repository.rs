//! Job repository errors.

use thiserror::Error;

use crate::job::JobStatus;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    /// A terminal Job was asked to change status again.
    #[error("Job {id} already finished with status {status}")]
    AlreadyFinished { id: String, status: JobStatus },

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Query error: {0}")]
    QueryError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_already_finished_display() {
        let err = RepositoryError::AlreadyFinished {
            id: "job-1".to_string(),
            status: JobStatus::Success,
        };
        let display = err.to_string();
        assert!(display.contains("job-1"));
        assert!(display.contains("success"));
    }

    #[test]
    fn test_not_found_errors() {
        assert!(RepositoryError::JobNotFound("j".into()).to_string().contains("Job not found"));
        assert!(RepositoryError::TaskNotFound("t".into()).to_string().contains("Task not found"));
    }

    #[test]
    fn test_all_error_variants() {
        let errors: Vec<RepositoryError> = vec![
            RepositoryError::StorageError("a".to_string()),
            RepositoryError::QueryError("b".to_string()),
            RepositoryError::SerializationError("c".to_string()),
            RepositoryError::ConnectionError("d".to_string()),
        ];
        for err in errors {
            assert!(!err.to_string().is_empty());
        }
    }
}
