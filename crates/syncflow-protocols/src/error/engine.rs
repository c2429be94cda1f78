//! Sync engine errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine could not be started at all.
    #[error("Engine launch failed: {0}")]
    Launch(String),

    /// Run-level failure (destination unreachable, auth rejected, ...).
    #[error("Engine fatal error: {0}")]
    Fatal(String),

    /// The run was stopped through its cancellation token.
    #[error("Engine run cancelled")]
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_error_display() {
        let err = EngineError::Fatal("destination unreachable".to_string());
        let display = err.to_string();
        assert!(display.contains("fatal"));
        assert!(display.contains("destination unreachable"));
    }

    #[test]
    fn test_launch_error_display() {
        let err = EngineError::Launch("rclone: not found".to_string());
        assert!(err.to_string().contains("rclone: not found"));
    }

    #[test]
    fn test_cancelled_debug() {
        let debug = format!("{:?}", EngineError::Cancelled);
        assert!(debug.contains("Cancelled"));
    }
}
