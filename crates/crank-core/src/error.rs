//! Unified error types for crank.

use thiserror::Error;

/// Unified error type for all crank operations.
///
/// Fatal variants (`CorruptState`, `DependencyCycle`,
/// `ConcurrentWriteConflict`, `ConcurrentLock`) halt a run; recoverable
/// variants (`AgentInvocation`, `QualityCheckFailed`, `NothingToCommit`)
/// are absorbed into the progress log and the loop continues.
#[derive(Error, Debug)]
pub enum CrankError {
    // Store errors
    #[error("corrupt task store: {0}")]
    CorruptState(String),

    #[error("dependency cycle involving task '{0}'")]
    DependencyCycle(String),

    #[error("task store changed on disk since load (concurrent writer?)")]
    ConcurrentWriteConflict,

    #[error("another run holds the lock{}", .pid.map(|p| format!(" (pid {})", p)).unwrap_or_default())]
    ConcurrentLock { pid: Option<u32> },

    #[error("task not found: {0}")]
    TaskNotFound(String),

    #[error("invalid status transition for task '{id}': {from} -> {to}")]
    InvalidTransition {
        id: String,
        from: String,
        to: String,
    },

    // Engine errors (recoverable within a run)
    #[error("agent invocation failed: {0}")]
    AgentInvocation(String),

    #[error("quality check failed: {command}")]
    QualityCheckFailed { command: String, output: String },

    #[error("nothing to commit for task '{0}'")]
    NothingToCommit(String),

    #[error("git command failed: {0}")]
    GitCommand(String),

    // I/O and serialization
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Generic
    #[error("{0}")]
    Other(String),
}

impl CrankError {
    /// True for errors the iteration loop absorbs into the progress log
    /// instead of halting.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            CrankError::AgentInvocation(_)
                | CrankError::QualityCheckFailed { .. }
                | CrankError::NothingToCommit(_)
        )
    }
}

/// Result type alias using CrankError.
pub type Result<T> = std::result::Result<T, CrankError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_classification() {
        assert!(CrankError::AgentInvocation("timed out".into()).is_recoverable());
        assert!(CrankError::NothingToCommit("1.0".into()).is_recoverable());
        assert!(!CrankError::CorruptState("bad json".into()).is_recoverable());
        assert!(!CrankError::ConcurrentLock { pid: Some(42) }.is_recoverable());
    }

    #[test]
    fn test_lock_error_display() {
        let with_pid = CrankError::ConcurrentLock { pid: Some(1234) };
        assert!(with_pid.to_string().contains("pid 1234"));

        let without = CrankError::ConcurrentLock { pid: None };
        assert!(!without.to_string().contains("pid"));
    }
}
