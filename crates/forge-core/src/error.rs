//! Error types for Forge

use thiserror::Error;

use crate::domain::locking::LockError;

/// Result type alias using Forge's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Forge error types with helpful messages and suggestions
#[derive(Error, Debug)]
pub enum Error {
    // Plan errors (E001-E099)
    #[error("Blueprint '{0}' not found in plan.")]
    BlueprintNotFound(String),

    #[error("Invalid plan: {0}")]
    InvalidPlan(String),

    #[error("Dependency cycle detected: {0}")]
    DependencyCycle(String),

    // Agent errors (E100-E199)
    #[error("Agent invocation failed for task '{task_id}': {reason}")]
    AgentFailure { task_id: String, reason: String },

    #[error("Review oracle failed: {0}")]
    ReviewOracleFailure(String),

    // Lock errors (E300-E399)
    #[error("Lock timeout: task '{0}' held its locks past the maximum duration")]
    LockTimeout(String),

    #[error(transparent)]
    Lock(#[from] LockError),

    // Input errors (E800-E899)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // Generic errors
    #[error("{0}")]
    Other(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Get error code for this error type
    pub fn code(&self) -> &'static str {
        match self {
            Self::BlueprintNotFound(_) => "E001",
            Self::InvalidPlan(_) => "E002",
            Self::DependencyCycle(_) => "E003",
            Self::AgentFailure { .. } => "E100",
            Self::ReviewOracleFailure(_) => "E101",
            Self::LockTimeout(_) => "E300",
            Self::Lock(e) => e.code(),
            Self::InvalidInput(_) => "E800",
            Self::Json(_) => "E801",
            Self::Other(_) | Self::Io(_) => "E9999",
        }
    }

    /// Get suggestion for how to fix this error
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Self::InvalidPlan(_) | Self::DependencyCycle(_) | Self::BlueprintNotFound(_) => {
                Some("forge validate <plan>".to_string())
            }
            Self::ReviewOracleFailure(_) => Some("forge config get review.command".to_string()),
            Self::LockTimeout(_) => {
                Some("forge config set locking.max_duration_secs <secs>".to_string())
            }
            _ => None,
        }
    }

    /// Whether this error means the caller should wait and retry rather than fail
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Lock(LockError::Conflict { .. }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(Error::InvalidPlan("x".into()).code(), "E002");
        assert_eq!(Error::LockTimeout("t1".into()).code(), "E300");
        assert_eq!(Error::ReviewOracleFailure("boom".into()).code(), "E101");
        assert_eq!(
            Error::Lock(LockError::InvalidRequest("t1".into())).code(),
            "E303"
        );
    }

    #[test]
    fn test_error_suggestions() {
        assert!(Error::DependencyCycle("a -> b -> a".into()).suggestion().is_some());
        assert!(Error::Other("x".into()).suggestion().is_none());
    }

    #[test]
    fn test_only_conflicts_are_recoverable() {
        let conflict = Error::Lock(LockError::Conflict {
            resource: "table:orders".into(),
            holder: "x".into(),
        });
        assert!(conflict.is_recoverable());
        assert!(!Error::LockTimeout("x".into()).is_recoverable());
        assert!(!Error::ReviewOracleFailure("x".into()).is_recoverable());
    }

    #[test]
    fn test_error_display() {
        let err = Error::AgentFailure {
            task_id: "db-1".into(),
            reason: "exit 2".into(),
        };
        assert_eq!(
            err.to_string(),
            "Agent invocation failed for task 'db-1': exit 2"
        );
    }
}
