//! Error taxonomy
//!
//! Four caller-facing classes: validation (fix your input), not-found,
//! state (operation illegal for the task's current state), persistence.
//! Every error maps to a severity and category for display.

use thiserror::Error;

use crate::domain::Status;
use crate::store::StoreError;
use crate::validation::ValidationError;

/// Severity of an error for user-facing display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

/// Coarse error category for display grouping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Validation,
    Persistence,
    BusinessLogic,
    System,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation => write!(f, "validation"),
            Self::Persistence => write!(f, "persistence"),
            Self::BusinessLogic => write!(f, "business_logic"),
            Self::System => write!(f, "system"),
        }
    }
}

/// Operation is illegal for the task's current state
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StateError {
    #[error("task {id} is already completed")]
    AlreadyCompleted { id: String },

    #[error("cannot transition from {from} to {to}")]
    IllegalTransition { from: Status, to: Status },

    #[error("cannot change difficulty of completed task {id}; this would affect XP history")]
    DifficultyLocked { id: String },

    #[error("cannot change status of completed task {id} away from completed")]
    StatusLocked { id: String },

    #[error("cannot delete completed task {id} without confirmation; pass force to delete")]
    DeletionRequiresForce { id: String },
}

/// Top-level error returned by TaskService operations
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("task not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Persistence(#[from] StoreError),
}

impl TaskError {
    /// Severity for user-facing display
    pub fn severity(&self) -> Severity {
        match self {
            Self::Validation(_) => Severity::Warning,
            Self::NotFound(_) => Severity::Error,
            Self::State(StateError::AlreadyCompleted { .. }) => Severity::Warning,
            Self::State(_) => Severity::Error,
            Self::Persistence(e) => match e {
                StoreError::Read { .. } => Severity::Error,
                // A failed save or a corrupt document means the in-memory
                // state may no longer be durable
                StoreError::Write { .. } | StoreError::Serialize { .. } | StoreError::Corrupt { .. } => {
                    Severity::Critical
                }
            },
        }
    }

    /// Category for user-facing display
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Validation(_) => ErrorCategory::Validation,
            Self::NotFound(_) | Self::State(_) => ErrorCategory::BusinessLogic,
            Self::Persistence(_) => ErrorCategory::Persistence,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_severity_mapping() {
        let err = TaskError::Validation(ValidationError::EmptyTitle);
        assert_eq!(err.severity(), Severity::Warning);
        assert_eq!(err.category(), ErrorCategory::Validation);

        let err = TaskError::NotFound("abc".into());
        assert_eq!(err.severity(), Severity::Error);
        assert_eq!(err.category(), ErrorCategory::BusinessLogic);

        let err = TaskError::State(StateError::AlreadyCompleted { id: "abc".into() });
        assert_eq!(err.severity(), Severity::Warning);

        let err = TaskError::Persistence(StoreError::Corrupt {
            path: PathBuf::from("tasks.json"),
            message: "bad json".into(),
        });
        assert_eq!(err.severity(), Severity::Critical);
        assert_eq!(err.category(), ErrorCategory::Persistence);
    }

    #[test]
    fn test_state_error_messages() {
        let err = StateError::IllegalTransition {
            from: Status::Completed,
            to: Status::Pending,
        };
        assert_eq!(err.to_string(), "cannot transition from Completed to Pending");
    }

    #[test]
    fn test_display_names() {
        assert_eq!(Severity::Critical.to_string(), "critical");
        assert_eq!(ErrorCategory::BusinessLogic.to_string(), "business_logic");
    }
}
