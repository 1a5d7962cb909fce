//! Error types for the labor cost engine.
//!
//! This module provides strongly-typed errors using the `thiserror` crate
//! for all error conditions that abort an engine operation. Advisory
//! problems (zero material cost, negative margin, missing attendance) are
//! not errors; they are reported as [`crate::models::Diagnostic`] values.

use thiserror::Error;

/// The main error type for the labor cost engine.
///
/// # Example
///
/// ```
/// use labor_cost_engine::error::EngineError;
///
/// let error = EngineError::WorkOrderNotFound {
///     id: "wo_001".to_string(),
/// };
/// assert_eq!(error.to_string(), "Work order not found: wo_001");
/// ```
#[derive(Debug, Error)]
pub enum EngineError {
    /// Configuration file was not found at the specified path.
    #[error("Configuration file not found: {path}")]
    ConfigNotFound {
        /// The path that was not found.
        path: String,
    },

    /// Configuration file could not be parsed.
    #[error("Failed to parse configuration file '{path}': {message}")]
    ConfigParseError {
        /// The path to the file that failed to parse.
        path: String,
        /// A description of the parse error.
        message: String,
    },

    /// Configuration parsed but is internally inconsistent.
    #[error("Invalid configuration: {message}")]
    ConfigInvalid {
        /// A description of the inconsistency.
        message: String,
    },

    /// The referenced worker does not exist in the worker directory.
    #[error("Worker not found: {id}")]
    WorkerNotFound {
        /// The worker identifier.
        id: String,
    },

    /// The referenced work order does not exist.
    #[error("Work order not found: {id}")]
    WorkOrderNotFound {
        /// The work order identifier.
        id: String,
    },

    /// The referenced work order task does not exist.
    #[error("Task not found: {id}")]
    TaskNotFound {
        /// The task identifier.
        id: String,
    },

    /// The referenced subtask does not exist on the task.
    #[error("Subtask '{sub_task_id}' not found on task '{task_id}'")]
    SubTaskNotFound {
        /// The owning task identifier.
        task_id: String,
        /// The subtask identifier.
        sub_task_id: String,
    },

    /// The referenced product does not exist.
    #[error("Product not found: {id}")]
    ProductNotFound {
        /// The product identifier.
        id: String,
    },

    /// The referenced project does not exist.
    #[error("Project not found: {id}")]
    ProjectNotFound {
        /// The project identifier.
        id: String,
    },

    /// A stage name is not part of the configured stage list.
    #[error("Unknown stage: {stage}")]
    UnknownStage {
        /// The stage name that was rejected.
        stage: String,
    },

    /// Caller-supplied input was rejected.
    #[error("Invalid input for '{field}': {message}")]
    InvalidInput {
        /// The offending field.
        field: String,
        /// Why the value was rejected.
        message: String,
    },

    /// The underlying document store failed.
    #[error("Store error: {message}")]
    Store {
        /// A description of the store failure.
        message: String,
    },
}

impl EngineError {
    /// Returns true for errors that mean a referenced entity is missing.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            EngineError::WorkerNotFound { .. }
                | EngineError::WorkOrderNotFound { .. }
                | EngineError::TaskNotFound { .. }
                | EngineError::SubTaskNotFound { .. }
                | EngineError::ProductNotFound { .. }
                | EngineError::ProjectNotFound { .. }
        )
    }

    /// Shorthand for a store failure.
    pub fn store(message: impl Into<String>) -> Self {
        EngineError::Store {
            message: message.into(),
        }
    }
}

/// A type alias for Results that return EngineError.
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_not_found_displays_path() {
        let error = EngineError::ConfigNotFound {
            path: "/missing/engine.yaml".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Configuration file not found: /missing/engine.yaml"
        );
    }

    #[test]
    fn test_subtask_not_found_displays_both_ids() {
        let error = EngineError::SubTaskNotFound {
            task_id: "task_1".to_string(),
            sub_task_id: "sub_9".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Subtask 'sub_9' not found on task 'task_1'"
        );
    }

    #[test]
    fn test_invalid_input_displays_field_and_message() {
        let error = EngineError::InvalidInput {
            field: "quantity".to_string(),
            message: "subtask quantities exceed task quantity".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Invalid input for 'quantity': subtask quantities exceed task quantity"
        );
    }

    #[test]
    fn test_is_not_found_classification() {
        assert!(EngineError::TaskNotFound { id: "t".into() }.is_not_found());
        assert!(EngineError::WorkerNotFound { id: "w".into() }.is_not_found());
        assert!(!EngineError::store("boom").is_not_found());
        assert!(
            !EngineError::UnknownStage {
                stage: "Painting".into()
            }
            .is_not_found()
        );
    }

    #[test]
    fn test_errors_implement_std_error() {
        fn assert_error<T: std::error::Error + Send + Sync + 'static>() {}
        assert_error::<EngineError>();
    }

    #[test]
    fn test_error_propagation_with_question_mark() {
        fn missing() -> EngineResult<()> {
            Err(EngineError::WorkOrderNotFound {
                id: "wo_404".to_string(),
            })
        }

        fn propagates() -> EngineResult<()> {
            missing()?;
            Ok(())
        }

        assert!(matches!(
            propagates(),
            Err(EngineError::WorkOrderNotFound { .. })
        ));
    }
}
