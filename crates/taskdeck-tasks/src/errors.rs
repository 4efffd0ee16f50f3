//! Task error types and per-action failure messages.
//!
//! Errors propagate to the layer that issued the operation, which turns them
//! into a short message for display (see [`TaskAction::failure_message`]) and
//! logs the details. Nothing is retried.

use taskdeck_store::StoreError;
use thiserror::Error;

/// Errors from task operations.
#[derive(Debug, Error)]
pub enum TaskError {
    /// The document store rejected or failed the operation.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Task not found.
    #[error("Task not found: {id}")]
    NotFound {
        /// The id that was looked up.
        id: String,
    },

    /// Input rejected before any write.
    #[error("Validation error: {0}")]
    Validation(String),
}

impl TaskError {
    /// Create a not-found error for a task.
    pub fn task_not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    /// Map a store error, turning a missing document into [`TaskError::NotFound`].
    pub(crate) fn from_store(err: StoreError, id: &str) -> Self {
        match err {
            StoreError::NotFound { .. } => Self::task_not_found(id),
            other => Self::Store(other),
        }
    }
}

/// A user-visible task action, for turning failures into display strings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskAction {
    /// Creating a task.
    Create,
    /// Patching a task (including status toggles and board moves).
    Update,
    /// Deleting a task.
    Delete,
    /// Loading tasks (one-shot or live).
    Load,
}

impl TaskAction {
    /// Generic message shown when the action fails.
    pub fn failure_message(self) -> &'static str {
        match self {
            Self::Create => "Failed to create task",
            Self::Update => "Failed to update task",
            Self::Delete => "Failed to delete task",
            Self::Load => "Failed to load tasks",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_display() {
        assert_eq!(
            TaskError::task_not_found("t1").to_string(),
            "Task not found: t1"
        );
    }

    #[test]
    fn store_not_found_becomes_task_not_found() {
        let err = TaskError::from_store(StoreError::not_found("tasks", "t9"), "t9");
        assert!(matches!(err, TaskError::NotFound { ref id } if id == "t9"));
    }

    #[test]
    fn other_store_errors_pass_through() {
        let err = TaskError::from_store(StoreError::InvalidQuery("x".into()), "t9");
        assert!(matches!(err, TaskError::Store(StoreError::InvalidQuery(_))));
    }

    #[test]
    fn failure_messages() {
        assert_eq!(TaskAction::Create.failure_message(), "Failed to create task");
        assert_eq!(TaskAction::Update.failure_message(), "Failed to update task");
        assert_eq!(TaskAction::Delete.failure_message(), "Failed to delete task");
        assert_eq!(TaskAction::Load.failure_message(), "Failed to load tasks");
    }
}
