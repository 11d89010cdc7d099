//! Error types for scheduling and dependency graph processing.

use chrono::NaiveDate;
use thiserror::Error;

use crate::interner::TaskId;

/// Errors raised while building or layering the dependency graph.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("Circular dependency detected among tasks {tasks:?}")]
    Cycle { tasks: Vec<TaskId> },
}

/// Errors that can occur while propagating dates.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("Failed to fulfill constraints of task {task}: {reason}")]
    Unsatisfiable { task: TaskId, reason: String },
    #[error("Invalid dependency graph: {0}")]
    Configuration(#[from] GraphError),
    #[error("Task not found: {0}")]
    TaskNotFound(TaskId),
    #[error("Task {task} would end ({end}) before it starts ({start})")]
    InvalidDates {
        task: TaskId,
        start: NaiveDate,
        end: NaiveDate,
    },
    #[error("Invalid dependency {dependee} -> {dependant}: {reason}")]
    InvalidDependency {
        dependee: TaskId,
        dependant: TaskId,
        reason: String,
    },
    #[error("A task named {0:?} already exists")]
    DuplicateTask(String),
    #[error("Too many {0} for 32-bit ids")]
    CapacityExceeded(&'static str),
    #[error("Cannot move task {task} under {parent}: {reason}")]
    InvalidHierarchy {
        task: TaskId,
        parent: TaskId,
        reason: String,
    },
}

impl ScheduleError {
    pub(crate) fn unsatisfiable(task: TaskId, reason: impl Into<String>) -> Self {
        ScheduleError::Unsatisfiable {
            task,
            reason: reason.into(),
        }
    }

    /// True for errors that stop a whole run rather than a single task.
    pub fn is_configuration(&self) -> bool {
        matches!(self, ScheduleError::Configuration(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_graph_error_converts_to_configuration() {
        let err: ScheduleError = GraphError::Cycle {
            tasks: vec![TaskId(1), TaskId(2)],
        }
        .into();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("Circular dependency"));
    }

    #[test]
    fn test_unsatisfiable_message_names_task() {
        let err = ScheduleError::unsatisfiable(TaskId(4), "two fixed starts");
        assert!(!err.is_configuration());
        assert_eq!(
            err.to_string(),
            "Failed to fulfill constraints of task #4: two fixed starts"
        );
    }
}
