//! Optional observer of scheduling results.

use chrono::NaiveDate;
use std::cell::RefCell;

use crate::error::ScheduleError;
use crate::interner::TaskId;

/// Receives per-node failures and committed changes.
///
/// Installing or removing a diagnostic never changes scheduling results.
pub trait Diagnostic {
    fn log_error(&self, error: &ScheduleError);

    /// A start and/or end is about to be committed for `task`.
    fn add_modified_task(&self, task: TaskId, new_start: Option<NaiveDate>, new_end: Option<NaiveDate>);
}

/// One modification reported to a diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Modification {
    pub task: TaskId,
    pub new_start: Option<NaiveDate>,
    pub new_end: Option<NaiveDate>,
}

/// Diagnostic that keeps everything it is told, for undo integration or
/// inspection after a run.
#[derive(Debug, Default)]
pub struct RecordingDiagnostic {
    errors: RefCell<Vec<ScheduleError>>,
    modifications: RefCell<Vec<Modification>>,
}

impl RecordingDiagnostic {
    pub fn errors(&self) -> Vec<ScheduleError> {
        self.errors.borrow().clone()
    }

    pub fn modifications(&self) -> Vec<Modification> {
        self.modifications.borrow().clone()
    }

    pub fn clear(&self) {
        self.errors.borrow_mut().clear();
        self.modifications.borrow_mut().clear();
    }
}

impl Diagnostic for RecordingDiagnostic {
    fn log_error(&self, error: &ScheduleError) {
        self.errors.borrow_mut().push(error.clone());
    }

    fn add_modified_task(&self, task: TaskId, new_start: Option<NaiveDate>, new_end: Option<NaiveDate>) {
        self.modifications.borrow_mut().push(Modification {
            task,
            new_start,
            new_end,
        });
    }
}
