//! Layered scheduler.
//!
//! The scheduler builds a `DependencyGraph`, walks its layers in order and
//! commits each task's new dates before the next layer reads them. Runs are
//! guarded against reentrancy, and an optional `Diagnostic` receives
//! per-node failures and the committed changes.

mod core;
mod diagnostic;
mod state;

pub use core::{RunReport, Scheduler};
pub use diagnostic::{Diagnostic, Modification, RecordingDiagnostic};
pub use state::{RunGuard, RunState};
