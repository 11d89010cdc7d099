//! Date constraint propagation for project task schedules.
//!
//! Two engines keep task dates consistent with their dependencies:
//! - `Scheduler` walks a layered `DependencyGraph` and moves every task
//!   into the range its incoming edges allow, including the containment
//!   of child tasks in their parents.
//! - `RecalculateTaskSchedule` starts from a directly changed task and
//!   resolves the dependencies it reaches in order of distance.
//!
//! Tasks live in a `TaskManager` and only change through its mutators;
//! working time comes from a `WorkingCalendar`.

pub mod bounds;
pub mod calendar;
mod config;
mod error;
pub mod graph;
mod interner;
pub mod logging;
pub mod manager;
mod models;
pub mod range;
pub mod recalculate;
pub mod scheduler;

pub use bounds::{AdjustTaskBounds, BoundsAdjuster};
pub use calendar::{
    DayMask, DayType, MoveDirection, TaskDuration, TimeUnit, WeekendCalendar, WorkingCalendar,
};
pub use config::{RecalculateConfig, SchedulerConfig};
pub use error::{GraphError, ScheduleError};
pub use graph::{DependencyEdge, DependencyGraph, EdgeKind, Node, NodeIndex};
pub use interner::{TaskId, TaskKeyInterner};
pub use manager::{ShiftMutator, TaskEvent, TaskListener, TaskManager, TaskMutator};
pub use models::{
    Collision, ConstraintKind, DependencyId, Hardness, Task, TaskDependency, ThirdDateConstraint,
    Variation,
};
pub use range::DateRange;
pub use recalculate::{resolve_start, RecalcReport, RecalculateTaskSchedule};
pub use scheduler::{Diagnostic, RecordingDiagnostic, RunReport, Scheduler};
