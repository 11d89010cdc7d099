//! Dependency graph edges.

use chrono::NaiveDate;
use std::fmt;

use crate::interner::TaskId;
use crate::manager::TaskManager;
use crate::models::{DependencyId, Hardness, TaskDependency};
use crate::range::DateRange;

/// Arena index of an edge inside a `DependencyGraph`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeIndex(pub usize);

/// What an edge stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    /// A user dependency. `inherited` marks copies that constrain a
    /// descendant of the declared dependant.
    Explicit {
        dependency: DependencyId,
        inherited: bool,
    },
    /// Child to parent: the parent must enclose the child.
    Containment,
}

/// Edge from `src` to `dst` with the ranges it last imposed on `dst`.
///
/// Cached ranges are only meaningful after a successful `refresh`.
#[derive(Debug, Clone)]
pub struct DependencyEdge {
    kind: EdgeKind,
    src: TaskId,
    dst: TaskId,
    start_range: DateRange,
    end_range: DateRange,
    weak: bool,
}

impl DependencyEdge {
    /// Edge for `dependency` constraining `dst` (the dependant or one of
    /// its descendants).
    pub fn explicit(dependency: &TaskDependency, dst: TaskId) -> Self {
        Self {
            kind: EdgeKind::Explicit {
                dependency: dependency.id,
                inherited: dst != dependency.dependant,
            },
            src: dependency.dependee,
            dst,
            start_range: DateRange::all(),
            end_range: DateRange::all(),
            weak: false,
        }
    }

    pub fn containment(child: TaskId, parent: TaskId) -> Self {
        Self {
            kind: EdgeKind::Containment,
            src: child,
            dst: parent,
            start_range: DateRange::all(),
            end_range: DateRange::all(),
            weak: false,
        }
    }

    pub fn kind(&self) -> EdgeKind {
        self.kind
    }

    pub fn src(&self) -> TaskId {
        self.src
    }

    pub fn dst(&self) -> TaskId {
        self.dst
    }

    pub fn is_containment(&self) -> bool {
        matches!(self.kind, EdgeKind::Containment)
    }

    /// Recompute the cached ranges from current task dates.
    ///
    /// Returns false when the edge cannot contribute right now: its
    /// dependency was removed, or one of its tasks is gone or no longer in
    /// the expected relation.
    pub fn refresh(&mut self, manager: &TaskManager) -> bool {
        let (Some(src), Some(dst)) = (manager.task(self.src), manager.task(self.dst)) else {
            return false;
        };
        match self.kind {
            EdgeKind::Containment => {
                if manager.parent(self.src) != Some(self.dst) {
                    return false;
                }
                self.start_range = DateRange::at_most(src.start);
                self.end_range = DateRange::at_least(src.end);
                self.weak = false;
            }
            EdgeKind::Explicit { dependency, .. } => {
                let Some(dep) = manager.dependency(dependency) else {
                    return false;
                };
                let calendar = manager.calendar();
                let collision = dep.collision(src, dst, calendar);
                self.start_range = collision.start_range(calendar, dst.time_unit());
                self.end_range = DateRange::all();
                self.weak = !collision.active && dep.hardness == Hardness::Rubber;
            }
        }
        true
    }

    /// Range imposed on the destination's start.
    pub fn start_range(&self) -> DateRange {
        self.start_range
    }

    /// Range imposed on the destination's end.
    pub fn end_range(&self) -> DateRange {
        self.end_range
    }

    /// Advisory edges only apply when nothing stronger bounds the task.
    pub fn is_weak(&self) -> bool {
        self.weak
    }

    /// The child's `(start, end)` recorded by a containment edge.
    pub fn boundaries(&self) -> Option<(NaiveDate, NaiveDate)> {
        if !self.is_containment() {
            return None;
        }
        Some((self.start_range.upper_endpoint()?, self.end_range.lower_endpoint()?))
    }
}

impl fmt::Display for DependencyEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            EdgeKind::Containment => write!(f, "{} contains {}", self.dst, self.src),
            EdgeKind::Explicit {
                inherited: true, ..
            } => write!(f, "{} -> {} (inherited)", self.src, self.dst),
            EdgeKind::Explicit { .. } => write!(f, "{} -> {}", self.src, self.dst),
        }
    }
}
