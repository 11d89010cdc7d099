//! Container bounds adjustment.
//!
//! After dates move, every container above a modified task is re-fitted to
//! exactly enclose its children. Containers are processed deepest first so a
//! parent sees its children's final spans.

use chrono::NaiveDate;
use rustc_hash::FxHashSet;

use crate::error::ScheduleError;
use crate::interner::TaskId;
use crate::log_changes;
use crate::manager::TaskManager;

/// Re-fits container tasks after a batch of date changes.
pub trait BoundsAdjuster {
    /// Adjust every ancestor of `modified`. Returns the containers that changed.
    fn adjust(
        &self,
        manager: &mut TaskManager,
        modified: &[TaskId],
    ) -> Result<Vec<TaskId>, ScheduleError>;
}

/// Fits each container to `[min(child.start), max(child.end)]`.
#[derive(Debug, Clone, Default)]
pub struct AdjustTaskBounds {
    verbosity: u8,
}

impl AdjustTaskBounds {
    pub fn new(verbosity: u8) -> Self {
        Self { verbosity }
    }

    /// Span of the direct children of `container`, `None` without children.
    fn children_span(
        manager: &TaskManager,
        container: TaskId,
    ) -> Option<(NaiveDate, NaiveDate)> {
        manager
            .children(container)
            .iter()
            .filter_map(|c| manager.task(*c))
            .fold(None, |acc, child| match acc {
                None => Some((child.start, child.end)),
                Some((lo, hi)) => Some((lo.min(child.start), hi.max(child.end))),
            })
    }
}

impl BoundsAdjuster for AdjustTaskBounds {
    fn adjust(
        &self,
        manager: &mut TaskManager,
        modified: &[TaskId],
    ) -> Result<Vec<TaskId>, ScheduleError> {
        let mut containers: FxHashSet<TaskId> = FxHashSet::default();
        for task in modified {
            let mut current = manager.parent(*task);
            while let Some(parent) = current {
                if !containers.insert(parent) {
                    break;
                }
                current = manager.parent(parent);
            }
        }

        let mut ordered: Vec<(usize, TaskId)> = containers
            .into_iter()
            .map(|id| (manager.depth(id), id))
            .collect();
        // Deepest first; ties by id keep runs deterministic.
        ordered.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));

        let mut changed = Vec::new();
        for (_, container) in ordered {
            let Some((start, end)) = Self::children_span(manager, container) else {
                continue;
            };
            let task = manager.get(container)?;
            if task.start == start && task.end == end {
                continue;
            }
            log_changes!(
                self.verbosity,
                "Fitting container {} to [{}..{})",
                task,
                start,
                end
            );
            let mut mutator = manager.create_mutator(container)?;
            mutator.set_start(start).set_end(end);
            if mutator.commit()? {
                changed.push(container);
            }
        }
        Ok(changed)
    }
}
