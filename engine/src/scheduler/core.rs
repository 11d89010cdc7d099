//! Layered scheduler implementation.

use chrono::NaiveDate;
use std::cell::Cell;
use std::rc::Rc;

use crate::calendar::{DayType, MoveDirection, TimeUnit, WorkingCalendar};
use crate::config::SchedulerConfig;
use crate::error::ScheduleError;
use crate::graph::{DependencyEdge, DependencyGraph, NodeIndex};
use crate::interner::TaskId;
use crate::manager::{TaskEvent, TaskListener, TaskManager};
use crate::models::Task;
use crate::range::DateRange;
use crate::{log_changes, log_checks, log_debug};

use super::diagnostic::Diagnostic;
use super::state::{RunGuard, RunState};

/// Outcome of one scheduler run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunReport {
    /// Number of graph layers walked
    pub layers: usize,
    /// Tasks whose dates changed, in commit order
    pub modified: Vec<TaskId>,
    /// Per-node failures; the walk continued past each of them
    pub errors: Vec<ScheduleError>,
    /// True when the run did nothing because the scheduler was disabled or
    /// already running
    pub skipped: bool,
}

impl RunReport {
    fn skipped() -> Self {
        Self {
            skipped: true,
            ..Self::default()
        }
    }

    /// True when the run changed no task.
    pub fn is_noop(&self) -> bool {
        self.modified.is_empty()
    }
}

/// Start and end ranges computed for one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct NodeRanges {
    start: DateRange,
    end: DateRange,
}

/// What one refreshed incoming edge contributes to its node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Contribution {
    start: DateRange,
    end: DateRange,
    weak: bool,
    /// Child `(start, end)` for containment edges
    boundaries: Option<(NaiveDate, NaiveDate)>,
}

impl From<&DependencyEdge> for Contribution {
    fn from(edge: &DependencyEdge) -> Self {
        Self {
            start: edge.start_range(),
            end: edge.end_range(),
            weak: edge.is_weak(),
            boundaries: edge.boundaries(),
        }
    }
}

/// Strong and weak accumulators over a node's incoming edges.
#[derive(Debug, Clone, PartialEq, Eq)]
struct EdgeFold {
    start: DateRange,
    weak_start: DateRange,
    end: DateRange,
    weak_end: DateRange,
    subtask_boundaries: Vec<NaiveDate>,
}

impl Default for EdgeFold {
    fn default() -> Self {
        Self {
            start: DateRange::all(),
            weak_start: DateRange::all(),
            end: DateRange::all(),
            weak_end: DateRange::all(),
            subtask_boundaries: Vec::new(),
        }
    }
}

impl EdgeFold {
    /// Fold one contribution. Returns false once a strong range is empty;
    /// no later edge can widen it again.
    fn add(&mut self, contribution: Contribution) -> bool {
        if let Some((child_start, child_end)) = contribution.boundaries {
            self.subtask_boundaries.push(child_start);
            self.subtask_boundaries.push(child_end);
        } else if contribution.weak {
            self.weak_start = self.weak_start.intersection(&contribution.start);
            self.weak_end = self.weak_end.intersection(&contribution.end);
        } else {
            self.start = self.start.intersection(&contribution.start);
            self.end = self.end.intersection(&contribution.end);
        }
        !(self.start.is_empty() || self.end.is_empty())
    }
}

/// Walks the dependency graph layer by layer and moves every task into the
/// range its incoming edges allow.
pub struct Scheduler {
    config: SchedulerConfig,
    enabled: Cell<bool>,
    state: Cell<RunState>,
    diagnostic: Option<Rc<dyn Diagnostic>>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(SchedulerConfig::default())
    }
}

impl Scheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            enabled: Cell::new(config.enabled),
            config,
            state: Cell::new(RunState::Idle),
            diagnostic: None,
        }
    }

    pub fn with_diagnostic(mut self, diagnostic: Rc<dyn Diagnostic>) -> Self {
        self.diagnostic = Some(diagnostic);
        self
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.set(enabled);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.get()
    }

    pub fn is_running(&self) -> bool {
        self.state.get().is_running()
    }

    /// Schedule every task.
    ///
    /// A cycle fails the whole run before anything is committed. Failures of
    /// single nodes are reported and the walk goes on. Calls made while a
    /// run is in progress return a skipped report.
    pub fn run(&self, manager: &mut TaskManager) -> Result<RunReport, ScheduleError> {
        let verbosity = self.config.verbosity;
        if !self.is_enabled() {
            log_checks!(verbosity, "Scheduler disabled, skipping run");
            return Ok(RunReport::skipped());
        }
        let Some(_guard) = RunGuard::try_enter(&self.state) else {
            log_debug!(verbosity, "Scheduler already running, skipping nested run");
            return Ok(RunReport::skipped());
        };

        let mut graph = DependencyGraph::build(manager, verbosity);
        let layers = graph.check_layer_validity()?;
        let mut report = RunReport {
            layers,
            ..RunReport::default()
        };

        for i in 0..layers {
            let nodes = graph.layer(i).to_vec();
            for node in nodes {
                let task = graph.node(node).task;
                match self.schedule_node(&mut graph, node, manager) {
                    Ok(true) => report.modified.push(task),
                    Ok(false) => {}
                    Err(err) => {
                        self.report_error(&err);
                        report.errors.push(err);
                    }
                }
            }
        }

        log_changes!(
            verbosity,
            "Scheduler run: {} layers, {} tasks modified, {} errors",
            report.layers,
            report.modified.len(),
            report.errors.len()
        );
        Ok(report)
    }

    fn report_error(&self, err: &ScheduleError) {
        match &self.diagnostic {
            Some(diagnostic) => diagnostic.log_error(err),
            None => log::error!(target: crate::logging::TARGET, "{}", err),
        }
    }

    /// Compute and commit the dates of one node. Returns whether it changed.
    fn schedule_node(
        &self,
        graph: &mut DependencyGraph,
        node: NodeIndex,
        manager: &mut TaskManager,
    ) -> Result<bool, ScheduleError> {
        let verbosity = self.config.verbosity;
        let task = manager.get(graph.node(node).task)?.clone();
        log_checks!(verbosity, "Scheduling {}", task);

        let ranges = self.calculate_ranges(graph, node, manager, &task)?;
        log_checks!(
            verbosity,
            "  final ranges: start={} end={}",
            ranges.start,
            ranges.end
        );

        let container = manager.has_nested_tasks(task.id);
        let calendar = manager.calendar();
        let unit = task.time_unit();

        let mut new_start = ranges.start.lower_endpoint();
        if !container {
            // A leaf never starts on a non-working day.
            new_start = new_start.map(|s| calendar.working_on_or_after(s, unit));
        }
        let new_start = new_start.filter(|s| *s != task.start);

        let effective_start = new_start.unwrap_or(task.start);
        let new_end = ranges
            .end
            .upper_endpoint()
            .map(|e| self.adjust_end(calendar, unit, e, effective_start))
            .filter(|e| *e != task.end);

        if new_start.is_none() && new_end.is_none() {
            return Ok(false);
        }
        if let Some(end) = new_end {
            if end < effective_start {
                return Err(ScheduleError::InvalidDates {
                    task: task.id,
                    start: effective_start,
                    end,
                });
            }
        }

        if let Some(diagnostic) = &self.diagnostic {
            diagnostic.add_modified_task(task.id, new_start, new_end);
        }
        log_changes!(
            verbosity,
            "  {}: start {} -> {}, end {} -> {}",
            task.name,
            task.start,
            effective_start,
            task.end,
            new_end.unwrap_or(task.end)
        );
        self.commit(manager, &task, container, new_start, new_end)
    }

    /// Fold the incoming edges of `node` into a start and an end range.
    fn calculate_ranges(
        &self,
        graph: &mut DependencyGraph,
        node: NodeIndex,
        manager: &TaskManager,
        task: &Task,
    ) -> Result<NodeRanges, ScheduleError> {
        let verbosity = self.config.verbosity;
        let mut fold = EdgeFold::default();
        let incoming = graph.node(node).incoming.clone();
        for idx in incoming {
            let edge = graph.edge_mut(idx);
            if !edge.refresh(manager) {
                log_checks!(verbosity, "  skipping edge {}", edge);
                continue;
            }
            if !fold.add(Contribution::from(&*edge)) {
                log_checks!(verbosity, "  empty range after edge {}", edge);
                break;
            }
        }
        log_checks!(
            verbosity,
            "  ranges: start={} end={} weak start={} weak end={}",
            fold.start,
            fold.end,
            fold.weak_start,
            fold.weak_end
        );
        let EdgeFold {
            start: start_range,
            weak_start: weak_start_range,
            end: end_range,
            weak_end: weak_end_range,
            subtask_boundaries,
        } = fold;

        let subtasks_span = DateRange::enclose_all(subtask_boundaries.iter().copied())
            .unwrap_or(DateRange::closed(task.start, task.end));
        let subtree_start_upwards = subtasks_span.span(&DateRange::at_least(task.start));
        let subtree_end_downwards = subtasks_span.span(&DateRange::at_most(task.end));

        let mut start_range = combine(start_range, weak_start_range, subtree_start_upwards);
        let mut end_range = combine(end_range, weak_end_range, subtree_end_downwards);

        if let Some(anchor) = task.earliest_begin() {
            start_range = start_range.intersection(&DateRange::at_least(anchor));
            log_checks!(
                verbosity,
                "  earliest begin {}: start range {}",
                anchor,
                start_range
            );
        }
        if !subtask_boundaries.is_empty() {
            start_range = start_range.intersection(&subtasks_span);
            end_range = end_range.intersection(&subtasks_span);
        }

        if start_range.is_empty() {
            return Err(ScheduleError::unsatisfiable(
                task.id,
                format!("no start date satisfies all constraints ({})", start_range),
            ));
        }
        if end_range.is_empty() {
            return Err(ScheduleError::unsatisfiable(
                task.id,
                format!("no end date satisfies all constraints ({})", end_range),
            ));
        }
        Ok(NodeRanges {
            start: start_range,
            end: end_range,
        })
    }

    /// Pull an end that falls on the first working unit after a non-working
    /// block back to the start of that block.
    fn adjust_end(
        &self,
        calendar: &dyn WorkingCalendar,
        unit: TimeUnit,
        end: NaiveDate,
        start: NaiveDate,
    ) -> NaiveDate {
        if !calendar.is_working(end) {
            return end;
        }
        let Some(working) =
            calendar.find_closest(end, unit, MoveDirection::Backward, DayType::Working, None)
        else {
            return end;
        };
        let Some(non_working) = calendar.find_closest(
            end,
            unit,
            MoveDirection::Backward,
            DayType::NonWorking,
            Some(working),
        ) else {
            return end;
        };
        if working < non_working {
            let period_start = unit.adjust_right(working);
            if period_start > start {
                log_checks!(
                    self.config.verbosity,
                    "  end {} follows non-working days, moved to {}",
                    end,
                    period_start
                );
                return period_start;
            }
        }
        end
    }

    /// Write the new dates.
    ///
    /// Containers take their dates directly. Leaves are shifted so their
    /// duration is preserved.
    fn commit(
        &self,
        manager: &mut TaskManager,
        task: &Task,
        container: bool,
        new_start: Option<NaiveDate>,
        new_end: Option<NaiveDate>,
    ) -> Result<bool, ScheduleError> {
        if container {
            let mut mutator = manager.create_mutator(task.id)?;
            if let Some(start) = new_start {
                mutator.set_start(start);
            }
            if let Some(end) = new_end {
                mutator.set_end(end);
            }
            return mutator.commit();
        }

        let mut changed = false;
        if let Some(start) = new_start {
            changed |= manager.move_start(task.id, start)?;
        }
        if let Some(end) = new_end {
            let mut mutator = manager.create_mutator(task.id)?;
            mutator.set_end(end);
            changed |= mutator.commit()?;
        }
        Ok(changed)
    }
}

/// Strong bounds win. Weak bounds apply on their own only where nothing
/// strong exists, and then never past the task's current subtree extent.
fn combine(strong: DateRange, weak: DateRange, subtree: DateRange) -> DateRange {
    if !strong.is_all() {
        strong.intersection(&weak)
    } else if !weak.is_all() {
        weak.intersection(&subtree)
    } else {
        strong
    }
}

impl TaskListener for Scheduler {
    fn task_changed(&self, manager: &mut TaskManager, event: &TaskEvent) {
        log_debug!(self.config.verbosity, "Scheduler notified: {:?}", event);
        if let Err(err) = self.run(manager) {
            self.report_error(&err);
        }
    }
}
