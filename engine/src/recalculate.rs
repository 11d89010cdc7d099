//! Distance-based recompute for a directly changed task.
//!
//! Dependencies reachable from the changed task are grouped by their
//! distance from it and resolved in increasing distance order, so every
//! dependant is resolved after the dependencies upstream of it. Each active
//! collision re-resolves its dependant against all of that task's incoming
//! dependencies. Containers above every moved task are re-fitted once per
//! outermost run.

use chrono::NaiveDate;
use rustc_hash::{FxHashMap, FxHashSet};
use std::cell::Cell;
use std::collections::{BTreeMap, VecDeque};

use crate::bounds::{AdjustTaskBounds, BoundsAdjuster};
use crate::config::RecalculateConfig;
use crate::error::{GraphError, ScheduleError};
use crate::interner::TaskId;
use crate::manager::TaskManager;
use crate::models::{Collision, DependencyId, Variation};
use crate::scheduler::{RunGuard, RunState};
use crate::{log_changes, log_checks, log_debug};

/// Dependencies grouped by distance from the changed tasks.
pub type DistanceMap = BTreeMap<usize, Vec<DependencyId>>;

/// Outcome of a recompute.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecalcReport {
    /// Tasks moved to satisfy their dependencies, in commit order
    pub modified: Vec<TaskId>,
    /// Containers re-fitted afterwards
    pub adjusted: Vec<TaskId>,
    /// Tasks whose constraints could not be satisfied; they kept their dates
    pub failures: Vec<ScheduleError>,
    /// True when the engine was disabled or already running
    pub skipped: bool,
}

impl RecalcReport {
    fn skipped() -> Self {
        Self {
            skipped: true,
            ..Self::default()
        }
    }
}

/// Start date satisfying every collision on one task.
///
/// The window runs from the latest start-later date (floor) to the earliest
/// start-earlier date (cap); with only one side present the window is that
/// single date. A fixed collision must fall inside the window and is then
/// the answer; otherwise the floor is. Without any start-earlier or
/// start-later collision the current start stands.
pub fn resolve_start(
    task: TaskId,
    current: NaiveDate,
    collisions: &[Collision],
) -> Result<NaiveDate, ScheduleError> {
    let mut fixed: Vec<NaiveDate> = Vec::new();
    let mut earlier: Vec<NaiveDate> = Vec::new();
    let mut later: Vec<NaiveDate> = Vec::new();
    for collision in collisions {
        match collision.variation {
            Variation::Fixed => fixed.push(collision.acceptable_start),
            Variation::StartEarlier => earlier.push(collision.acceptable_start),
            Variation::StartLater => later.push(collision.acceptable_start),
        }
    }
    if fixed.len() > 1 {
        return Err(ScheduleError::unsatisfiable(
            task,
            format!(
                "{} constraints allow no start variation ({:?})",
                fixed.len(),
                fixed
            ),
        ));
    }
    earlier.sort();
    later.sort();

    let window = match (earlier.first().copied(), later.last().copied()) {
        (None, None) => None,
        (Some(cap), None) => Some((cap, cap)),
        (None, Some(floor)) => Some((floor, floor)),
        (Some(cap), Some(floor)) => Some((floor, cap)),
    };
    let Some((floor, cap)) = window else {
        return Ok(current);
    };
    if floor > cap {
        return Err(ScheduleError::unsatisfiable(
            task,
            format!("must start by {} but not before {}", cap, floor),
        ));
    }
    match fixed.first() {
        Some(&date) if date < floor || date > cap => Err(ScheduleError::unsatisfiable(
            task,
            format!("fixed start {} is outside [{}, {}]", date, floor, cap),
        )),
        Some(&date) => Ok(date),
        None => Ok(floor),
    }
}

/// Distance of every dependency reachable from `sources`.
///
/// Dependencies leaving a source sit at distance 1, those leaving their
/// dependants at 2, and so on. A dependency reachable along several paths
/// keeps its longest distance. A distance beyond the number of
/// dependencies can only come from a cycle.
pub fn build_distance_map(
    manager: &TaskManager,
    sources: &[TaskId],
) -> Result<DistanceMap, GraphError> {
    let limit = manager.dependencies().count();
    let mut distances: FxHashMap<DependencyId, usize> = FxHashMap::default();
    let mut queue: VecDeque<(DependencyId, usize)> = sources
        .iter()
        .flat_map(move |s| manager.dependencies_as_dependee(*s))
        .map(|dep| (dep.id, 1))
        .collect();

    while let Some((id, distance)) = queue.pop_front() {
        if distances.get(&id).is_some_and(|known| *known >= distance) {
            continue;
        }
        let Some(dep) = manager.dependency(id) else {
            continue;
        };
        if distance > limit {
            return Err(GraphError::Cycle {
                tasks: vec![dep.dependee, dep.dependant],
            });
        }
        distances.insert(id, distance);
        for next in manager.dependencies_as_dependee(dep.dependant) {
            queue.push_back((next.id, distance + 1));
        }
    }

    let mut map = DistanceMap::new();
    for (id, distance) in distances {
        map.entry(distance).or_default().push(id);
    }
    for deps in map.values_mut() {
        deps.sort();
    }
    Ok(map)
}

/// Distance-based recompute engine.
pub struct RecalculateTaskSchedule {
    config: RecalculateConfig,
    enabled: Cell<bool>,
    state: Cell<RunState>,
    adjuster: Box<dyn BoundsAdjuster>,
}

impl Default for RecalculateTaskSchedule {
    fn default() -> Self {
        Self::new(RecalculateConfig::default())
    }
}

impl RecalculateTaskSchedule {
    pub fn new(config: RecalculateConfig) -> Self {
        Self {
            adjuster: Box::new(AdjustTaskBounds::new(config.verbosity)),
            enabled: Cell::new(config.enabled),
            config,
            state: Cell::new(RunState::Idle),
        }
    }

    pub fn with_adjuster(mut self, adjuster: Box<dyn BoundsAdjuster>) -> Self {
        self.adjuster = adjuster;
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

    /// Recompute after `changed` moved.
    pub fn run(
        &self,
        manager: &mut TaskManager,
        changed: TaskId,
    ) -> Result<RecalcReport, ScheduleError> {
        self.run_batch(manager, &[changed])
    }

    /// Recompute after several tasks moved, sharing one outer pass and one
    /// bounds adjustment.
    pub fn run_batch(
        &self,
        manager: &mut TaskManager,
        changed: &[TaskId],
    ) -> Result<RecalcReport, ScheduleError> {
        let Some(_outer) = self.enter() else {
            return Ok(RecalcReport::skipped());
        };
        // Unknown tasks and cycles fail the batch before anything moves.
        let mut batch = Vec::with_capacity(changed.len());
        for task in changed {
            manager.get(*task)?;
            batch.push((*task, build_distance_map(manager, &[*task])?));
        }

        let mut report = RecalcReport::default();
        let mut touched: Vec<TaskId> = Vec::new();
        for (task, distances) in &batch {
            let inner = RunGuard::enter(&self.state);
            log_debug!(
                self.config.verbosity,
                "Recompute from {} at depth {}",
                task,
                inner.depth()
            );
            self.fulfil(manager, distances, &mut report)?;
            touched.push(*task);
        }
        touched.extend(report.modified.iter().copied());
        report.adjusted = self.adjuster.adjust(manager, &touched)?;
        Ok(report)
    }

    /// Recompute the whole project from every task without incoming
    /// dependencies.
    pub fn run_all(&self, manager: &mut TaskManager) -> Result<RecalcReport, ScheduleError> {
        let Some(_outer) = self.enter() else {
            return Ok(RecalcReport::skipped());
        };
        let mut independent = Vec::new();
        let mut queue: VecDeque<TaskId> = manager.children(TaskId::ROOT).iter().copied().collect();
        while let Some(task) = queue.pop_front() {
            if manager.dependencies_as_dependant(task).next().is_none() {
                independent.push(task);
            }
            queue.extend(manager.children(task).iter().copied());
        }
        log_debug!(
            self.config.verbosity,
            "Recompute from {} independent tasks",
            independent.len()
        );

        let distances = build_distance_map(manager, &independent)?;
        let mut report = RecalcReport::default();
        self.fulfil(manager, &distances, &mut report)?;
        report.adjusted = self.adjuster.adjust(manager, &report.modified)?;
        Ok(report)
    }

    fn enter(&self) -> Option<RunGuard<'_>> {
        if !self.is_enabled() {
            log_checks!(self.config.verbosity, "Recompute disabled, skipping");
            return None;
        }
        let guard = RunGuard::try_enter(&self.state);
        if guard.is_none() {
            log_debug!(self.config.verbosity, "Recompute already running, skipping");
        }
        guard
    }

    /// Resolve every active dependency in increasing distance order.
    fn fulfil(
        &self,
        manager: &mut TaskManager,
        distances: &DistanceMap,
        report: &mut RecalcReport,
    ) -> Result<(), ScheduleError> {
        let verbosity = self.config.verbosity;
        let mut failed: FxHashSet<TaskId> = FxHashSet::default();
        for (distance, deps) in distances {
            log_debug!(verbosity, "Distance {}: {:?}", distance, deps);
            for id in deps {
                let Some(dep) = manager.dependency(*id).cloned() else {
                    continue;
                };
                if failed.contains(&dep.dependant) {
                    continue;
                }
                let collision = manager.collision(&dep, dep.dependant)?;
                if !collision.active {
                    continue;
                }
                log_checks!(
                    verbosity,
                    "Active collision {} -> {}: acceptable start {}",
                    dep.dependee,
                    dep.dependant,
                    collision.acceptable_start
                );
                match self.fulfil_constraints(manager, dep.dependant) {
                    Ok(true) => {
                        if !report.modified.contains(&dep.dependant) {
                            report.modified.push(dep.dependant);
                        }
                    }
                    Ok(false) => {}
                    Err(err @ ScheduleError::Unsatisfiable { .. }) => {
                        log::warn!(target: crate::logging::TARGET, "{}", err);
                        failed.insert(dep.dependant);
                        report.failures.push(err);
                    }
                    Err(err) => return Err(err),
                }
            }
        }
        Ok(())
    }

    /// Re-resolve `dependant` against all of its incoming dependencies.
    fn fulfil_constraints(
        &self,
        manager: &mut TaskManager,
        dependant: TaskId,
    ) -> Result<bool, ScheduleError> {
        let current = manager.get(dependant)?.start;
        let collisions = manager
            .dependencies_as_dependant(dependant)
            .map(|dep| manager.collision(dep, dependant))
            .collect::<Result<Vec<_>, _>>()?;
        if collisions.is_empty() {
            return Ok(false);
        }
        let solution = resolve_start(dependant, current, &collisions)?;
        let changed = manager.move_start(dependant, solution)?;
        if changed {
            let task = manager.get(dependant)?;
            log_changes!(
                self.config.verbosity,
                "Moved {}: start {} -> {}",
                task.name,
                current,
                task.start
            );
        }
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::TaskDuration;
    use crate::models::{ConstraintKind, Hardness};

    // 2025-01-06 is a Monday.
    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, day).unwrap()
    }

    fn later(day: u32) -> Collision {
        Collision::new(d(day), Variation::StartLater, true)
    }

    fn earlier(day: u32) -> Collision {
        Collision::new(d(day), Variation::StartEarlier, true)
    }

    fn fixed(day: u32) -> Collision {
        Collision::new(d(day), Variation::Fixed, true)
    }

    fn depend(m: &mut TaskManager, a: TaskId, b: TaskId) -> DependencyId {
        m.add_dependency(a, b, ConstraintKind::FinishStart, Hardness::Strong, 0)
            .unwrap()
    }

    #[test]
    fn test_two_fixed_starts_are_unsatisfiable() {
        let err = resolve_start(TaskId(1), d(1), &[fixed(5), fixed(7)]).unwrap_err();
        assert!(matches!(err, ScheduleError::Unsatisfiable { task: TaskId(1), .. }));
    }

    #[test]
    fn test_latest_start_later_wins() {
        let start = resolve_start(TaskId(1), d(1), &[later(5), later(3), earlier(8)]).unwrap();
        assert_eq!(start, d(5));
    }

    #[test]
    fn test_floor_after_cap_fails() {
        assert!(resolve_start(TaskId(1), d(1), &[later(9), earlier(8)]).is_err());
    }

    #[test]
    fn test_fixed_must_lie_in_window() {
        let collisions = [later(5), earlier(8), fixed(6)];
        assert_eq!(resolve_start(TaskId(1), d(1), &collisions).unwrap(), d(6));

        let collisions = [later(5), earlier(8), fixed(9)];
        assert!(resolve_start(TaskId(1), d(1), &collisions).is_err());
    }

    #[test]
    fn test_single_sided_windows() {
        assert_eq!(
            resolve_start(TaskId(1), d(1), &[earlier(10), earlier(8)]).unwrap(),
            d(8)
        );
        assert_eq!(resolve_start(TaskId(1), d(2), &[]).unwrap(), d(2));
    }

    #[test]
    fn test_fixed_without_window_keeps_current_start() {
        assert_eq!(resolve_start(TaskId(1), d(2), &[fixed(7)]).unwrap(), d(2));
        // Two fixed starts fail even without a window.
        assert!(resolve_start(TaskId(1), d(2), &[fixed(7), fixed(8)]).is_err());
    }

    #[test]
    fn test_distance_map_uses_longest_path() {
        let mut m = TaskManager::default();
        let a = m.add_task("a", d(6), TaskDuration::days(1)).unwrap();
        let b = m.add_task("b", d(6), TaskDuration::days(1)).unwrap();
        let c = m.add_task("c", d(6), TaskDuration::days(1)).unwrap();
        let e = m.add_task("e", d(6), TaskDuration::days(1)).unwrap();
        let ab = depend(&mut m, a, b);
        let bc = depend(&mut m, b, c);
        let ac = depend(&mut m, a, c);
        let ce = depend(&mut m, c, e);

        let map = build_distance_map(&m, &[a]).unwrap();
        let flat: Vec<(usize, DependencyId)> = map
            .iter()
            .flat_map(|(dist, deps)| deps.iter().map(move |dep| (*dist, *dep)))
            .collect();
        // c -> e is reached both at distance 2 (via a -> c) and 3 (via b).
        assert_eq!(flat, vec![(1, ab), (1, ac), (2, bc), (3, ce)]);
    }

    #[test]
    fn test_distance_map_reports_cycle() {
        let mut m = TaskManager::default();
        let a = m.add_task("a", d(6), TaskDuration::days(1)).unwrap();
        let b = m.add_task("b", d(6), TaskDuration::days(1)).unwrap();
        depend(&mut m, a, b);
        depend(&mut m, b, a);
        assert!(matches!(
            build_distance_map(&m, &[a]),
            Err(GraphError::Cycle { .. })
        ));
    }

    #[test]
    fn test_change_propagates_along_chain() {
        let mut m = TaskManager::default();
        let a = m.add_task("a", d(6), TaskDuration::days(1)).unwrap();
        let b = m.add_task("b", d(7), TaskDuration::days(1)).unwrap();
        let c = m.add_task("c", d(8), TaskDuration::days(1)).unwrap();
        depend(&mut m, a, b);
        depend(&mut m, b, c);

        let mut shift = m.create_shift_mutator(a).unwrap();
        shift.shift(TaskDuration::days(2));
        shift.commit().unwrap();

        let report = RecalculateTaskSchedule::default().run(&mut m, a).unwrap();
        assert_eq!(report.modified, vec![b, c]);
        assert!(report.failures.is_empty());
        assert_eq!(m.task(b).unwrap().start, d(9));
        assert_eq!(m.task(c).unwrap().start, d(10));
    }

    #[test]
    fn test_strong_dependency_pulls_dependant_back() {
        let mut m = TaskManager::default();
        let a = m.add_task("a", d(6), TaskDuration::days(1)).unwrap();
        let b = m.add_task("b", d(9), TaskDuration::days(1)).unwrap();
        depend(&mut m, a, b);

        RecalculateTaskSchedule::default().run(&mut m, a).unwrap();
        assert_eq!(m.task(b).unwrap().start, d(7));
    }

    #[test]
    fn test_batch_adjusts_containers_once() {
        let mut m = TaskManager::default();
        let a = m.add_task("a", d(6), TaskDuration::days(3)).unwrap();
        let x = m.add_task("x", d(6), TaskDuration::days(1)).unwrap();
        let p = m.add_task("p", d(6), TaskDuration::days(1)).unwrap();
        let c = m.add_task("c", d(6), TaskDuration::days(1)).unwrap();
        let y = m.add_task("y", d(6), TaskDuration::days(1)).unwrap();
        m.set_parent(c, p).unwrap();
        depend(&mut m, a, c);
        depend(&mut m, x, y);

        let engine = RecalculateTaskSchedule::default();
        let report = engine.run_batch(&mut m, &[a, x]).unwrap();
        assert_eq!(report.modified, vec![c, y]);
        assert_eq!(report.adjusted, vec![p]);
        assert_eq!(m.task(c).unwrap().start, d(9));
        assert_eq!(m.task(p).unwrap().start, d(9));
        assert!(!engine.is_running());
    }

    #[test]
    fn test_batch_with_cycle_moves_nothing() {
        let mut m = TaskManager::default();
        let a = m.add_task("a", d(6), TaskDuration::days(3)).unwrap();
        let p = m.add_task("p", d(6), TaskDuration::days(1)).unwrap();
        let c = m.add_task("c", d(6), TaskDuration::days(1)).unwrap();
        let x = m.add_task("x", d(6), TaskDuration::days(1)).unwrap();
        let y = m.add_task("y", d(6), TaskDuration::days(1)).unwrap();
        m.set_parent(c, p).unwrap();
        depend(&mut m, a, c);
        depend(&mut m, x, y);
        depend(&mut m, y, x);

        let engine = RecalculateTaskSchedule::default();
        let err = engine.run_batch(&mut m, &[a, x]).unwrap_err();
        assert!(err.is_configuration());
        assert_eq!(m.task(c).unwrap().start, d(6));
        assert_eq!(m.task(p).unwrap().start, d(6));
        assert!(!engine.is_running());
    }

    #[test]
    fn test_run_all_starts_from_independent_tasks() {
        let mut m = TaskManager::default();
        let a = m.add_task("a", d(6), TaskDuration::days(2)).unwrap();
        let b = m.add_task("b", d(6), TaskDuration::days(1)).unwrap();
        let c = m.add_task("c", d(6), TaskDuration::days(1)).unwrap();
        depend(&mut m, a, b);
        depend(&mut m, b, c);

        let report = RecalculateTaskSchedule::default().run_all(&mut m).unwrap();
        assert_eq!(report.modified, vec![b, c]);
        assert_eq!(m.task(c).unwrap().start, d(9));
    }

    #[test]
    fn test_shared_dependant_takes_latest_dependency() {
        let mut m = TaskManager::default();
        let a = m.add_task("a", d(6), TaskDuration::days(1)).unwrap();
        let b = m.add_task("b", d(6), TaskDuration::days(3)).unwrap();
        let t = m.add_task("t", d(13), TaskDuration::days(1)).unwrap();
        let u = m.add_task("u", d(6), TaskDuration::days(1)).unwrap();
        // Both dependencies are start-later collisions; the later one wins
        // even though only a changed.
        depend(&mut m, a, t);
        depend(&mut m, b, t);
        depend(&mut m, a, u);

        let report = RecalculateTaskSchedule::default().run(&mut m, a).unwrap();
        assert!(report.failures.is_empty());
        assert_eq!(m.task(t).unwrap().start, d(9));
        assert_eq!(m.task(u).unwrap().start, d(7));
    }

    #[test]
    fn test_disabled_engine_skips() {
        let mut m = TaskManager::default();
        let a = m.add_task("a", d(6), TaskDuration::days(1)).unwrap();
        let b = m.add_task("b", d(6), TaskDuration::days(1)).unwrap();
        depend(&mut m, a, b);

        let engine = RecalculateTaskSchedule::new(RecalculateConfig {
            enabled: false,
            ..RecalculateConfig::default()
        });
        assert!(engine.run(&mut m, a).unwrap().skipped);
        assert_eq!(m.task(b).unwrap().start, d(6));
    }

    #[test]
    fn test_unknown_task_is_an_error() {
        let mut m = TaskManager::default();
        let err = RecalculateTaskSchedule::default()
            .run(&mut m, TaskId(42))
            .unwrap_err();
        assert_eq!(err, ScheduleError::TaskNotFound(TaskId(42)));
    }
}
