//! Task manager: the owner of tasks, dependencies and the containment
//! hierarchy.
//!
//! The engines never touch task fields directly. They read through the
//! query methods and write through `TaskMutator`/`ShiftMutator`, whose
//! `commit` applies every pending field at once and notifies listeners.

use chrono::NaiveDate;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::calendar::{DayType, MoveDirection, TaskDuration, WeekendCalendar, WorkingCalendar};
use crate::error::ScheduleError;
use crate::interner::{TaskId, TaskKeyInterner};
use crate::models::{
    Collision, ConstraintKind, DependencyId, Hardness, Task, TaskDependency, ThirdDateConstraint,
};

/// Change notification emitted by the manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskEvent {
    /// A commit changed a task's start and/or end.
    DatesChanged {
        task: TaskId,
        old_start: NaiveDate,
        old_end: NaiveDate,
        new_start: NaiveDate,
        new_end: NaiveDate,
    },
    /// Dependencies or hierarchy changed.
    GraphChanged,
}

/// Observer of task changes.
///
/// Listeners receive the manager itself, so they may react by committing
/// further changes (which is how nested scheduling requests arise).
pub trait TaskListener {
    fn task_changed(&self, manager: &mut TaskManager, event: &TaskEvent);
}

/// Arena of tasks and dependencies with a containment hierarchy.
pub struct TaskManager {
    /// Slot 0 is the hierarchy root and never holds a task.
    tasks: Vec<Option<Task>>,
    parents: Vec<TaskId>,
    children: Vec<Vec<TaskId>>,
    outgoing: Vec<Vec<DependencyId>>,
    incoming: Vec<Vec<DependencyId>>,
    dependencies: Vec<Option<TaskDependency>>,
    keys: TaskKeyInterner,
    calendar: Box<dyn WorkingCalendar>,
    listeners: Vec<Rc<dyn TaskListener>>,
}

impl Default for TaskManager {
    fn default() -> Self {
        Self::new(WeekendCalendar::default())
    }
}

impl TaskManager {
    pub fn new(calendar: impl WorkingCalendar + 'static) -> Self {
        Self {
            tasks: vec![None],
            parents: vec![TaskId::ROOT],
            children: vec![Vec::new()],
            outgoing: vec![Vec::new()],
            incoming: vec![Vec::new()],
            dependencies: Vec::new(),
            keys: TaskKeyInterner::default(),
            calendar: Box::new(calendar),
            listeners: Vec::new(),
        }
    }

    pub fn calendar(&self) -> &dyn WorkingCalendar {
        self.calendar.as_ref()
    }

    // ------------------------------------------------------------------
    // Tasks
    // ------------------------------------------------------------------

    /// Add a top-level task; its end is derived from start and duration.
    pub fn add_task(
        &mut self,
        name: &str,
        start: NaiveDate,
        duration: TaskDuration,
    ) -> Result<TaskId, ScheduleError> {
        let end = self.calendar.shift(start, duration);
        self.insert_task(name, start, end, duration, false)
    }

    /// Add a zero-length top-level task.
    pub fn add_milestone(&mut self, name: &str, date: NaiveDate) -> Result<TaskId, ScheduleError> {
        self.insert_task(name, date, date, TaskDuration::days(0), true)
    }

    fn insert_task(
        &mut self,
        name: &str,
        start: NaiveDate,
        end: NaiveDate,
        duration: TaskDuration,
        milestone: bool,
    ) -> Result<TaskId, ScheduleError> {
        let id = TaskId(next_id(self.tasks.len(), "tasks")?);
        if !self.keys.bind(name, id) {
            return Err(ScheduleError::DuplicateTask(name.to_string()));
        }
        self.tasks.push(Some(Task {
            id,
            name: name.to_string(),
            start,
            end,
            duration,
            milestone,
            third_date_constraint: None,
            third_date: None,
        }));
        self.parents.push(TaskId::ROOT);
        self.children.push(Vec::new());
        self.outgoing.push(Vec::new());
        self.incoming.push(Vec::new());
        self.children[TaskId::ROOT.index()].push(id);
        Ok(id)
    }

    pub fn task(&self, id: TaskId) -> Option<&Task> {
        self.tasks.get(id.index()).and_then(|t| t.as_ref())
    }

    /// Like `task`, but a missing task is an error.
    pub fn get(&self, id: TaskId) -> Result<&Task, ScheduleError> {
        self.task(id).ok_or(ScheduleError::TaskNotFound(id))
    }

    pub fn contains(&self, id: TaskId) -> bool {
        self.task(id).is_some()
    }

    pub fn lookup(&self, name: &str) -> Option<TaskId> {
        self.keys.get(name)
    }

    /// Live tasks in creation order.
    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter().filter_map(|t| t.as_ref())
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Remove a task with its whole subtree and every dependency touching it.
    pub fn remove_task(&mut self, id: TaskId) -> Result<(), ScheduleError> {
        self.get(id)?;
        let mut doomed = self.descendants(id);
        doomed.push(id);

        let parent = self.parents[id.index()];
        self.children[parent.index()].retain(|c| *c != id);

        for task in doomed {
            let touching: Vec<DependencyId> = self.outgoing[task.index()]
                .iter()
                .chain(self.incoming[task.index()].iter())
                .copied()
                .collect();
            for dep in touching {
                self.detach_dependency(dep);
            }
            self.tasks[task.index()] = None;
            self.children[task.index()].clear();
            self.keys.unbind(task);
        }
        self.notify(TaskEvent::GraphChanged);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Hierarchy
    // ------------------------------------------------------------------

    /// Move `child` under `parent` (`TaskId::ROOT` makes it top-level).
    pub fn set_parent(&mut self, child: TaskId, parent: TaskId) -> Result<(), ScheduleError> {
        self.get(child)?;
        if parent != TaskId::ROOT {
            self.get(parent)?;
        }
        if child == parent || self.is_ancestor(child, parent) {
            return Err(ScheduleError::InvalidHierarchy {
                task: child,
                parent,
                reason: "a task cannot contain itself".to_string(),
            });
        }
        let old_parent = self.parents[child.index()];
        self.children[old_parent.index()].retain(|c| *c != child);
        self.children[parent.index()].push(child);
        self.parents[child.index()] = parent;
        self.notify(TaskEvent::GraphChanged);
        Ok(())
    }

    /// Containing task, `None` for top-level tasks.
    pub fn parent(&self, id: TaskId) -> Option<TaskId> {
        match self.parents.get(id.index()) {
            Some(p) if *p != TaskId::ROOT && self.contains(id) => Some(*p),
            _ => None,
        }
    }

    /// Direct children; `children(TaskId::ROOT)` lists top-level tasks.
    pub fn children(&self, id: TaskId) -> &[TaskId] {
        self.children
            .get(id.index())
            .map(|c| c.as_slice())
            .unwrap_or(&[])
    }

    pub fn has_nested_tasks(&self, id: TaskId) -> bool {
        !self.children(id).is_empty()
    }

    /// True when `ancestor` strictly contains `task`.
    pub fn is_ancestor(&self, ancestor: TaskId, task: TaskId) -> bool {
        let mut current = self.parent(task);
        while let Some(p) = current {
            if p == ancestor {
                return true;
            }
            current = self.parent(p);
        }
        ancestor == TaskId::ROOT && task != TaskId::ROOT && self.contains(task)
    }

    /// All tasks below `id`, parents before children.
    pub fn descendants(&self, id: TaskId) -> Vec<TaskId> {
        let mut result = Vec::new();
        let mut queue: VecDeque<TaskId> = self.children(id).iter().copied().collect();
        while let Some(next) = queue.pop_front() {
            result.push(next);
            queue.extend(self.children(next).iter().copied());
        }
        result
    }

    /// Nesting level: top-level tasks have depth 1.
    pub fn depth(&self, id: TaskId) -> usize {
        let mut depth = 0;
        let mut current = Some(id);
        while let Some(task) = current {
            depth += 1;
            current = self.parent(task);
        }
        depth
    }

    // ------------------------------------------------------------------
    // Dependencies
    // ------------------------------------------------------------------

    pub fn add_dependency(
        &mut self,
        dependee: TaskId,
        dependant: TaskId,
        kind: ConstraintKind,
        hardness: Hardness,
        lag_days: i64,
    ) -> Result<DependencyId, ScheduleError> {
        let invalid = |reason: &str| ScheduleError::InvalidDependency {
            dependee,
            dependant,
            reason: reason.to_string(),
        };
        self.get(dependee)?;
        self.get(dependant)?;
        if dependee == dependant {
            return Err(invalid("a task cannot depend on itself"));
        }
        if self.is_ancestor(dependee, dependant) || self.is_ancestor(dependant, dependee) {
            return Err(invalid("tasks are in the same containment branch"));
        }
        if self
            .dependencies_as_dependant(dependant)
            .any(|d| d.dependee == dependee)
        {
            return Err(invalid("dependency already exists"));
        }

        let id = DependencyId(next_id(self.dependencies.len(), "dependencies")?);
        self.dependencies.push(Some(TaskDependency {
            id,
            dependee,
            dependant,
            kind,
            hardness,
            lag_days,
        }));
        self.outgoing[dependee.index()].push(id);
        self.incoming[dependant.index()].push(id);
        self.notify(TaskEvent::GraphChanged);
        Ok(id)
    }

    pub fn remove_dependency(&mut self, id: DependencyId) -> Result<(), ScheduleError> {
        if self.dependency(id).is_none() {
            return Err(ScheduleError::InvalidDependency {
                dependee: TaskId::ROOT,
                dependant: TaskId::ROOT,
                reason: format!("no dependency with id {}", id.0),
            });
        }
        self.detach_dependency(id);
        self.notify(TaskEvent::GraphChanged);
        Ok(())
    }

    fn detach_dependency(&mut self, id: DependencyId) {
        if let Some(dep) = self.dependencies.get_mut(id.index()).and_then(|d| d.take()) {
            self.outgoing[dep.dependee.index()].retain(|d| *d != id);
            self.incoming[dep.dependant.index()].retain(|d| *d != id);
        }
    }

    pub fn dependency(&self, id: DependencyId) -> Option<&TaskDependency> {
        self.dependencies.get(id.index()).and_then(|d| d.as_ref())
    }

    pub fn dependencies(&self) -> impl Iterator<Item = &TaskDependency> {
        self.dependencies.iter().filter_map(|d| d.as_ref())
    }

    /// Dependencies where `task` is the dependee (outgoing edges).
    pub fn dependencies_as_dependee(&self, task: TaskId) -> impl Iterator<Item = &TaskDependency> {
        self.outgoing
            .get(task.index())
            .into_iter()
            .flatten()
            .filter_map(|id| self.dependency(*id))
    }

    /// Dependencies where `task` is the dependant (incoming edges).
    pub fn dependencies_as_dependant(&self, task: TaskId) -> impl Iterator<Item = &TaskDependency> {
        self.incoming
            .get(task.index())
            .into_iter()
            .flatten()
            .filter_map(|id| self.dependency(*id))
    }

    /// Evaluate `dep` against current dates with `dependant` as the
    /// constrained task.
    pub fn collision(
        &self,
        dep: &TaskDependency,
        dependant: TaskId,
    ) -> Result<Collision, ScheduleError> {
        let dependee = self.get(dep.dependee)?;
        let dependant = self.get(dependant)?;
        Ok(dep.collision(dependee, dependant, self.calendar()))
    }

    // ------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------

    pub fn create_mutator(&mut self, task: TaskId) -> Result<TaskMutator<'_>, ScheduleError> {
        self.get(task)?;
        Ok(TaskMutator {
            manager: self,
            task,
            start: None,
            end: None,
            duration: None,
            third_date: None,
        })
    }

    pub fn create_shift_mutator(&mut self, task: TaskId) -> Result<ShiftMutator<'_>, ScheduleError> {
        let unit = self.get(task)?.time_unit();
        Ok(ShiftMutator {
            manager: self,
            task,
            shift: TaskDuration { length: 0, unit },
        })
    }

    /// Move a task so it starts at `start`.
    ///
    /// A container takes the start directly and keeps its end. A leaf is
    /// shifted by the working time between its old and new start, keeping
    /// its duration; a non-working target moves on to the next working day.
    pub fn move_start(&mut self, id: TaskId, start: NaiveDate) -> Result<bool, ScheduleError> {
        let task = self.get(id)?;
        if self.has_nested_tasks(id) {
            let mut mutator = self.create_mutator(id)?;
            mutator.set_start(start);
            return mutator.commit();
        }

        let unit = task.time_unit();
        let duration = task.duration;
        let target = self.calendar.working_on_or_after(start, unit);
        if target == task.start {
            return Ok(false);
        }
        let delta = self.calendar.create_length(unit, task.start, target);
        if delta.is_zero() {
            // Less than one unit apart, or moving off a non-working start.
            let mut mutator = self.create_mutator(id)?;
            mutator.set_start(target).set_duration(duration);
            return mutator.commit();
        }
        let mut mutator = self.create_shift_mutator(id)?;
        mutator.shift(delta);
        mutator.commit()
    }

    pub fn add_listener(&mut self, listener: Rc<dyn TaskListener>) {
        self.listeners.push(listener);
    }

    fn notify(&mut self, event: TaskEvent) {
        let listeners = self.listeners.clone();
        for listener in listeners {
            listener.task_changed(self, &event);
        }
    }

    /// Apply new field values at once. Returns whether anything changed.
    fn apply(
        &mut self,
        id: TaskId,
        start: NaiveDate,
        end: NaiveDate,
        duration: TaskDuration,
        third_date: Option<(Option<ThirdDateConstraint>, Option<NaiveDate>)>,
    ) -> Result<bool, ScheduleError> {
        if end < start {
            return Err(ScheduleError::InvalidDates {
                task: id,
                start,
                end,
            });
        }
        let task = self
            .tasks
            .get_mut(id.index())
            .and_then(|t| t.as_mut())
            .ok_or(ScheduleError::TaskNotFound(id))?;

        let (old_start, old_end) = (task.start, task.end);
        let dates_changed = old_start != start || old_end != end;
        let mut changed = dates_changed || task.duration != duration;
        task.start = start;
        task.end = end;
        task.duration = duration;
        if let Some((constraint, date)) = third_date {
            changed |= task.third_date_constraint != constraint || task.third_date != date;
            task.third_date_constraint = constraint;
            task.third_date = date;
        }

        if dates_changed {
            self.notify(TaskEvent::DatesChanged {
                task: id,
                old_start,
                old_end,
                new_start: start,
                new_end: end,
            });
        }
        Ok(changed)
    }
}

/// Scoped, commit-on-demand edit of one task.
pub struct TaskMutator<'a> {
    manager: &'a mut TaskManager,
    task: TaskId,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    duration: Option<TaskDuration>,
    third_date: Option<(Option<ThirdDateConstraint>, Option<NaiveDate>)>,
}

impl TaskMutator<'_> {
    pub fn set_start(&mut self, start: NaiveDate) -> &mut Self {
        self.start = Some(start);
        self
    }

    pub fn set_end(&mut self, end: NaiveDate) -> &mut Self {
        self.end = Some(end);
        self
    }

    /// A new duration re-derives the end from the (new) start.
    pub fn set_duration(&mut self, duration: TaskDuration) -> &mut Self {
        self.duration = Some(duration);
        self
    }

    pub fn set_third_date(
        &mut self,
        constraint: Option<ThirdDateConstraint>,
        date: Option<NaiveDate>,
    ) -> &mut Self {
        self.third_date = Some((constraint, date));
        self
    }

    /// Apply all pending changes. Returns whether the task changed.
    ///
    /// Setting only the start keeps the end, so the duration absorbs the
    /// difference. Milestones always end where they start.
    pub fn commit(self) -> Result<bool, ScheduleError> {
        let current = self.manager.get(self.task)?;
        let calendar = self.manager.calendar();
        let start = self.start.unwrap_or(current.start);
        let unit = self.duration.map(|d| d.unit).unwrap_or(current.duration.unit);

        let (end, duration) = if current.milestone {
            (start, TaskDuration { length: 0, unit })
        } else if let Some(duration) = self.duration {
            (calendar.shift(start, duration), duration)
        } else {
            let end = self.end.unwrap_or(current.end);
            (end, calendar.create_length(unit, start, end))
        };
        self.manager
            .apply(self.task, start, end, duration, self.third_date)
    }
}

/// Moves a task in time while preserving its duration.
pub struct ShiftMutator<'a> {
    manager: &'a mut TaskManager,
    task: TaskId,
    shift: TaskDuration,
}

impl ShiftMutator<'_> {
    /// Accumulate a working-time shift (negative moves earlier).
    pub fn shift(&mut self, delta: TaskDuration) -> &mut Self {
        self.shift.length += delta.length;
        self
    }

    /// Apply the shift. A forward shift that ends on a non-working day
    /// moves on to the next working day.
    pub fn commit(self) -> Result<bool, ScheduleError> {
        let current = self.manager.get(self.task)?;
        let calendar = self.manager.calendar();
        let mut start = calendar.shift(current.start, self.shift);
        if self.shift.length > 0 && !calendar.is_working(start) {
            start = calendar
                .find_closest(
                    start,
                    self.shift.unit,
                    MoveDirection::Forward,
                    DayType::Working,
                    None,
                )
                .unwrap_or(start);
        }
        let end = if current.milestone {
            start
        } else {
            calendar.shift(start, current.duration)
        };
        let duration = current.duration;
        self.manager.apply(self.task, start, end, duration, None)
    }
}

/// Arena slot `len` as a 32-bit id.
fn next_id(len: usize, what: &'static str) -> Result<u32, ScheduleError> {
    u32::try_from(len).map_err(|_| ScheduleError::CapacityExceeded(what))
}
