//! Core data types for the date propagation engines.

use chrono::NaiveDate;
use std::fmt;

use crate::calendar::{DayType, MoveDirection, TaskDuration, TimeUnit, WorkingCalendar};
use crate::interner::TaskId;
use crate::range::DateRange;

/// Constraint a task places on its own start, beside its dependencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThirdDateConstraint {
    /// The task must not start before its third date.
    EarliestBegin,
}

/// A task as seen by the engines.
///
/// The end date is exclusive: a task occupies `[start, end)`. Tasks are owned
/// by the `TaskManager` and only change through its mutators.
#[derive(Clone, Debug, PartialEq)]
pub struct Task {
    pub id: TaskId,
    pub name: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub duration: TaskDuration,
    pub milestone: bool,
    pub third_date_constraint: Option<ThirdDateConstraint>,
    pub third_date: Option<NaiveDate>,
}

impl Task {
    /// Anchor of an earliest-begin constraint, if one is set.
    pub fn earliest_begin(&self) -> Option<NaiveDate> {
        match self.third_date_constraint {
            Some(ThirdDateConstraint::EarliestBegin) => self.third_date,
            None => None,
        }
    }

    pub fn time_unit(&self) -> TimeUnit {
        self.duration.unit
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{} [{}..{})",
            self.name, self.id, self.start, self.end
        )
    }
}

/// Arena index of a dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DependencyId(pub u32);

impl DependencyId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Which dates of dependee and dependant a dependency links.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    /// Dependant starts after the dependee finishes.
    FinishStart,
    /// Dependant starts after the dependee starts.
    StartStart,
    /// Dependant finishes after the dependee finishes.
    FinishFinish,
    /// Dependant finishes after the dependee starts.
    StartFinish,
}

/// How strictly a dependency binds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hardness {
    /// The dependant is kept exactly at the acceptable start.
    Strong,
    /// The dependant may drift later; only an early start is corrected.
    Rubber,
}

/// Which way a collision lets the dependant's start move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Variation {
    /// Start must equal the acceptable start.
    Fixed,
    /// Start may be at or before the acceptable start.
    StartEarlier,
    /// Start may be at or after the acceptable start.
    StartLater,
}

/// A constraint instance evaluated against current task dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Collision {
    pub acceptable_start: NaiveDate,
    pub variation: Variation,
    /// True when the dependant currently violates the constraint.
    pub active: bool,
}

impl Collision {
    pub fn new(acceptable_start: NaiveDate, variation: Variation, active: bool) -> Self {
        Self {
            acceptable_start,
            variation,
            active,
        }
    }

    /// Start range this collision imposes on the dependant.
    ///
    /// Open-ended variations move a non-working acceptable start onto the
    /// nearest working day in the direction the start is free to go.
    pub fn start_range(&self, calendar: &dyn WorkingCalendar, unit: TimeUnit) -> DateRange {
        let acceptable = self.acceptable_start;
        match self.variation {
            Variation::StartEarlier => {
                let snapped = if calendar.is_working(acceptable) {
                    acceptable
                } else {
                    calendar
                        .find_closest(acceptable, unit, MoveDirection::Backward, DayType::Working, None)
                        .unwrap_or(acceptable)
                };
                DateRange::at_most(snapped)
            }
            Variation::StartLater => {
                let snapped = if calendar.is_working(acceptable) {
                    acceptable
                } else {
                    calendar
                        .find_closest(acceptable, unit, MoveDirection::Forward, DayType::Working, None)
                        .unwrap_or(acceptable)
                };
                DateRange::at_least(snapped)
            }
            Variation::Fixed => DateRange::singleton(acceptable),
        }
    }
}

/// A dependency between two tasks: `dependee -> dependant`.
#[derive(Clone, Debug, PartialEq)]
pub struct TaskDependency {
    pub id: DependencyId,
    pub dependee: TaskId,
    pub dependant: TaskId,
    pub kind: ConstraintKind,
    pub hardness: Hardness,
    /// Lag in working days, may be negative.
    pub lag_days: i64,
}

impl TaskDependency {
    /// Evaluate this dependency for `dependant` (the declared dependant or,
    /// for inherited constraints, one of its descendants).
    pub fn collision(
        &self,
        dependee: &Task,
        dependant: &Task,
        calendar: &dyn WorkingCalendar,
    ) -> Collision {
        let lag = TaskDuration::days(self.lag_days);
        let acceptable_start = match self.kind {
            ConstraintKind::FinishStart => calendar.shift(dependee.end, lag),
            ConstraintKind::StartStart => calendar.shift(dependee.start, lag),
            ConstraintKind::FinishFinish => {
                let barrier = calendar.shift(dependee.end, lag);
                calendar.shift(barrier, dependant.duration.negate())
            }
            ConstraintKind::StartFinish => {
                let barrier = calendar.shift(dependee.start, lag);
                calendar.shift(barrier, dependant.duration.negate())
            }
        };
        let active = match self.hardness {
            Hardness::Strong => dependant.start != acceptable_start,
            Hardness::Rubber => dependant.start < acceptable_start,
        };
        Collision::new(acceptable_start, Variation::StartLater, active)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::WeekendCalendar;

    // 2025-01-06 is a Monday.
    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, day).unwrap()
    }

    fn make_task(id: u32, start: NaiveDate, end: NaiveDate, days: i64) -> Task {
        Task {
            id: TaskId(id),
            name: format!("t{}", id),
            start,
            end,
            duration: TaskDuration::days(days),
            milestone: false,
            third_date_constraint: None,
            third_date: None,
        }
    }

    fn make_dep(kind: ConstraintKind, hardness: Hardness, lag_days: i64) -> TaskDependency {
        TaskDependency {
            id: DependencyId(0),
            dependee: TaskId(1),
            dependant: TaskId(2),
            kind,
            hardness,
            lag_days,
        }
    }

    #[test]
    fn test_finish_start_collision() {
        let cal = WeekendCalendar::default();
        let dependee = make_task(1, d(6), d(9), 3); // Mon..Thu
        let dependant = make_task(2, d(6), d(8), 2);

        let c = make_dep(ConstraintKind::FinishStart, Hardness::Strong, 0)
            .collision(&dependee, &dependant, &cal);
        assert_eq!(c.acceptable_start, d(9));
        assert_eq!(c.variation, Variation::StartLater);
        assert!(c.active);
    }

    #[test]
    fn test_lag_counts_working_days() {
        let cal = WeekendCalendar::default();
        let dependee = make_task(1, d(6), d(10), 4); // ends Friday (exclusive)
        let dependant = make_task(2, d(6), d(7), 1);

        let c = make_dep(ConstraintKind::FinishStart, Hardness::Strong, 1)
            .collision(&dependee, &dependant, &cal);
        // Fri is the lag day; the Saturday start is moved onto Monday.
        assert_eq!(c.acceptable_start, d(11));
        assert_eq!(c.start_range(&cal, TimeUnit::Day), DateRange::at_least(d(13)));
    }

    #[test]
    fn test_start_start_and_finish_finish() {
        let cal = WeekendCalendar::default();
        let dependee = make_task(1, d(7), d(10), 3); // Tue..Fri
        let dependant = make_task(2, d(6), d(8), 2);

        let ss = make_dep(ConstraintKind::StartStart, Hardness::Strong, 0)
            .collision(&dependee, &dependant, &cal);
        assert_eq!(ss.acceptable_start, d(7));

        // Dependant must end at Fri (exclusive) -> start two working days earlier.
        let ff = make_dep(ConstraintKind::FinishFinish, Hardness::Strong, 0)
            .collision(&dependee, &dependant, &cal);
        assert_eq!(ff.acceptable_start, d(8));
    }

    #[test]
    fn test_rubber_inactive_when_dependant_is_later() {
        let cal = WeekendCalendar::default();
        let dependee = make_task(1, d(6), d(8), 2);
        let dependant = make_task(2, d(13), d(14), 1);

        let rubber = make_dep(ConstraintKind::FinishStart, Hardness::Rubber, 0)
            .collision(&dependee, &dependant, &cal);
        assert!(!rubber.active);

        let strong = make_dep(ConstraintKind::FinishStart, Hardness::Strong, 0)
            .collision(&dependee, &dependant, &cal);
        assert!(strong.active);
    }

    #[test]
    fn test_collision_start_ranges() {
        let cal = WeekendCalendar::default();
        let saturday = d(11);

        let later = Collision::new(saturday, Variation::StartLater, true);
        assert_eq!(later.start_range(&cal, TimeUnit::Day), DateRange::at_least(d(13)));

        let earlier = Collision::new(saturday, Variation::StartEarlier, true);
        assert_eq!(earlier.start_range(&cal, TimeUnit::Day), DateRange::at_most(d(10)));

        let fixed = Collision::new(saturday, Variation::Fixed, true);
        assert_eq!(fixed.start_range(&cal, TimeUnit::Day), DateRange::singleton(saturday));
    }

    #[test]
    fn test_earliest_begin_needs_anchor() {
        let mut task = make_task(1, d(6), d(7), 1);
        task.third_date_constraint = Some(ThirdDateConstraint::EarliestBegin);
        assert_eq!(task.earliest_begin(), None);

        task.third_date = Some(d(9));
        assert_eq!(task.earliest_begin(), Some(d(9)));
    }
}
