//! Working-time calendar and duration arithmetic.
//!
//! `WorkingCalendar` is the calendar facade the engines consult: day
//! classification, nearest-day search and working-time shifting. Only
//! `day_mask` is required; the rest derive from it. `WeekendCalendar` is the
//! standard implementation with weekend days and explicit holidays.

use chrono::{Datelike, Days, NaiveDate, Weekday};
use rustc_hash::FxHashSet;
use std::fmt;

/// Maximum number of consecutive units searched before giving up.
///
/// Keeps `find_closest` and `shift` finite on a calendar without working days.
pub const SEARCH_HORIZON_UNITS: usize = 3660;

/// Granularity of a task duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeUnit {
    Day,
    /// Calendar week starting on Monday.
    Week,
}

impl TimeUnit {
    /// Start of the unit following the one containing `date`.
    pub fn adjust_right(self, date: NaiveDate) -> NaiveDate {
        match self {
            TimeUnit::Day => date.succ_opt().unwrap_or(date),
            TimeUnit::Week => {
                let to_next_monday = 7 - u64::from(date.weekday().num_days_from_monday());
                date.checked_add_days(Days::new(to_next_monday))
                    .unwrap_or(date)
            }
        }
    }

    /// Start of the latest unit beginning strictly before `date`.
    pub fn jump_left(self, date: NaiveDate) -> NaiveDate {
        match self {
            TimeUnit::Day => date.pred_opt().unwrap_or(date),
            TimeUnit::Week => {
                let from_monday = u64::from(date.weekday().num_days_from_monday());
                let back = if from_monday == 0 { 7 } else { from_monday };
                date.checked_sub_days(Days::new(back)).unwrap_or(date)
            }
        }
    }
}

/// A length of time: count of units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskDuration {
    pub length: i64,
    pub unit: TimeUnit,
}

impl TaskDuration {
    pub const fn days(length: i64) -> Self {
        Self {
            length,
            unit: TimeUnit::Day,
        }
    }

    pub const fn weeks(length: i64) -> Self {
        Self {
            length,
            unit: TimeUnit::Week,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.length == 0
    }

    pub fn negate(self) -> Self {
        Self {
            length: -self.length,
            unit: self.unit,
        }
    }
}

impl fmt::Display for TaskDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.unit {
            TimeUnit::Day => write!(f, "{}d", self.length),
            TimeUnit::Week => write!(f, "{}w", self.length),
        }
    }
}

/// Classification bits of a calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayMask(u8);

impl DayMask {
    pub const WORKING: DayMask = DayMask(1);
    pub const WEEKEND: DayMask = DayMask(2);
    pub const HOLIDAY: DayMask = DayMask(4);

    pub fn contains(self, other: DayMask) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn union(self, other: DayMask) -> DayMask {
        DayMask(self.0 | other.0)
    }

    pub fn is_working(self) -> bool {
        self.contains(DayMask::WORKING)
    }
}

/// Kind of day a nearest-day search looks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayType {
    Working,
    NonWorking,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveDirection {
    Forward,
    Backward,
}

/// Calendar and duration facade used by the scheduling engines.
pub trait WorkingCalendar {
    /// Classify a day.
    fn day_mask(&self, date: NaiveDate) -> DayMask;

    fn is_working(&self, date: NaiveDate) -> bool {
        self.day_mask(date).is_working()
    }

    /// Nearest unit start of the requested type, strictly after (`Forward`)
    /// or strictly before (`Backward`) `date`.
    ///
    /// Returns `None` when the walk reaches `bound` (inclusive) or the search
    /// horizon without a match.
    fn find_closest(
        &self,
        date: NaiveDate,
        unit: TimeUnit,
        direction: MoveDirection,
        day_type: DayType,
        bound: Option<NaiveDate>,
    ) -> Option<NaiveDate> {
        let step = |d: NaiveDate| match direction {
            MoveDirection::Forward => unit.adjust_right(d),
            MoveDirection::Backward => unit.jump_left(d),
        };
        let mut candidate = step(date);
        for _ in 0..SEARCH_HORIZON_UNITS {
            if let Some(limit) = bound {
                let passed = match direction {
                    MoveDirection::Forward => candidate >= limit,
                    MoveDirection::Backward => candidate <= limit,
                };
                if passed {
                    return None;
                }
            }
            let working = self.is_working(candidate);
            let matches = match day_type {
                DayType::Working => working,
                DayType::NonWorking => !working,
            };
            if matches {
                return Some(candidate);
            }
            let next = step(candidate);
            if next == candidate {
                return None;
            }
            candidate = next;
        }
        None
    }

    /// Move `date` by a working-time duration.
    ///
    /// Day durations count working days starting at `date` itself, so the
    /// result is the exclusive end of a task of that length starting at
    /// `date`. Negative lengths walk backward over working days. Week
    /// durations move by whole calendar weeks.
    fn shift(&self, date: NaiveDate, duration: TaskDuration) -> NaiveDate {
        match duration.unit {
            TimeUnit::Week => {
                let days = Days::new(duration.length.unsigned_abs() * 7);
                let moved = if duration.length >= 0 {
                    date.checked_add_days(days)
                } else {
                    date.checked_sub_days(days)
                };
                moved.unwrap_or(date)
            }
            TimeUnit::Day => {
                let mut current = date;
                let mut remaining = duration.length.unsigned_abs();
                let mut idle = 0;
                while remaining > 0 && idle < SEARCH_HORIZON_UNITS {
                    if duration.length > 0 {
                        if self.is_working(current) {
                            remaining -= 1;
                            idle = 0;
                        } else {
                            idle += 1;
                        }
                        current = TimeUnit::Day.adjust_right(current);
                    } else {
                        current = TimeUnit::Day.jump_left(current);
                        if self.is_working(current) {
                            remaining -= 1;
                            idle = 0;
                        } else {
                            idle += 1;
                        }
                    }
                }
                current
            }
        }
    }

    /// `date` itself on a working day, otherwise the next working unit start.
    fn working_on_or_after(&self, date: NaiveDate, unit: TimeUnit) -> NaiveDate {
        if self.is_working(date) {
            return date;
        }
        self.find_closest(date, unit, MoveDirection::Forward, DayType::Working, None)
            .unwrap_or(date)
    }

    /// Working length of `[from, to)`, negative when `to` precedes `from`.
    fn create_length(&self, unit: TimeUnit, from: NaiveDate, to: NaiveDate) -> TaskDuration {
        let (lo, hi, sign) = if to >= from {
            (from, to, 1)
        } else {
            (to, from, -1)
        };
        let length = match unit {
            TimeUnit::Week => (hi - lo).num_days() / 7,
            TimeUnit::Day => lo
                .iter_days()
                .take_while(|d| *d < hi)
                .filter(|d| self.is_working(*d))
                .count() as i64,
        };
        TaskDuration {
            length: sign * length,
            unit,
        }
    }
}

/// Calendar with a fixed set of weekend days plus explicit holidays.
#[derive(Debug, Clone)]
pub struct WeekendCalendar {
    weekend: FxHashSet<Weekday>,
    holidays: FxHashSet<NaiveDate>,
}

impl Default for WeekendCalendar {
    /// Mon-Fri work week, no holidays.
    fn default() -> Self {
        Self {
            weekend: FxHashSet::from_iter([Weekday::Sat, Weekday::Sun]),
            holidays: FxHashSet::default(),
        }
    }
}

impl WeekendCalendar {
    /// Calendar where every day is a working day.
    pub fn all_working() -> Self {
        Self {
            weekend: FxHashSet::default(),
            holidays: FxHashSet::default(),
        }
    }

    pub fn add_holiday(&mut self, date: NaiveDate) {
        self.holidays.insert(date);
    }

    pub fn add_holidays(&mut self, dates: &[NaiveDate]) {
        self.holidays.extend(dates.iter().copied());
    }

    /// Set custom working days (e.g., Mon-Sat for 6-day weeks).
    pub fn set_working_days(&mut self, days: &[Weekday]) {
        self.weekend.clear();
        for day in [
            Weekday::Mon,
            Weekday::Tue,
            Weekday::Wed,
            Weekday::Thu,
            Weekday::Fri,
            Weekday::Sat,
            Weekday::Sun,
        ] {
            if !days.contains(&day) {
                self.weekend.insert(day);
            }
        }
    }
}

impl WorkingCalendar for WeekendCalendar {
    fn day_mask(&self, date: NaiveDate) -> DayMask {
        let weekend = self.weekend.contains(&date.weekday());
        let holiday = self.holidays.contains(&date);
        match (weekend, holiday) {
            (false, false) => DayMask::WORKING,
            (true, false) => DayMask::WEEKEND,
            (false, true) => DayMask::HOLIDAY,
            (true, true) => DayMask::WEEKEND.union(DayMask::HOLIDAY),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 2025-01-06 is a Monday.
    fn d(month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, month, day).unwrap()
    }

    #[test]
    fn test_day_mask() {
        let mut cal = WeekendCalendar::default();
        cal.add_holiday(d(1, 8));

        assert!(cal.day_mask(d(1, 6)).is_working());
        assert_eq!(cal.day_mask(d(1, 11)), DayMask::WEEKEND);
        assert_eq!(cal.day_mask(d(1, 8)), DayMask::HOLIDAY);
        assert!(!cal.is_working(d(1, 12)));
    }

    #[test]
    fn test_time_unit_steps() {
        assert_eq!(TimeUnit::Day.adjust_right(d(1, 6)), d(1, 7));
        assert_eq!(TimeUnit::Day.jump_left(d(1, 6)), d(1, 5));
        // Wednesday -> next Monday / this Monday
        assert_eq!(TimeUnit::Week.adjust_right(d(1, 8)), d(1, 13));
        assert_eq!(TimeUnit::Week.jump_left(d(1, 8)), d(1, 6));
        // Monday -> previous Monday
        assert_eq!(TimeUnit::Week.jump_left(d(1, 13)), d(1, 6));
    }

    #[test]
    fn test_find_closest_backward() {
        let cal = WeekendCalendar::default();
        let monday = d(1, 13);

        let working = cal.find_closest(monday, TimeUnit::Day, MoveDirection::Backward, DayType::Working, None);
        assert_eq!(working, Some(d(1, 10))); // Friday

        let non_working = cal.find_closest(
            monday,
            TimeUnit::Day,
            MoveDirection::Backward,
            DayType::NonWorking,
            working,
        );
        assert_eq!(non_working, Some(d(1, 12))); // Sunday
    }

    #[test]
    fn test_find_closest_respects_bound() {
        let cal = WeekendCalendar::default();
        let thursday = d(1, 9);
        // Walking back from Thursday, Wednesday is already the bound.
        let found = cal.find_closest(
            thursday,
            TimeUnit::Day,
            MoveDirection::Backward,
            DayType::NonWorking,
            Some(d(1, 8)),
        );
        assert_eq!(found, None);
    }

    #[test]
    fn test_find_closest_forward_skips_weekend() {
        let cal = WeekendCalendar::default();
        let friday = d(1, 10);
        let next = cal.find_closest(friday, TimeUnit::Day, MoveDirection::Forward, DayType::Working, None);
        assert_eq!(next, Some(d(1, 13)));
    }

    #[test]
    fn test_find_closest_gives_up_without_working_days() {
        let mut cal = WeekendCalendar::default();
        cal.set_working_days(&[]);
        let found = cal.find_closest(d(1, 6), TimeUnit::Day, MoveDirection::Forward, DayType::Working, None);
        assert_eq!(found, None);
    }

    #[test]
    fn test_shift_counts_working_days() {
        let cal = WeekendCalendar::default();
        // Mon + 3 working days -> exclusive end Thursday
        assert_eq!(cal.shift(d(1, 6), TaskDuration::days(3)), d(1, 9));
        // Thu + 3 -> Thu, Fri, Mon -> Tuesday
        assert_eq!(cal.shift(d(1, 9), TaskDuration::days(3)), d(1, 14));
        // Mon - 1 -> Friday
        assert_eq!(cal.shift(d(1, 13), TaskDuration::days(-1)), d(1, 10));
        assert_eq!(cal.shift(d(1, 13), TaskDuration::days(0)), d(1, 13));
        assert_eq!(cal.shift(d(1, 6), TaskDuration::weeks(2)), d(1, 20));
    }

    #[test]
    fn test_create_length() {
        let cal = WeekendCalendar::default();
        assert_eq!(cal.create_length(TimeUnit::Day, d(1, 6), d(1, 13)), TaskDuration::days(5));
        assert_eq!(cal.create_length(TimeUnit::Day, d(1, 8), d(1, 6)), TaskDuration::days(-2));
        assert_eq!(cal.create_length(TimeUnit::Week, d(1, 6), d(1, 20)), TaskDuration::weeks(2));
    }

    #[test]
    fn test_shift_inverts_create_length() {
        let mut cal = WeekendCalendar::default();
        cal.add_holiday(d(1, 15));
        let from = d(1, 7);
        let to = d(1, 17);
        let len = cal.create_length(TimeUnit::Day, from, to);
        assert_eq!(cal.shift(from, len), to);
        assert_eq!(cal.shift(to, len.negate()), from);
    }

    #[test]
    fn test_working_on_or_after() {
        let cal = WeekendCalendar::default();
        assert_eq!(cal.working_on_or_after(d(1, 8), TimeUnit::Day), d(1, 8));
        assert_eq!(cal.working_on_or_after(d(1, 11), TimeUnit::Day), d(1, 13));
        assert_eq!(cal.working_on_or_after(d(1, 12), TimeUnit::Day), d(1, 13));
    }

    #[test]
    fn test_set_working_days_includes_saturday() {
        let mut cal = WeekendCalendar::default();
        cal.set_working_days(&[
            Weekday::Mon,
            Weekday::Tue,
            Weekday::Wed,
            Weekday::Thu,
            Weekday::Fri,
            Weekday::Sat,
        ]);
        assert!(cal.is_working(d(1, 11)));
        assert!(!cal.is_working(d(1, 12)));
    }
}
