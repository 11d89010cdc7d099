//! Date interval algebra.
//!
//! `DateRange` is an immutable interval over `NaiveDate` whose ends may be
//! closed, open or unbounded. Intersection of disjoint ranges yields an empty
//! range instead of failing, so range accumulation never panics.

use chrono::NaiveDate;
use std::cmp::Ordering;
use std::fmt;
use std::ops::Bound;

/// Interval of dates with independent lower and upper bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    lower: Bound<NaiveDate>,
    upper: Bound<NaiveDate>,
}

/// Orders two lower bounds; `Greater` means tighter.
fn cmp_lower(a: &Bound<NaiveDate>, b: &Bound<NaiveDate>) -> Ordering {
    match (a, b) {
        (Bound::Unbounded, Bound::Unbounded) => Ordering::Equal,
        (Bound::Unbounded, _) => Ordering::Less,
        (_, Bound::Unbounded) => Ordering::Greater,
        (Bound::Included(x), Bound::Included(y)) | (Bound::Excluded(x), Bound::Excluded(y)) => {
            x.cmp(y)
        }
        (Bound::Included(x), Bound::Excluded(y)) => x.cmp(y).then(Ordering::Less),
        (Bound::Excluded(x), Bound::Included(y)) => x.cmp(y).then(Ordering::Greater),
    }
}

/// Orders two upper bounds; `Less` means tighter.
fn cmp_upper(a: &Bound<NaiveDate>, b: &Bound<NaiveDate>) -> Ordering {
    match (a, b) {
        (Bound::Unbounded, Bound::Unbounded) => Ordering::Equal,
        (Bound::Unbounded, _) => Ordering::Greater,
        (_, Bound::Unbounded) => Ordering::Less,
        (Bound::Included(x), Bound::Included(y)) | (Bound::Excluded(x), Bound::Excluded(y)) => {
            x.cmp(y)
        }
        (Bound::Included(x), Bound::Excluded(y)) => x.cmp(y).then(Ordering::Greater),
        (Bound::Excluded(x), Bound::Included(y)) => x.cmp(y).then(Ordering::Less),
    }
}

fn endpoint(bound: &Bound<NaiveDate>) -> Option<NaiveDate> {
    match bound {
        Bound::Included(d) | Bound::Excluded(d) => Some(*d),
        Bound::Unbounded => None,
    }
}

impl DateRange {
    /// The universal range. Intersecting with it is the identity.
    pub const fn all() -> Self {
        Self {
            lower: Bound::Unbounded,
            upper: Bound::Unbounded,
        }
    }

    pub const fn new(lower: Bound<NaiveDate>, upper: Bound<NaiveDate>) -> Self {
        Self { lower, upper }
    }

    /// `[lower, upper]`
    pub const fn closed(lower: NaiveDate, upper: NaiveDate) -> Self {
        Self::new(Bound::Included(lower), Bound::Included(upper))
    }

    /// `[date, date]`
    pub const fn singleton(date: NaiveDate) -> Self {
        Self::closed(date, date)
    }

    /// `[date, +∞)`
    pub const fn at_least(date: NaiveDate) -> Self {
        Self::new(Bound::Included(date), Bound::Unbounded)
    }

    /// `(date, +∞)`
    pub const fn greater_than(date: NaiveDate) -> Self {
        Self::new(Bound::Excluded(date), Bound::Unbounded)
    }

    /// `(−∞, date]`
    pub const fn at_most(date: NaiveDate) -> Self {
        Self::new(Bound::Unbounded, Bound::Included(date))
    }

    /// `(−∞, date)`
    pub const fn less_than(date: NaiveDate) -> Self {
        Self::new(Bound::Unbounded, Bound::Excluded(date))
    }

    /// Smallest closed range containing every date, `None` for no dates.
    pub fn enclose_all<I>(dates: I) -> Option<Self>
    where
        I: IntoIterator<Item = NaiveDate>,
    {
        let mut iter = dates.into_iter();
        let first = iter.next()?;
        let (min, max) = iter.fold((first, first), |(lo, hi), d| (lo.min(d), hi.max(d)));
        Some(Self::closed(min, max))
    }

    pub fn lower_bound(&self) -> Bound<NaiveDate> {
        self.lower
    }

    pub fn upper_bound(&self) -> Bound<NaiveDate> {
        self.upper
    }

    pub fn has_lower_bound(&self) -> bool {
        !matches!(self.lower, Bound::Unbounded)
    }

    pub fn has_upper_bound(&self) -> bool {
        !matches!(self.upper, Bound::Unbounded)
    }

    pub fn lower_endpoint(&self) -> Option<NaiveDate> {
        endpoint(&self.lower)
    }

    pub fn upper_endpoint(&self) -> Option<NaiveDate> {
        endpoint(&self.upper)
    }

    pub fn is_all(&self) -> bool {
        !self.has_lower_bound() && !self.has_upper_bound()
    }

    /// True when no instant satisfies both bounds.
    pub fn is_empty(&self) -> bool {
        match (self.lower, self.upper) {
            (Bound::Included(l), Bound::Included(u)) => l > u,
            (Bound::Included(l), Bound::Excluded(u))
            | (Bound::Excluded(l), Bound::Included(u))
            | (Bound::Excluded(l), Bound::Excluded(u)) => l >= u,
            _ => false,
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        let above = match self.lower {
            Bound::Included(l) => date >= l,
            Bound::Excluded(l) => date > l,
            Bound::Unbounded => true,
        };
        let below = match self.upper {
            Bound::Included(u) => date <= u,
            Bound::Excluded(u) => date < u,
            Bound::Unbounded => true,
        };
        above && below
    }

    /// Tightest range inside both. May be empty.
    pub fn intersection(&self, other: &DateRange) -> DateRange {
        let lower = match cmp_lower(&self.lower, &other.lower) {
            Ordering::Less => other.lower,
            _ => self.lower,
        };
        let upper = match cmp_upper(&self.upper, &other.upper) {
            Ordering::Greater => other.upper,
            _ => self.upper,
        };
        DateRange { lower, upper }
    }

    /// Smallest range enclosing both.
    pub fn span(&self, other: &DateRange) -> DateRange {
        let lower = match cmp_lower(&self.lower, &other.lower) {
            Ordering::Greater => other.lower,
            _ => self.lower,
        };
        let upper = match cmp_upper(&self.upper, &other.upper) {
            Ordering::Less => other.upper,
            _ => self.upper,
        };
        DateRange { lower, upper }
    }
}

impl Default for DateRange {
    fn default() -> Self {
        Self::all()
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.lower {
            Bound::Included(d) => write!(f, "[{}", d)?,
            Bound::Excluded(d) => write!(f, "({}", d)?,
            Bound::Unbounded => write!(f, "(-∞")?,
        }
        write!(f, "..")?;
        match self.upper {
            Bound::Included(d) => write!(f, "{}]", d),
            Bound::Excluded(d) => write!(f, "{})", d),
            Bound::Unbounded => write!(f, "+∞)"),
        }
    }
}
