//! Calendar date ranges used to window reports.

use std::fmt;

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Returned when a range would end before it starts.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("range end {end} is before start {start}")]
pub struct InvertedRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// An inclusive range of local calendar dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, InvertedRange> {
        if end < start {
            return Err(InvertedRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// A single day.
    pub const fn day(date: NaiveDate) -> Self {
        Self {
            start: date,
            end: date,
        }
    }

    /// The `days` calendar days ending on `today` (inclusive). `days` of 0 is treated as 1.
    pub fn trailing_days(today: NaiveDate, days: u32) -> Self {
        let back = i64::from(days.max(1)) - 1;
        Self {
            start: today - Duration::days(back),
            end: today,
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    /// Number of calendar days covered (always at least 1).
    pub fn num_days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    /// Every date in the range, in ascending order.
    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> {
        self.start.iter_days().take(usize::try_from(self.num_days()).unwrap_or(0))
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{} to {}", self.start, self.end)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn trailing_seven_days_includes_today() {
        let range = DateRange::trailing_days(date(2025, 1, 29), 7);
        assert_eq!(range.start, date(2025, 1, 23));
        assert_eq!(range.end, date(2025, 1, 29));
        assert_eq!(range.num_days(), 7);
        assert_eq!(range.dates().count(), 7);
    }

    #[test]
    fn trailing_days_crosses_month_boundary() {
        let range = DateRange::trailing_days(date(2025, 3, 2), 7);
        assert_eq!(range.start, date(2025, 2, 24));
    }

    #[test]
    fn inverted_range_is_rejected() {
        let err = DateRange::new(date(2025, 1, 29), date(2025, 1, 28)).unwrap_err();
        assert_eq!(err.to_string(), "range end 2025-01-28 is before start 2025-01-29");
    }

    #[test]
    fn contains_is_inclusive() {
        let range = DateRange::new(date(2025, 1, 27), date(2025, 1, 29)).unwrap();
        assert!(range.contains(date(2025, 1, 27)));
        assert!(range.contains(date(2025, 1, 29)));
        assert!(!range.contains(date(2025, 1, 30)));
    }

    #[test]
    fn display_single_day_and_span() {
        assert_eq!(DateRange::day(date(2025, 1, 29)).to_string(), "2025-01-29");
        let range = DateRange::new(date(2025, 1, 27), date(2025, 1, 29)).unwrap();
        assert_eq!(range.to_string(), "2025-01-27 to 2025-01-29");
    }
}
