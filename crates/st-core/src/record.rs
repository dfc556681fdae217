//! Raw activity readings as stored in the activity log.

use chrono::{NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Timestamp format used by the log (`YYYY-MM-DD HH:MM:SS`, local wall clock).
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// ISO-8601 variant written by older trackers (`2025-01-29T09:00:00.123456`).
const LEGACY_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// Validation errors for activity records.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    /// Idle time was negative, NaN or infinite.
    #[error("idle seconds must be a finite non-negative number, got {value}")]
    InvalidIdleSeconds { value: f64 },

    /// The timestamp did not match any accepted format.
    #[error("invalid timestamp: {value}")]
    InvalidTimestamp { value: String },
}

/// One sampled observation of the foreground application and idle time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityRecord {
    /// When the sample was taken, truncated to whole seconds.
    pub timestamp: NaiveDateTime,
    /// Seconds since the last user input at sampling time.
    pub idle_seconds: f64,
    /// Application (process) name.
    pub app_name: String,
    /// Title of the focused window.
    pub window_title: String,
}

impl ActivityRecord {
    /// Creates a record after validating the idle value.
    ///
    /// The timestamp is truncated to second precision.
    pub fn new(
        timestamp: NaiveDateTime,
        idle_seconds: f64,
        app_name: impl Into<String>,
        window_title: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        if !idle_seconds.is_finite() || idle_seconds < 0.0 {
            return Err(ValidationError::InvalidIdleSeconds {
                value: idle_seconds,
            });
        }
        let timestamp = timestamp.with_nanosecond(0).unwrap_or(timestamp);
        Ok(Self {
            timestamp,
            idle_seconds,
            app_name: app_name.into(),
            window_title: window_title.into(),
        })
    }

    /// Whether this reading counts as idle for the given classification threshold.
    ///
    /// Readings exactly at the threshold count as idle.
    pub fn is_idle(&self, idle_threshold_secs: f64) -> bool {
        self.idle_seconds >= idle_threshold_secs
    }

    /// Formats the timestamp the way the log stores it.
    pub fn timestamp_string(&self) -> String {
        self.timestamp.format(TIMESTAMP_FORMAT).to_string()
    }
}

/// Parses a log timestamp, accepting the legacy ISO-8601 form as well.
pub fn parse_timestamp(value: &str) -> Result<NaiveDateTime, ValidationError> {
    let trimmed = value.trim();
    NaiveDateTime::parse_from_str(trimmed, TIMESTAMP_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(trimmed, LEGACY_TIMESTAMP_FORMAT))
        .map(|ts| ts.with_nanosecond(0).unwrap_or(ts))
        .map_err(|_| ValidationError::InvalidTimestamp {
            value: value.to_string(),
        })
}

/// Everything a report needs from one read of the log.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogContents {
    /// Well-formed records in file order.
    pub records: Vec<ActivityRecord>,
    /// Number of lines that could not be parsed and were skipped.
    pub skipped_lines: usize,
}

impl LogContents {
    pub const fn new(records: Vec<ActivityRecord>, skipped_lines: usize) -> Self {
        Self {
            records,
            skipped_lines,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, 29)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn new_rejects_negative_idle() {
        let result = ActivityRecord::new(ts(9, 0, 0), -1.0, "Chrome", "Tab");
        assert!(matches!(
            result,
            Err(ValidationError::InvalidIdleSeconds { .. })
        ));
    }

    #[test]
    fn new_rejects_nan_idle() {
        assert!(ActivityRecord::new(ts(9, 0, 0), f64::NAN, "Chrome", "Tab").is_err());
    }

    #[test]
    fn new_truncates_subsecond_precision() {
        let precise = ts(9, 0, 0).with_nanosecond(750_000_000).unwrap();
        let record = ActivityRecord::new(precise, 0.0, "Chrome", "Tab").unwrap();
        assert_eq!(record.timestamp, ts(9, 0, 0));
    }

    #[test]
    fn idle_threshold_tie_counts_as_idle() {
        let record = ActivityRecord::new(ts(9, 0, 0), 300.0, "Chrome", "Tab").unwrap();
        assert!(record.is_idle(300.0));
        let record = ActivityRecord::new(ts(9, 0, 0), 299.9, "Chrome", "Tab").unwrap();
        assert!(!record.is_idle(300.0));
    }

    #[test]
    fn parse_timestamp_accepts_log_format() {
        assert_eq!(parse_timestamp("2025-01-29 09:10:00").unwrap(), ts(9, 10, 0));
    }

    #[test]
    fn parse_timestamp_accepts_legacy_iso_format() {
        assert_eq!(
            parse_timestamp("2025-01-29T09:10:00.123456").unwrap(),
            ts(9, 10, 0)
        );
        assert_eq!(parse_timestamp("2025-01-29T09:10:00").unwrap(), ts(9, 10, 0));
    }

    #[test]
    fn parse_timestamp_rejects_garbage() {
        let err = parse_timestamp("yesterday-ish").unwrap_err();
        assert_eq!(err.to_string(), "invalid timestamp: yesterday-ish");
    }

    #[test]
    fn timestamp_string_round_trips() {
        let record = ActivityRecord::new(ts(23, 59, 59), 0.0, "a", "b").unwrap();
        assert_eq!(record.timestamp_string(), "2025-01-29 23:59:59");
        assert_eq!(
            parse_timestamp(&record.timestamp_string()).unwrap(),
            record.timestamp
        );
    }
}
