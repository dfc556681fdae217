//! Shared utilities for CLI commands.

use std::sync::LazyLock;
use std::thread;
use std::time::{Duration as StdDuration, Instant};

use anyhow::Context;
use chrono::{Duration, NaiveDate};
use regex::Regex;
use st_core::DateRange;

/// Pre-compiled regex for relative date parsing.
static RELATIVE_DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)\s+(day|week)s?\s+ago$").unwrap());

/// Conservative bound for relative dates (~100 years in days).
const MAX_RELATIVE_DAYS: i64 = 100 * 366;

/// Parse a date as `YYYY-MM-DD`, `today`, `yesterday` or relative (`3 days ago`).
pub fn parse_date(s: &str, today: NaiveDate) -> anyhow::Result<NaiveDate> {
    let s = s.trim().to_lowercase();
    match s.as_str() {
        "today" => return Ok(today),
        "yesterday" => return Ok(today - Duration::days(1)),
        _ => {}
    }

    if let Ok(date) = NaiveDate::parse_from_str(&s, "%Y-%m-%d") {
        return Ok(date);
    }

    let Some(caps) = RELATIVE_DATE_RE.captures(&s) else {
        anyhow::bail!(
            "Invalid date: {s}. Use YYYY-MM-DD, 'today', 'yesterday' or relative (e.g., '3 days ago')"
        );
    };

    let n: i64 = caps[1]
        .parse()
        .context("failed to parse number in relative date")?;
    let days_per_unit = match &caps[2] {
        "day" => 1,
        "week" => 7,
        unit => anyhow::bail!("Unknown date unit: {unit}"),
    };

    if n > MAX_RELATIVE_DAYS / days_per_unit {
        anyhow::bail!("Relative date too far back: {n} {}s", &caps[2]);
    }

    Ok(today - Duration::days(n * days_per_unit))
}

/// Builds the report window from `--from` / `--to`.
///
/// Neither given: `None` (each report uses its own default). Only `--from`:
/// from that date through today. Only `--to`: that single day.
pub fn resolve_range(
    from: Option<&str>,
    to: Option<&str>,
    today: NaiveDate,
) -> anyhow::Result<Option<DateRange>> {
    let from = from.map(|s| parse_date(s, today)).transpose()?;
    let to = to.map(|s| parse_date(s, today)).transpose()?;

    let range = match (from, to) {
        (None, None) => return Ok(None),
        (Some(start), None) => DateRange::new(start, today.max(start)),
        (None, Some(end)) => Ok(DateRange::day(end)),
        (Some(start), Some(end)) => DateRange::new(start, end),
    };
    Ok(Some(range?))
}

/// Interval between checks in [`poll_until`].
const POLL_INTERVAL: StdDuration = StdDuration::from_millis(100);

/// Calls `done` until it returns `true` or `timeout` passes.
///
/// Returns whether the condition was met.
pub fn poll_until<F>(timeout: StdDuration, mut done: F) -> anyhow::Result<bool>
where
    F: FnMut() -> anyhow::Result<bool>,
{
    let deadline = Instant::now() + timeout;
    loop {
        if done()? {
            return Ok(true);
        }
        if Instant::now() >= deadline {
            return Ok(false);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 29).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn parses_keywords() {
        assert_eq!(parse_date("today", today()).unwrap(), today());
        assert_eq!(parse_date("Yesterday", today()).unwrap(), date(2025, 1, 28));
    }

    #[test]
    fn parses_iso_dates() {
        assert_eq!(parse_date("2024-12-31", today()).unwrap(), date(2024, 12, 31));
    }

    #[test]
    fn parses_relative_dates() {
        assert_eq!(parse_date("3 days ago", today()).unwrap(), date(2025, 1, 26));
        assert_eq!(parse_date("1 day ago", today()).unwrap(), date(2025, 1, 28));
        assert_eq!(parse_date("2 weeks ago", today()).unwrap(), date(2025, 1, 15));
    }

    #[test]
    fn rejects_garbage() {
        let err = parse_date("last tuesday", today()).unwrap_err();
        assert!(err.to_string().starts_with("Invalid date: last tuesday"));
        assert!(parse_date("2025-02-30", today()).is_err());
    }

    #[test]
    fn rejects_huge_relative_values() {
        assert!(parse_date("999999 weeks ago", today()).is_err());
    }

    #[test]
    fn range_defaults() {
        assert_eq!(resolve_range(None, None, today()).unwrap(), None);
        assert_eq!(
            resolve_range(Some("2 days ago"), None, today()).unwrap(),
            Some(DateRange::new(date(2025, 1, 27), today()).unwrap())
        );
        assert_eq!(
            resolve_range(None, Some("yesterday"), today()).unwrap(),
            Some(DateRange::day(date(2025, 1, 28)))
        );
    }

    #[test]
    fn poll_until_stops_when_done() {
        let mut calls = 0;
        let met = poll_until(StdDuration::from_secs(5), || {
            calls += 1;
            Ok(calls == 3)
        })
        .unwrap();
        assert!(met);
        assert_eq!(calls, 3);
    }

    #[test]
    fn poll_until_times_out() {
        let met = poll_until(StdDuration::ZERO, || Ok(false)).unwrap();
        assert!(!met);
    }

    #[test]
    fn inverted_range_is_an_error() {
        let err = resolve_range(Some("today"), Some("yesterday"), today()).unwrap_err();
        assert!(err.to_string().contains("before start"));
    }
}
