//! Report engine: aggregates reconstructed sessions into report views.
//!
//! The record-level entry points (`summarize`, `weekly`, `app_usage`,
//! `productivity`) reconstruct sessions over the whole log, clip them to the
//! requested window and hand them to the session-level aggregators below. A
//! session crossing midnight is counted once but its time is split between
//! the days it covers. Everything here is a pure function of its inputs.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::category::{Category, CategoryMap};
use crate::period::DateRange;
use crate::record::LogContents;
use crate::session::{Session, SessionConfig, sessions_in_range};

/// Number of days in the weekly and productivity default windows.
pub const WEEK_DAYS: u32 = 7;

/// Active time attributed to one application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppTime {
    pub app_name: String,
    pub active_ms: i64,
}

/// Totals over a date range (today's summary or a custom range).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub range: DateRange,
    pub total_active_ms: i64,
    pub total_idle_ms: i64,
    pub session_count: usize,
    /// Distinct apps with any active time.
    pub app_count: usize,
    pub top_apps: Vec<AppTime>,
    pub days: i64,
    pub daily_average_ms: i64,
    pub skipped_lines: usize,
}

/// One row of the weekly report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayTotal {
    pub date: NaiveDate,
    pub active_ms: i64,
    pub idle_ms: i64,
    pub app_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeeklyReport {
    pub range: DateRange,
    /// One row per day of the range, oldest first. Days without data are zero.
    pub days: Vec<DayTotal>,
    pub total_active_ms: i64,
    pub daily_average_ms: i64,
    pub skipped_lines: usize,
}

/// Usage of one application over the requested window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppUsageStat {
    pub app_name: String,
    pub active_ms: i64,
    pub idle_ms: i64,
    pub session_count: usize,
    pub last_used: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppUsageReport {
    /// `None` means all recorded history.
    pub range: Option<DateRange>,
    pub apps: Vec<AppUsageStat>,
    pub skipped_lines: usize,
}

/// Active time and share of one productivity category.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryShare {
    pub category: Category,
    pub active_ms: i64,
    /// Share of total active time, rounded half-up to one decimal.
    pub percent: f64,
}

/// Coarse verdict derived from the productive share.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Rating {
    Excellent,
    Good,
    Average,
    NeedsImprovement,
}

impl Rating {
    pub fn from_score(score: f64) -> Self {
        if score >= 70.0 {
            Self::Excellent
        } else if score >= 50.0 {
            Self::Good
        } else if score >= 30.0 {
            Self::Average
        } else {
            Self::NeedsImprovement
        }
    }

    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Excellent => "Excellent!",
            Self::Good => "Good",
            Self::Average => "Average",
            Self::NeedsImprovement => "Needs Improvement",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductivityReport {
    pub range: DateRange,
    /// Every category, in `Category::ALL` order.
    pub shares: Vec<CategoryShare>,
    pub total_active_ms: i64,
    /// The productive share in percent.
    pub score: f64,
    pub rating: Rating,
    pub skipped_lines: usize,
}

// ========== Session-level aggregation ==========

/// Percentage of `part` in `total`, rounded half-up to one decimal.
///
/// Returns 0.0 when `total` is not positive.
#[allow(clippy::cast_precision_loss)]
pub fn percent_of(part: i64, total: i64) -> f64 {
    if total <= 0 || part <= 0 {
        return 0.0;
    }
    let part = i128::from(part);
    let total = i128::from(total);
    let tenths = (part * 1000 + total / 2) / total;
    tenths as f64 / 10.0
}

/// Top `n` apps by active time, descending; ties broken by name ascending.
///
/// Apps without any active time are left out.
pub fn top_apps(sessions: &[Session], n: usize) -> Vec<AppTime> {
    let mut totals: HashMap<&str, i64> = HashMap::new();
    for session in sessions {
        *totals.entry(session.app_name.as_str()).or_default() += session.active_ms;
    }

    let mut apps: Vec<AppTime> = totals
        .into_iter()
        .filter(|(_, active_ms)| *active_ms > 0)
        .map(|(app_name, active_ms)| AppTime {
            app_name: app_name.to_string(),
            active_ms,
        })
        .collect();
    apps.sort_by(|a, b| {
        b.active_ms
            .cmp(&a.active_ms)
            .then_with(|| a.app_name.cmp(&b.app_name))
    });
    apps.truncate(n);
    apps
}

/// Per-app usage, sorted by active time descending then name ascending.
pub fn app_usage_stats(sessions: &[Session]) -> Vec<AppUsageStat> {
    let mut stats: HashMap<&str, AppUsageStat> = HashMap::new();
    for session in sessions {
        let entry = stats
            .entry(session.app_name.as_str())
            .or_insert_with(|| AppUsageStat {
                app_name: session.app_name.clone(),
                active_ms: 0,
                idle_ms: 0,
                session_count: 0,
                last_used: session.end,
            });
        entry.active_ms += session.active_ms;
        entry.idle_ms += session.idle_ms;
        entry.session_count += 1;
        entry.last_used = entry.last_used.max(session.end);
    }

    let mut apps: Vec<AppUsageStat> = stats.into_values().collect();
    apps.sort_by(|a, b| {
        b.active_ms
            .cmp(&a.active_ms)
            .then_with(|| a.app_name.cmp(&b.app_name))
    });
    apps
}

/// Active/idle totals for every day of `range`, zero-filled.
///
/// Uses each session's per-day breakdown, so time after midnight lands on
/// the next day.
pub fn daily_totals(sessions: &[Session], range: DateRange) -> Vec<DayTotal> {
    let mut by_day: BTreeMap<NaiveDate, (i64, i64, BTreeSet<&str>)> = BTreeMap::new();
    for session in sessions {
        for (date, share) in session.days.range(range.start..=range.end) {
            let (active, idle, apps) = by_day.entry(*date).or_default();
            *active += share.active_ms;
            *idle += share.idle_ms;
            if share.active_ms > 0 {
                apps.insert(session.app_name.as_str());
            }
        }
    }

    range
        .dates()
        .map(|date| {
            let (active_ms, idle_ms, app_count) = by_day
                .get(&date)
                .map_or((0, 0, 0), |(a, i, apps)| (*a, *i, apps.len()));
            DayTotal {
                date,
                active_ms,
                idle_ms,
                app_count,
            }
        })
        .collect()
}

/// Active time per category with shares of the total, in `Category::ALL` order.
pub fn category_shares(sessions: &[Session], categories: &CategoryMap) -> Vec<CategoryShare> {
    let mut per_category: HashMap<Category, i64> = HashMap::new();
    for session in sessions {
        *per_category
            .entry(categories.categorize(&session.app_name))
            .or_default() += session.active_ms;
    }
    let total: i64 = per_category.values().sum();

    Category::ALL
        .into_iter()
        .map(|category| {
            let active_ms = per_category.get(&category).copied().unwrap_or(0);
            CategoryShare {
                category,
                active_ms,
                percent: percent_of(active_ms, total),
            }
        })
        .collect()
}

fn distinct_active_apps(sessions: &[Session]) -> usize {
    sessions
        .iter()
        .filter(|s| s.active_ms > 0)
        .map(|s| s.app_name.as_str())
        .collect::<BTreeSet<_>>()
        .len()
}

// ========== Report entry points ==========

/// Today's summary (default) or a custom-range summary.
pub fn summarize(
    log: &LogContents,
    range: Option<DateRange>,
    today: NaiveDate,
    config: &SessionConfig,
    top_n: usize,
) -> Summary {
    let range = range.unwrap_or_else(|| DateRange::day(today));
    let sessions = sessions_in_range(&log.records, Some(range), config);

    let total_active_ms: i64 = sessions.iter().map(|s| s.active_ms).sum();
    let total_idle_ms: i64 = sessions.iter().map(|s| s.idle_ms).sum();
    let days = range.num_days();

    Summary {
        range,
        total_active_ms,
        total_idle_ms,
        session_count: sessions.len(),
        app_count: distinct_active_apps(&sessions),
        top_apps: top_apps(&sessions, top_n),
        days,
        daily_average_ms: total_active_ms / days,
        skipped_lines: log.skipped_lines,
    }
}

/// Weekly report; defaults to the trailing seven days including today.
pub fn weekly(
    log: &LogContents,
    range: Option<DateRange>,
    today: NaiveDate,
    config: &SessionConfig,
) -> WeeklyReport {
    let range = range.unwrap_or_else(|| DateRange::trailing_days(today, WEEK_DAYS));
    let sessions = sessions_in_range(&log.records, Some(range), config);
    let days = daily_totals(&sessions, range);
    let total_active_ms: i64 = days.iter().map(|d| d.active_ms).sum();

    WeeklyReport {
        range,
        days,
        total_active_ms,
        daily_average_ms: total_active_ms / range.num_days(),
        skipped_lines: log.skipped_lines,
    }
}

/// App usage statistics; defaults to all recorded history.
pub fn app_usage(
    log: &LogContents,
    range: Option<DateRange>,
    config: &SessionConfig,
) -> AppUsageReport {
    let sessions = sessions_in_range(&log.records, range, config);
    AppUsageReport {
        range,
        apps: app_usage_stats(&sessions),
        skipped_lines: log.skipped_lines,
    }
}

/// Productivity analysis; defaults to the trailing seven days including today.
pub fn productivity(
    log: &LogContents,
    range: Option<DateRange>,
    today: NaiveDate,
    config: &SessionConfig,
    categories: &CategoryMap,
) -> ProductivityReport {
    let range = range.unwrap_or_else(|| DateRange::trailing_days(today, WEEK_DAYS));
    let sessions = sessions_in_range(&log.records, Some(range), config);
    let shares = category_shares(&sessions, categories);
    let total_active_ms = shares.iter().map(|s| s.active_ms).sum();
    let score = shares
        .iter()
        .find(|s| s.category == Category::Productive)
        .map_or(0.0, |s| s.percent);

    ProductivityReport {
        range,
        shares,
        total_active_ms,
        score,
        rating: Rating::from_score(score),
        skipped_lines: log.skipped_lines,
    }
}
