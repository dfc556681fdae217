//! Session reconstruction from the flat activity log.
//!
//! A session is a maximal run of consecutive records for the same application
//! with no gap between neighbouring records longer than the idle-gap threshold.
//!
//! # Algorithm
//!
//! 1. Walk records in file order (never re-sorted: the wall clock may jump).
//! 2. Close the current session when the app changes, when the gap since the
//!    previous record exceeds `idle_gap_secs`, or when the gap is negative.
//! 3. Credit each in-session interval to idle or active according to the idle
//!    state of the *later* record of the pair.
//! 4. The last session ends at the final record's timestamp.
//!
//! Sessions are never split at midnight. Each one keeps a per-day breakdown of
//! its time so that day-based reports can clip it to the days they cover.

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::period::DateRange;
use crate::record::ActivityRecord;

/// Configuration for session reconstruction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Longest gap between two records of one session.
    /// Default: 300 (5 minutes).
    pub idle_gap_secs: i64,

    /// Idle readings at or above this many seconds count as idle time.
    /// Default: 300 (5 minutes).
    pub idle_threshold_secs: f64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_gap_secs: 300,
            idle_threshold_secs: 300.0,
        }
    }
}

/// Active and idle time a session spent on one calendar day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DayShare {
    pub active_ms: i64,
    pub idle_ms: i64,
}

/// A contiguous stretch of use of one application.
///
/// `active_ms + idle_ms` always equals `end - start`, and the values of
/// `days` sum to the same totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub app_name: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub active_ms: i64,
    pub idle_ms: i64,
    /// Number of log records folded into this session.
    pub record_count: usize,
    /// Time per local calendar day. Days with no elapsed time are absent.
    #[serde(skip)]
    pub days: BTreeMap<NaiveDate, DayShare>,
}

fn midnight(date: NaiveDate) -> Option<NaiveDateTime> {
    date.and_hms_opt(0, 0, 0)
}

impl Session {
    fn open(record: &ActivityRecord) -> Self {
        Self {
            app_name: record.app_name.clone(),
            start: record.timestamp,
            end: record.timestamp,
            active_ms: 0,
            idle_ms: 0,
            record_count: 1,
            days: BTreeMap::new(),
        }
    }

    /// Whether `record` extends this session rather than starting a new one.
    fn continues_with(&self, record: &ActivityRecord, config: &SessionConfig) -> bool {
        if record.app_name != self.app_name {
            return false;
        }
        let gap_ms = (record.timestamp - self.end).num_milliseconds();
        (0..=config.idle_gap_secs.saturating_mul(1000)).contains(&gap_ms)
    }

    fn extend(&mut self, record: &ActivityRecord, config: &SessionConfig) {
        let idle = record.is_idle(config.idle_threshold_secs);

        let mut from = self.end;
        while from < record.timestamp {
            let until = from
                .date()
                .succ_opt()
                .and_then(midnight)
                .map_or(record.timestamp, |next| next.min(record.timestamp));
            let ms = (until - from).num_milliseconds();
            let share = self.days.entry(from.date()).or_default();
            if idle {
                share.idle_ms += ms;
                self.idle_ms += ms;
            } else {
                share.active_ms += ms;
                self.active_ms += ms;
            }
            from = until;
        }

        self.end = record.timestamp;
        self.record_count += 1;
    }

    pub fn duration_ms(&self) -> i64 {
        (self.end - self.start).num_milliseconds()
    }

    /// Calendar date the session started on.
    pub fn date(&self) -> NaiveDate {
        self.start.date()
    }

    /// Whether any part of the session falls on a day of `range`.
    pub fn overlaps(&self, range: DateRange) -> bool {
        range.contains(self.date()) || self.days.keys().any(|date| range.contains(*date))
    }

    /// The part of this session that lies within `range`.
    ///
    /// Start and end are clamped to the range's midnights and the totals are
    /// recomputed from the per-day breakdown, so the duration invariant holds
    /// for the clipped copy as well. `record_count` is left unchanged.
    pub fn clipped(&self, range: DateRange) -> Self {
        let mut days = self.days.clone();
        days.retain(|date, _| range.contains(*date));

        let start = midnight(range.start).map_or(self.start, |m| self.start.max(m));
        let end = range
            .end
            .succ_opt()
            .and_then(midnight)
            .map_or(self.end, |m| self.end.min(m));

        Self {
            app_name: self.app_name.clone(),
            start,
            end: end.max(start),
            active_ms: days.values().map(|d| d.active_ms).sum(),
            idle_ms: days.values().map(|d| d.idle_ms).sum(),
            record_count: self.record_count,
            days,
        }
    }
}

/// Groups records into sessions, preserving file order.
pub fn reconstruct<'a, I>(records: I, config: &SessionConfig) -> Vec<Session>
where
    I: IntoIterator<Item = &'a ActivityRecord>,
{
    let mut sessions = Vec::new();
    let mut current: Option<Session> = None;

    for record in records {
        if let Some(session) = current
            .as_mut()
            .filter(|s| s.continues_with(record, config))
        {
            session.extend(record, config);
            continue;
        }

        if let Some(done) = current.replace(Session::open(record)) {
            sessions.push(done);
        }
    }

    sessions.extend(current);
    sessions
}

/// Reconstructs sessions over the whole log and clips them to `range`.
///
/// Sessions that do not touch the range are dropped; `None` keeps everything
/// unclipped. A session that crosses midnight is returned once, carrying the
/// time it spent inside the range.
pub fn sessions_in_range(
    records: &[ActivityRecord],
    range: Option<DateRange>,
    config: &SessionConfig,
) -> Vec<Session> {
    let sessions = reconstruct(records, config);
    let sessions: Vec<Session> = match range {
        None => sessions,
        Some(range) => sessions
            .iter()
            .filter(|s| s.overlaps(range))
            .map(|s| s.clipped(range))
            .collect(),
    };

    tracing::debug!(sessions = sessions.len(), "reconstructed sessions");
    sessions
}
