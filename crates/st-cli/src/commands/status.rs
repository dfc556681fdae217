//! Status command: whether the tracker runs, its counters and log freshness.

use std::fmt::Write as _;
use std::io::Write;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDateTime};
use st_core::LogContents;
use st_store::{LockState, TrackerState};

use super::report::format_duration;
use crate::Config;

/// Everything the status screen shows, gathered up front.
pub struct StatusView<'a> {
    pub config: &'a Config,
    pub lock: LockState,
    pub state: Option<TrackerState>,
    pub log: &'a LogContents,
    pub now: NaiveDateTime,
}

fn ago(from: NaiveDateTime, now: NaiveDateTime) -> String {
    let ms = (now - from).num_milliseconds();
    if ms < 60_000 {
        "just now".to_string()
    } else {
        format!("{} ago", format_duration(ms))
    }
}

pub fn render(view: &StatusView<'_>) -> String {
    let mut output = String::new();

    match view.lock {
        LockState::Held { pid: Some(pid) } => {
            writeln!(output, "Tracker: running (pid {pid})").unwrap();
        }
        LockState::Held { pid: None } => writeln!(output, "Tracker: running (pid unknown)").unwrap(),
        LockState::Free => writeln!(output, "Tracker: not running").unwrap(),
    }
    writeln!(output, "Log: {}", view.config.log_path.display()).unwrap();

    match view.log.records.last() {
        Some(last) => writeln!(
            output,
            "Last record: {} ({}) {}",
            last.timestamp_string(),
            ago(last.timestamp, view.now),
            last.app_name
        )
        .unwrap(),
        None => writeln!(output, "Last record: none").unwrap(),
    }
    writeln!(output, "Records: {}", view.log.records.len()).unwrap();
    if view.log.skipped_lines > 0 {
        writeln!(output, "Malformed lines: {}", view.log.skipped_lines).unwrap();
    }

    let Some(state) = &view.state else {
        return output;
    };

    let stats = &state.stats;
    writeln!(output).unwrap();
    writeln!(
        output,
        "Session: pid {} since {}",
        state.pid,
        state.started_at.format("%Y-%m-%d %H:%M:%S")
    )
    .unwrap();
    writeln!(
        output,
        "Ticks: {}  written: {}  skipped idle: {}  probe failures: {}",
        stats.ticks, stats.records_written, stats.skipped_idle, stats.probe_failures
    )
    .unwrap();
    if let Some(last_tick) = stats.last_tick_at {
        writeln!(output, "Last tick: {}", ago(last_tick, view.now)).unwrap();
    }
    if let Some(error) = &stats.last_probe_error {
        writeln!(output, "Last probe error: {error}").unwrap();
    }
    if let Some(stopped_at) = state.stopped_at {
        let reason = state.stop_reason.as_deref().unwrap_or("unknown");
        writeln!(
            output,
            "Stopped: {} ({reason})",
            stopped_at.format("%Y-%m-%d %H:%M:%S")
        )
        .unwrap();
    }

    output
}

pub fn run<W: Write>(writer: &mut W, config: &Config) -> Result<()> {
    let dir = config.data_dir();
    let lock = st_store::lock_state(&dir).context("failed to probe tracker lock")?;
    let state = TrackerState::load(&dir).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "ignoring unreadable tracker state");
        None
    });
    let log = st_store::read_log(&config.log_path)
        .with_context(|| format!("failed to read {}", config.log_path.display()))?;

    let view = StatusView {
        config,
        lock,
        state,
        log: &log,
        now: Local::now().naive_local(),
    };
    write!(writer, "{}", render(&view))?;
    Ok(())
}
