//! `--track`: run the sampler in the foreground until signalled.
//!
//! This is what `--start` launches in the background. It owns the tracker
//! guard for its whole lifetime and keeps `tracker_state.json` current.
//! Besides Ctrl-C and SIGTERM it watches for the stop request `--stop` leaves
//! in the data directory.

use std::cell::Cell;
use std::io::Write;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Local;
use st_core::Sampler;
use st_store::{EventLog, GuardError, ProcessGuard, TrackerState};

use crate::Config;
use crate::platform;

const STOP_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Resolves once a stop request shows up in `dir`, consuming it.
async fn stop_requested(dir: &Path) {
    let mut poll = tokio::time::interval(STOP_POLL_INTERVAL);
    loop {
        poll.tick().await;
        match st_store::take_stop_request(dir) {
            Ok(true) => return,
            Ok(false) => {}
            Err(e) => tracing::warn!(error = %e, "failed to check for stop request"),
        }
    }
}

/// Resolves on Ctrl-C, SIGTERM on Unix, or a stop request, recording which.
async fn shutdown_signal(dir: &Path, reason: &Cell<&'static str>) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => reason.set("interrupted"),
        () = terminate => reason.set("terminated"),
        () = stop_requested(dir) => reason.set("stop requested"),
    }
}

fn save_state(state: &TrackerState, dir: &Path) {
    if let Err(e) = state.save(dir) {
        tracing::warn!(error = %e, "failed to write tracker state");
    }
}

pub fn run<W: Write>(writer: &mut W, config: &Config) -> Result<()> {
    let dir = config.data_dir();
    let guard = match ProcessGuard::acquire(&dir) {
        Ok(guard) => guard,
        Err(GuardError::AlreadyRunning { pid }) => {
            match pid {
                Some(pid) => writeln!(writer, "Tracker is already running (pid {pid})")?,
                None => writeln!(writer, "Tracker is already running")?,
            }
            return Ok(());
        }
        Err(e) => return Err(e).context("failed to acquire tracker lock"),
    };

    let log = EventLog::open(&config.log_path)
        .with_context(|| format!("failed to open {}", config.log_path.display()))?;
    let mut sampler = Sampler::new(platform::native_probe(), log, config.sampler_config());

    let mut state = TrackerState::new(guard.pid(), Local::now().naive_local());
    save_state(&state, &dir);
    writeln!(
        writer,
        "Tracking to {} every {}s (pid {})",
        config.log_path.display(),
        config.interval_seconds,
        guard.pid()
    )?;
    writer.flush()?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;

    let reason = Cell::new("unknown");
    let result = runtime.block_on(sampler.run(shutdown_signal(&dir, &reason), |stats| {
        state.stats = stats.clone();
        save_state(&state, &dir);
    }));

    state.stopped_at = Some(Local::now().naive_local());
    let outcome = match result {
        Ok(stats) => {
            state.stats = stats;
            state.stop_reason = Some(reason.get().to_string());
            Ok(())
        }
        Err(e) => {
            tracing::error!(error = %e, "sampler stopped");
            state.stop_reason = Some(e.to_string());
            Err(e)
        }
    };
    save_state(&state, &dir);
    guard.release().context("failed to release tracker lock")?;

    outcome.context("tracker stopped")?;
    writeln!(
        writer,
        "Tracker stopped after {} ticks ({} records)",
        state.stats.ticks, state.stats.records_written
    )?;
    Ok(())
}
