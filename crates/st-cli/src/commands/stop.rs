//! `--stop`: ask the running tracker to exit and wait for its lock.
//!
//! The request goes through the stop file the tracker polls, so the sampler
//! finishes its current tick and records why it stopped. Signals are only a
//! fallback for a tracker that does not answer.

use std::io::Write;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use st_store::LockState;
use sysinfo::{Pid, ProcessesToUpdate, Signal, System};

use super::util::poll_until;
use crate::Config;

/// How long the tracker gets to honour a stop request.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// How long to wait after signalling an unresponsive tracker.
const KILL_TIMEOUT: Duration = Duration::from_secs(5);

/// Sends a terminate request, falling back to a hard kill where the
/// platform has no SIGTERM.
fn terminate(pid: u32) -> Result<()> {
    let pid = Pid::from_u32(pid);
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::Some(&[pid]));

    let Some(process) = system.process(pid) else {
        anyhow::bail!("tracker process {pid} not found");
    };

    let sent = process.kill_with(Signal::Term).unwrap_or_else(|| {
        tracing::debug!(%pid, "SIGTERM unsupported, killing");
        process.kill()
    });
    if !sent {
        anyhow::bail!("failed to signal tracker process {pid}");
    }
    Ok(())
}

fn wait_for_release(dir: &Path, timeout: Duration) -> Result<bool> {
    poll_until(timeout, || {
        Ok(st_store::lock_state(dir)? == LockState::Free)
    })
}

pub fn run<W: Write>(writer: &mut W, config: &Config) -> Result<()> {
    let dir = config.data_dir();
    let LockState::Held { pid } = st_store::lock_state(&dir)? else {
        writeln!(writer, "Tracker is not running")?;
        return Ok(());
    };

    st_store::request_stop(&dir).context("failed to request tracker stop")?;
    tracing::info!(?pid, "requested tracker stop");

    if !wait_for_release(&dir, SHUTDOWN_TIMEOUT)? {
        let Some(pid) = pid else {
            anyhow::bail!(
                "tracker did not exit within {}s and its pid is unknown",
                SHUTDOWN_TIMEOUT.as_secs()
            );
        };
        tracing::warn!(pid, "tracker ignored stop request, signalling it");
        terminate(pid).with_context(|| format!("failed to stop tracker (pid {pid})"))?;
        if !wait_for_release(&dir, KILL_TIMEOUT)? {
            anyhow::bail!(
                "tracker (pid {pid}) did not exit within {}s",
                (SHUTDOWN_TIMEOUT + KILL_TIMEOUT).as_secs()
            );
        }
    }

    match pid {
        Some(pid) => writeln!(writer, "Tracker stopped (pid {pid})")?,
        None => writeln!(writer, "Tracker stopped")?,
    }
    Ok(())
}
