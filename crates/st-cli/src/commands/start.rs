//! `--start`: launch `screentime --track` in the background.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::Duration;

use anyhow::{Context, Result};
use st_store::LockState;

use super::util::poll_until;
use crate::Config;

/// Output of the background tracker.
pub const TRACKER_LOG: &str = "tracker.log";

/// How long to wait for the tracker to take the lock.
const STARTUP_TIMEOUT: Duration = Duration::from_secs(5);

pub fn tracker_log_path(config: &Config) -> PathBuf {
    config.data_dir().join(TRACKER_LOG)
}

fn tracker_command(exe: &Path, config_path: Option<&Path>) -> Command {
    let mut command = Command::new(exe);
    command.arg("--track");
    if let Some(path) = config_path {
        command.arg("--config").arg(path);
    }
    detach(&mut command);
    command
}

#[cfg(unix)]
fn detach(command: &mut Command) {
    use std::os::unix::process::CommandExt;
    // New process group: a Ctrl-C in the launching terminal does not reach it.
    command.process_group(0);
}

#[cfg(windows)]
fn detach(command: &mut Command) {
    use std::os::windows::process::CommandExt;
    const DETACHED_PROCESS: u32 = 0x0000_0008;
    const CREATE_NO_WINDOW: u32 = 0x0800_0000;
    command.creation_flags(DETACHED_PROCESS | CREATE_NO_WINDOW);
}

#[cfg(not(any(unix, windows)))]
fn detach(_command: &mut Command) {}

fn spawn_tracker(config: &Config, config_path: Option<&Path>) -> Result<Child> {
    let dir = config.data_dir();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create {}", dir.display()))?;

    let log_path = tracker_log_path(config);
    let log = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("failed to open {}", log_path.display()))?;
    let stderr = log.try_clone().context("failed to duplicate tracker log handle")?;

    let exe = std::env::current_exe().context("failed to locate the screentime executable")?;
    tracing::debug!(exe = %exe.display(), log = %log_path.display(), "spawning tracker");

    tracker_command(&exe, config_path)
        .stdin(Stdio::null())
        .stdout(log)
        .stderr(stderr)
        .spawn()
        .with_context(|| format!("failed to spawn {}", exe.display()))
}

pub fn run<W: Write>(writer: &mut W, config: &Config, config_path: Option<&Path>) -> Result<()> {
    let dir = config.data_dir();
    if let LockState::Held { pid } = st_store::lock_state(&dir)? {
        match pid {
            Some(pid) => writeln!(writer, "Tracker is already running (pid {pid})")?,
            None => writeln!(writer, "Tracker is already running")?,
        }
        return Ok(());
    }

    let mut child = spawn_tracker(config, config_path)?;
    let log_path = tracker_log_path(config);

    let mut exited = None;
    let started = poll_until(STARTUP_TIMEOUT, || {
        if matches!(st_store::lock_state(&dir)?, LockState::Held { .. }) {
            return Ok(true);
        }
        exited = child.try_wait().context("failed to poll tracker process")?;
        Ok(exited.is_some())
    })?;

    if let Some(status) = exited {
        anyhow::bail!(
            "tracker exited during startup ({status}); see {}",
            log_path.display()
        );
    }
    if !started {
        anyhow::bail!(
            "tracker did not start within {}s; see {}",
            STARTUP_TIMEOUT.as_secs(),
            log_path.display()
        );
    }

    writeln!(writer, "Tracker started (pid {})", child.id())?;
    writeln!(writer, "Logging to {}", config.log_path.display())?;
    Ok(())
}
