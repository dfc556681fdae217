//! Single-instance guard for the tracker process.
//!
//! The guard is an OS advisory lock on `tracker.lock` plus a `tracker.pid`
//! file naming the holder. The lock dies with the process, so a crashed
//! tracker never blocks the next start; the PID file is only trusted while
//! the lock is held.
//!
//! `tracker.stop` is a stop request: `--stop` creates it and the running
//! tracker removes it and shuts down cleanly. It works the same on every
//! platform, unlike signals.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use thiserror::Error;

pub const LOCK_FILE: &str = "tracker.lock";
pub const PID_FILE: &str = "tracker.pid";
pub const STOP_FILE: &str = "tracker.stop";

#[derive(Debug, Error)]
pub enum GuardError {
    /// Another tracker holds the lock.
    #[error(
        "tracker is already running{}",
        .pid.map_or_else(String::new, |pid| format!(" (pid {pid})"))
    )]
    AlreadyRunning { pid: Option<u32> },

    #[error("failed to {action} {}: {source}", .path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

fn io_error(action: &'static str, path: &Path) -> impl FnOnce(io::Error) -> GuardError {
    let path = path.to_path_buf();
    move |source| GuardError::Io {
        action,
        path,
        source,
    }
}

/// Whether a tracker currently holds the lock in a data directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    Free,
    /// Held; `pid` is `None` when the PID file is missing or unreadable.
    Held { pid: Option<u32> },
}

pub fn lock_path(dir: &Path) -> PathBuf {
    dir.join(LOCK_FILE)
}

pub fn pid_path(dir: &Path) -> PathBuf {
    dir.join(PID_FILE)
}

pub fn stop_path(dir: &Path) -> PathBuf {
    dir.join(STOP_FILE)
}

/// Asks the tracker running in `dir` to shut down.
pub fn request_stop(dir: &Path) -> Result<(), GuardError> {
    fs::create_dir_all(dir).map_err(io_error("create directory", dir))?;
    let path = stop_path(dir);
    fs::write(&path, std::process::id().to_string()).map_err(io_error("write", &path))?;
    tracing::debug!(path = %path.display(), "stop requested");
    Ok(())
}

/// Consumes a pending stop request, returning whether there was one.
pub fn take_stop_request(dir: &Path) -> Result<bool, GuardError> {
    let path = stop_path(dir);
    match fs::remove_file(&path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(io_error("remove", &path)(e)),
    }
}

fn read_pid(dir: &Path) -> Option<u32> {
    fs::read_to_string(pid_path(dir))
        .ok()
        .and_then(|s| s.trim().parse().ok())
}

fn is_contended(err: &io::Error) -> bool {
    err.kind() == fs2::lock_contended_error().kind()
}

/// Exclusive ownership of the tracker role. Dropping it releases the lock.
#[derive(Debug)]
pub struct ProcessGuard {
    file: File,
    dir: PathBuf,
    pid: u32,
}

impl ProcessGuard {
    /// Takes the lock without blocking and records this process's PID.
    pub fn acquire(dir: &Path) -> Result<Self, GuardError> {
        fs::create_dir_all(dir).map_err(io_error("create directory", dir))?;

        let path = lock_path(dir);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(io_error("open", &path))?;

        if let Err(e) = file.try_lock_exclusive() {
            if is_contended(&e) {
                return Err(GuardError::AlreadyRunning { pid: read_pid(dir) });
            }
            return Err(io_error("lock", &path)(e));
        }

        let pid = std::process::id();
        let pid_file = pid_path(dir);
        fs::write(&pid_file, pid.to_string()).map_err(io_error("write", &pid_file))?;

        // A request left over from a tracker that was killed is not for us.
        if take_stop_request(dir)? {
            tracing::debug!("discarded stale stop request");
        }

        tracing::info!(pid, dir = %dir.display(), "acquired tracker guard");
        Ok(Self {
            file,
            dir: dir.to_path_buf(),
            pid,
        })
    }

    pub const fn pid(&self) -> u32 {
        self.pid
    }

    /// Removes the PID file and unlocks.
    pub fn release(self) -> Result<(), GuardError> {
        let pid_file = pid_path(&self.dir);
        match fs::remove_file(&pid_file) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(io_error("remove", &pid_file)(e)),
        }
        self.file
            .unlock()
            .map_err(io_error("unlock", &lock_path(&self.dir)))?;
        tracing::info!(pid = self.pid, "released tracker guard");
        Ok(())
    }
}

/// Probes the lock without keeping it.
pub fn lock_state(dir: &Path) -> Result<LockState, GuardError> {
    let path = lock_path(dir);
    let file = match OpenOptions::new().read(true).write(true).open(&path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(LockState::Free),
        Err(e) => return Err(io_error("open", &path)(e)),
    };

    match file.try_lock_exclusive() {
        Ok(()) => {
            file.unlock().map_err(io_error("unlock", &path))?;
            Ok(LockState::Free)
        }
        Err(e) if is_contended(&e) => Ok(LockState::Held { pid: read_pid(dir) }),
        Err(e) => Err(io_error("lock", &path)(e)),
    }
}

/// PID of the running tracker, if one holds the lock and its PID is known.
pub fn running_pid(dir: &Path) -> Option<u32> {
    match lock_state(dir) {
        Ok(LockState::Held { pid }) => pid,
        Ok(LockState::Free) => None,
        Err(e) => {
            tracing::warn!(error = %e, "failed to probe tracker lock");
            None
        }
    }
}
