//! Running external helper programs with a deadline.

use std::io::{self, Read};
use std::process::{Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use st_core::ProbeError;

/// Helpers still running after this long are killed.
pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(5);

const WAIT_POLL: Duration = Duration::from_millis(20);

/// Runs a helper program and returns its stdout, decoded lossily.
pub fn run_command(program: &str, args: &[&str]) -> Result<String, ProbeError> {
    run_command_with_timeout(program, args, COMMAND_TIMEOUT)
}

fn spawn_error(program: &str, e: &io::Error) -> ProbeError {
    match e.kind() {
        io::ErrorKind::NotFound => ProbeError::Unavailable(format!("`{program}` not found")),
        io::ErrorKind::PermissionDenied => {
            ProbeError::PermissionDenied(format!("cannot execute `{program}`"))
        }
        _ => ProbeError::Command {
            command: program.to_string(),
            message: e.to_string(),
        },
    }
}

/// Reads a pipe to the end on its own thread so the child never blocks on a
/// full pipe while we wait for it.
fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            if let Err(e) = pipe.read_to_end(&mut buf) {
                tracing::debug!(error = %e, "failed to read helper output");
            }
        }
        buf
    })
}

pub(super) fn run_command_with_timeout(
    program: &str,
    args: &[&str],
    timeout: Duration,
) -> Result<String, ProbeError> {
    let command_error = |message: String| ProbeError::Command {
        command: program.to_string(),
        message,
    };

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| spawn_error(program, &e))?;
    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let started = Instant::now();
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) if started.elapsed() >= timeout => {
                if let Err(e) = child.kill().and_then(|()| child.wait().map(drop)) {
                    tracing::debug!(program, error = %e, "failed to kill timed out helper");
                }
                return Err(command_error(format!("timed out after {timeout:?}")));
            }
            Ok(None) => thread::sleep(WAIT_POLL),
            Err(e) => return Err(command_error(e.to_string())),
        }
    };

    let stdout = stdout.join().unwrap_or_default();
    if !status.success() {
        let stderr = stderr.join().unwrap_or_default();
        return Err(command_error(format!(
            "{status}: {}",
            String::from_utf8_lossy(&stderr).trim()
        )));
    }

    Ok(String::from_utf8_lossy(&stdout).into_owned())
}
