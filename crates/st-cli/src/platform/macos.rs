//! macOS probe: AppleScript for the frontmost app, `ioreg` for idle time,
//! `pgrep` for a running screensaver.

use st_core::{ForegroundApp, Probe, ProbeError};

use super::command::run_command;

const FRONTMOST_SCRIPT: &str = r#"
tell application "System Events"
    set frontProc to first application process whose frontmost is true
    set appName to name of frontProc
    set windowTitle to ""
    try
        set windowTitle to name of front window of frontProc
    end try
    return appName & linefeed & windowTitle
end tell
"#;

#[derive(Debug, Default)]
pub struct MacProbe;

impl MacProbe {
    pub const fn new() -> Self {
        Self
    }
}

impl Probe for MacProbe {
    fn foreground_app(&mut self) -> Result<ForegroundApp, ProbeError> {
        let output = run_command("osascript", &["-e", FRONTMOST_SCRIPT]).map_err(|e| match e {
            ProbeError::Command { message, .. } if is_permission_error(&message) => {
                ProbeError::PermissionDenied(
                    "grant Accessibility access to the terminal running screentime".to_string(),
                )
            }
            other => other,
        })?;
        parse_frontmost(&output)
    }

    fn idle_seconds(&mut self) -> Result<f64, ProbeError> {
        parse_hid_idle_time(&run_command("ioreg", &["-c", "IOHIDSystem"])?)
    }

    fn screen_locked(&mut self) -> Result<bool, ProbeError> {
        screensaver_running(run_command("pgrep", &["-x", "ScreenSaverEngine"]))
    }
}

/// `pgrep` exits non-zero when nothing matches.
fn screensaver_running(result: Result<String, ProbeError>) -> Result<bool, ProbeError> {
    match result {
        Ok(_) => Ok(true),
        Err(ProbeError::Command { message, .. }) if !message.starts_with("timed out") => Ok(false),
        Err(e) => Err(e),
    }
}

fn is_permission_error(message: &str) -> bool {
    message.contains("assistive access") || message.contains("(-1743)") || message.contains("(-25211)")
}

/// Splits the script output into app name and window title.
fn parse_frontmost(output: &str) -> Result<ForegroundApp, ProbeError> {
    let output = output.trim_end_matches(['\r', '\n']);
    let (app_name, title) = output.split_once('\n').unwrap_or((output, ""));
    let app_name = app_name.trim();
    if app_name.is_empty() {
        return Err(ProbeError::Parse("osascript returned no application".to_string()));
    }
    Ok(ForegroundApp::new(app_name, title.trim()))
}

/// Reads `"HIDIdleTime" = <nanoseconds>` from `ioreg` output.
#[allow(clippy::cast_precision_loss)]
fn parse_hid_idle_time(output: &str) -> Result<f64, ProbeError> {
    let nanos: u64 = output
        .lines()
        .filter(|line| line.contains("HIDIdleTime"))
        .find_map(|line| line.split_once('=')?.1.trim().parse().ok())
        .ok_or_else(|| ProbeError::Parse("HIDIdleTime missing from ioreg output".to_string()))?;
    Ok(nanos as f64 / 1_000_000_000.0)
}
