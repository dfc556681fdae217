//! Linux probe.
//!
//! X11 sessions use `xprop` for the focused window and `xprintidle` (or
//! `xssstate`) for idle time. Wayland sessions ask GNOME Shell over D-Bus and
//! fall back to `swaymsg`. Screensaver state comes from `xssstate` or
//! `gnome-screensaver-command` on X11 and from `org.gnome.ScreenSaver` on
//! Wayland.

use serde_json::Value;
use st_core::{ForegroundApp, Probe, ProbeError};
use sysinfo::System;

use super::command::run_command;
use super::process_name;

const GNOME_SHELL_EVAL: [&str; 9] = [
    "call",
    "--session",
    "--dest",
    "org.gnome.Shell",
    "--object-path",
    "/org/gnome/Shell",
    "--method",
    "org.gnome.Shell.Eval",
    "",
];

const GNOME_SCREENSAVER_ACTIVE: [&str; 8] = [
    "call",
    "--session",
    "--dest",
    "org.gnome.ScreenSaver",
    "--object-path",
    "/org/gnome/ScreenSaver",
    "--method",
    "org.gnome.ScreenSaver.GetActive",
];

/// Which display server the session runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayServer {
    X11,
    Wayland,
    Unknown,
}

impl DisplayServer {
    /// Detects the display server from the session environment.
    pub fn detect(
        session_type: Option<&str>,
        wayland_display: Option<&str>,
        display: Option<&str>,
    ) -> Self {
        let set = |v: Option<&str>| v.is_some_and(|v| !v.is_empty());
        if session_type == Some("wayland") || set(wayland_display) {
            Self::Wayland
        } else if session_type == Some("x11") || set(display) {
            Self::X11
        } else {
            Self::Unknown
        }
    }
}

pub struct LinuxProbe {
    server: DisplayServer,
    system: System,
}

impl LinuxProbe {
    pub fn new(server: DisplayServer) -> Self {
        Self {
            server,
            system: System::new(),
        }
    }

    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok();
        let server = DisplayServer::detect(
            var("XDG_SESSION_TYPE").as_deref(),
            var("WAYLAND_DISPLAY").as_deref(),
            var("DISPLAY").as_deref(),
        );
        tracing::debug!(?server, "detected display server");
        Self::new(server)
    }

    fn x11_foreground(&mut self) -> Result<ForegroundApp, ProbeError> {
        let root = run_command("xprop", &["-root", "_NET_ACTIVE_WINDOW"])?;
        let window_id = parse_active_window(&root)?;
        if window_id == "0x0" {
            return Ok(ForegroundApp::new("Desktop", "Desktop"));
        }

        let title = run_command("xprop", &["-id", &window_id, "_NET_WM_NAME", "WM_NAME"])
            .ok()
            .and_then(|out| parse_xprop_string(&out))
            .unwrap_or_default();

        let app_name = run_command("xprop", &["-id", &window_id, "_NET_WM_PID"])
            .ok()
            .and_then(|out| parse_xprop_cardinal(&out))
            .and_then(|pid| process_name(&mut self.system, pid))
            .unwrap_or_else(|| "Unknown".to_string());

        Ok(ForegroundApp::new(app_name, title))
    }

    /// Evaluates `script` in GNOME Shell. Newer Shell releases refuse `Eval`
    /// unless unsafe mode is on, which shows up as a `(false, '')` reply.
    fn gnome_eval(script: &str) -> Result<String, ProbeError> {
        let mut args: [&str; 9] = GNOME_SHELL_EVAL;
        args[8] = script;
        let output = run_command("gdbus", &args)?;
        parse_gnome_eval(&output)
            .ok_or_else(|| ProbeError::Unavailable("GNOME Shell refused Eval".to_string()))
    }

    fn gnome_foreground() -> Result<ForegroundApp, ProbeError> {
        let app_name = Self::gnome_eval("global.display.focus_window.get_wm_class()")?;
        let title =
            Self::gnome_eval("global.display.focus_window.get_title()").unwrap_or_default();
        Ok(ForegroundApp::new(app_name, title))
    }

    fn sway_foreground() -> Result<ForegroundApp, ProbeError> {
        let tree = run_command("swaymsg", &["-t", "get_tree"])?;
        let tree: Value =
            serde_json::from_str(&tree).map_err(|e| ProbeError::Parse(e.to_string()))?;
        focused_sway_window(&tree)
            .ok_or_else(|| ProbeError::Parse("no focused window in sway tree".to_string()))
    }
}

impl Probe for LinuxProbe {
    fn foreground_app(&mut self) -> Result<ForegroundApp, ProbeError> {
        match self.server {
            DisplayServer::X11 => self.x11_foreground(),
            DisplayServer::Wayland => Self::gnome_foreground().or_else(|e| {
                tracing::trace!(error = %e, "GNOME Shell unavailable, trying sway");
                Self::sway_foreground()
            }),
            DisplayServer::Unknown => Err(no_display()),
        }
    }

    fn idle_seconds(&mut self) -> Result<f64, ProbeError> {
        match self.server {
            DisplayServer::X11 => run_command("xprintidle", &[])
                .or_else(|e| {
                    tracing::trace!(error = %e, "xprintidle failed, trying xssstate");
                    run_command("xssstate", &["-i"])
                })
                .and_then(|out| parse_idle_millis(&out)),
            // Wayland exposes no idle time to ordinary clients.
            DisplayServer::Wayland => Ok(0.0),
            DisplayServer::Unknown => Err(no_display()),
        }
    }

    fn screen_locked(&mut self) -> Result<bool, ProbeError> {
        match self.server {
            DisplayServer::X11 => run_command("xssstate", &["-s"])
                .and_then(|out| parsed("xssstate", &out, parse_xssstate))
                .or_else(|_| {
                    run_command("gnome-screensaver-command", &["-q"]).and_then(|out| {
                        parsed("gnome-screensaver-command", &out, parse_screensaver_query)
                    })
                }),
            DisplayServer::Wayland => run_command("gdbus", &GNOME_SCREENSAVER_ACTIVE)
                .and_then(|out| parsed("gdbus", &out, parse_gdbus_bool)),
            DisplayServer::Unknown => Ok(false),
        }
    }
}

fn parsed<T>(
    program: &str,
    output: &str,
    parse: fn(&str) -> Option<T>,
) -> Result<T, ProbeError> {
    parse(output).ok_or_else(|| {
        ProbeError::Parse(format!("unexpected {program} output: {}", output.trim()))
    })
}

fn no_display() -> ProbeError {
    ProbeError::Unavailable("no display server (DISPLAY and WAYLAND_DISPLAY unset)".to_string())
}

/// Extracts the window id from `_NET_ACTIVE_WINDOW(WINDOW): window id # 0x3a00007`.
fn parse_active_window(output: &str) -> Result<String, ProbeError> {
    output
        .split_whitespace()
        .last()
        .filter(|id| id.starts_with("0x"))
        .map(|id| id.trim_end_matches(',').to_string())
        .ok_or_else(|| ProbeError::Parse(format!("unexpected xprop output: {}", output.trim())))
}

/// First quoted property value, e.g. from `_NET_WM_NAME(UTF8_STRING) = "title"`.
fn parse_xprop_string(output: &str) -> Option<String> {
    output.lines().find_map(|line| {
        let (_, value) = line.split_once(" = ")?;
        let value = value.trim().strip_prefix('"')?.strip_suffix('"')?;
        Some(value.replace("\\\"", "\"").replace("\\\\", "\\"))
    })
}

/// Numeric property value, e.g. from `_NET_WM_PID(CARDINAL) = 4242`.
fn parse_xprop_cardinal(output: &str) -> Option<u32> {
    output
        .lines()
        .find_map(|line| line.split_once(" = ")?.1.trim().parse().ok())
}

/// `xprintidle` and `xssstate -i` both print idle milliseconds.
#[allow(clippy::cast_precision_loss)]
fn parse_idle_millis(output: &str) -> Result<f64, ProbeError> {
    let ms: u64 = output
        .trim()
        .parse()
        .map_err(|_| ProbeError::Parse(format!("unexpected idle time output: {}", output.trim())))?;
    Ok(ms as f64 / 1000.0)
}

/// `xssstate -s` prints `on`, `off` or `disabled`.
fn parse_xssstate(output: &str) -> Option<bool> {
    match output.trim() {
        "on" => Some(true),
        "off" | "disabled" => Some(false),
        _ => None,
    }
}

/// First line of `gnome-screensaver-command -q`, e.g. `The screensaver is active`.
fn parse_screensaver_query(output: &str) -> Option<bool> {
    let line = output.lines().next()?.trim();
    if line.ends_with("is inactive") {
        Some(false)
    } else if line.ends_with("is active") {
        Some(true)
    } else {
        None
    }
}

/// A single boolean D-Bus reply as printed by `gdbus`: `(true,)`.
fn parse_gdbus_bool(output: &str) -> Option<bool> {
    match output.trim() {
        "(true,)" => Some(true),
        "(false,)" => Some(false),
        _ => None,
    }
}

/// `Shell.Eval` replies `(true, '"firefox"')`: a success flag and the result
/// as JSON. Returns the string result, or `None` on failure or a non-string.
fn parse_gnome_eval(output: &str) -> Option<String> {
    let inner = output.trim().strip_prefix('(')?.strip_suffix(')')?;
    let (ok, value) = inner.split_once(", ")?;
    if ok != "true" {
        return None;
    }
    let json = value.trim().strip_prefix('\'')?.strip_suffix('\'')?;
    match serde_json::from_str(json).ok()? {
        Value::String(s) if !s.is_empty() => Some(s),
        _ => None,
    }
}

/// Depth-first search for the focused node of a `swaymsg -t get_tree` dump.
fn focused_sway_window(node: &Value) -> Option<ForegroundApp> {
    if node.get("focused").and_then(Value::as_bool) == Some(true) {
        let app_name = node
            .get("app_id")
            .and_then(Value::as_str)
            .or_else(|| node.pointer("/window_properties/class").and_then(Value::as_str))
            .unwrap_or("Unknown");
        let title = node.get("name").and_then(Value::as_str).unwrap_or_default();
        return Some(ForegroundApp::new(app_name, title));
    }

    ["nodes", "floating_nodes"]
        .iter()
        .filter_map(|key| node.get(*key).and_then(Value::as_array))
        .flatten()
        .find_map(focused_sway_window)
}
