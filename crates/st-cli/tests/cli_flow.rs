//! End-to-end tests driving the `screentime` binary against a temp data dir.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

fn screentime_binary() -> String {
    env!("CARGO_BIN_EXE_screentime").to_string()
}

const LOG: &str = "\
timestamp,idle_seconds,app_name,window_title
2025-01-29 09:00:00,0,Code,main.rs
2025-01-29 09:01:00,0,Code,main.rs
2025-01-29 09:02:00,0,Code,lib.rs
2025-01-29 09:03:00,0,Firefox,\"Docs, Rust\"
2025-01-29 09:05:00,0,Firefox,\"Docs, Rust\"
";

struct Env {
    temp: TempDir,
}

impl Env {
    fn new() -> Self {
        Self {
            temp: TempDir::new().unwrap(),
        }
    }

    fn with_log(contents: &str) -> Self {
        let env = Self::new();
        std::fs::create_dir_all(env.data_dir()).unwrap();
        std::fs::write(env.log_path(), contents).unwrap();
        env
    }

    fn data_dir(&self) -> PathBuf {
        self.temp.path().join("data")
    }

    fn log_path(&self) -> PathBuf {
        self.data_dir().join("activity_log.csv")
    }

    fn command(&self) -> Command {
        let mut command = Command::new(screentime_binary());
        command
            .env("HOME", self.temp.path())
            .env("XDG_CONFIG_HOME", self.temp.path().join("config"))
            .env("XDG_DATA_HOME", self.temp.path().join("share"))
            .env("SCREENTIME_LOG_PATH", self.log_path())
            .env_remove("RUST_LOG");
        command
    }

    fn run(&self, args: &[&str]) -> Output {
        self.command()
            .args(args)
            .output()
            .expect("failed to run screentime")
    }

    fn json(&self, args: &[&str]) -> serde_json::Value {
        let output = self.run(args);
        assert_success(&output);
        let mut value: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
        let object = value.as_object_mut().unwrap();
        object.remove("generated_at");
        object.remove("skipped_lines");
        value
    }
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn assert_success(output: &Output) {
    assert!(
        output.status.success(),
        "command failed: {}",
        stderr(output)
    );
}

#[test]
fn test_no_action_prints_help() {
    let env = Env::new();
    let output = env.run(&[]);

    assert_success(&output);
    assert!(stdout(&output).contains("Usage:"));
}

#[test]
fn test_today_with_missing_log() {
    let env = Env::new();
    let output = env.run(&["--today"]);

    assert_success(&output);
    assert!(stdout(&output).contains("No activity recorded for this period."));
}

#[test]
fn test_range_summary() {
    let env = Env::with_log(LOG);
    let output = env.run(&["--range", "--from", "2025-01-29", "--to", "2025-01-29"]);

    assert_success(&output);
    let out = stdout(&output);
    assert!(out.starts_with("SCREEN TIME: Wednesday, Jan 29, 2025\n"));
    assert!(out.contains("Active time:    4m"));
    assert!(out.contains("Sessions:       2"));
    assert!(out.contains("Apps used:      2"));
}

#[test]
fn test_range_requires_bounds() {
    let env = Env::with_log(LOG);
    let output = env.run(&["--range"]);

    assert!(!output.status.success());
}

#[test]
fn test_inverted_range_fails() {
    let env = Env::with_log(LOG);
    let output = env.run(&["--range", "--from", "2025-01-29", "--to", "2025-01-28"]);

    assert!(!output.status.success());
    assert!(stderr(&output).contains("before start"));
}

#[test]
fn test_actions_are_exclusive() {
    let env = Env::new();
    let output = env.run(&["--today", "--week"]);

    assert!(!output.status.success());
}

#[test]
fn test_week_json_has_seven_days() {
    let env = Env::with_log(LOG);
    let output = env.run(&["--week", "--json", "--from", "2025-01-23", "--to", "2025-01-29"]);

    assert_success(&output);
    let value: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(value["report"], "week");
    let days = value["days"].as_array().unwrap();
    assert_eq!(days.len(), 7);
    assert_eq!(days[6]["date"], "2025-01-29");
    assert_eq!(days[6]["active_ms"], 240_000);
    assert_eq!(days[0]["active_ms"], 0);
}

#[test]
fn test_apps_lists_each_app() {
    let env = Env::with_log(LOG);
    let output = env.run(&["--apps"]);

    assert_success(&output);
    let out = stdout(&output);
    assert!(out.starts_with("APP USAGE: all time\n"));
    assert!(out.contains("Code"));
    assert!(out.contains("Firefox"));
}

#[test]
fn test_malformed_lines_are_reported() {
    let env = Env::with_log(&format!("{LOG}not a timestamp,0,Code,x\n"));
    let output = env.run(&["--range", "--from", "2025-01-29", "--to", "2025-01-29"]);

    assert_success(&output);
    assert!(stdout(&output).contains("Note: skipped 1 malformed log line."));
}

#[test]
fn test_malformed_line_mid_log_matches_clean_log() {
    let damaged = LOG.replacen(
        "2025-01-29 09:02:00",
        "garbage,0,Code\n2025-01-29 09:02:00",
        1,
    );
    let clean = Env::with_log(LOG);
    let damaged = Env::with_log(&damaged);
    let range = ["--range", "--from", "2025-01-29", "--to", "2025-01-29", "--json"];

    assert_eq!(damaged.json(&range), clean.json(&range));
    assert_eq!(damaged.json(&["--apps", "--json"]), clean.json(&["--apps", "--json"]));
    let week = ["--week", "--from", "2025-01-23", "--to", "2025-01-29", "--json"];
    assert_eq!(damaged.json(&week), clean.json(&week));
}

#[test]
fn test_idle_reading_at_threshold_counts_as_idle() {
    let env = Env::with_log(
        "timestamp,idle_seconds,app_name,window_title\n\
         2025-01-29 09:00:00,300,Code,main.rs\n\
         2025-01-29 09:01:00,300,Code,main.rs\n\
         2025-01-29 09:02:00,300,Code,main.rs\n",
    );
    let value = env.json(&["--range", "--from", "2025-01-29", "--to", "2025-01-29", "--json"]);

    assert_eq!(value["total_active_ms"], 0);
    assert_eq!(value["total_idle_ms"], 120_000);
}

#[test]
fn test_session_across_midnight_is_counted_once() {
    let env = Env::with_log(
        "timestamp,idle_seconds,app_name,window_title\n\
         2025-01-28 23:59:00,0,Code,main.rs\n\
         2025-01-28 23:59:50,0,Code,main.rs\n\
         2025-01-29 00:00:40,0,Code,main.rs\n\
         2025-01-29 00:01:40,0,Code,main.rs\n",
    );

    let apps = env.json(&["--apps", "--json"]);
    assert_eq!(apps["apps"][0]["active_ms"], 160_000);
    assert_eq!(apps["apps"][0]["session_count"], 1);

    let week = env.json(&["--week", "--from", "2025-01-23", "--to", "2025-01-29", "--json"]);
    assert_eq!(week["days"][5]["active_ms"], 60_000);
    assert_eq!(week["days"][6]["active_ms"], 100_000);
}

#[test]
fn test_stop_when_not_running() {
    let env = Env::new();
    let output = env.run(&["--stop"]);

    assert_success(&output);
    assert_eq!(stdout(&output), "Tracker is not running\n");
}

#[test]
fn test_status_when_not_running() {
    let env = Env::with_log(LOG);
    let output = env.run(&["--status"]);

    assert_success(&output);
    let out = stdout(&output);
    assert!(out.starts_with("Tracker: not running\n"));
    assert!(out.contains("Records: 5"));
}

#[test]
fn test_clear_requires_yes() {
    let env = Env::with_log(LOG);
    let output = env.run(&["--clear"]);

    assert!(!output.status.success());
    assert_eq!(std::fs::read_to_string(env.log_path()).unwrap(), LOG);
}

#[test]
fn test_clear_with_yes() {
    let env = Env::with_log(LOG);
    let output = env.run(&["--clear", "--yes"]);

    assert_success(&output);
    assert_eq!(
        std::fs::read_to_string(env.log_path()).unwrap(),
        "timestamp,idle_seconds,app_name,window_title\n"
    );
}

#[test]
fn test_export_to_path() {
    let env = Env::with_log(LOG);
    let dest = env.temp.path().join("out.csv");
    let output = env.run(&["--export", dest.to_str().unwrap()]);

    assert_success(&output);
    assert!(stdout(&output).starts_with("Exported 5 records"));
    let exported = std::fs::read_to_string(&dest).unwrap();
    let mut lines = exported.lines();
    assert_eq!(
        lines.next(),
        Some("timestamp,idle_seconds,app_name,window_title,date,hour,day_of_week")
    );
    assert_eq!(
        lines.next(),
        Some("2025-01-29 09:00:00,0,Code,main.rs,2025-01-29,09,Wednesday")
    );
}

#[test]
fn test_export_default_destination() {
    let env = Env::with_log(LOG);
    let output = env.run(&["--export"]);

    assert_success(&output);
    let exports = env.data_dir().join("exports");
    let files: Vec<_> = std::fs::read_dir(&exports).unwrap().collect();
    assert_eq!(files.len(), 1);
    assert!(is_export_name(&files[0].as_ref().unwrap().path()));
}

fn is_export_name(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with("screentime_export_") && n.ends_with(".csv"))
}

#[cfg(target_os = "linux")]
mod lifecycle {
    use std::time::{Duration, Instant};

    use super::*;

    impl Env {
        /// Runs without a display so the tracker's probe fails on every tick.
        fn run_headless(&self, args: &[&str]) -> Output {
            self.command()
                .env_remove("DISPLAY")
                .env_remove("WAYLAND_DISPLAY")
                .env_remove("XDG_SESSION_TYPE")
                .env("SCREENTIME_INTERVAL_SECONDS", "1")
                .args(args)
                .output()
                .expect("failed to run screentime")
        }

        fn wait_for_status(&self, expected: &str) -> String {
            let deadline = Instant::now() + Duration::from_secs(15);
            loop {
                let out = stdout(&self.run(&["--status"]));
                if out.contains(expected) || Instant::now() > deadline {
                    return out;
                }
                std::thread::sleep(Duration::from_millis(100));
            }
        }
    }

    /// Stops a tracker left behind by a failed assertion.
    struct StopOnDrop<'a>(&'a Env);

    impl Drop for StopOnDrop<'_> {
        fn drop(&mut self) {
            let _ = self.0.run(&["--stop"]);
        }
    }

    #[test]
    fn test_tracker_lifecycle() {
        let env = Env::new();
        let _cleanup = StopOnDrop(&env);

        let output = env.run_headless(&["--start"]);
        assert_success(&output);
        let started = stdout(&output);
        let pid = started
            .lines()
            .next()
            .and_then(|l| l.strip_prefix("Tracker started (pid "))
            .and_then(|l| l.strip_suffix(')'))
            .unwrap_or_else(|| panic!("unexpected start output: {started}"))
            .to_string();

        let status = env.wait_for_status("Last probe error:");
        assert!(
            status.starts_with(&format!("Tracker: running (pid {pid})\n")),
            "{status}"
        );
        assert!(status.contains("Last probe error: probe unavailable"), "{status}");
        assert!(!status.contains("probe failures: 0"), "{status}");

        let again = env.run_headless(&["--start"]);
        assert_success(&again);
        assert_eq!(
            stdout(&again),
            format!("Tracker is already running (pid {pid})\n")
        );

        let stop = env.run(&["--stop"]);
        assert_success(&stop);
        assert_eq!(stdout(&stop), format!("Tracker stopped (pid {pid})\n"));

        let status = stdout(&env.run(&["--status"]));
        assert!(status.starts_with("Tracker: not running\n"), "{status}");
        assert!(status.contains("(stop requested)"), "{status}");

        let stop = env.run(&["--stop"]);
        assert_success(&stop);
        assert_eq!(stdout(&stop), "Tracker is not running\n");
    }
}
