//! Report commands: `--today`, `--range`, `--week`, `--apps` and
//! `--productivity`, in human-readable or JSON form.

use std::fmt::Write as _;
use std::io::Write;

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use serde::Serialize;
use st_core::{
    AppUsageReport, DateRange, LogContents, ProductivityReport, Summary, WeeklyReport,
};

use crate::Config;

/// Which report to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportKind {
    Today,
    Range,
    Week,
    Apps,
    Productivity,
}

// ========== Formatting Helpers ==========

/// Formats milliseconds as duration string.
/// Returns "Xh Ym" if >= 1 hour, "Xm" if < 1 hour.
/// Negative durations are treated as 0m.
pub fn format_duration(ms: i64) -> String {
    if ms < 0 {
        return "0m".to_string();
    }
    let total_minutes = ms / 60_000;
    let hours = total_minutes / 60;
    let minutes = total_minutes % 60;

    if hours >= 1 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}

/// Generates a 10-character progress bar.
/// Values <5% of max get a single block for visibility.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn progress_bar(value: i64, max: i64) -> String {
    if max <= 0 || value <= 0 {
        return "░".repeat(10);
    }

    let ratio = value as f64 / max as f64;
    let filled = if ratio < 0.05 {
        1
    } else {
        (ratio * 10.0).round().min(10.0) as usize
    };

    format!("{}{}", "█".repeat(filled), "░".repeat(10 - filled))
}

/// Pads or truncates a name to `width` characters.
fn fit(name: &str, width: usize) -> String {
    if name.chars().count() > width {
        let truncated: String = name.chars().take(width - 1).collect();
        format!("{truncated}…")
    } else {
        format!("{name:<width$}")
    }
}

fn describe_range(range: &DateRange) -> String {
    if range.start == range.end {
        range.start.format("%A, %b %-d, %Y").to_string()
    } else {
        range.to_string()
    }
}

fn write_skipped_note(output: &mut String, skipped: usize) {
    if skipped > 0 {
        let plural = if skipped == 1 { "" } else { "s" };
        writeln!(output).unwrap();
        writeln!(output, "Note: skipped {skipped} malformed log line{plural}.").unwrap();
    }
}

fn write_empty(output: &mut String) {
    writeln!(output).unwrap();
    writeln!(output, "No activity recorded for this period.").unwrap();
    writeln!(output).unwrap();
    writeln!(output, "Hint: Run 'screentime --start' to begin tracking.").unwrap();
}

// ========== Human-readable Reports ==========

/// Formats today's summary or a custom-range summary.
pub fn format_summary(summary: &Summary) -> String {
    let mut output = String::new();
    writeln!(output, "SCREEN TIME: {}", describe_range(&summary.range)).unwrap();

    if summary.session_count == 0 {
        write_empty(&mut output);
        write_skipped_note(&mut output, summary.skipped_lines);
        return output;
    }

    writeln!(output).unwrap();
    writeln!(output, "Active time:    {}", format_duration(summary.total_active_ms)).unwrap();
    writeln!(output, "Idle time:      {}", format_duration(summary.total_idle_ms)).unwrap();
    writeln!(output, "Sessions:       {}", summary.session_count).unwrap();
    writeln!(output, "Apps used:      {}", summary.app_count).unwrap();
    if summary.days > 1 {
        writeln!(output, "Days:           {}", summary.days).unwrap();
        writeln!(
            output,
            "Daily average:  {}",
            format_duration(summary.daily_average_ms)
        )
        .unwrap();
    }

    if !summary.top_apps.is_empty() {
        let max = summary.top_apps[0].active_ms;
        writeln!(output).unwrap();
        writeln!(output, "TOP APPS").unwrap();
        writeln!(output, "────────").unwrap();
        for app in &summary.top_apps {
            writeln!(
                output,
                "{} {:>7}  {}",
                fit(&app.app_name, 24),
                format_duration(app.active_ms),
                progress_bar(app.active_ms, max)
            )
            .unwrap();
        }
    }

    write_skipped_note(&mut output, summary.skipped_lines);
    output
}

/// Formats the day-by-day weekly report.
pub fn format_weekly(report: &WeeklyReport) -> String {
    let mut output = String::new();
    writeln!(output, "WEEKLY REPORT: {}", report.range).unwrap();
    writeln!(output).unwrap();

    let max = report.days.iter().map(|d| d.active_ms).max().unwrap_or(0);
    for day in &report.days {
        let apps = if day.app_count == 1 { "app" } else { "apps" };
        writeln!(
            output,
            "{}  {:>7}  {}  {} {apps}",
            day.date.format("%a %b %d"),
            format_duration(day.active_ms),
            progress_bar(day.active_ms, max),
            day.app_count
        )
        .unwrap();
    }

    writeln!(output).unwrap();
    writeln!(output, "Total active:   {}", format_duration(report.total_active_ms)).unwrap();
    writeln!(
        output,
        "Daily average:  {}",
        format_duration(report.daily_average_ms)
    )
    .unwrap();

    write_skipped_note(&mut output, report.skipped_lines);
    output
}

/// Formats per-application usage.
pub fn format_apps(report: &AppUsageReport) -> String {
    let mut output = String::new();
    let period = report
        .range
        .as_ref()
        .map_or_else(|| "all time".to_string(), describe_range);
    writeln!(output, "APP USAGE: {period}").unwrap();

    if report.apps.is_empty() {
        write_empty(&mut output);
        write_skipped_note(&mut output, report.skipped_lines);
        return output;
    }

    writeln!(output).unwrap();
    writeln!(
        output,
        "{} {:>7}  {:>7}  {:>8}  LAST USED",
        fit("APP", 24),
        "ACTIVE",
        "IDLE",
        "SESSIONS"
    )
    .unwrap();
    for app in &report.apps {
        writeln!(
            output,
            "{} {:>7}  {:>7}  {:>8}  {}",
            fit(&app.app_name, 24),
            format_duration(app.active_ms),
            format_duration(app.idle_ms),
            app.session_count,
            app.last_used.format("%Y-%m-%d %H:%M")
        )
        .unwrap();
    }

    write_skipped_note(&mut output, report.skipped_lines);
    output
}

/// Formats the productivity breakdown.
pub fn format_productivity(report: &ProductivityReport) -> String {
    let mut output = String::new();
    writeln!(output, "PRODUCTIVITY: {}", describe_range(&report.range)).unwrap();

    if report.total_active_ms == 0 {
        write_empty(&mut output);
        write_skipped_note(&mut output, report.skipped_lines);
        return output;
    }

    writeln!(output).unwrap();
    for share in &report.shares {
        writeln!(
            output,
            "{} {:>7}  {:>5.1}%  {}",
            fit(share.category.label(), 22),
            format_duration(share.active_ms),
            share.percent,
            progress_bar(share.active_ms, report.total_active_ms)
        )
        .unwrap();
    }

    writeln!(output).unwrap();
    writeln!(
        output,
        "Productivity score: {:.1}% ({})",
        report.score,
        report.rating.label()
    )
    .unwrap();

    write_skipped_note(&mut output, report.skipped_lines);
    output
}

// ========== JSON Output ==========

/// JSON envelope shared by all reports.
#[derive(Debug, Serialize)]
pub struct JsonReport<'a, T: Serialize> {
    pub generated_at: String,
    pub timezone: String,
    pub report: ReportKind,
    #[serde(flatten)]
    pub data: &'a T,
}

/// Formats a report as pretty JSON.
pub fn format_json<T: Serialize>(
    kind: ReportKind,
    data: &T,
    generated_at: DateTime<Local>,
) -> Result<String> {
    let timezone = iana_time_zone::get_timezone().unwrap_or_else(|_| "UTC".to_string());
    let report = JsonReport {
        generated_at: generated_at.to_rfc3339(),
        timezone,
        report: kind,
        data,
    };
    Ok(serde_json::to_string_pretty(&report)?)
}

// ========== Public Interface ==========

/// Options shared by the report commands.
#[derive(Debug, Clone, Copy)]
pub struct ReportOptions {
    pub range: Option<DateRange>,
    pub top: usize,
    pub json: bool,
}

/// Renders a report from already-loaded log contents.
pub fn render(
    kind: ReportKind,
    contents: &LogContents,
    config: &Config,
    options: ReportOptions,
    now: DateTime<Local>,
) -> Result<String> {
    let today = now.date_naive();
    let sessions = config.session_config();

    match kind {
        ReportKind::Today | ReportKind::Range => {
            if kind == ReportKind::Range && options.range.is_none() {
                anyhow::bail!("--range needs --from and --to");
            }
            let summary =
                st_core::summarize(contents, options.range, today, &sessions, options.top);
            emit(kind, &summary, options.json, now, format_summary)
        }
        ReportKind::Week => {
            let report = st_core::weekly(contents, options.range, today, &sessions);
            emit(kind, &report, options.json, now, format_weekly)
        }
        ReportKind::Apps => {
            let report = st_core::app_usage(contents, options.range, &sessions);
            emit(kind, &report, options.json, now, format_apps)
        }
        ReportKind::Productivity => {
            let report = st_core::productivity(
                contents,
                options.range,
                today,
                &sessions,
                &config.categories,
            );
            emit(kind, &report, options.json, now, format_productivity)
        }
    }
}

fn emit<T: Serialize>(
    kind: ReportKind,
    data: &T,
    json: bool,
    now: DateTime<Local>,
    text: fn(&T) -> String,
) -> Result<String> {
    if json {
        format_json(kind, data, now)
    } else {
        Ok(text(data))
    }
}

/// Runs a report command against the configured log.
pub fn run<W: Write>(
    writer: &mut W,
    config: &Config,
    kind: ReportKind,
    options: ReportOptions,
) -> Result<()> {
    let contents = st_store::read_log(&config.log_path)
        .with_context(|| format!("failed to read {}", config.log_path.display()))?;
    tracing::debug!(
        records = contents.records.len(),
        skipped = contents.skipped_lines,
        "loaded activity log"
    );

    let output = render(kind, &contents, config, options, Local::now())?;
    if options.json {
        writeln!(writer, "{output}")?;
    } else {
        write!(writer, "{output}")?;
    }
    Ok(())
}
