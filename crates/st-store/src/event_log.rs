//! The append-only CSV activity log.
//!
//! # Format
//!
//! UTF-8 CSV with the header `timestamp,idle_seconds,app_name,window_title`.
//! Timestamps are local wall-clock `YYYY-MM-DD HH:MM:SS`; idle seconds use
//! the shortest decimal form that parses back to the same value.
//!
//! # Durability
//!
//! Each record is encoded into a buffer first and written with a single
//! `write_all` on an append-mode handle, followed by `sync_data`. Readers only
//! parse complete lines, so a record that is still being written is invisible
//! to them rather than malformed. If a crash left such a torn line behind, the
//! next append terminates it first so the fragment is skipped as one malformed
//! line and the new record stays intact.

use std::borrow::Cow;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use st_core::{ActivityRecord, LogContents, RecordSink, parse_timestamp};
use thiserror::Error;

/// Column names of the activity log.
pub const HEADER: [&str; 4] = ["timestamp", "idle_seconds", "app_name", "window_title"];

/// Extra columns appended by [`EventLog::export`].
pub const EXPORT_COLUMNS: [&str; 3] = ["date", "hour", "day_of_week"];

/// Activity log errors.
#[derive(Debug, Error)]
pub enum LogError {
    /// A filesystem operation failed.
    #[error("failed to {action} {}: {source}", .path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// CSV encoding failed.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    /// A log line could not be turned into a record.
    #[error("invalid record on line {line}: {message}")]
    InvalidRecord { line: u64, message: String },
}

fn io_error(action: &'static str, path: &Path) -> impl FnOnce(io::Error) -> LogError {
    let path = path.to_path_buf();
    move |source| LogError::Io {
        action,
        path,
        source,
    }
}

/// Handle to an activity log file.
#[derive(Debug, Clone)]
pub struct EventLog {
    path: PathBuf,
}

impl EventLog {
    /// Opens the log, creating parent directories and the header if needed.
    ///
    /// An existing header is never rewritten.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, LogError> {
        let log = Self { path: path.into() };
        if let Some(parent) = log.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_error("create directory", parent))?;
        }

        let mut file = log.open_append()?;
        if file_is_empty(&file, &log.path)? {
            let header = encode_row(&HEADER)?;
            file.write_all(&header)
                .and_then(|()| file.sync_data())
                .map_err(io_error("write header to", &log.path))?;
            tracing::debug!(path = %log.path.display(), "created activity log");
        }
        Ok(log)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open_append(&self) -> Result<File, LogError> {
        OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)
            .map_err(io_error("open", &self.path))
    }

    /// Appends one record and syncs it to disk.
    pub fn append(&self, record: &ActivityRecord) -> Result<(), LogError> {
        let mut file = self.open_append()?;

        let mut buf = match last_byte(&mut file, &self.path)? {
            None => encode_row(&HEADER)?,
            Some(b'\n') => Vec::new(),
            Some(_) => {
                tracing::warn!(path = %self.path.display(), "terminating torn trailing line");
                vec![b'\n']
            }
        };
        let timestamp = record.timestamp_string();
        let idle = format_idle(record.idle_seconds);
        buf.extend(encode_row(&[
            timestamp.as_str(),
            idle.as_str(),
            &*sanitize(&record.app_name),
            &*sanitize(&record.window_title),
        ])?);

        file.write_all(&buf)
            .and_then(|()| file.sync_data())
            .map_err(io_error("append to", &self.path))
    }

    /// Reads every well-formed record; see [`read_log`].
    pub fn read(&self) -> Result<LogContents, LogError> {
        read_log(&self.path)
    }

    /// Truncates the log back to the header row.
    pub fn clear(&self) -> Result<(), LogError> {
        let header = encode_row(&HEADER)?;
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.path)
            .map_err(io_error("truncate", &self.path))?;
        file.write_all(&header)
            .and_then(|()| file.sync_data())
            .map_err(io_error("write header to", &self.path))?;
        tracing::info!(path = %self.path.display(), "activity log cleared");
        Ok(())
    }

    /// Writes an enriched copy of the log to `dest` and returns the row count.
    ///
    /// Each row gains `date`, `hour` and `day_of_week` columns. The copy is
    /// written to a temporary file and renamed into place.
    pub fn export(&self, dest: &Path) -> Result<usize, LogError> {
        let contents = self.read()?;
        if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_error("create directory", parent))?;
        }

        let tmp_path = dest.with_extension("tmp");
        let file = File::create(&tmp_path).map_err(io_error("create", &tmp_path))?;
        let mut writer = csv::WriterBuilder::new()
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(file);
        writer.write_record(HEADER.iter().chain(EXPORT_COLUMNS.iter()))?;
        for record in &contents.records {
            writer.write_record([
                record.timestamp_string(),
                format_idle(record.idle_seconds),
                record.app_name.clone(),
                record.window_title.clone(),
                record.timestamp.format("%Y-%m-%d").to_string(),
                record.timestamp.format("%H").to_string(),
                record.timestamp.format("%A").to_string(),
            ])?;
        }
        writer.flush().map_err(io_error("write", &tmp_path))?;
        drop(writer);

        if let Err(e) = fs::rename(&tmp_path, dest) {
            let _ = fs::remove_file(&tmp_path);
            return Err(io_error("rename export to", dest)(e));
        }

        tracing::info!(
            path = %dest.display(),
            rows = contents.records.len(),
            "exported activity log"
        );
        Ok(contents.records.len())
    }
}

impl RecordSink for EventLog {
    type Error = LogError;

    fn append(&mut self, record: &ActivityRecord) -> Result<(), LogError> {
        Self::append(self, record)
    }
}

/// Reads the log at `path`, skipping lines that do not form a valid record.
///
/// A missing file yields empty contents. A trailing line without a newline is
/// still being written and is ignored. Invalid UTF-8 is decoded lossily.
pub fn read_log(path: &Path) -> Result<LogContents, LogError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(LogContents::default()),
        Err(e) => return Err(io_error("read", path)(e)),
    };

    let complete = bytes.iter().rposition(|&b| b == b'\n').map_or(0, |i| i + 1);
    if complete < bytes.len() {
        tracing::debug!(
            bytes = bytes.len() - complete,
            "ignoring incomplete trailing line"
        );
    }

    Ok(parse_log(&bytes[..complete]))
}

fn parse_log(data: &[u8]) -> LogContents {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(data);

    let mut contents = LogContents::default();
    let mut row = csv::ByteRecord::new();
    loop {
        match reader.read_byte_record(&mut row) {
            Ok(true) => {}
            Ok(false) => break,
            Err(err) => {
                tracing::warn!(error = %err, "skipping unreadable log line");
                contents.skipped_lines += 1;
                if err.is_io_error() {
                    break;
                }
                continue;
            }
        }

        let line = row.position().map_or(0, csv::Position::line);
        if line == 1 && row.get(0) == Some(HEADER[0].as_bytes()) {
            continue;
        }

        match parse_row(&row, line) {
            Ok(record) => contents.records.push(record),
            Err(err) => {
                tracing::warn!(error = %err, "skipping malformed log line");
                contents.skipped_lines += 1;
            }
        }
    }

    contents
}

fn parse_row(row: &csv::ByteRecord, line: u64) -> Result<ActivityRecord, LogError> {
    let invalid = |message: String| LogError::InvalidRecord { line, message };

    if row.len() != HEADER.len() {
        return Err(invalid(format!(
            "expected {} fields, found {}",
            HEADER.len(),
            row.len()
        )));
    }
    let field = |i: usize| String::from_utf8_lossy(&row[i]).into_owned();

    let timestamp = parse_timestamp(&field(0)).map_err(|e| invalid(e.to_string()))?;
    let raw_idle = field(1);
    let idle_seconds: f64 = raw_idle
        .trim()
        .parse()
        .map_err(|_| invalid(format!("invalid idle seconds: {raw_idle}")))?;

    ActivityRecord::new(timestamp, idle_seconds, field(2), field(3))
        .map_err(|e| invalid(e.to_string()))
}

fn file_is_empty(file: &File, path: &Path) -> Result<bool, LogError> {
    file.metadata()
        .map(|m| m.len() == 0)
        .map_err(io_error("inspect", path))
}

/// Last byte of the file, or `None` when it is empty.
fn last_byte(file: &mut File, path: &Path) -> Result<Option<u8>, LogError> {
    if file_is_empty(file, path)? {
        return Ok(None);
    }
    let mut byte = [0u8; 1];
    file.seek(SeekFrom::End(-1))
        .and_then(|_| file.read_exact(&mut byte))
        .map_err(io_error("read", path))?;
    Ok(Some(byte[0]))
}

fn encode_row<I, T>(fields: I) -> Result<Vec<u8>, LogError>
where
    I: IntoIterator<Item = T>,
    T: AsRef<[u8]>,
{
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    writer.write_record(fields)?;
    writer
        .into_inner()
        .map_err(|e| LogError::Csv(csv::Error::from(e.into_error())))
}

/// Shortest round-trip form, without a trailing `.0`.
fn format_idle(idle_seconds: f64) -> String {
    format!("{idle_seconds}")
}

/// Replaces line breaks and tabs with spaces and other control characters
/// with U+FFFD so every record stays on one line.
fn sanitize(text: &str) -> Cow<'_, str> {
    if !text.chars().any(char::is_control) {
        return Cow::Borrowed(text);
    }
    text.chars()
        .map(|c| match c {
            '\r' | '\n' | '\t' => ' ',
            c if c.is_control() => '\u{FFFD}',
            c => c,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};
    use tempfile::TempDir;

    fn ts(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, 29)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    fn record(at: NaiveDateTime, idle: f64, app: &str, title: &str) -> ActivityRecord {
        ActivityRecord::new(at, idle, app, title).unwrap()
    }

    fn temp_log() -> (TempDir, EventLog) {
        let dir = TempDir::new().unwrap();
        let log = EventLog::open(dir.path().join("nested").join("activity_log.csv")).unwrap();
        (dir, log)
    }

    #[test]
    fn open_creates_file_with_header() {
        let (_dir, log) = temp_log();
        let content = fs::read_to_string(log.path()).unwrap();
        assert_eq!(content, "timestamp,idle_seconds,app_name,window_title\n");
    }

    #[test]
    fn reopening_does_not_duplicate_header() {
        let (_dir, log) = temp_log();
        log.append(&record(ts(9, 0, 0), 0.0, "Code", "main.rs")).unwrap();
        let reopened = EventLog::open(log.path()).unwrap();

        let content = fs::read_to_string(reopened.path()).unwrap();
        assert_eq!(content.matches("timestamp,idle_seconds").count(), 1);
        assert_eq!(reopened.read().unwrap().records.len(), 1);
    }

    #[test]
    fn append_then_read_preserves_records() {
        let (_dir, log) = temp_log();
        let records = vec![
            record(ts(9, 0, 0), 0.0, "Chrome", "Inbox (3), \"urgent\" - Gmail"),
            record(ts(9, 1, 0), 12.5, "Terminal", "cargo — zsh"),
            record(ts(9, 2, 0), 400.0, "微信", "聊天"),
        ];
        for r in &records {
            log.append(r).unwrap();
        }

        let contents = log.read().unwrap();
        assert_eq!(contents.records, records);
        assert_eq!(contents.skipped_lines, 0);
    }

    #[test]
    fn append_writes_expected_line() {
        let (_dir, log) = temp_log();
        log.append(&record(ts(9, 10, 0), 3.25, "Code", "a,b")).unwrap();

        let content = fs::read_to_string(log.path()).unwrap();
        let last = content.lines().last().unwrap();
        assert_eq!(last, "2025-01-29 09:10:00,3.25,Code,\"a,b\"");
    }

    #[test]
    fn control_characters_are_sanitized() {
        let (_dir, log) = temp_log();
        log.append(&record(ts(9, 0, 0), 0.0, "Code", "line one\nline two\ttab\u{7}"))
            .unwrap();

        let contents = log.read().unwrap();
        assert_eq!(
            contents.records[0].window_title,
            "line one line two tab\u{FFFD}"
        );
        let content = fs::read_to_string(log.path()).unwrap();
        assert_eq!(content.lines().count(), 2);
    }

    #[test]
    fn missing_file_reads_as_empty() {
        let dir = TempDir::new().unwrap();
        let contents = read_log(&dir.path().join("absent.csv")).unwrap();
        assert!(contents.is_empty());
        assert_eq!(contents.skipped_lines, 0);
    }

    #[test]
    fn trailing_partial_line_is_ignored() {
        let (_dir, log) = temp_log();
        log.append(&record(ts(9, 0, 0), 0.0, "Code", "main.rs")).unwrap();
        let mut file = OpenOptions::new().append(true).open(log.path()).unwrap();
        file.write_all(b"2025-01-29 09:01:00,0,Co").unwrap();

        let contents = log.read().unwrap();
        assert_eq!(contents.records.len(), 1);
        assert_eq!(contents.skipped_lines, 0);
    }

    #[test]
    fn malformed_lines_are_skipped_and_counted() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("log.csv");
        fs::write(
            &path,
            "timestamp,idle_seconds,app_name,window_title\n\
             2025-01-29 09:00:00,0,Xcode,main.swift\n\
             not-a-date,0,Xcode,main.swift\n\
             2025-01-29 09:00:30,-5,Xcode,main.swift\n\
             2025-01-29 09:00:40,abc,Xcode,main.swift\n\
             2025-01-29 09:00:50,0,Xcode\n\
             2025-01-29 09:01:00,0,Xcode,main.swift\n",
        )
        .unwrap();

        let contents = read_log(&path).unwrap();
        assert_eq!(contents.records.len(), 2);
        assert_eq!(contents.skipped_lines, 4);
    }

    #[test]
    fn legacy_iso_timestamps_are_accepted() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("log.csv");
        fs::write(
            &path,
            "timestamp,idle_seconds,app_name,window_title\n\
             2025-01-29T09:00:00.123456,1.5,Code,main.rs\n",
        )
        .unwrap();

        let contents = read_log(&path).unwrap();
        assert_eq!(contents.records[0].timestamp, ts(9, 0, 0));
        assert_eq!(contents.records[0].app_name, "Code");
    }

    #[test]
    fn invalid_utf8_is_decoded_lossily() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("log.csv");
        let mut bytes = b"timestamp,idle_seconds,app_name,window_title\n".to_vec();
        bytes.extend_from_slice(b"2025-01-29 09:00:00,0,App\xff,Title\n");
        fs::write(&path, bytes).unwrap();

        let contents = read_log(&path).unwrap();
        assert_eq!(contents.records[0].app_name, "App\u{FFFD}");
    }

    #[test]
    fn clear_keeps_only_header() {
        let (_dir, log) = temp_log();
        log.append(&record(ts(9, 0, 0), 0.0, "Code", "main.rs")).unwrap();
        log.clear().unwrap();

        let content = fs::read_to_string(log.path()).unwrap();
        assert_eq!(content, "timestamp,idle_seconds,app_name,window_title\n");
        assert!(log.read().unwrap().is_empty());
    }

    #[test]
    fn export_adds_calendar_columns() {
        let (dir, log) = temp_log();
        log.append(&record(ts(14, 5, 0), 0.0, "Code", "main.rs")).unwrap();
        let dest = dir.path().join("exports").join("out.csv");

        let rows = log.export(&dest).unwrap();

        assert_eq!(rows, 1);
        let content = fs::read_to_string(&dest).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(
            lines[0],
            "timestamp,idle_seconds,app_name,window_title,date,hour,day_of_week"
        );
        assert_eq!(
            lines[1],
            "2025-01-29 14:05:00,0,Code,main.rs,2025-01-29,14,Wednesday"
        );
        assert!(!dest.with_extension("tmp").exists());
    }

    #[test]
    fn format_idle_is_exact() {
        assert_eq!(format_idle(0.0), "0");
        assert_eq!(format_idle(300.0), "300");
        assert_eq!(format_idle(2.5), "2.5");
        assert_eq!(format_idle(0.04), "0.04");
        assert_eq!(format_idle(299.96), "299.96");
    }

    #[test]
    fn fractional_idle_survives_append_and_read() {
        let (_dir, log) = temp_log();
        let records = vec![
            record(ts(9, 0, 0), 299.96, "Code", "main.rs"),
            record(ts(9, 1, 0), 0.123, "Code", "main.rs"),
            record(ts(9, 2, 0), 1e-7, "Code", "main.rs"),
        ];
        for r in &records {
            log.append(r).unwrap();
        }

        let contents = log.read().unwrap();
        assert_eq!(contents.records, records);
        assert!(!contents.records[0].is_idle(300.0));
    }

    #[test]
    fn append_after_torn_line_keeps_new_record() {
        let (_dir, log) = temp_log();
        let mut file = OpenOptions::new().append(true).open(log.path()).unwrap();
        file.write_all(b"2025-01-29 08:59:00,0,Co").unwrap();

        let good = record(ts(9, 0, 0), 0.0, "Code", "main.rs");
        log.append(&good).unwrap();

        let contents = log.read().unwrap();
        assert_eq!(contents.records, vec![good]);
        assert_eq!(contents.skipped_lines, 1);
        let content = fs::read_to_string(log.path()).unwrap();
        assert!(content.ends_with("2025-01-29 08:59:00,0,Co\n2025-01-29 09:00:00,0,Code,main.rs\n"));
    }

    #[test]
    fn malformed_line_mid_log_does_not_change_reports() {
        let dir = TempDir::new().unwrap();
        let clean = dir.path().join("clean.csv");
        let damaged = dir.path().join("damaged.csv");
        let header = "timestamp,idle_seconds,app_name,window_title\n";
        let first = "2025-01-29 09:00:00,0,Code,main.rs\n2025-01-29 09:01:00,0,Code,main.rs\n";
        let rest = "2025-01-29 09:02:00,0,Code,lib.rs\n2025-01-29 09:04:00,400,Firefox,Docs\n\
                    2025-01-29 09:05:00,0,Firefox,Docs\n";
        fs::write(&clean, format!("{header}{first}{rest}")).unwrap();
        fs::write(&damaged, format!("{header}{first}not-a-date,0,Code,main.rs\n{rest}")).unwrap();

        let clean = read_log(&clean).unwrap();
        let damaged = read_log(&damaged).unwrap();
        assert_eq!(damaged.skipped_lines, 1);
        assert_eq!(damaged.records, clean.records);

        let config = st_core::SessionConfig::default();
        let today = NaiveDate::from_ymd_opt(2025, 1, 29).unwrap();
        let mut summary = st_core::summarize(&damaged, None, today, &config, 5);
        summary.skipped_lines = 0;
        assert_eq!(summary, st_core::summarize(&clean, None, today, &config, 5));
        let mut apps = st_core::app_usage(&damaged, None, &config);
        apps.skipped_lines = 0;
        assert_eq!(apps, st_core::app_usage(&clean, None, &config));
    }

    #[test]
    fn sink_appends_through_trait() {
        let (_dir, mut log) = temp_log();
        RecordSink::append(&mut log, &record(ts(9, 0, 0), 0.0, "Code", "x")).unwrap();
        assert_eq!(log.read().unwrap().records.len(), 1);
    }
}
