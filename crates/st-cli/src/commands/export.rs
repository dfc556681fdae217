//! `--export [PATH]`: copy the log to a standalone CSV with derived columns.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use st_store::EventLog;

use crate::Config;

/// Default export location: `<data_dir>/exports/screentime_export_<stamp>.csv`.
pub fn default_destination(config: &Config, now: NaiveDateTime) -> PathBuf {
    config.data_dir().join("exports").join(format!(
        "screentime_export_{}.csv",
        now.format("%Y%m%d_%H%M%S")
    ))
}

pub fn run<W: Write>(writer: &mut W, config: &Config, dest: &Path) -> Result<()> {
    let log = EventLog::open(&config.log_path)
        .with_context(|| format!("failed to open {}", config.log_path.display()))?;
    let rows = log
        .export(dest)
        .with_context(|| format!("failed to export to {}", dest.display()))?;

    writeln!(writer, "Exported {rows} records to {}", dest.display())?;
    Ok(())
}
