//! `--clear --yes`: truncate the log back to its header.

use std::io::Write;

use anyhow::{Context, Result};
use st_store::EventLog;

use crate::Config;

pub fn run<W: Write>(writer: &mut W, config: &Config) -> Result<()> {
    if let Some(pid) = st_store::running_pid(&config.data_dir()) {
        tracing::warn!(pid, "clearing the log while the tracker is running");
    }

    let log = EventLog::open(&config.log_path)
        .with_context(|| format!("failed to open {}", config.log_path.display()))?;
    log.clear()
        .with_context(|| format!("failed to clear {}", config.log_path.display()))?;

    writeln!(writer, "Cleared {}", config.log_path.display())?;
    Ok(())
}
