//! Tracker diagnostics persisted for `--status`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use st_core::SamplerStats;
use thiserror::Error;

pub const STATE_FILE: &str = "tracker_state.json";

#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to {action} {}: {source}", .path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid tracker state: {0}")]
    Json(#[from] serde_json::Error),
}

/// Snapshot of a tracker run, rewritten after every tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerState {
    pub pid: u32,
    pub started_at: NaiveDateTime,
    #[serde(flatten)]
    pub stats: SamplerStats,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stopped_at: Option<NaiveDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<String>,
}

impl TrackerState {
    pub fn new(pid: u32, started_at: NaiveDateTime) -> Self {
        Self {
            pid,
            started_at,
            stats: SamplerStats::default(),
            stopped_at: None,
            stop_reason: None,
        }
    }

    pub fn path(dir: &Path) -> PathBuf {
        dir.join(STATE_FILE)
    }

    /// Loads the state file; `None` if no tracker has run yet.
    pub fn load(dir: &Path) -> Result<Option<Self>, StateError> {
        let path = Self::path(dir);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(StateError::Io {
                    action: "read",
                    path,
                    source,
                });
            }
        };
        Ok(Some(serde_json::from_str(&content)?))
    }

    /// Writes the state atomically (temp file, then rename).
    pub fn save(&self, dir: &Path) -> Result<(), StateError> {
        let path = Self::path(dir);
        let tmp_path = path.with_extension("tmp");
        let content = serde_json::to_string_pretty(self)?;

        fs::write(&tmp_path, content).map_err(|source| StateError::Io {
            action: "write",
            path: tmp_path.clone(),
            source,
        })?;
        if let Err(source) = fs::rename(&tmp_path, &path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(StateError::Io {
                action: "rename",
                path,
                source,
            });
        }
        Ok(())
    }
}
