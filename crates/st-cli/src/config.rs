//! Configuration loading and management.

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use st_core::{CategoryMap, SamplePolicy, SamplerConfig, SessionConfig};

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Path to the activity log. Lock, PID and state files live next to it.
    pub log_path: PathBuf,

    /// Seconds between samples.
    pub interval_seconds: u64,

    /// Idle readings at or above this many seconds count as idle time.
    pub idle_threshold_seconds: f64,

    /// Longest gap in seconds between two records of one session.
    pub idle_gap_seconds: i64,

    /// Apps listed in summaries.
    pub top_apps: usize,

    pub sample_policy: SamplePolicy,

    pub categories: CategoryMap,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs_data_path().unwrap_or_else(|| PathBuf::from("."));
        Self {
            log_path: data_dir.join("activity_log.csv"),
            interval_seconds: 60,
            idle_threshold_seconds: 300.0,
            idle_gap_seconds: 300,
            top_apps: 5,
            sample_policy: SamplePolicy::default(),
            categories: CategoryMap::default(),
        }
    }
}

impl Config {
    /// Loads configuration, optionally from a specific file.
    ///
    /// Later sources win: defaults, `<config_dir>/screentime/config.toml`,
    /// the given file, then `SCREENTIME_*` environment variables.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        figment = figment.merge(Env::prefixed("SCREENTIME_"));

        figment.extract()
    }

    /// Rejects values the tracker cannot run with.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.interval_seconds == 0 {
            anyhow::bail!("interval_seconds must be at least 1");
        }
        if self.idle_gap_seconds < 0 {
            anyhow::bail!(
                "idle_gap_seconds must not be negative, got {}",
                self.idle_gap_seconds
            );
        }
        if !self.idle_threshold_seconds.is_finite() || self.idle_threshold_seconds < 0.0 {
            anyhow::bail!(
                "idle_threshold_seconds must be a non-negative number, got {}",
                self.idle_threshold_seconds
            );
        }
        Ok(())
    }

    /// Directory holding the log and the tracker's lock, PID and state files.
    pub fn data_dir(&self) -> PathBuf {
        self.log_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
    }

    pub const fn session_config(&self) -> SessionConfig {
        SessionConfig {
            idle_gap_secs: self.idle_gap_seconds,
            idle_threshold_secs: self.idle_threshold_seconds,
        }
    }

    pub const fn sampler_config(&self) -> SamplerConfig {
        SamplerConfig {
            interval: Duration::from_secs(self.interval_seconds),
            idle_threshold_secs: self.idle_threshold_seconds,
            policy: self.sample_policy,
        }
    }
}

/// Returns the platform-specific config directory for screentime.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("screentime"))
}

/// Returns the platform-specific data directory for screentime.
///
/// On Linux: `~/.local/share/screentime`
pub fn dirs_data_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("screentime"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dirs_data_path_ends_with_screentime() {
        let path = dirs_data_path().unwrap();
        assert_eq!(path.file_name().unwrap(), "screentime");
    }

    #[test]
    fn test_default_config_uses_data_dir_for_log() {
        let config = Config::default();
        let data_dir = dirs_data_path().unwrap();
        assert_eq!(config.log_path, data_dir.join("activity_log.csv"));
        assert_eq!(config.data_dir(), data_dir);
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.interval_seconds, 60);
        assert_eq!(config.top_apps, 5);
        assert_eq!(config.sample_policy, SamplePolicy::EveryTick);
    }

    #[test]
    fn test_config_file_overrides_defaults() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
log_path = "/tmp/screentime/log.csv"
interval_seconds = 30
sample_policy = "skip_idle_repeats"

[categories]
productive = ["helix"]
"#,
        )
        .unwrap();

        let config = Config::load_from(Some(&path)).unwrap();

        assert_eq!(config.log_path, PathBuf::from("/tmp/screentime/log.csv"));
        assert_eq!(config.interval_seconds, 30);
        assert_eq!(config.sample_policy, SamplePolicy::SkipIdleRepeats);
        assert_eq!(config.categories.productive, vec!["helix".to_string()]);
        // Tables merge key by key, so unset lists keep their defaults.
        assert_eq!(config.categories.social, CategoryMap::default().social);
        assert_eq!(config.idle_gap_seconds, 300);
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let config = Config {
            interval_seconds: 0,
            ..Config::default()
        };
        let err = config.validate().unwrap_err();
        assert_eq!(err.to_string(), "interval_seconds must be at least 1");
    }

    #[test]
    fn test_validate_rejects_negative_values() {
        let config = Config {
            idle_gap_seconds: -1,
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            idle_threshold_seconds: f64::NAN,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_session_and_sampler_configs_follow_settings() {
        let config = Config {
            interval_seconds: 15,
            idle_gap_seconds: 120,
            idle_threshold_seconds: 90.0,
            ..Config::default()
        };
        assert_eq!(config.session_config().idle_gap_secs, 120);
        assert_eq!(config.sampler_config().interval, Duration::from_secs(15));
        assert!((config.sampler_config().idle_threshold_secs - 90.0).abs() < f64::EPSILON);
    }
}
