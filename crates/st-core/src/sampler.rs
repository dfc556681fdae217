//! The sampling loop.
//!
//! Every tick reads the probe once and appends one record to the sink. Probe
//! failures are transient: the tick is skipped and counted. A failed append is
//! retried once; a second failure stops the loop.

use std::future::Future;
use std::time::Duration;

use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::MissedTickBehavior;

use crate::probe::{Probe, ProbeError};
use crate::record::ActivityRecord;

/// Shortest interval the loop will run with.
pub const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Destination for sampled records.
pub trait RecordSink {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Durably appends one record.
    fn append(&mut self, record: &ActivityRecord) -> Result<(), Self::Error>;
}

/// Which ticks produce a log record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SamplePolicy {
    /// One record per tick, idle or not.
    #[default]
    EveryTick,
    /// Skip idle ticks while the app is unchanged since an idle record.
    SkipIdleRepeats,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplerConfig {
    /// Time between samples. Default: 60 seconds.
    pub interval: Duration,
    /// Idle readings at or above this count as idle. Default: 300 seconds.
    pub idle_threshold_secs: f64,
    pub policy: SamplePolicy,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            idle_threshold_secs: 300.0,
            policy: SamplePolicy::EveryTick,
        }
    }
}

/// Running counters, reported to the observer after every tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SamplerStats {
    pub ticks: u64,
    pub records_written: u64,
    pub skipped_idle: u64,
    pub probe_failures: u64,
    pub last_probe_error: Option<String>,
    pub last_tick_at: Option<NaiveDateTime>,
}

/// What a single tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Recorded,
    SkippedIdle,
    ProbeFailed,
}

#[derive(Debug, Error)]
pub enum SamplerError {
    #[error("failed to append record after retry: {0}")]
    Append(#[source] Box<dyn std::error::Error + Send + Sync>),
}

pub struct Sampler<P, S> {
    probe: P,
    sink: S,
    config: SamplerConfig,
    stats: SamplerStats,
    /// App name and idle state of the last record written.
    last_written: Option<(String, bool)>,
}

impl<P: Probe, S: RecordSink> Sampler<P, S> {
    pub fn new(probe: P, sink: S, config: SamplerConfig) -> Self {
        Self {
            probe,
            sink,
            config,
            stats: SamplerStats::default(),
            last_written: None,
        }
    }

    pub const fn stats(&self) -> &SamplerStats {
        &self.stats
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// A showing screensaver or lock screen raises the reading to at least
    /// the idle threshold. Lock detection failures are not fatal.
    fn read_probe(&mut self, now: NaiveDateTime) -> Result<ActivityRecord, ProbeError> {
        let app = self.probe.foreground_app()?;
        let mut idle = self.probe.idle_seconds()?;
        match self.probe.screen_locked() {
            Ok(true) => {
                tracing::debug!("screen locked, sample counts as idle");
                idle = idle.max(self.config.idle_threshold_secs);
            }
            Ok(false) => {}
            Err(err) => tracing::debug!(error = %err, "screen lock check failed"),
        }
        ActivityRecord::new(now, idle, app.app_name, app.window_title)
            .map_err(|e| ProbeError::Parse(e.to_string()))
    }

    fn is_idle_repeat(&self, record: &ActivityRecord) -> bool {
        self.config.policy == SamplePolicy::SkipIdleRepeats
            && record.is_idle(self.config.idle_threshold_secs)
            && self
                .last_written
                .as_ref()
                .is_some_and(|(app, was_idle)| *was_idle && *app == record.app_name)
    }

    /// Takes one sample at `now`.
    pub fn tick(&mut self, now: NaiveDateTime) -> Result<TickOutcome, SamplerError> {
        self.stats.ticks += 1;
        self.stats.last_tick_at = Some(now);

        let record = match self.read_probe(now) {
            Ok(record) => record,
            Err(err) => {
                tracing::warn!(error = %err, "probe failed, skipping sample");
                self.stats.probe_failures += 1;
                self.stats.last_probe_error = Some(err.to_string());
                return Ok(TickOutcome::ProbeFailed);
            }
        };

        if self.is_idle_repeat(&record) {
            tracing::trace!(app = %record.app_name, "idle repeat skipped");
            self.stats.skipped_idle += 1;
            return Ok(TickOutcome::SkippedIdle);
        }

        if let Err(err) = self.sink.append(&record) {
            tracing::warn!(error = %err, "append failed, retrying once");
            self.sink
                .append(&record)
                .map_err(|e| SamplerError::Append(Box::new(e)))?;
        }

        tracing::debug!(
            app = %record.app_name,
            idle_seconds = record.idle_seconds,
            "sample recorded"
        );
        self.stats.records_written += 1;
        let idle = record.is_idle(self.config.idle_threshold_secs);
        self.last_written = Some((record.app_name, idle));
        Ok(TickOutcome::Recorded)
    }

    /// Ticks on the configured interval until `shutdown` resolves.
    ///
    /// The first sample is taken immediately. `observe` sees the counters
    /// after every tick. Returns the final counters.
    pub async fn run<F, O>(
        &mut self,
        shutdown: F,
        mut observe: O,
    ) -> Result<SamplerStats, SamplerError>
    where
        F: Future<Output = ()>,
        O: FnMut(&SamplerStats),
    {
        let mut interval = tokio::time::interval(self.config.interval.max(MIN_INTERVAL));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        tracing::info!(
            interval = ?self.config.interval,
            policy = ?self.config.policy,
            "sampler started"
        );

        loop {
            tokio::select! {
                biased;
                () = &mut shutdown => {
                    tracing::info!(ticks = self.stats.ticks, "shutdown requested");
                    break;
                }
                _ = interval.tick() => {
                    self.tick(Local::now().naive_local())?;
                    observe(&self.stats);
                }
            }
        }

        Ok(self.stats.clone())
    }
}
