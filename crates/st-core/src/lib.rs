//! Core domain logic for the screentime activity logger.
//!
//! This crate contains the platform-independent parts:
//! - Records: the validated shape of one log line
//! - Sampling: the tick loop that polls a [`Probe`] and feeds a [`RecordSink`]
//! - Sessions: rebuilding usage sessions from the flat log
//! - Reports: daily, weekly, per-app and productivity aggregates

pub mod category;
pub mod period;
pub mod probe;
pub mod record;
pub mod report;
pub mod sampler;
pub mod session;

pub use category::{Category, CategoryMap};
pub use period::{DateRange, InvertedRange};
pub use probe::{ForegroundApp, Probe, ProbeError};
pub use record::{ActivityRecord, LogContents, TIMESTAMP_FORMAT, ValidationError, parse_timestamp};
pub use report::{
    AppTime, AppUsageReport, AppUsageStat, CategoryShare, DayTotal, ProductivityReport, Rating,
    Summary, WeeklyReport, app_usage, productivity, summarize, weekly,
};
pub use sampler::{
    RecordSink, SamplePolicy, Sampler, SamplerConfig, SamplerError, SamplerStats, TickOutcome,
};
pub use session::{DayShare, Session, SessionConfig, reconstruct, sessions_in_range};
