//! Local file storage for screentime.
//!
//! Everything lives in plain files in one data directory:
//! - `activity_log.csv`: the append-only activity log ([`EventLog`])
//! - `tracker.lock` / `tracker.pid`: the single-instance guard ([`ProcessGuard`])
//! - `tracker.stop`: a pending stop request ([`request_stop`])
//! - `tracker_state.json`: diagnostics of the running tracker ([`TrackerState`])

pub mod event_log;
pub mod guard;
pub mod state;

pub use event_log::{EventLog, LogError, read_log};
pub use guard::{
    GuardError, LockState, ProcessGuard, lock_state, request_stop, running_pid, take_stop_request,
};
pub use state::{StateError, TrackerState};
