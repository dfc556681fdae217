//! The platform capability the sampler polls.
//!
//! Each operating system supplies its own implementation; the sampler only
//! ever sees this trait.

use thiserror::Error;

/// Errors a platform probe can report. All are treated as transient.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProbeError {
    /// The OS facility is not available (no display server, headless session).
    #[error("probe unavailable: {0}")]
    Unavailable(String),

    /// The OS refused access (accessibility permission, sandbox).
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// A helper command failed to run or exited unsuccessfully.
    #[error("command `{command}` failed: {message}")]
    Command { command: String, message: String },

    /// The OS answered but the answer could not be interpreted.
    #[error("could not parse probe output: {0}")]
    Parse(String),
}

/// The focused application and its window title.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ForegroundApp {
    pub app_name: String,
    pub window_title: String,
}

impl ForegroundApp {
    pub fn new(app_name: impl Into<String>, window_title: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            window_title: window_title.into(),
        }
    }
}

/// Supplies the raw "what is focused" and "how idle is the user" readings.
///
/// Both calls may fail on any invocation.
pub trait Probe {
    /// Returns the foreground application and window title.
    fn foreground_app(&mut self) -> Result<ForegroundApp, ProbeError>;

    /// Returns the seconds elapsed since the last user input.
    fn idle_seconds(&mut self) -> Result<f64, ProbeError>;

    /// Whether a screensaver or lock screen is showing.
    ///
    /// Platforms that cannot tell report `false`.
    fn screen_locked(&mut self) -> Result<bool, ProbeError> {
        Ok(false)
    }
}

impl<P: Probe + ?Sized> Probe for Box<P> {
    fn foreground_app(&mut self) -> Result<ForegroundApp, ProbeError> {
        (**self).foreground_app()
    }

    fn idle_seconds(&mut self) -> Result<f64, ProbeError> {
        (**self).idle_seconds()
    }

    fn screen_locked(&mut self) -> Result<bool, ProbeError> {
        (**self).screen_locked()
    }
}
