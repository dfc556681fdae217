//! Platform probes for the focused window and user idle time.
//!
//! The probe for the current OS is chosen once, by [`native_probe`].

use st_core::{Probe, ProbeError};
#[cfg(any(target_os = "linux", target_os = "windows", test))]
use sysinfo::{Pid, ProcessesToUpdate, System};

#[cfg(any(target_os = "linux", target_os = "macos", test))]
mod command;
#[cfg(any(target_os = "linux", test))]
pub mod linux;
#[cfg(any(target_os = "macos", test))]
pub mod macos;
#[cfg(target_os = "windows")]
pub mod windows;

/// Probe for targets without a supported display API. Always fails.
#[derive(Debug, Default)]
pub struct UnsupportedProbe;

impl Probe for UnsupportedProbe {
    fn foreground_app(&mut self) -> Result<st_core::ForegroundApp, ProbeError> {
        Err(ProbeError::Unavailable(format!(
            "no foreground window probe for {}",
            std::env::consts::OS
        )))
    }

    fn idle_seconds(&mut self) -> Result<f64, ProbeError> {
        Err(ProbeError::Unavailable(format!(
            "no idle time probe for {}",
            std::env::consts::OS
        )))
    }
}

/// Returns the probe for the operating system this binary was built for.
#[cfg(target_os = "linux")]
pub fn native_probe() -> Box<dyn Probe> {
    Box::new(linux::LinuxProbe::from_env())
}

#[cfg(target_os = "macos")]
pub fn native_probe() -> Box<dyn Probe> {
    Box::new(macos::MacProbe::new())
}

#[cfg(target_os = "windows")]
pub fn native_probe() -> Box<dyn Probe> {
    Box::new(windows::WindowsProbe::new())
}

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
pub fn native_probe() -> Box<dyn Probe> {
    Box::new(UnsupportedProbe)
}

/// Looks up a process name by PID.
#[cfg(any(target_os = "linux", target_os = "windows", test))]
pub(crate) fn process_name(system: &mut System, pid: u32) -> Option<String> {
    let pid = Pid::from_u32(pid);
    system.refresh_processes(ProcessesToUpdate::Some(&[pid]));
    system
        .process(pid)
        .map(|process| process.name().to_string_lossy().into_owned())
}
