//! Windows probe built on the Win32 window, input and screensaver APIs.

#![allow(unsafe_code)]

use ::windows::Win32::Foundation::{BOOL, HWND};
use ::windows::Win32::System::SystemInformation::GetTickCount;
use ::windows::Win32::UI::Input::KeyboardAndMouse::{GetLastInputInfo, LASTINPUTINFO};
use ::windows::Win32::UI::WindowsAndMessaging::{
    GetForegroundWindow, GetWindowTextLengthW, GetWindowTextW, GetWindowThreadProcessId,
    SPI_GETSCREENSAVERRUNNING, SYSTEM_PARAMETERS_INFO_UPDATE_FLAGS, SystemParametersInfoW,
};
use st_core::{ForegroundApp, Probe, ProbeError};
use sysinfo::System;

use super::process_name;

pub struct WindowsProbe {
    system: System,
}

impl WindowsProbe {
    pub fn new() -> Self {
        Self {
            system: System::new(),
        }
    }
}

impl Default for WindowsProbe {
    fn default() -> Self {
        Self::new()
    }
}

fn foreground_window() -> Option<HWND> {
    // SAFETY: takes no arguments; a null handle means no window has focus.
    let hwnd = unsafe { GetForegroundWindow() };
    (!hwnd.0.is_null()).then_some(hwnd)
}

fn window_text(hwnd: HWND) -> String {
    // SAFETY: `hwnd` came from GetForegroundWindow and the buffer outlives the call.
    unsafe {
        let len = GetWindowTextLengthW(hwnd);
        let Ok(len) = usize::try_from(len) else {
            return String::new();
        };
        if len == 0 {
            return String::new();
        }
        let mut buffer = vec![0u16; len + 1];
        let copied = usize::try_from(GetWindowTextW(hwnd, &mut buffer)).unwrap_or(0);
        String::from_utf16_lossy(&buffer[..copied.min(len)])
    }
}

fn window_process_id(hwnd: HWND) -> u32 {
    let mut process_id = 0u32;
    // SAFETY: `process_id` is a valid out pointer for the duration of the call.
    unsafe { GetWindowThreadProcessId(hwnd, Some(&mut process_id)) };
    process_id
}

impl Probe for WindowsProbe {
    fn foreground_app(&mut self) -> Result<ForegroundApp, ProbeError> {
        let Some(hwnd) = foreground_window() else {
            return Ok(ForegroundApp::new("Desktop", "Desktop"));
        };
        let title = window_text(hwnd);
        let app_name = match window_process_id(hwnd) {
            0 => None,
            pid => process_name(&mut self.system, pid),
        }
        .unwrap_or_else(|| "Unknown".to_string());
        Ok(ForegroundApp::new(app_name, title))
    }

    fn idle_seconds(&mut self) -> Result<f64, ProbeError> {
        let mut info = LASTINPUTINFO {
            cbSize: u32::try_from(std::mem::size_of::<LASTINPUTINFO>()).unwrap_or(8),
            dwTime: 0,
        };
        // SAFETY: `info` is a properly sized LASTINPUTINFO owned by this frame.
        let ok = unsafe { GetLastInputInfo(&mut info) };
        if !ok.as_bool() {
            return Err(ProbeError::Unavailable("GetLastInputInfo failed".to_string()));
        }
        // SAFETY: takes no arguments.
        let now = unsafe { GetTickCount() };
        // Both tick counts wrap after ~49.7 days.
        let idle_ms = now.wrapping_sub(info.dwTime);
        Ok(f64::from(idle_ms) / 1000.0)
    }

    fn screen_locked(&mut self) -> Result<bool, ProbeError> {
        let mut running = BOOL(0);
        // SAFETY: SPI_GETSCREENSAVERRUNNING writes one BOOL into `running`.
        unsafe {
            SystemParametersInfoW(
                SPI_GETSCREENSAVERRUNNING,
                0,
                Some(std::ptr::from_mut(&mut running).cast()),
                SYSTEM_PARAMETERS_INFO_UPDATE_FLAGS(0),
            )
        }
        .map_err(|e| ProbeError::Unavailable(format!("SystemParametersInfoW failed: {e}")))?;
        Ok(running.as_bool())
    }
}
