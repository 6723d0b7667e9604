//! Refresh rate of the monitor a window is on.

use windows::core::PCWSTR;
use windows::Win32::Foundation::HWND;
use windows::Win32::Graphics::Gdi::{
    EnumDisplaySettingsW, GetMonitorInfoW, MonitorFromWindow, DEVMODEW, ENUM_CURRENT_SETTINGS,
    MONITORINFO, MONITORINFOEXW, MONITOR_DEFAULTTONEAREST,
};

use tracing::{debug, warn};

use crate::gate::FALLBACK_REFRESH_RATE_HZ;

/// Current refresh rate of the monitor nearest to `window`, or 60 Hz when
/// it cannot be determined.
pub fn refresh_rate(window: HWND) -> f64 {
    match query(window) {
        Some(hz) => {
            debug!(hz, "Display refresh rate");
            hz
        }
        None => {
            warn!("Could not query display refresh rate, assuming {FALLBACK_REFRESH_RATE_HZ} Hz");
            FALLBACK_REFRESH_RATE_HZ
        }
    }
}

fn query(window: HWND) -> Option<f64> {
    let monitor = unsafe { MonitorFromWindow(window, MONITOR_DEFAULTTONEAREST) };
    if monitor.is_invalid() {
        return None;
    }

    let mut info = MONITORINFOEXW::default();
    info.monitorInfo.cbSize = std::mem::size_of::<MONITORINFOEXW>() as u32;
    let ok = unsafe { GetMonitorInfoW(monitor, &mut info as *mut MONITORINFOEXW as *mut MONITORINFO) };
    if !ok.as_bool() {
        return None;
    }

    let mut mode = DEVMODEW {
        dmSize: std::mem::size_of::<DEVMODEW>() as u16,
        ..Default::default()
    };
    let ok = unsafe {
        EnumDisplaySettingsW(
            PCWSTR(info.szDevice.as_ptr()),
            ENUM_CURRENT_SETTINGS,
            &mut mode,
        )
    };
    if !ok.as_bool() {
        return None;
    }

    // 0 and 1 both mean "hardware default".
    match mode.dmDisplayFrequency {
        0 | 1 => None,
        hz => Some(hz as f64),
    }
}
