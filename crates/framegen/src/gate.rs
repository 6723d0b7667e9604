//! Whether a host swap chain is worth substituting.

use std::fmt;

use tracing::{info, warn};

use crate::settings::Settings;

/// Below this refresh rate, generated frames add more latency than
/// smoothness.
pub const MIN_REFRESH_RATE_HZ: f64 = 119.0;

/// Assumed when the display cannot be queried.
pub const FALLBACK_REFRESH_RATE_HZ: f64 = 60.0;

/// What is known about the display when the host creates its swap chain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayInfo {
    pub refresh_rate_hz: f64,
    /// False for exclusive fullscreen.
    pub windowed: bool,
}

impl DisplayInfo {
    pub fn low_refresh_rate(&self) -> bool {
        low_refresh_rate(self.refresh_rate_hz)
    }
}

pub fn low_refresh_rate(refresh_rate_hz: f64) -> bool {
    refresh_rate_hz < MIN_REFRESH_RATE_HZ
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclineReason {
    ExclusiveFullscreen,
    FrameGenerationDisabled,
    EngineUnavailable,
    LowRefreshRate,
}

impl fmt::Display for DeclineReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::ExclusiveFullscreen => "exclusive fullscreen is not supported",
            Self::FrameGenerationDisabled => "frame generation is disabled in settings",
            Self::EngineUnavailable => "the frame-generation engine could not be loaded",
            Self::LowRefreshRate => "display refresh rate is below 119 Hz (set force_enable to override)",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyDecision {
    Substitute,
    Decline(DeclineReason),
}

impl ProxyDecision {
    pub fn substitute(&self) -> bool {
        matches!(self, Self::Substitute)
    }
}

/// Decide whether to hand the host a facade instead of its own swap chain.
pub fn should_proxy(settings: &Settings, display: &DisplayInfo, engine_available: bool) -> ProxyDecision {
    let decision = if !display.windowed {
        ProxyDecision::Decline(DeclineReason::ExclusiveFullscreen)
    } else if !settings.frame_generation {
        ProxyDecision::Decline(DeclineReason::FrameGenerationDisabled)
    } else if !engine_available {
        ProxyDecision::Decline(DeclineReason::EngineUnavailable)
    } else if display.low_refresh_rate() && !settings.force_enable {
        ProxyDecision::Decline(DeclineReason::LowRefreshRate)
    } else {
        ProxyDecision::Substitute
    };

    // Bound outside the macros: tracing's expansion shadows `display`.
    let refresh_rate_hz = display.refresh_rate_hz;
    let low_refresh_rate = display.low_refresh_rate();
    match decision {
        ProxyDecision::Substitute => info!(
            refresh_rate = refresh_rate_hz,
            forced = settings.force_enable && low_refresh_rate,
            "Substituting swap chain"
        ),
        ProxyDecision::Decline(reason) => {
            warn!(refresh_rate = refresh_rate_hz, "Keeping host swap chain: {reason}")
        }
    }
    decision
}

#[cfg(test)]
mod tests {
    use super::*;

    const FAST: DisplayInfo = DisplayInfo {
        refresh_rate_hz: 144.0,
        windowed: true,
    };

    #[test]
    fn fast_windowed_display_is_proxied() {
        assert_eq!(
            should_proxy(&Settings::default(), &FAST, true),
            ProxyDecision::Substitute
        );
    }

    #[test]
    fn threshold_is_119() {
        assert!(low_refresh_rate(60.0));
        assert!(low_refresh_rate(118.99));
        assert!(!low_refresh_rate(119.0));
        assert!(!low_refresh_rate(120.0));
    }

    #[test]
    fn low_refresh_needs_force_enable() {
        let display = DisplayInfo {
            refresh_rate_hz: 60.0,
            ..FAST
        };
        assert_eq!(
            should_proxy(&Settings::default(), &display, true),
            ProxyDecision::Decline(DeclineReason::LowRefreshRate)
        );

        let forced = Settings {
            force_enable: true,
            ..Settings::default()
        };
        assert!(should_proxy(&forced, &display, true).substitute());
    }

    #[test]
    fn fullscreen_disabled_or_missing_engine_decline() {
        let fullscreen = DisplayInfo {
            windowed: false,
            ..FAST
        };
        assert_eq!(
            should_proxy(&Settings::default(), &fullscreen, true),
            ProxyDecision::Decline(DeclineReason::ExclusiveFullscreen)
        );

        let disabled = Settings {
            frame_generation: false,
            force_enable: true,
            ..Settings::default()
        };
        assert_eq!(
            should_proxy(&disabled, &FAST, true),
            ProxyDecision::Decline(DeclineReason::FrameGenerationDisabled)
        );

        assert_eq!(
            should_proxy(&Settings::default(), &FAST, false),
            ProxyDecision::Decline(DeclineReason::EngineUnavailable)
        );
    }
}
