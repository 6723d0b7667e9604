//! CPU-side frame rate cap.
//!
//! With variable refresh, presenting slightly below the refresh rate keeps
//! the display inside its adaptive range. The cap is `r - r²/3600` Hz for a
//! refresh rate of `r`, halved while frame generation doubles every real
//! frame.

use std::time::{Duration, Instant};

use tracing::debug;

/// The last stretch of the wait is spun instead of slept; `thread::sleep`
/// overshoots by up to a scheduler quantum.
const SPIN_THRESHOLD: Duration = Duration::from_millis(2);

/// Highest presentation rate worth targeting on a display of `refresh_hz`.
pub fn best_refresh_rate(refresh_hz: f64) -> f64 {
    refresh_hz - refresh_hz * refresh_hz / 3600.0
}

#[derive(Debug)]
pub struct FrameLimiter {
    refresh_hz: f64,
    enabled: bool,
    last_frame: Option<Instant>,
}

impl FrameLimiter {
    pub fn new(refresh_hz: f64, enabled: bool) -> Self {
        debug!(refresh_hz, enabled, "Frame limiter");
        Self {
            refresh_hz,
            enabled,
            last_frame: None,
        }
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.last_frame = None;
        }
    }

    pub fn set_refresh_rate(&mut self, refresh_hz: f64) {
        self.refresh_hz = refresh_hz;
    }

    /// Minimum time between two real frames. `None` when the limiter is off
    /// or the refresh rate is unusable.
    pub fn target_interval(&self, frame_generation: bool) -> Option<Duration> {
        if !self.enabled {
            return None;
        }
        let rate = best_refresh_rate(self.refresh_hz) * if frame_generation { 0.5 } else { 1.0 };
        if !rate.is_finite() || rate <= 0.0 {
            return None;
        }
        Some(Duration::from_secs_f64(1.0 / rate))
    }

    /// Block until a full interval has passed since the previous call.
    /// Returns how long it waited.
    pub fn wait(&mut self, frame_generation: bool) -> Duration {
        let now = Instant::now();
        let Some(interval) = self.target_interval(frame_generation) else {
            self.last_frame = Some(now);
            return Duration::ZERO;
        };
        let Some(last) = self.last_frame else {
            self.last_frame = Some(now);
            return Duration::ZERO;
        };

        let deadline = last + interval;
        if now >= deadline {
            // Running slower than the cap; restart the schedule from here.
            self.last_frame = Some(now);
            return Duration::ZERO;
        }

        let remaining = deadline - now;
        if remaining > SPIN_THRESHOLD {
            std::thread::sleep(remaining - SPIN_THRESHOLD);
        }
        while Instant::now() < deadline {
            std::hint::spin_loop();
        }
        self.last_frame = Some(deadline);
        deadline - now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn best_rate_sits_below_refresh() {
        assert!((best_refresh_rate(60.0) - 59.0).abs() < 1e-9);
        assert!((best_refresh_rate(120.0) - 116.0).abs() < 1e-9);
        assert!((best_refresh_rate(144.0) - 138.24).abs() < 1e-9);
    }

    #[test]
    fn frame_generation_halves_the_rate() {
        let limiter = FrameLimiter::new(120.0, true);
        let plain = limiter.target_interval(false).unwrap();
        let generated = limiter.target_interval(true).unwrap();
        assert!((plain.as_secs_f64() - 1.0 / 116.0).abs() < 1e-9);
        assert!((generated.as_secs_f64() - 2.0 / 116.0).abs() < 1e-9);
    }

    #[test]
    fn disabled_or_bad_rate_never_waits() {
        let mut limiter = FrameLimiter::new(144.0, false);
        assert_eq!(limiter.target_interval(false), None);
        assert_eq!(limiter.wait(false), Duration::ZERO);
        assert_eq!(limiter.wait(false), Duration::ZERO);

        limiter.set_enabled(true);
        limiter.set_refresh_rate(0.0);
        assert_eq!(limiter.target_interval(true), None);
    }

    #[test]
    fn consecutive_frames_are_spaced_by_the_interval() {
        // 1000 Hz display: ~1.38 ms per frame.
        let mut limiter = FrameLimiter::new(1000.0, true);
        let interval = limiter.target_interval(false).unwrap();

        let start = Instant::now();
        assert_eq!(limiter.wait(false), Duration::ZERO);
        for _ in 0..5 {
            limiter.wait(false);
        }
        assert!(start.elapsed() >= interval * 5);
    }

    #[test]
    fn slow_frames_are_not_delayed() {
        let mut limiter = FrameLimiter::new(1000.0, true);
        limiter.wait(false);
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(limiter.wait(false), Duration::ZERO);
    }
}
