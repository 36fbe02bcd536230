//! Frame pacing against a variable display refresh rate
//!
//! Time model: the surface supplies a monotonic `now` (as a `Duration` since
//! an arbitrary origin). A swap is allowed once the elapsed time since the
//! last presented frame reaches the threshold:
//!
//! - threshold = frame interval on displays above 60Hz
//! - threshold = frame interval - 6ms on displays at or below 60Hz, so the
//!   swap lands on the vsync that is "close enough" instead of one late
//!
//! After a swap on a high refresh display the timestamp is pulled back by the
//! overshoot (capped at 16ms) so pacing does not drift.

use std::time::Duration;

/// Minimum frame interval (~60fps)
pub const FRAME_FLOOR_MS: u64 = 16;

/// Minimum frame interval with fps limiting (~30fps)
pub const LIMITED_FRAME_FLOOR_MS: u64 = 33;

/// Threshold reduction on <= 60Hz displays
pub const VSYNC_SLACK_MS: u64 = 6;

/// Max overshoot carried into the next frame on high refresh displays
pub const MAX_CATCH_UP_MS: u64 = 16;

/// Frame rate at which fps limiting is allowed to kick in
pub const LIMIT_FPS_MIN_RATE: u32 = 60;

/// Frame interval: `max(floor, 1000 / frame_rate)` milliseconds.
///
/// A zero frame rate yields the floor.
pub fn frame_interval(frame_rate: u32, limit_fps: bool) -> Duration {
    let floor = if limit_fps { LIMITED_FRAME_FLOOR_MS } else { FRAME_FLOOR_MS };
    let native = if frame_rate == 0 {
        0
    } else {
        (1000.0_f32 / frame_rate as f32) as u64
    };
    Duration::from_millis(native.max(floor))
}

/// Per-instance pacing state
#[derive(Debug, Clone)]
pub struct FramePacer {
    interval: Duration,
    refresh_rate: f32,
    last_frame: Duration,
}

impl FramePacer {
    pub fn new(interval: Duration, refresh_rate: f32) -> Self {
        Self {
            interval,
            refresh_rate,
            last_frame: Duration::ZERO,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn refresh_rate(&self) -> f32 {
        self.refresh_rate
    }

    /// Update from the surface's refresh rate hint (ignored if not positive)
    pub fn set_refresh_rate(&mut self, hz: f32) {
        if hz.is_finite() && hz > 0.0 {
            self.refresh_rate = hz;
        }
    }

    fn is_low_refresh(&self) -> bool {
        self.refresh_rate <= 60.0
    }

    /// Elapsed time required before the next swap
    pub fn threshold(&self) -> Duration {
        if self.is_low_refresh() {
            self.interval.saturating_sub(Duration::from_millis(VSYNC_SLACK_MS))
        } else {
            self.interval
        }
    }

    /// Time since the last presented frame (absolute difference)
    pub fn elapsed(&self, now: Duration) -> Duration {
        now.abs_diff(self.last_frame)
    }

    pub fn is_due(&self, now: Duration) -> bool {
        self.elapsed(now) >= self.threshold()
    }

    /// Record a swap at `now`; `elapsed` is the value measured for this draw.
    pub fn mark_presented(&mut self, now: Duration, elapsed: Duration) {
        self.last_frame = if self.is_low_refresh() {
            now
        } else {
            let overshoot = elapsed.saturating_sub(self.threshold());
            now.saturating_sub(overshoot.min(Duration::from_millis(MAX_CATCH_UP_MS)))
        };
    }

    pub fn last_frame(&self) -> Duration {
        self.last_frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn test_frame_interval() {
        assert_eq!(frame_interval(30, false), ms(33));
        assert_eq!(frame_interval(60, false), ms(16));
        assert_eq!(frame_interval(120, false), ms(16));
        assert_eq!(frame_interval(60, true), ms(33));
        assert_eq!(frame_interval(24, true), ms(41));
        assert_eq!(frame_interval(0, false), ms(16));
    }

    #[test]
    fn test_threshold_slack() {
        let pacer = FramePacer::new(ms(33), 60.0);
        assert_eq!(pacer.threshold(), ms(27));

        let pacer = FramePacer::new(ms(33), 120.0);
        assert_eq!(pacer.threshold(), ms(33));
    }

    #[test]
    fn test_low_refresh_marks_now() {
        let mut pacer = FramePacer::new(ms(33), 60.0);
        assert!(pacer.is_due(ms(40)));
        pacer.mark_presented(ms(40), ms(40));
        assert_eq!(pacer.last_frame(), ms(40));
        assert!(!pacer.is_due(ms(60)));
        assert!(pacer.is_due(ms(67)));
    }

    #[test]
    fn test_high_refresh_catch_up() {
        let mut pacer = FramePacer::new(ms(33), 120.0);
        pacer.mark_presented(ms(100), ms(100));
        // overshoot 67ms capped at 16
        assert_eq!(pacer.last_frame(), ms(84));

        pacer.mark_presented(ms(120), ms(36));
        assert_eq!(pacer.last_frame(), ms(117));
    }

    #[test]
    fn test_refresh_hint_validation() {
        let mut pacer = FramePacer::new(ms(16), 60.0);
        pacer.set_refresh_rate(0.0);
        assert_eq!(pacer.refresh_rate(), 60.0);
        pacer.set_refresh_rate(144.0);
        assert_eq!(pacer.refresh_rate(), 144.0);
    }
}
