//! Frame ticks and per-frame bookkeeping.

use serde::Serialize;
use std::time::Duration;

/// Which host mechanism is delivering frame callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClockSource {
    /// One callback per presented video frame.
    VideoFrame,
    /// Generic per-animation-frame callback; used when the element cannot
    /// report presented frames.
    AnimationFrame,
}

impl std::fmt::Display for ClockSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClockSource::VideoFrame => write!(f, "video-frame"),
            ClockSource::AnimationFrame => write!(f, "animation-frame"),
        }
    }
}

/// One frame callback forwarded by the host.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FrameTick {
    pub source: ClockSource,
    /// Host display timestamp in seconds.
    pub timestamp: f64,
    /// Presentation time of the frame in the source, when the host knows it.
    pub media_time: Option<f64>,
}

impl FrameTick {
    pub fn video_frame(timestamp: f64, media_time: f64) -> Self {
        Self {
            source: ClockSource::VideoFrame,
            timestamp,
            media_time: Some(media_time),
        }
    }

    pub fn animation_frame(timestamp: f64) -> Self {
        Self {
            source: ClockSource::AnimationFrame,
            timestamp,
            media_time: None,
        }
    }
}

/// Minimum inter-frame interval gate.
#[derive(Debug, Clone)]
pub(crate) struct FrameGate {
    min_interval: Duration,
    last: Option<Duration>,
}

impl FrameGate {
    pub(crate) fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last: None,
        }
    }

    /// Whether a frame arriving at `now` should be processed. Admitted frames
    /// restart the interval.
    pub(crate) fn admit(&mut self, now: Duration) -> bool {
        match self.last {
            Some(last) if now.saturating_sub(last) < self.min_interval => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }

    pub(crate) fn reset(&mut self) {
        self.last = None;
    }
}

/// Rolling frame counters, logged at most once per interval.
#[derive(Debug, Clone)]
pub(crate) struct FrameStats {
    interval: Duration,
    window_start: Option<Duration>,
    processed: u64,
    throttled: u64,
}

impl FrameStats {
    pub(crate) fn new(interval: Duration) -> Self {
        Self {
            interval,
            window_start: None,
            processed: 0,
            throttled: 0,
        }
    }

    pub(crate) fn record_processed(&mut self) {
        self.processed += 1;
    }

    pub(crate) fn record_throttled(&mut self) {
        self.throttled += 1;
    }

    /// Emit the window's counters if the interval has elapsed. Returns whether
    /// a line was logged.
    pub(crate) fn maybe_log(&mut self, now: Duration, virtual_time: f64) -> bool {
        let start = *self.window_start.get_or_insert(now);
        let elapsed = now.saturating_sub(start);
        if self.interval.is_zero() || elapsed < self.interval {
            return false;
        }
        let fps = self.processed as f64 / elapsed.as_secs_f64();
        tracing::debug!(
            processed = self.processed,
            throttled = self.throttled,
            fps = format!("{fps:.1}"),
            virtual_time,
            "Frame stats"
        );
        self.window_start = Some(now);
        self.processed = 0;
        self.throttled = 0;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn gate_enforces_min_interval() {
        let mut gate = FrameGate::new(ms(16));
        assert!(gate.admit(ms(0)));
        assert!(!gate.admit(ms(8)));
        assert!(!gate.admit(ms(15)));
        assert!(gate.admit(ms(16)));
        assert!(!gate.admit(ms(20)));
        assert!(gate.admit(ms(40)));
    }

    #[test]
    fn gate_reset_admits_next_frame() {
        let mut gate = FrameGate::new(ms(16));
        assert!(gate.admit(ms(100)));
        gate.reset();
        assert!(gate.admit(ms(101)));
    }

    #[test]
    fn zero_interval_admits_everything() {
        let mut gate = FrameGate::new(Duration::ZERO);
        assert!(gate.admit(ms(5)));
        assert!(gate.admit(ms(5)));
    }

    #[test]
    fn stats_log_once_per_interval() {
        let mut stats = FrameStats::new(ms(1000));
        stats.record_processed();
        assert!(!stats.maybe_log(ms(0), 0.0));
        stats.record_processed();
        stats.record_throttled();
        assert!(!stats.maybe_log(ms(500), 0.5));
        assert!(stats.maybe_log(ms(1000), 1.0));
        assert_eq!(stats.processed, 0);
        assert!(!stats.maybe_log(ms(1500), 1.5));
    }

    #[test]
    fn tick_constructors() {
        let tick = FrameTick::video_frame(1.0, 4.5);
        assert_eq!(tick.source, ClockSource::VideoFrame);
        assert_eq!(tick.media_time, Some(4.5));
        assert_eq!(FrameTick::animation_frame(2.0).media_time, None);
        assert_eq!(ClockSource::AnimationFrame.to_string(), "animation-frame");
    }
}
