//! Engine configuration types.
//!
//! The top-level [`Config`] struct is deserialized from a TOML file by the
//! `seamcut` binary and carries the tuning knobs for segment detection, the
//! player loop and the simulated media element. Every section defaults
//! sensibly so a completely empty document is valid.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::Result;
use crate::Error;

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub segments: SegmentConfig,
    pub player: PlayerConfig,
    pub simulation: SimulationConfig,
}

impl Config {
    /// Reject settings the engine cannot run with.
    ///
    /// Everything else is clamped at use and only reported by
    /// [`Config::validate`].
    pub fn check(&self) -> Result<()> {
        let player = &self.player;
        if !(player.min_playback_rate > 0.0) || !player.max_playback_rate.is_finite() {
            return Err(Error::config(format!(
                "playback rate bounds must be positive and finite (min {}, max {})",
                player.min_playback_rate, player.max_playback_rate
            )));
        }
        if player.min_playback_rate > player.max_playback_rate {
            return Err(Error::config(format!(
                "player.min_playback_rate {} exceeds max_playback_rate {}",
                player.min_playback_rate, player.max_playback_rate
            )));
        }
        if !(self.simulation.frame_rate > 0.0) || !self.simulation.frame_rate.is_finite() {
            return Err(Error::config(format!(
                "simulation.frame_rate must be positive, got {}",
                self.simulation.frame_rate
            )));
        }
        Ok(())
    }

    /// Return a list of validation warnings (non-fatal issues).
    ///
    /// None of these stop the engine from running; they flag settings that
    /// will not behave as written.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.segments.boundary_threshold_ms == 0 {
            warnings.push("segments.boundary_threshold_ms is 0; boundary reads will be exact".into());
        }
        if self.segments.completion_debounce_ms == 0 {
            warnings.push(
                "segments.completion_debounce_ms is 0; completion may fire on seek jitter".into(),
            );
        }

        if self.player.drift_threshold_ms == 0 {
            warnings.push(
                "player.drift_threshold_ms is 0; every frame will reposition the media".into(),
            );
        }
        if self.player.min_frame_interval_ms > 1000 {
            warnings.push(format!(
                "player.min_frame_interval_ms {} throttles below 1 fps",
                self.player.min_frame_interval_ms
            ));
        }
        if self.player.default_playback_rate < self.player.min_playback_rate
            || self.player.default_playback_rate > self.player.max_playback_rate
        {
            warnings.push(format!(
                "player.default_playback_rate {} is outside [{}, {}] and will be clamped",
                self.player.default_playback_rate,
                self.player.min_playback_rate,
                self.player.max_playback_rate
            ));
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// Segment boundary and completion detection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentConfig {
    /// How close a noisy real-time read may be to a segment edge and still
    /// count as inside it.
    pub boundary_threshold_ms: u64,
    /// How long playback must sit past the end of coverage before the
    /// completion signal fires.
    pub completion_debounce_ms: u64,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            boundary_threshold_ms: 50,
            completion_debounce_ms: 100,
        }
    }
}

impl SegmentConfig {
    /// Boundary threshold in seconds.
    pub fn boundary_threshold_secs(&self) -> f64 {
        self.boundary_threshold_ms as f64 / 1000.0
    }

    pub fn completion_debounce(&self) -> Duration {
        Duration::from_millis(self.completion_debounce_ms)
    }
}

/// Player loop settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Drift between the media element and the target position above which
    /// the element is repositioned.
    pub drift_threshold_ms: u64,
    /// Minimum interval between processed frame callbacks.
    pub min_frame_interval_ms: u64,
    pub default_playback_rate: f64,
    pub min_playback_rate: f64,
    pub max_playback_rate: f64,
    /// Interval between periodic frame statistics log lines.
    pub stats_log_interval_ms: u64,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            drift_threshold_ms: 100,
            min_frame_interval_ms: 16,
            default_playback_rate: 1.0,
            min_playback_rate: 0.0625,
            max_playback_rate: 16.0,
            stats_log_interval_ms: 1000,
        }
    }
}

impl PlayerConfig {
    /// Drift threshold in seconds.
    pub fn drift_threshold_secs(&self) -> f64 {
        self.drift_threshold_ms as f64 / 1000.0
    }

    pub fn min_frame_interval(&self) -> Duration {
        Duration::from_millis(self.min_frame_interval_ms)
    }

    pub fn stats_log_interval(&self) -> Duration {
        Duration::from_millis(self.stats_log_interval_ms)
    }

    /// Clamp a requested playback rate into the configured bounds.
    ///
    /// Non-finite requests fall back to the default rate. Inverted bounds are
    /// tolerated by treating the smaller value as the minimum.
    pub fn clamp_rate(&self, rate: f64) -> f64 {
        let lo = self.min_playback_rate.min(self.max_playback_rate).max(f64::MIN_POSITIVE);
        let hi = self.min_playback_rate.max(self.max_playback_rate).max(lo);
        let rate = if rate.is_finite() {
            rate
        } else {
            self.default_playback_rate
        };
        if rate.is_finite() {
            rate.clamp(lo, hi)
        } else {
            1.0_f64.clamp(lo, hi)
        }
    }
}

/// Settings for the simulated media element used by the CLI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Frames per second delivered to the player loop.
    pub frame_rate: f64,
    /// How many frames a seek on the simulated element takes to settle.
    pub seek_latency_frames: u32,
    /// Whether the simulated element exposes per-video-frame callbacks.
    pub video_frame_callbacks: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            frame_rate: 60.0,
            seek_latency_frames: 2,
            video_frame_callbacks: true,
        }
    }
}

impl SimulationConfig {
    /// Duration of one simulated frame.
    pub fn frame_duration(&self) -> Duration {
        let fps = if self.frame_rate > 0.0 { self.frame_rate } else { 60.0 };
        Duration::from_secs_f64(1.0 / fps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = Config::default();
        assert_eq!(cfg.segments.boundary_threshold_ms, 50);
        assert_eq!(cfg.segments.completion_debounce_ms, 100);
        assert_eq!(cfg.player.drift_threshold_ms, 100);
        assert_eq!(cfg.player.min_frame_interval_ms, 16);
        assert!((cfg.player.default_playback_rate - 1.0).abs() < f64::EPSILON);
        assert_eq!(cfg.simulation.seek_latency_frames, 2);
    }

    #[test]
    fn default_config_no_warnings() {
        let cfg = Config::default();
        let warnings = cfg.validate();
        assert!(warnings.is_empty(), "unexpected warnings: {:?}", warnings);
    }

    #[test]
    fn default_config_passes_check() {
        assert!(Config::default().check().is_ok());
    }

    #[test]
    fn inverted_rate_bounds_are_rejected() {
        let mut cfg = Config::default();
        cfg.player.min_playback_rate = 4.0;
        cfg.player.max_playback_rate = 2.0;
        let err = cfg.check().unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("exceeds max_playback_rate"));
    }

    #[test]
    fn non_positive_frame_rate_is_rejected() {
        let mut cfg = Config::default();
        cfg.simulation.frame_rate = 0.0;
        assert!(cfg.check().is_err());
        cfg.simulation.frame_rate = f64::NAN;
        assert!(cfg.check().is_err());
    }

    #[test]
    fn zero_thresholds_warn() {
        let mut cfg = Config::default();
        cfg.segments.completion_debounce_ms = 0;
        cfg.player.drift_threshold_ms = 0;
        let warnings = cfg.validate();
        assert_eq!(warnings.len(), 2);
    }

    #[test]
    fn clamp_rate_bounds() {
        let player = PlayerConfig::default();
        assert_eq!(player.clamp_rate(2.0), 2.0);
        assert_eq!(player.clamp_rate(0.0), 0.0625);
        assert_eq!(player.clamp_rate(-3.0), 0.0625);
        assert_eq!(player.clamp_rate(100.0), 16.0);
        assert_eq!(player.clamp_rate(f64::NAN), 1.0);
    }

    #[test]
    fn unit_conversions() {
        let cfg = Config::default();
        assert!((cfg.segments.boundary_threshold_secs() - 0.05).abs() < 1e-12);
        assert!((cfg.player.drift_threshold_secs() - 0.1).abs() < 1e-12);
        assert_eq!(cfg.player.min_frame_interval(), Duration::from_millis(16));
        assert_eq!(cfg.segments.completion_debounce(), Duration::from_millis(100));
    }
}
