//! Payloads delivered to subscribers.

use seamcut_core::SegmentId;
use seamcut_timeline::CompletionReason;
use serde::Serialize;

/// Controller state. `Seeking` is transient and never observed between calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackState {
    #[default]
    Idle,
    Playing,
    Paused,
    Seeking,
}

impl std::fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PlaybackState::Idle => "idle",
            PlaybackState::Playing => "playing",
            PlaybackState::Paused => "paused",
            PlaybackState::Seeking => "seeking",
        };
        f.write_str(s)
    }
}

/// Play/pause/stop transitions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StateChange {
    pub previous: PlaybackState,
    pub current: PlaybackState,
    pub virtual_time: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SeekPhase {
    /// `seek()` was called; virtual time already reflects the target.
    Requested,
    /// The media element finished repositioning for the latest request.
    Settled,
    /// The element was repositioned by something other than the controller
    /// (native controls, scripting) and virtual time was resynchronised.
    Native,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SeekEvent {
    /// Request generation; `None` for native seeks.
    pub generation: Option<u64>,
    pub phase: SeekPhase,
    pub virtual_time: f64,
    pub real_time: Option<f64>,
}

/// The active segment changed. `None` means a gap.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SegmentChange {
    pub previous: Option<SegmentId>,
    pub current: Option<SegmentId>,
    pub virtual_time: f64,
}

/// A rebuilt timeline was applied.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TimelineChange {
    pub duration: f64,
    pub previous_duration: f64,
    pub segment_count: usize,
    pub enabled_count: usize,
    /// Virtual time after clamping to the new duration.
    pub virtual_time: f64,
}

/// Playback ran to completion. Fired once per run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Completion {
    pub reason: CompletionReason,
    pub virtual_time: f64,
}
