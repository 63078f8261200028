//! The media element the player drives.
//!
//! This is the host's playable/seekable handle (a `<video>` element, a
//! native decoder session, or [`SimulatedMedia`](crate::SimulatedMedia)).
//! Seeks are asynchronous: [`MediaElement::set_current_time`] only starts
//! one, and the host reports completion by forwarding
//! [`MediaEvent::Seeked`] to the controller.

use serde::{Deserialize, Serialize};

/// Pixel dimensions of the decoded video.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoDimensions {
    pub width: u32,
    pub height: u32,
}

/// Failure reported by the media element itself.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MediaError {
    /// The element refused to start playback (autoplay policy, no source, ...).
    #[error("playback rejected: {0}")]
    PlayRejected(String),
}

/// Lifecycle events the host forwards from the element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "detail", rename_all = "snake_case")]
pub enum MediaEvent {
    /// A seek started.
    Seeking,
    /// A seek finished; `current_time` now reports the new position.
    Seeked,
    Play,
    Pause,
    /// The element reached the end of its source.
    Ended,
    /// The element reported an error.
    Error(String),
}

/// A playable, seekable media handle.
pub trait MediaElement {
    /// Start or resume playback.
    fn play(&mut self) -> Result<(), MediaError>;

    fn pause(&mut self);

    fn is_paused(&self) -> bool;

    /// Whether a seek is still in flight.
    fn is_seeking(&self) -> bool;

    /// Current position in the source, in seconds.
    fn current_time(&self) -> f64;

    /// Begin repositioning to `time` seconds in the source.
    fn set_current_time(&mut self, time: f64);

    /// Source duration in seconds.
    fn duration(&self) -> f64;

    fn dimensions(&self) -> VideoDimensions;

    fn set_playback_rate(&mut self, rate: f64);

    /// Whether the host can deliver one callback per presented video frame.
    /// When it cannot, the player falls back to animation-frame ticks.
    fn supports_video_frame_callbacks(&self) -> bool;
}
