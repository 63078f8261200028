//! seamcut-player: drive a real media element through a virtual timeline.
//!
//! [`PlayerController`] owns the playback session. The host forwards two
//! things into it: per-frame callbacks ([`FrameTick`]) and the media
//! element's lifecycle events ([`MediaEvent`]). On every admitted frame the
//! controller advances its own wall-clock-driven virtual time, resolves the
//! active segment, nudges the element towards the matching real position and
//! then notifies subscribers, in that order.
//!
//! # Modules
//!
//! - [`controller`] - [`PlayerController`]: the play/pause/seek state machine
//! - [`media`] - [`MediaElement`] trait and [`MediaEvent`]s consumed from the host
//! - [`seek`] - Generation-counted seek arbitration and [`SeekHandle`]
//! - [`observer`] - Fan-out subscriber lists with panic isolation
//! - [`frame`] - Frame ticks, the minimum-interval gate and frame statistics
//! - [`events`] - Payloads delivered to subscribers
//! - [`simulated`] - [`SimulatedMedia`] and a deterministic [`SimulationDriver`]

pub mod controller;
pub mod error;
pub mod events;
pub mod frame;
pub mod media;
pub mod observer;
pub mod seek;
pub mod simulated;

// Re-export the most commonly used items at the crate root.
pub use controller::{PlayerController, PlayerCounters, PlayerDebugInfo, SubscriberCounts};
pub use error::PlayerError;
pub use events::{Completion, PlaybackState, SeekEvent, SeekPhase, SegmentChange, StateChange, TimelineChange};
pub use frame::{ClockSource, FrameTick};
pub use media::{MediaElement, MediaError, MediaEvent, VideoDimensions};
pub use observer::{Subscribers, Subscription};
pub use seek::{SeekCompletion, SeekError, SeekHandle};
pub use simulated::{SimulatedMedia, SimulationDriver};
