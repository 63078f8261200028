//! seamcut-timeline: the virtual timeline and its mapping onto source media.
//!
//! An edit is a list of clips cut from one source. Enabled clips play
//! back-to-back on a continuous *virtual* timeline; disabled ranges are
//! skipped. This crate models that mapping and answers the questions the
//! player asks every frame.
//!
//! # Modules
//!
//! - [`segment`] - [`VirtualSegment`] and [`VirtualTimeline`], plus structural diagnostics
//! - [`builder`] - Build a timeline from the editor's clip list or an edit document
//! - [`mapper`] - [`TimelineMapper`]: virtual/real conversions and frame data
//! - [`boundary`] - [`SegmentController`]: boundary tolerance, transition targets, completion

pub mod boundary;
pub mod builder;
pub mod mapper;
pub mod segment;

// Re-export commonly used items at the crate root.
pub use boundary::{CompletionReason, SegmentController, TransitionTarget};
pub use builder::{parse_edit_json, Clip, TimelineBuilder};
pub use mapper::{FrameData, Mapping, TimelineMapper};
pub use segment::{TimelineIssue, VirtualSegment, VirtualTimeline};
