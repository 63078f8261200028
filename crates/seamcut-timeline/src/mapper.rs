//! Virtual/real coordinate transforms over a [`VirtualTimeline`].
//!
//! The mapper holds a shared reference to the current timeline and is
//! otherwise stateless. Every lookup treats segment ranges as half-open, so a
//! time equal to one segment's end belongs to the segment that starts there.
//! Misses never panic or error: they come back as an invalid [`Mapping`]
//! with time `0`, since gaps are expected while an edit is in progress.

use seamcut_core::SegmentId;
use serde::Serialize;
use std::sync::Arc;

use crate::segment::{VirtualSegment, VirtualTimeline};

/// Result of a time conversion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Mapping {
    /// Converted time in seconds, or `0` when `is_valid` is false.
    pub time: f64,
    pub is_valid: bool,
    /// Segment the input resolved in.
    pub segment_id: Option<SegmentId>,
}

impl Mapping {
    pub fn invalid() -> Self {
        Self {
            time: 0.0,
            is_valid: false,
            segment_id: None,
        }
    }

    fn valid(time: f64, segment: &VirtualSegment) -> Self {
        Self {
            time,
            is_valid: true,
            segment_id: Some(segment.id),
        }
    }
}

/// Snapshot handed to per-frame consumers (subtitle renderer, progress UI).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameData {
    pub virtual_time: f64,
    pub real_time: f64,
    /// Host timestamp of the displayed frame, in seconds.
    pub display_timestamp: f64,
    pub duration: f64,
    /// `virtual_time / duration`, `0` for an empty timeline.
    pub progress: f64,
    pub segment_id: Option<SegmentId>,
    /// Whether `virtual_time` lies inside an enabled segment.
    pub is_valid: bool,
}

/// Coordinate transform layer between virtual and real time.
#[derive(Debug, Clone, Default)]
pub struct TimelineMapper {
    timeline: Arc<VirtualTimeline>,
}

impl TimelineMapper {
    pub fn new(timeline: VirtualTimeline) -> Self {
        Self {
            timeline: Arc::new(timeline),
        }
    }

    /// Swap in a rebuilt timeline.
    pub fn set_timeline(&mut self, timeline: Arc<VirtualTimeline>) {
        self.timeline = timeline;
    }

    pub fn timeline(&self) -> &Arc<VirtualTimeline> {
        &self.timeline
    }

    pub fn duration(&self) -> f64 {
        self.timeline.duration()
    }

    /// The enabled segment whose `[virtual_start, virtual_end)` contains
    /// `virtual_time`.
    pub fn segment_at(&self, virtual_time: f64) -> Option<&VirtualSegment> {
        if !virtual_time.is_finite() || virtual_time < 0.0 || virtual_time > self.duration() {
            return None;
        }
        let order = self.timeline.ordered_index();
        let segments = self.timeline.segments();
        // First segment starting strictly after `virtual_time`; the candidate
        // is the one before it.
        let after = order.partition_point(|&i| segments[i].virtual_start_time <= virtual_time);
        let candidate = &segments[*order.get(after.checked_sub(1)?)?];
        candidate.contains_virtual(virtual_time).then_some(candidate)
    }

    /// Convert a virtual time to the real source position.
    pub fn virtual_to_real(&self, virtual_time: f64) -> Mapping {
        match self.segment_at(virtual_time) {
            Some(seg) => Mapping::valid(seg.virtual_to_real(virtual_time), seg),
            None => Mapping::invalid(),
        }
    }

    /// The enabled segment whose `[real_start, real_end)` contains `real_time`.
    ///
    /// Reordered edits do not keep real ranges sorted, so this is a linear
    /// scan in virtual order; the first match wins.
    pub fn segment_at_real(&self, real_time: f64) -> Option<&VirtualSegment> {
        if !real_time.is_finite() {
            return None;
        }
        self.timeline
            .enabled_segments()
            .find(|seg| seg.contains_real(real_time))
    }

    /// Convert a real source position back to virtual time. Positions inside
    /// disabled regions resolve to an invalid mapping.
    pub fn real_to_virtual(&self, real_time: f64) -> Mapping {
        match self.segment_at_real(real_time) {
            Some(seg) => Mapping::valid(seg.real_to_virtual(real_time), seg),
            None => Mapping::invalid(),
        }
    }

    /// Like [`Self::real_to_virtual`], but a real position within `tolerance`
    /// seconds outside an enabled segment snaps onto that segment's edge.
    pub fn real_to_virtual_with_tolerance(&self, real_time: f64, tolerance: f64) -> Mapping {
        let exact = self.real_to_virtual(real_time);
        if exact.is_valid || !real_time.is_finite() {
            return exact;
        }
        let tolerance = tolerance.max(0.0);
        let near = self.timeline.enabled_segments().find_map(|seg| {
            let before_start = seg.real_start_time - real_time;
            let past_end = real_time - seg.real_end_time;
            if before_start > 0.0 && before_start <= tolerance {
                Some(Mapping::valid(seg.virtual_start_time, seg))
            } else if past_end >= 0.0 && past_end <= tolerance {
                Some(Mapping::valid(seg.virtual_end_time, seg))
            } else {
                None
            }
        });
        near.unwrap_or_else(Mapping::invalid)
    }

    pub fn first_segment(&self) -> Option<&VirtualSegment> {
        self.timeline.enabled_segments().next()
    }

    pub fn last_segment(&self) -> Option<&VirtualSegment> {
        self.timeline.enabled_segments().last()
    }

    /// First enabled segment starting at or after `virtual_time`.
    pub fn next_segment_after_virtual(&self, virtual_time: f64) -> Option<&VirtualSegment> {
        self.timeline
            .enabled_segments()
            .find(|seg| seg.virtual_start_time >= virtual_time)
    }

    /// Enabled segment with the smallest real start at or after `real_time`.
    pub fn next_segment_after_real(&self, real_time: f64) -> Option<&VirtualSegment> {
        self.timeline
            .enabled_segments()
            .filter(|seg| seg.real_start_time >= real_time)
            .min_by(|a, b| a.real_start_time.total_cmp(&b.real_start_time))
    }

    pub fn segment_by_id(&self, id: SegmentId) -> Option<&VirtualSegment> {
        self.timeline.segments().iter().find(|seg| seg.id == id)
    }

    /// Enabled segment by its position in virtual order.
    pub fn segment_at_index(&self, index: usize) -> Option<&VirtualSegment> {
        self.timeline.enabled_segments().nth(index)
    }

    /// Bundle a frame's times for subscribers.
    pub fn create_frame_data(&self, virtual_time: f64, real_time: f64, display_timestamp: f64) -> FrameData {
        let duration = self.duration();
        let segment = self.segment_at(virtual_time);
        let progress = if duration > 0.0 {
            (virtual_time / duration).clamp(0.0, 1.0)
        } else {
            0.0
        };
        FrameData {
            virtual_time,
            real_time,
            display_timestamp,
            duration,
            progress,
            segment_id: segment.map(|s| s.id),
            is_valid: segment.is_some(),
        }
    }
}
