//! Segment boundary handling and playback completion detection.
//!
//! [`SegmentController`] answers two questions for the player:
//!
//! 1. Has playback run off the end of the timeline (or sat past the end of
//!    enabled coverage longer than the debounce window)? If so, report it
//!    exactly once so the owner can stop instead of looping.
//! 2. The media element is somewhere no enabled segment covers; where should
//!    it go next?

use seamcut_core::config::SegmentConfig;
use seamcut_core::SegmentId;
use serde::Serialize;
use std::time::Duration;

use crate::mapper::TimelineMapper;

/// Why completion fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionReason {
    /// Virtual time reached the timeline duration.
    ReachedEnd,
    /// Virtual time sat past the last enabled segment for the debounce window.
    OutsideCoverage,
    /// The timeline has no enabled segments.
    EmptyTimeline,
}

/// Where to reposition the media element when it is outside every enabled
/// segment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TransitionTarget {
    pub segment_id: SegmentId,
    pub virtual_time: f64,
    pub real_time: f64,
}

/// Boundary detection with debounced completion signalling.
#[derive(Debug, Clone)]
pub struct SegmentController {
    boundary_threshold: f64,
    debounce: Duration,
    /// Clock reading when virtual time was first seen past coverage.
    outside_since: Option<Duration>,
    completed: bool,
}

impl SegmentController {
    pub fn new(config: &SegmentConfig) -> Self {
        Self {
            boundary_threshold: config.boundary_threshold_secs(),
            debounce: config.completion_debounce(),
            outside_since: None,
            completed: false,
        }
    }

    /// Boundary threshold in seconds.
    pub fn boundary_threshold(&self) -> f64 {
        self.boundary_threshold
    }

    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    pub fn has_completed(&self) -> bool {
        self.completed
    }

    /// Forget any pending or fired completion. Called whenever playback
    /// starts, seeks, or the timeline changes.
    pub fn reset(&mut self) {
        self.outside_since = None;
        self.completed = false;
    }

    /// Feed the current virtual time; returns a reason the first time
    /// playback counts as complete, `None` otherwise.
    ///
    /// Reaching the duration completes immediately. Sitting in a gap with a
    /// later segment ahead never completes, since the virtual clock keeps
    /// advancing towards it. Sitting past the last enabled segment completes
    /// only after the debounce window, which absorbs jitter while a seek
    /// settles or a rebuild lands.
    pub fn check_completion(
        &mut self,
        mapper: &TimelineMapper,
        virtual_time: f64,
        now: Duration,
    ) -> Option<CompletionReason> {
        if self.completed {
            return None;
        }

        let duration = mapper.duration();
        let reason = if mapper.timeline().is_empty() {
            Some(CompletionReason::EmptyTimeline)
        } else if virtual_time >= duration {
            Some(CompletionReason::ReachedEnd)
        } else if mapper.segment_at(virtual_time).is_none()
            && mapper.next_segment_after_virtual(virtual_time).is_none()
        {
            let since = *self.outside_since.get_or_insert(now);
            (now.saturating_sub(since) >= self.debounce).then_some(CompletionReason::OutsideCoverage)
        } else {
            self.outside_since = None;
            None
        };

        if let Some(reason) = reason {
            self.completed = true;
            self.outside_since = None;
            tracing::debug!(virtual_time, duration, ?reason, "Playback complete");
        }
        reason
    }

    /// Whether a real position read from the media element counts as inside
    /// an enabled segment, allowing for the boundary threshold.
    pub fn is_real_time_covered(&self, mapper: &TimelineMapper, real_time: f64) -> bool {
        mapper
            .real_to_virtual_with_tolerance(real_time, self.boundary_threshold)
            .is_valid
    }

    /// Pick where playback should continue from `virtual_time`: the segment
    /// containing it, or else the next enabled segment after it.
    pub fn transition_target(
        &self,
        mapper: &TimelineMapper,
        virtual_time: f64,
    ) -> Option<TransitionTarget> {
        if let Some(seg) = mapper.segment_at(virtual_time) {
            return Some(TransitionTarget {
                segment_id: seg.id,
                virtual_time,
                real_time: seg.virtual_to_real(virtual_time),
            });
        }
        mapper
            .next_segment_after_virtual(virtual_time)
            .map(|seg| TransitionTarget {
                segment_id: seg.id,
                virtual_time: seg.virtual_start_time,
                real_time: seg.real_start_time,
            })
    }
}

impl Default for SegmentController {
    fn default() -> Self {
        Self::new(&SegmentConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::{VirtualSegment, VirtualTimeline};

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    fn mapper_with(segments: Vec<VirtualSegment>) -> TimelineMapper {
        TimelineMapper::new(VirtualTimeline::new(segments))
    }

    fn two_segments() -> TimelineMapper {
        mapper_with(vec![
            VirtualSegment::with_random_id(0.0, 5.0, 0.0, 5.0),
            VirtualSegment::with_random_id(5.0, 10.0, 10.0, 15.0),
        ])
    }

    #[test]
    fn defaults_match_config() {
        let ctl = SegmentController::default();
        assert!((ctl.boundary_threshold() - 0.05).abs() < 1e-12);
        assert_eq!(ctl.debounce(), ms(100));
    }

    #[test]
    fn reaching_end_fires_once() {
        let mapper = two_segments();
        let mut ctl = SegmentController::default();
        assert_eq!(ctl.check_completion(&mapper, 9.9, ms(0)), None);
        assert_eq!(
            ctl.check_completion(&mapper, 10.0, ms(16)),
            Some(CompletionReason::ReachedEnd)
        );
        assert!(ctl.has_completed());
        assert_eq!(ctl.check_completion(&mapper, 10.0, ms(32)), None);
    }

    #[test]
    fn reset_rearms_completion() {
        let mapper = two_segments();
        let mut ctl = SegmentController::default();
        assert!(ctl.check_completion(&mapper, 10.0, ms(0)).is_some());
        ctl.reset();
        assert!(ctl.check_completion(&mapper, 10.0, ms(16)).is_some());
    }

    #[test]
    fn empty_timeline_completes() {
        let mapper = TimelineMapper::default();
        let mut ctl = SegmentController::default();
        assert_eq!(
            ctl.check_completion(&mapper, 0.0, ms(0)),
            Some(CompletionReason::EmptyTimeline)
        );
    }

    #[test]
    fn interior_gap_never_completes() {
        let mapper = mapper_with(vec![
            VirtualSegment::with_random_id(0.0, 4.0, 0.0, 4.0),
            VirtualSegment::with_random_id(6.0, 8.0, 6.0, 8.0),
        ]);
        let mut ctl = SegmentController::default();
        // Gap at 5 with a segment ahead: never completes.
        assert_eq!(ctl.check_completion(&mapper, 5.0, ms(0)), None);
        assert_eq!(ctl.check_completion(&mapper, 5.5, ms(500)), None);
        assert!(!ctl.has_completed());
    }

    #[test]
    fn outside_coverage_fires_after_debounce() {
        // Duration comes from a zero-length trailing segment at 12 while
        // coverage stops at 8.
        let mapper = mapper_with(vec![
            VirtualSegment::with_random_id(0.0, 8.0, 0.0, 8.0),
            VirtualSegment::with_random_id(12.0, 12.0, 20.0, 20.0),
        ]);
        assert_eq!(mapper.duration(), 12.0);
        let mut ctl = SegmentController::default();
        assert_eq!(ctl.check_completion(&mapper, 9.0, ms(1000)), None);
        assert_eq!(ctl.check_completion(&mapper, 9.05, ms(1050)), None);
        assert_eq!(
            ctl.check_completion(&mapper, 9.1, ms(1100)),
            Some(CompletionReason::OutsideCoverage)
        );
    }

    #[test]
    fn returning_to_coverage_clears_debounce() {
        let mapper = mapper_with(vec![
            VirtualSegment::with_random_id(0.0, 8.0, 0.0, 8.0),
            VirtualSegment::with_random_id(12.0, 12.0, 20.0, 20.0),
        ]);
        let mut ctl = SegmentController::default();
        assert_eq!(ctl.check_completion(&mapper, 9.0, ms(0)), None);
        assert_eq!(ctl.check_completion(&mapper, 3.0, ms(80)), None);
        // Timer restarted: 90 ms outside is not yet enough.
        assert_eq!(ctl.check_completion(&mapper, 9.0, ms(90)), None);
        assert_eq!(ctl.check_completion(&mapper, 9.0, ms(180)), None);
        assert!(ctl.check_completion(&mapper, 9.0, ms(190)).is_some());
    }

    #[test]
    fn covered_real_time_uses_threshold() {
        let mapper = two_segments();
        let ctl = SegmentController::default();
        assert!(ctl.is_real_time_covered(&mapper, 12.0));
        assert!(ctl.is_real_time_covered(&mapper, 9.96));
        assert!(!ctl.is_real_time_covered(&mapper, 7.0));
    }

    #[test]
    fn transition_target_prefers_containing_segment() {
        let mapper = two_segments();
        let ctl = SegmentController::default();
        let target = ctl.transition_target(&mapper, 7.0).unwrap();
        assert_eq!(target.virtual_time, 7.0);
        assert_eq!(target.real_time, 12.0);
    }

    #[test]
    fn transition_target_jumps_gap_to_next_segment() {
        let mapper = mapper_with(vec![
            VirtualSegment::with_random_id(0.0, 4.0, 0.0, 4.0),
            VirtualSegment::with_random_id(6.0, 8.0, 20.0, 22.0),
        ]);
        let ctl = SegmentController::default();
        let target = ctl.transition_target(&mapper, 5.0).unwrap();
        assert_eq!(target.virtual_time, 6.0);
        assert_eq!(target.real_time, 20.0);
        assert!(ctl.transition_target(&mapper, 8.0).is_none());
    }
}
