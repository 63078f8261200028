//! Virtual segments and the timeline they form.
//!
//! A [`VirtualTimeline`] is immutable once built. The editor rebuilds it
//! wholesale on every edit and hands the new value to the player, which
//! swaps its reference instead of mutating segments in place.

use seamcut_core::SegmentId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Tolerance used when comparing segment edges for contiguity.
pub(crate) const EDGE_EPSILON: f64 = 1e-6;

/// One contiguous range of the edited sequence mapped onto a range of the
/// source media. All times are in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualSegment {
    #[serde(default)]
    pub id: SegmentId,
    pub virtual_start_time: f64,
    pub virtual_end_time: f64,
    pub real_start_time: f64,
    pub real_end_time: f64,
    #[serde(default = "default_enabled")]
    pub is_enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl VirtualSegment {
    /// Create an enabled segment.
    pub fn new(
        id: SegmentId,
        virtual_start_time: f64,
        virtual_end_time: f64,
        real_start_time: f64,
        real_end_time: f64,
    ) -> Self {
        Self {
            id,
            virtual_start_time,
            virtual_end_time,
            real_start_time,
            real_end_time,
            is_enabled: true,
        }
    }

    /// Create an enabled segment with a fresh random ID.
    pub fn with_random_id(
        virtual_start_time: f64,
        virtual_end_time: f64,
        real_start_time: f64,
        real_end_time: f64,
    ) -> Self {
        Self::new(
            SegmentId::new(),
            virtual_start_time,
            virtual_end_time,
            real_start_time,
            real_end_time,
        )
    }

    /// Return this segment marked as disabled.
    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.is_enabled = false;
        self
    }

    pub fn virtual_duration(&self) -> f64 {
        self.virtual_end_time - self.virtual_start_time
    }

    pub fn real_duration(&self) -> f64 {
        self.real_end_time - self.real_start_time
    }

    /// Whether `virtual_time` falls in `[virtual_start_time, virtual_end_time)`.
    pub fn contains_virtual(&self, virtual_time: f64) -> bool {
        virtual_time >= self.virtual_start_time && virtual_time < self.virtual_end_time
    }

    /// Whether `real_time` falls in `[real_start_time, real_end_time)`.
    pub fn contains_real(&self, real_time: f64) -> bool {
        real_time >= self.real_start_time && real_time < self.real_end_time
    }

    /// Real position for a virtual time, by linear interpolation of the
    /// progress through this segment.
    ///
    /// Segments whose two durations match map 1:1 without a ratio, so
    /// `real_start + (t - virtual_start)` stays exact.
    pub fn virtual_to_real(&self, virtual_time: f64) -> f64 {
        let offset = virtual_time - self.virtual_start_time;
        let virtual_len = self.virtual_duration();
        let real_len = self.real_duration();
        if virtual_len <= 0.0 {
            return self.real_start_time;
        }
        if (virtual_len - real_len).abs() < EDGE_EPSILON {
            return self.real_start_time + offset;
        }
        self.real_start_time + offset * (real_len / virtual_len)
    }

    /// Virtual position for a real time; the inverse of [`Self::virtual_to_real`].
    pub fn real_to_virtual(&self, real_time: f64) -> f64 {
        let offset = real_time - self.real_start_time;
        let virtual_len = self.virtual_duration();
        let real_len = self.real_duration();
        if real_len <= 0.0 {
            return self.virtual_start_time;
        }
        if (virtual_len - real_len).abs() < EDGE_EPSILON {
            return self.virtual_start_time + offset;
        }
        self.virtual_start_time + offset * (virtual_len / real_len)
    }

    /// Replace non-finite or negative times and inverted ranges so every
    /// segment is well-formed.
    fn sanitized(mut self) -> Self {
        fn finite_non_negative(t: f64) -> f64 {
            if t.is_finite() {
                t.max(0.0)
            } else {
                0.0
            }
        }
        self.virtual_start_time = finite_non_negative(self.virtual_start_time);
        self.virtual_end_time = finite_non_negative(self.virtual_end_time).max(self.virtual_start_time);
        self.real_start_time = finite_non_negative(self.real_start_time);
        self.real_end_time = finite_non_negative(self.real_end_time).max(self.real_start_time);
        self
    }
}

/// A structural problem found in a segment list. Construction never fails;
/// these are reported for diagnostics only.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TimelineIssue {
    /// A segment had a non-finite time that was replaced with `0`.
    NonFiniteTime { index: usize },
    /// A segment had a negative time that was clamped to `0`.
    NegativeTime { index: usize },
    /// `real_end_time < real_start_time`; the end was clamped to the start.
    InvertedRealRange { index: usize },
    /// `virtual_end_time < virtual_start_time`; the end was clamped to the start.
    InvertedVirtualRange { index: usize },
    /// An enabled segment starts before the previous enabled one.
    Unsorted { index: usize },
    /// An enabled segment does not start where the previous one ended.
    NonContiguous { index: usize, expected: f64, found: f64 },
    /// The first enabled segment does not start at virtual time zero.
    LeadingGap { start: f64 },
}

impl fmt::Display for TimelineIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimelineIssue::NonFiniteTime { index } => {
                write!(f, "segment {index}: non-finite time replaced with 0")
            }
            TimelineIssue::NegativeTime { index } => {
                write!(f, "segment {index}: negative time clamped to 0")
            }
            TimelineIssue::InvertedRealRange { index } => {
                write!(f, "segment {index}: real end before real start")
            }
            TimelineIssue::InvertedVirtualRange { index } => {
                write!(f, "segment {index}: virtual end before virtual start")
            }
            TimelineIssue::Unsorted { index } => {
                write!(f, "segment {index}: enabled segments out of virtual order")
            }
            TimelineIssue::NonContiguous {
                index,
                expected,
                found,
            } => write!(
                f,
                "segment {index}: starts at {found:.3}s, expected {expected:.3}s"
            ),
            TimelineIssue::LeadingGap { start } => {
                write!(f, "first enabled segment starts at {start:.3}s, not 0")
            }
        }
    }
}

/// The full virtual/real mapping for one edit.
///
/// `duration` is the virtual end of the last enabled segment, or `0` when
/// nothing is enabled.
#[derive(Debug, Clone, Default, Serialize)]
pub struct VirtualTimeline {
    segments: Vec<VirtualSegment>,
    duration: f64,
    /// Indices of enabled, non-empty segments ordered by virtual start.
    #[serde(skip)]
    by_virtual: Vec<usize>,
    #[serde(skip)]
    issues: Vec<TimelineIssue>,
}

impl VirtualTimeline {
    /// Build a timeline from a caller-maintained segment list.
    ///
    /// Malformed segments are clamped rather than rejected so a mid-edit
    /// list still produces a usable mapping; see [`Self::issues`].
    pub fn new(segments: Vec<VirtualSegment>) -> Self {
        let mut issues = Vec::new();
        for (index, seg) in segments.iter().enumerate() {
            let times = [
                seg.virtual_start_time,
                seg.virtual_end_time,
                seg.real_start_time,
                seg.real_end_time,
            ];
            if times.iter().any(|t| !t.is_finite()) {
                issues.push(TimelineIssue::NonFiniteTime { index });
            } else if times.iter().any(|t| *t < 0.0) {
                issues.push(TimelineIssue::NegativeTime { index });
            }
            if seg.real_end_time < seg.real_start_time {
                issues.push(TimelineIssue::InvertedRealRange { index });
            }
            if seg.virtual_end_time < seg.virtual_start_time {
                issues.push(TimelineIssue::InvertedVirtualRange { index });
            }
        }

        let segments: Vec<VirtualSegment> =
            segments.into_iter().map(VirtualSegment::sanitized).collect();

        let mut previous: Option<&VirtualSegment> = None;
        for (index, seg) in segments.iter().enumerate() {
            if !seg.is_enabled {
                continue;
            }
            match previous {
                None if seg.virtual_start_time > EDGE_EPSILON => {
                    issues.push(TimelineIssue::LeadingGap {
                        start: seg.virtual_start_time,
                    });
                }
                Some(prev) if seg.virtual_start_time < prev.virtual_start_time => {
                    issues.push(TimelineIssue::Unsorted { index });
                }
                Some(prev) if (seg.virtual_start_time - prev.virtual_end_time).abs() > EDGE_EPSILON => {
                    issues.push(TimelineIssue::NonContiguous {
                        index,
                        expected: prev.virtual_end_time,
                        found: seg.virtual_start_time,
                    });
                }
                _ => {}
            }
            previous = Some(seg);
        }

        let mut by_virtual: Vec<usize> = segments
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_enabled && s.virtual_duration() > 0.0)
            .map(|(i, _)| i)
            .collect();
        by_virtual.sort_by(|a, b| {
            segments[*a]
                .virtual_start_time
                .total_cmp(&segments[*b].virtual_start_time)
        });

        let duration = segments
            .iter()
            .filter(|s| s.is_enabled)
            .map(|s| s.virtual_end_time)
            .fold(0.0_f64, f64::max);

        if !issues.is_empty() {
            tracing::debug!(
                issues = issues.len(),
                segments = segments.len(),
                "Timeline built with structural issues"
            );
        }

        Self {
            segments,
            duration,
            by_virtual,
            issues,
        }
    }

    /// An empty timeline: duration `0`, every lookup invalid.
    pub fn empty() -> Self {
        Self::default()
    }

    /// All segments in caller order, including disabled ones.
    pub fn segments(&self) -> &[VirtualSegment] {
        &self.segments
    }

    /// Enabled, non-empty segments ordered by virtual start.
    pub fn enabled_segments(&self) -> impl Iterator<Item = &VirtualSegment> + '_ {
        self.by_virtual.iter().map(move |&i| &self.segments[i])
    }

    pub fn enabled_count(&self) -> usize {
        self.by_virtual.len()
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn is_empty(&self) -> bool {
        self.by_virtual.is_empty()
    }

    /// Structural issues found while building.
    pub fn issues(&self) -> &[TimelineIssue] {
        &self.issues
    }

    /// Total source time skipped by the edit.
    pub fn removed_duration(&self) -> f64 {
        self.segments
            .iter()
            .filter(|s| !s.is_enabled)
            .map(VirtualSegment::real_duration)
            .sum()
    }

    pub(crate) fn ordered_index(&self) -> &[usize] {
        &self.by_virtual
    }
}

impl PartialEq for VirtualTimeline {
    fn eq(&self, other: &Self) -> bool {
        self.segments == other.segments
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(vs: f64, ve: f64, rs: f64, re: f64) -> VirtualSegment {
        VirtualSegment::with_random_id(vs, ve, rs, re)
    }

    #[test]
    fn empty_timeline_has_zero_duration() {
        let tl = VirtualTimeline::empty();
        assert_eq!(tl.duration(), 0.0);
        assert!(tl.is_empty());
        assert!(tl.issues().is_empty());
    }

    #[test]
    fn duration_is_last_enabled_end() {
        let tl = VirtualTimeline::new(vec![
            seg(0.0, 5.0, 0.0, 5.0),
            seg(5.0, 10.0, 10.0, 15.0),
            seg(10.0, 10.0, 5.0, 10.0).disabled(),
        ]);
        assert_eq!(tl.duration(), 10.0);
        assert_eq!(tl.enabled_count(), 2);
        assert!(tl.issues().is_empty());
        assert_eq!(tl.removed_duration(), 5.0);
    }

    #[test]
    fn all_disabled_is_empty() {
        let tl = VirtualTimeline::new(vec![seg(0.0, 5.0, 0.0, 5.0).disabled()]);
        assert_eq!(tl.duration(), 0.0);
        assert!(tl.is_empty());
    }

    #[test]
    fn inverted_real_range_is_clamped() {
        let tl = VirtualTimeline::new(vec![seg(0.0, 5.0, 8.0, 3.0)]);
        let s = &tl.segments()[0];
        assert_eq!(s.real_start_time, 8.0);
        assert_eq!(s.real_end_time, 8.0);
        assert_eq!(tl.issues(), &[TimelineIssue::InvertedRealRange { index: 0 }]);
    }

    #[test]
    fn non_finite_times_are_zeroed() {
        let tl = VirtualTimeline::new(vec![seg(0.0, f64::NAN, 0.0, 5.0)]);
        assert_eq!(tl.segments()[0].virtual_end_time, 0.0);
        assert_eq!(tl.issues()[0], TimelineIssue::NonFiniteTime { index: 0 });
        assert_eq!(tl.duration(), 0.0);
    }

    #[test]
    fn detects_non_contiguous_segments() {
        let tl = VirtualTimeline::new(vec![seg(0.0, 5.0, 0.0, 5.0), seg(6.0, 8.0, 9.0, 11.0)]);
        assert_eq!(
            tl.issues(),
            &[TimelineIssue::NonContiguous {
                index: 1,
                expected: 5.0,
                found: 6.0
            }]
        );
    }

    #[test]
    fn detects_unsorted_segments_and_still_indexes_them() {
        let tl = VirtualTimeline::new(vec![seg(5.0, 10.0, 10.0, 15.0), seg(0.0, 5.0, 0.0, 5.0)]);
        assert!(tl.issues().contains(&TimelineIssue::Unsorted { index: 1 }));
        let starts: Vec<f64> = tl.enabled_segments().map(|s| s.virtual_start_time).collect();
        assert_eq!(starts, vec![0.0, 5.0]);
        assert_eq!(tl.duration(), 10.0);
    }

    #[test]
    fn detects_leading_gap() {
        let tl = VirtualTimeline::new(vec![seg(1.0, 5.0, 0.0, 4.0)]);
        assert_eq!(tl.issues(), &[TimelineIssue::LeadingGap { start: 1.0 }]);
    }

    #[test]
    fn segment_interpolation_one_to_one() {
        let s = seg(5.0, 10.0, 10.0, 15.0);
        assert_eq!(s.virtual_to_real(7.5), 12.5);
        assert_eq!(s.real_to_virtual(12.5), 7.5);
    }

    #[test]
    fn segment_interpolation_proportional() {
        // Virtual range twice as long as the real range: half speed.
        let s = seg(0.0, 4.0, 10.0, 12.0);
        assert!((s.virtual_to_real(2.0) - 11.0).abs() < 1e-9);
        assert!((s.real_to_virtual(11.0) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn segment_serde_uses_camel_case() {
        let s = seg(0.0, 1.0, 2.0, 3.0);
        let json = serde_json::to_value(&s).unwrap();
        assert_eq!(json["virtualStartTime"], 0.0);
        assert_eq!(json["realEndTime"], 3.0);
        assert_eq!(json["isEnabled"], true);
    }

    #[test]
    fn issue_display() {
        let issue = TimelineIssue::NonContiguous {
            index: 2,
            expected: 5.0,
            found: 6.5,
        };
        assert_eq!(issue.to_string(), "segment 2: starts at 6.500s, expected 5.000s");
    }
}
