//! Human and JSON summaries of a timeline.

use seamcut_core::SegmentId;
use seamcut_timeline::{TimelineIssue, VirtualTimeline};
use serde::Serialize;
use std::fmt::Write as _;

#[derive(Debug, Clone, Serialize)]
pub struct SegmentRow {
    pub index: usize,
    pub id: SegmentId,
    pub enabled: bool,
    pub virtual_start: f64,
    pub virtual_end: f64,
    pub real_start: f64,
    pub real_end: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TimelineSummary {
    pub duration: f64,
    pub segment_count: usize,
    pub enabled_count: usize,
    /// Source seconds cut out by disabled clips.
    pub removed_duration: f64,
    pub segments: Vec<SegmentRow>,
    pub issues: Vec<TimelineIssue>,
}

impl TimelineSummary {
    pub fn new(timeline: &VirtualTimeline) -> Self {
        let segments = timeline
            .segments()
            .iter()
            .enumerate()
            .map(|(index, s)| SegmentRow {
                index,
                id: s.id,
                enabled: s.is_enabled,
                virtual_start: s.virtual_start_time,
                virtual_end: s.virtual_end_time,
                real_start: s.real_start_time,
                real_end: s.real_end_time,
            })
            .collect();
        Self {
            duration: timeline.duration(),
            segment_count: timeline.segments().len(),
            enabled_count: timeline.enabled_count(),
            removed_duration: timeline.removed_duration(),
            segments,
            issues: timeline.issues().to_vec(),
        }
    }

    /// Plain-text table for the terminal.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Duration: {}", format_time(self.duration));
        let _ = writeln!(
            out,
            "Segments: {} ({} enabled, {} removed)",
            self.segment_count,
            self.enabled_count,
            format_time(self.removed_duration)
        );
        let _ = writeln!(out);
        let _ = writeln!(out, "  #  state  virtual               real");
        for row in &self.segments {
            let _ = writeln!(
                out,
                "{:>3}  {:<5}  {} - {}  {} - {}",
                row.index,
                if row.enabled { "on" } else { "off" },
                format_time(row.virtual_start),
                format_time(row.virtual_end),
                format_time(row.real_start),
                format_time(row.real_end),
            );
        }
        let _ = writeln!(out);
        if self.issues.is_empty() {
            let _ = writeln!(out, "No issues found");
        } else {
            let _ = writeln!(out, "Issues: {}", self.issues.len());
            for issue in &self.issues {
                let _ = writeln!(out, "  - {}", issue);
            }
        }
        out
    }
}

/// `mm:ss.mmm`, or `h:mm:ss.mmm` past an hour.
pub fn format_time(secs: f64) -> String {
    let secs = if secs.is_finite() { secs.max(0.0) } else { 0.0 };
    let total_ms = (secs * 1000.0).round() as u64;
    let ms = total_ms % 1000;
    let total_secs = total_ms / 1000;
    let s = total_secs % 60;
    let m = (total_secs / 60) % 60;
    let h = total_secs / 3600;
    if h > 0 {
        format!("{h}:{m:02}:{s:02}.{ms:03}")
    } else {
        format!("{m:02}:{s:02}.{ms:03}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use seamcut_timeline::Clip;

    #[test]
    fn format_time_pads() {
        assert_eq!(format_time(0.0), "00:00.000");
        assert_eq!(format_time(65.25), "01:05.250");
        assert_eq!(format_time(3725.0), "1:02:05.000");
        assert_eq!(format_time(f64::NAN), "00:00.000");
    }

    #[test]
    fn summary_counts_removed_time() {
        let timeline = VirtualTimeline::from_clips(&[
            Clip::new(0.0, 5.0),
            Clip::new(5.0, 10.0).disabled(),
            Clip::new(10.0, 15.0),
        ]);
        let summary = TimelineSummary::new(&timeline);
        assert_eq!(summary.segment_count, 3);
        assert_eq!(summary.enabled_count, 2);
        assert_eq!(summary.removed_duration, 5.0);
        let text = summary.render();
        assert!(text.contains("Duration: 00:10.000"));
        assert!(text.contains("off"));
        assert!(text.contains("No issues found"));
    }
}
