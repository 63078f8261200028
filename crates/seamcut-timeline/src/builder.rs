//! Build a [`VirtualTimeline`] from the editor's clip list.
//!
//! Enabled clips are laid end-to-end on the virtual timeline in list order;
//! disabled clips keep their source range for bookkeeping but occupy no
//! virtual time.

use seamcut_core::{Error, Result, SegmentId};
use serde::{Deserialize, Serialize};

use crate::segment::{VirtualSegment, VirtualTimeline};

/// One clip as the editor stores it: a range of the source media.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clip {
    #[serde(default)]
    pub id: SegmentId,
    /// Source start in seconds.
    #[serde(alias = "sourceStart", alias = "source_start")]
    pub start: f64,
    /// Source end in seconds.
    #[serde(alias = "sourceEnd", alias = "source_end")]
    pub end: f64,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl Clip {
    pub fn new(start: f64, end: f64) -> Self {
        Self {
            id: SegmentId::new(),
            start,
            end,
            enabled: true,
        }
    }

    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// Incrementally assembles a timeline from clips.
#[derive(Debug, Clone, Default)]
pub struct TimelineBuilder {
    segments: Vec<VirtualSegment>,
    cursor: f64,
}

impl TimelineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a clip at the current end of the virtual timeline.
    pub fn push(&mut self, clip: &Clip) -> &mut Self {
        let start = if clip.start.is_finite() { clip.start.max(0.0) } else { 0.0 };
        let mut end = if clip.end.is_finite() { clip.end.max(0.0) } else { start };
        if end < start {
            tracing::warn!(clip = %clip.id, start, end, "Clip end before start; treating as empty");
            end = start;
        }

        let virtual_len = if clip.enabled { end - start } else { 0.0 };
        self.segments.push(VirtualSegment {
            id: clip.id,
            virtual_start_time: self.cursor,
            virtual_end_time: self.cursor + virtual_len,
            real_start_time: start,
            real_end_time: end,
            is_enabled: clip.enabled,
        });
        self.cursor += virtual_len;
        self
    }

    /// Builder-style variant of [`Self::push`].
    #[must_use]
    pub fn clip(mut self, clip: Clip) -> Self {
        self.push(&clip);
        self
    }

    pub fn build(self) -> VirtualTimeline {
        VirtualTimeline::new(self.segments)
    }
}

impl VirtualTimeline {
    /// Lay out `clips` end-to-end; see [`TimelineBuilder`].
    pub fn from_clips(clips: &[Clip]) -> Self {
        let mut builder = TimelineBuilder::new();
        for clip in clips {
            builder.push(clip);
        }
        builder.build()
    }
}

/// Shapes accepted for an edit document.
#[derive(Deserialize)]
#[serde(untagged)]
enum EditDocument {
    Clips(Vec<Clip>),
    ClipList { clips: Vec<Clip> },
    SegmentList { segments: Vec<VirtualSegment> },
}

/// Parse an edit document into a timeline.
///
/// Accepts a bare clip array, `{"clips": [...]}`, or a precomputed
/// `{"segments": [...]}` list using the camelCase segment fields.
pub fn parse_edit_json(json: &str) -> Result<VirtualTimeline> {
    let doc: EditDocument = serde_json::from_str(json)
        .map_err(|e| Error::EditParse(format!("expected a clip array, {{\"clips\"}} or {{\"segments\"}}: {e}")))?;
    Ok(match doc {
        EditDocument::Clips(clips) | EditDocument::ClipList { clips } => {
            VirtualTimeline::from_clips(&clips)
        }
        EditDocument::SegmentList { segments } => VirtualTimeline::new(segments),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enabled_clips_are_laid_end_to_end() {
        let tl = VirtualTimeline::from_clips(&[Clip::new(0.0, 5.0), Clip::new(10.0, 15.0)]);
        let segs = tl.segments();
        assert_eq!(segs[0].virtual_start_time, 0.0);
        assert_eq!(segs[0].virtual_end_time, 5.0);
        assert_eq!(segs[1].virtual_start_time, 5.0);
        assert_eq!(segs[1].virtual_end_time, 10.0);
        assert_eq!(segs[1].real_start_time, 10.0);
        assert_eq!(tl.duration(), 10.0);
        assert!(tl.issues().is_empty());
    }

    #[test]
    fn disabled_clips_take_no_virtual_time() {
        let tl = VirtualTimeline::from_clips(&[
            Clip::new(0.0, 5.0),
            Clip::new(5.0, 10.0).disabled(),
            Clip::new(10.0, 15.0),
        ]);
        let segs = tl.segments();
        assert_eq!(segs.len(), 3);
        assert!(!segs[1].is_enabled);
        assert_eq!(segs[1].virtual_start_time, 5.0);
        assert_eq!(segs[1].virtual_end_time, 5.0);
        assert_eq!(segs[2].virtual_start_time, 5.0);
        assert_eq!(tl.duration(), 10.0);
        assert_eq!(tl.enabled_count(), 2);
    }

    #[test]
    fn reordered_clips_keep_list_order() {
        let tl = TimelineBuilder::new()
            .clip(Clip::new(20.0, 22.0))
            .clip(Clip::new(0.0, 3.0))
            .build();
        let starts: Vec<(f64, f64)> = tl
            .enabled_segments()
            .map(|s| (s.virtual_start_time, s.real_start_time))
            .collect();
        assert_eq!(starts, vec![(0.0, 20.0), (2.0, 0.0)]);
        assert_eq!(tl.duration(), 5.0);
    }

    #[test]
    fn inverted_clip_is_empty() {
        let tl = VirtualTimeline::from_clips(&[Clip::new(5.0, 2.0), Clip::new(0.0, 1.0)]);
        assert_eq!(tl.segments()[0].real_end_time, 5.0);
        assert_eq!(tl.enabled_count(), 1);
        assert_eq!(tl.duration(), 1.0);
    }

    #[test]
    fn parse_bare_clip_array() {
        let tl = parse_edit_json(r#"[{"start": 0, "end": 5}, {"start": 10, "end": 15, "enabled": true}]"#)
            .unwrap();
        assert_eq!(tl.duration(), 10.0);
    }

    #[test]
    fn parse_clip_object_with_aliases() {
        let tl = parse_edit_json(
            r#"{"clips": [{"sourceStart": 0, "sourceEnd": 4}, {"start": 4, "end": 8, "enabled": false}]}"#,
        )
        .unwrap();
        assert_eq!(tl.duration(), 4.0);
        assert_eq!(tl.segments().len(), 2);
    }

    #[test]
    fn parse_segment_list() {
        let tl = parse_edit_json(
            r#"{"segments": [
                {"virtualStartTime": 0, "virtualEndTime": 5, "realStartTime": 0, "realEndTime": 5},
                {"virtualStartTime": 5, "virtualEndTime": 10, "realStartTime": 10, "realEndTime": 15, "isEnabled": true}
            ]}"#,
        )
        .unwrap();
        assert_eq!(tl.duration(), 10.0);
        assert_eq!(tl.segments()[1].real_start_time, 10.0);
    }

    #[test]
    fn parse_rejects_garbage() {
        let err = parse_edit_json(r#"{"tracks": []}"#).unwrap_err();
        assert!(matches!(err, Error::EditParse(_)));
    }
}
