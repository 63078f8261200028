//! Reading edit documents from disk.

use anyhow::{Context, Result};
use seamcut_timeline::{parse_edit_json, VirtualTimeline};
use std::path::Path;

/// Load an edit (clip list or segment list) JSON file into a timeline.
pub fn load_edit(path: &Path) -> Result<VirtualTimeline> {
    if !path.exists() {
        anyhow::bail!("Edit file does not exist: {:?}", path);
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read edit file: {:?}", path))?;
    let timeline = parse_edit_json(&content)
        .with_context(|| format!("Failed to parse edit file: {:?}", path))?;

    for issue in timeline.issues() {
        tracing::warn!("{}: {}", path.display(), issue);
    }
    tracing::debug!(
        segments = timeline.segments().len(),
        enabled = timeline.enabled_count(),
        duration = timeline.duration(),
        "Loaded edit"
    );
    Ok(timeline)
}

/// Length of source media an edit needs: the furthest real end of any segment.
pub fn source_extent(timeline: &VirtualTimeline) -> f64 {
    timeline
        .segments()
        .iter()
        .map(|s| s.real_end_time)
        .fold(0.0, f64::max)
}
