//! Segments, loop modes and their persisted form.

use crate::marker::MarkerId;
use crate::timefmt::seconds_to_mmss;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What happens when the current segment's end is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopMode {
    /// Advance to the next segment, wrapping to the first after the last.
    #[default]
    LoopSequence,
    /// Restart the current segment.
    LoopSingle,
    /// Advance once through the list, then stop.
    PlayOnce,
}

impl LoopMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoopMode::LoopSequence => "loop_sequence",
            LoopMode::LoopSingle => "loop_single",
            LoopMode::PlayOnce => "play_once",
        }
    }
}

impl fmt::Display for LoopMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An ordered playback unit between two markers.
///
/// Only the marker ids are stored; the time range is looked up from the
/// registry whenever it is needed, so moving a marker moves every segment
/// that uses it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub start_marker_id: MarkerId,
    pub end_marker_id: MarkerId,
    #[serde(default)]
    pub display_name: Option<String>,
}

impl Segment {
    pub fn new(start: MarkerId, end: MarkerId) -> Self {
        Self {
            start_marker_id: start,
            end_marker_id: end,
            display_name: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Whether either end of the segment is `id`.
    pub fn references(&self, id: &MarkerId) -> bool {
        &self.start_marker_id == id || &self.end_marker_id == id
    }
}

/// Persisted engine state: segment list and loop mode.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SequenceRecord {
    #[serde(default)]
    pub segments: Vec<Segment>,
    #[serde(default)]
    pub loop_mode: LoopMode,
}

/// Human-readable view of one segment with its live range.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentSummary {
    pub index: usize,
    pub display_name: Option<String>,
    pub start_label: String,
    pub end_label: String,
    pub start: f64,
    pub end: f64,
}

impl SegmentSummary {
    /// Display name, or `A–B` from the marker labels.
    pub fn title(&self) -> String {
        match &self.display_name {
            Some(name) if !name.is_empty() => name.clone(),
            _ => format!("{}–{}", self.start_label, self.end_label),
        }
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

impl fmt::Display for SegmentSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}  {} → {}",
            self.title(),
            seconds_to_mmss(self.start),
            seconds_to_mmss(self.end)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loop_mode_wire_names() {
        assert_eq!(serde_json::to_string(&LoopMode::PlayOnce).unwrap(), "\"play_once\"");
        let mode: LoopMode = serde_json::from_str("\"loop_single\"").unwrap();
        assert_eq!(mode, LoopMode::LoopSingle);
        assert_eq!(LoopMode::default(), LoopMode::LoopSequence);
        assert_eq!(LoopMode::LoopSequence.to_string(), "loop_sequence");
    }

    #[test]
    fn sequence_record_defaults_missing_fields() {
        let record: SequenceRecord = serde_json::from_str("{}").unwrap();
        assert!(record.segments.is_empty());
        assert_eq!(record.loop_mode, LoopMode::LoopSequence);

        let record: SequenceRecord = serde_json::from_str(
            r#"{"segments":[{"start_marker_id":"a","end_marker_id":"b"}]}"#,
        )
        .unwrap();
        assert_eq!(record.segments[0].display_name, None);
    }

    #[test]
    fn segment_references_either_end() {
        let seg = Segment::new("a".into(), "b".into());
        assert!(seg.references(&"a".into()));
        assert!(seg.references(&"b".into()));
        assert!(!seg.references(&"c".into()));
    }

    #[test]
    fn summary_display_uses_labels_or_name() {
        let summary = SegmentSummary {
            index: 0,
            display_name: None,
            start_label: "A".into(),
            end_label: "B".into(),
            start: 10.0,
            end: 20.0,
        };
        assert_eq!(summary.to_string(), "A–B  00:10.000 → 00:20.000");

        let named = SegmentSummary {
            display_name: Some("chorus".into()),
            ..summary
        };
        assert_eq!(named.to_string(), "chorus  00:10.000 → 00:20.000");
        assert_eq!(named.duration(), 10.0);
    }
}
