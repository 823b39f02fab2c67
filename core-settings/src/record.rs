//! Persisted per-stream record.

use core_sequence::{LoopMode, MarkerRecord, Segment, SequenceRecord};
use serde::{Deserialize, Serialize};

/// Everything remembered about one stream.
///
/// Missing fields read as empty lists and the default loop mode, so documents
/// written by older versions still load.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StreamRecord {
    #[serde(default)]
    pub markers: Vec<MarkerRecord>,
    #[serde(default)]
    pub segments: Vec<Segment>,
    #[serde(default)]
    pub loop_mode: LoopMode,
}

impl StreamRecord {
    pub fn new(markers: Vec<MarkerRecord>, segments: Vec<Segment>, loop_mode: LoopMode) -> Self {
        Self {
            markers,
            segments,
            loop_mode,
        }
    }

    /// Nothing worth storing.
    pub fn is_empty(&self) -> bool {
        self.markers.is_empty() && self.segments.is_empty()
    }

    /// The part the sequence engine restores from.
    pub fn sequence(&self) -> SequenceRecord {
        SequenceRecord {
            segments: self.segments.clone(),
            loop_mode: self.loop_mode,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_use_defaults() {
        let record: StreamRecord = serde_json::from_str(r#"{"markers":[]}"#).unwrap();
        assert!(record.is_empty());
        assert_eq!(record.loop_mode, LoopMode::LoopSequence);
    }

    #[test]
    fn wire_shape() {
        let record = StreamRecord::new(
            vec![MarkerRecord {
                id: Some("m1".into()),
                label: "A".into(),
                position: 1.5,
                color: Some("#FF6B6B".into()),
                memo: String::new(),
            }],
            vec![Segment::new("m1".into(), "m1".into())],
            LoopMode::PlayOnce,
        );
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["loop_mode"], "play_once");
        assert_eq!(value["markers"][0]["id"], "m1");
        assert_eq!(value["markers"][0]["color"], "#FF6B6B");
        assert_eq!(value["segments"][0]["start_marker_id"], "m1");
        assert!(value["segments"][0]["display_name"].is_null());
        assert_eq!(record.sequence().loop_mode, LoopMode::PlayOnce);
    }
}
