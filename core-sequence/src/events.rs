//! Domain events carried by the looper's [`EventBus`].

use crate::marker::Marker;
use crate::segment::Segment;
use bridge_traits::PlaybackState;
use core_runtime::events::{BusEvent, EventBus};

/// Bus specialised to looper events.
pub type LooperBus = EventBus<LooperEvent>;

/// Everything published on the looper bus.
///
/// The player adapter publishes the first three; the registry, the engine and
/// the audio effects publish the rest.
#[derive(Debug, Clone, PartialEq)]
pub enum LooperEvent {
    /// Playback position in seconds. High frequency, best effort.
    PositionChanged(f64),
    /// Stream duration in seconds, once known.
    DurationChanged(f64),
    PlaybackStateChanged(PlaybackState),
    /// Full registry snapshot, sorted by position.
    MarkersChanged(Vec<Marker>),
    /// Segment list or loop state changed.
    SequenceChanged {
        segments: Vec<Segment>,
        current_index: Option<usize>,
    },
    /// The engine moved to (or restarted) the segment at this index.
    SegmentChanged(usize),
    EffectsChanged {
        tempo: f64,
        semitones: i32,
    },
}

/// One topic per [`LooperEvent`] variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    PositionChanged,
    DurationChanged,
    PlaybackStateChanged,
    MarkersChanged,
    SequenceChanged,
    SegmentChanged,
    EffectsChanged,
}

impl BusEvent for LooperEvent {
    type Topic = Topic;

    fn topic(&self) -> Topic {
        match self {
            LooperEvent::PositionChanged(_) => Topic::PositionChanged,
            LooperEvent::DurationChanged(_) => Topic::DurationChanged,
            LooperEvent::PlaybackStateChanged(_) => Topic::PlaybackStateChanged,
            LooperEvent::MarkersChanged(_) => Topic::MarkersChanged,
            LooperEvent::SequenceChanged { .. } => Topic::SequenceChanged,
            LooperEvent::SegmentChanged(_) => Topic::SegmentChanged,
            LooperEvent::EffectsChanged { .. } => Topic::EffectsChanged,
        }
    }
}
