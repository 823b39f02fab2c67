//! # Sequence Engine
//!
//! Position-driven state machine that loops through an ordered list of
//! segments.
//!
//! ## Overview
//!
//! The engine owns:
//! - the segment list (playback order, independent of marker order)
//! - the current index (`None` exactly when the list is empty)
//! - the active flag
//! - the [`LoopMode`]
//!
//! It subscribes to [`LooperEvent::PositionChanged`] and, while active, checks
//! each tick against the current segment's live end. Once the position
//! reaches `end - seek_threshold` it advances according to the loop mode,
//! publishes [`LooperEvent::SegmentChanged`] and hands the new start to its
//! [`SeekTarget`]. It also subscribes to [`LooperEvent::MarkersChanged`] and
//! drops segments whose markers have disappeared.
//!
//! ## Locking
//!
//! One mutex guards all engine state. Every operation computes what to publish
//! while holding it, releases it, then publishes and requests the seek. Marker
//! positions are read from the registry while the engine lock is held; the
//! registry never calls back into the engine under its own lock.
//!
//! ## Arrival guard
//!
//! Ordinary segments check the boundary on every tick. A segment no longer
//! than `seek_threshold` is in its own trigger zone from its first sample, so
//! after seeking into one the engine waits for a tick that lands near it
//! (`start - threshold <= p <= end`) before checking its boundary again. The
//! landing tick itself does not advance. If no tick lands within
//! `arrival_grace_ticks`, the last grace tick falls through to the normal
//! boundary check.

use crate::error::{Result, SequenceError};
use crate::events::{LooperBus, LooperEvent, Topic};
use crate::marker::{Marker, MarkerId, MarkerRegistry};
use crate::seek::SeekTarget;
use crate::segment::{LoopMode, Segment, SegmentSummary, SequenceRecord};
use core_runtime::config::{LooperConfig, DEFAULT_ARRIVAL_GRACE_TICKS, DEFAULT_SEEK_THRESHOLD};
use core_runtime::events::SubscriptionId;
use parking_lot::{Mutex, RwLock};
use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Weak};
use tracing::{debug, info, trace, warn};

// ============================================================================
// Settings
// ============================================================================

/// Tuning values of the boundary loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineSettings {
    /// Seconds before a segment's end at which the engine advances.
    pub seek_threshold: f64,
    /// Ticks to wait for a seek into a short segment to land.
    pub arrival_grace_ticks: u32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            seek_threshold: DEFAULT_SEEK_THRESHOLD,
            arrival_grace_ticks: DEFAULT_ARRIVAL_GRACE_TICKS,
        }
    }
}

impl From<&LooperConfig> for EngineSettings {
    fn from(config: &LooperConfig) -> Self {
        Self {
            seek_threshold: config.seek_threshold,
            arrival_grace_ticks: config.arrival_grace_ticks,
        }
    }
}

// ============================================================================
// State
// ============================================================================

#[derive(Debug, Default)]
struct EngineState {
    segments: Vec<Segment>,
    current_index: Option<usize>,
    active: bool,
    loop_mode: LoopMode,
    /// Remaining grace ticks while waiting for a seek to land.
    awaiting_arrival: Option<u32>,
}

impl EngineState {
    fn sequence_changed(&self) -> LooperEvent {
        LooperEvent::SequenceChanged {
            segments: self.segments.clone(),
            current_index: self.current_index,
        }
    }

    fn deactivate_if_empty(&mut self) {
        if self.segments.is_empty() {
            self.current_index = None;
            self.active = false;
            self.awaiting_arrival = None;
        }
    }

    /// Keep only segments matching `keep`, leaving `current_index` on the same
    /// segment if it survives, else on the next survivor (wrapping).
    fn retain_segments<F>(&mut self, keep: F) -> usize
    where
        F: Fn(&Segment) -> bool,
    {
        let before = self.segments.len();
        let current = self.current_index;
        let mut new_current = None;
        let mut survivors = Vec::with_capacity(before);

        for (i, segment) in std::mem::take(&mut self.segments).into_iter().enumerate() {
            if Some(i) == current && new_current.is_none() {
                new_current = Some(survivors.len());
            }
            if keep(&segment) {
                survivors.push(segment);
            }
        }

        self.segments = survivors;
        let removed = before - self.segments.len();
        self.current_index = match new_current {
            Some(i) if i < self.segments.len() => Some(i),
            _ if self.segments.is_empty() => None,
            _ => Some(0),
        };
        self.deactivate_if_empty();
        removed
    }
}

/// What to do once the lock is released.
#[derive(Debug, Default)]
struct Outcome {
    events: Vec<LooperEvent>,
    seek: Option<f64>,
}

impl Outcome {
    fn publish(event: LooperEvent) -> Self {
        Self {
            events: vec![event],
            seek: None,
        }
    }
}

// ============================================================================
// Engine
// ============================================================================

/// Segment-loop state machine.
///
/// Construct with [`SequenceEngine::new`], which registers the bus handlers.
/// The handlers hold only a weak reference, so dropping the last `Arc`
/// detaches the engine.
pub struct SequenceEngine {
    bus: Arc<LooperBus>,
    registry: Arc<MarkerRegistry>,
    settings: EngineSettings,
    seek_target: RwLock<Option<Arc<dyn SeekTarget>>>,
    state: Mutex<EngineState>,
    subscriptions: Mutex<Vec<SubscriptionId>>,
}

impl SequenceEngine {
    pub fn new(
        bus: Arc<LooperBus>,
        registry: Arc<MarkerRegistry>,
        settings: EngineSettings,
    ) -> Arc<Self> {
        let engine = Arc::new(Self {
            bus: Arc::clone(&bus),
            registry,
            settings,
            seek_target: RwLock::new(None),
            state: Mutex::new(EngineState::default()),
            subscriptions: Mutex::new(Vec::new()),
        });

        let weak: Weak<Self> = Arc::downgrade(&engine);
        let on_position = bus.subscribe(Topic::PositionChanged, move |event| {
            if let (Some(engine), LooperEvent::PositionChanged(position)) = (weak.upgrade(), event)
            {
                engine.on_position(*position);
            }
            Ok(())
        });

        let weak: Weak<Self> = Arc::downgrade(&engine);
        let on_markers = bus.subscribe(Topic::MarkersChanged, move |event| {
            if let (Some(engine), LooperEvent::MarkersChanged(markers)) = (weak.upgrade(), event) {
                engine.prune_stale_segments(markers);
            }
            Ok(())
        });

        engine
            .subscriptions
            .lock()
            .extend([on_position, on_markers]);
        engine
    }

    /// Route future seek requests to `target`.
    pub fn set_seek_target(&self, target: Arc<dyn SeekTarget>) {
        *self.seek_target.write() = Some(target);
    }

    pub fn settings(&self) -> EngineSettings {
        self.settings
    }

    // ------------------------------------------------------------------------
    // Transport
    // ------------------------------------------------------------------------

    /// Activate on the first segment and seek to its start.
    ///
    /// Does nothing when there are no segments.
    pub fn start(&self) {
        self.activate_at(0);
    }

    /// Activate on segment `index` and seek to its start.
    ///
    /// Does nothing when `index` is out of range.
    pub fn jump_to(&self, index: usize) {
        self.activate_at(index);
    }

    /// Deactivate. Publishes only if the engine was active.
    pub fn stop(&self) {
        let outcome = {
            let mut state = self.state.lock();
            if !state.active {
                return;
            }
            state.active = false;
            state.awaiting_arrival = None;
            Outcome::publish(state.sequence_changed())
        };
        info!("Sequence stopped");
        self.apply(outcome);
    }

    fn activate_at(&self, index: usize) {
        let outcome = {
            let mut state = self.state.lock();
            if index >= state.segments.len() {
                debug!(index, len = state.segments.len(), "Ignoring activation out of range");
                return;
            }
            state.active = true;
            state.current_index = Some(index);
            let range = self.resolve(&state.segments[index]);
            state.awaiting_arrival = self.arrival_guard(range);
            let seek = range.map(|(start, _)| start);
            Outcome {
                events: vec![LooperEvent::SegmentChanged(index)],
                seek,
            }
        };
        info!(index, "Sequence playing");
        self.apply(outcome);
    }

    // ------------------------------------------------------------------------
    // Boundary loop
    // ------------------------------------------------------------------------

    /// Evaluate one position tick.
    ///
    /// Called by the bus handler; exposed for hosts that drive the engine
    /// directly.
    pub fn on_position(&self, position: f64) {
        let outcome = {
            let mut state = self.state.lock();
            if !state.active || state.segments.is_empty() {
                return;
            }
            let Some(index) = state.current_index else {
                return;
            };
            let Some((start, end)) = self.resolve(&state.segments[index]) else {
                debug!(index, "Current segment references a missing marker; skipping tick");
                return;
            };

            let threshold = self.settings.seek_threshold;
            if let Some(remaining) = state.awaiting_arrival {
                if position >= start - threshold && position <= end {
                    trace!(position, index, "Seek landed in short segment");
                    state.awaiting_arrival = None;
                    return;
                }
                if remaining > 1 {
                    state.awaiting_arrival = Some(remaining - 1);
                    return;
                }
                debug!(position, index, "Seek did not land within grace period");
                state.awaiting_arrival = None;
            }

            if position < end - threshold {
                return;
            }
            self.advance(&mut state, index)
        };
        self.apply(outcome);
    }

    fn advance(&self, state: &mut EngineState, index: usize) -> Outcome {
        let len = state.segments.len();
        let next = match state.loop_mode {
            LoopMode::LoopSingle => index,
            LoopMode::LoopSequence => (index + 1) % len,
            LoopMode::PlayOnce => {
                if index + 1 >= len {
                    state.active = false;
                    state.awaiting_arrival = None;
                    info!(index, "Reached end of sequence");
                    return Outcome::publish(state.sequence_changed());
                }
                index + 1
            }
        };

        state.current_index = Some(next);
        let range = self.resolve(&state.segments[next]);
        state.awaiting_arrival = self.arrival_guard(range);
        let seek = range.map(|(start, _)| start);
        debug!(from = index, to = next, mode = %state.loop_mode, "Advancing segment");

        Outcome {
            events: vec![LooperEvent::SegmentChanged(next)],
            seek,
        }
    }

    // ------------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------------

    /// Replace the whole list. The index resets to the first segment.
    pub fn set_segments(&self, segments: Vec<Segment>) {
        let outcome = {
            let mut state = self.state.lock();
            state.segments = segments;
            state.current_index = if state.segments.is_empty() {
                None
            } else {
                Some(0)
            };
            state.awaiting_arrival = None;
            state.deactivate_if_empty();
            Outcome::publish(state.sequence_changed())
        };
        self.apply(outcome);
    }

    /// Append a segment between two existing markers.
    ///
    /// # Errors
    ///
    /// [`SequenceError::UnknownMarker`] if either id is not in the registry.
    pub fn add_segment(
        &self,
        start: MarkerId,
        end: MarkerId,
        display_name: Option<String>,
    ) -> Result<()> {
        for id in [&start, &end] {
            if !self.registry.contains(id) {
                return Err(SequenceError::UnknownMarker(id.to_string()));
            }
        }

        let outcome = {
            let mut state = self.state.lock();
            state.segments.push(Segment {
                start_marker_id: start,
                end_marker_id: end,
                display_name,
            });
            if state.current_index.is_none() {
                state.current_index = Some(0);
            }
            Outcome::publish(state.sequence_changed())
        };
        self.apply(outcome);
        Ok(())
    }

    /// Remove the segment at `index`; out-of-range indices are ignored.
    pub fn remove_segment(&self, index: usize) {
        let outcome = {
            let mut state = self.state.lock();
            if index >= state.segments.len() {
                return;
            }
            state.segments.remove(index);
            if let Some(current) = state.current_index {
                let shifted = if index < current { current - 1 } else { current };
                state.current_index = Some(if shifted >= state.segments.len() {
                    0
                } else {
                    shifted
                });
            }
            state.deactivate_if_empty();
            Outcome::publish(state.sequence_changed())
        };
        self.apply(outcome);
    }

    /// Cascade delete for a marker that is about to go away.
    ///
    /// Removes every segment that starts or ends at `id`, keeping the order of
    /// the rest. Always publishes. Returns how many segments were removed.
    pub fn remove_segments_referencing(&self, id: &MarkerId) -> usize {
        let (removed, outcome) = {
            let mut state = self.state.lock();
            let removed = state.retain_segments(|segment| !segment.references(id));
            (removed, Outcome::publish(state.sequence_changed()))
        };
        if removed > 0 {
            debug!(marker = %id, removed, "Removed segments referencing marker");
        }
        self.apply(outcome);
        removed
    }

    /// Move the segment at `from` to position `to`.
    ///
    /// The current index follows the segment it pointed at. Ignored unless
    /// both indices are in range.
    pub fn reorder(&self, from: usize, to: usize) {
        let outcome = {
            let mut state = self.state.lock();
            let len = state.segments.len();
            if from >= len || to >= len {
                return;
            }
            let segment = state.segments.remove(from);
            state.segments.insert(to, segment);

            if let Some(current) = state.current_index {
                state.current_index = Some(if current == from {
                    to
                } else if from < current && current <= to {
                    current - 1
                } else if to <= current && current < from {
                    current + 1
                } else {
                    current
                });
            }
            Outcome::publish(state.sequence_changed())
        };
        self.apply(outcome);
    }

    pub fn set_loop_mode(&self, mode: LoopMode) {
        let outcome = {
            let mut state = self.state.lock();
            state.loop_mode = mode;
            Outcome::publish(state.sequence_changed())
        };
        debug!(mode = %mode, "Loop mode changed");
        self.apply(outcome);
    }

    fn prune_stale_segments(&self, markers: &[Marker]) {
        let outcome = {
            let mut state = self.state.lock();
            if state.segments.is_empty() {
                return;
            }
            let live: HashSet<&MarkerId> = markers.iter().map(|m| &m.id).collect();
            let removed = state.retain_segments(|segment| {
                live.contains(&segment.start_marker_id) && live.contains(&segment.end_marker_id)
            });
            if removed == 0 {
                return;
            }
            debug!(removed, "Dropped segments whose markers are gone");
            Outcome::publish(state.sequence_changed())
        };
        self.apply(outcome);
    }

    // ------------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------------

    pub fn to_record(&self) -> SequenceRecord {
        let state = self.state.lock();
        SequenceRecord {
            segments: state.segments.clone(),
            loop_mode: state.loop_mode,
        }
    }

    /// Load a persisted sequence. The engine ends up inactive on the first
    /// segment. Segments over markers the registry does not have are dropped,
    /// so restore the markers first.
    pub fn from_record(&self, record: SequenceRecord) {
        let outcome = {
            let mut state = self.state.lock();
            let (usable, dangling): (Vec<Segment>, Vec<Segment>) =
                record.segments.into_iter().partition(|segment| {
                    self.registry.contains(&segment.start_marker_id)
                        && self.registry.contains(&segment.end_marker_id)
                });
            if !dangling.is_empty() {
                warn!(count = dangling.len(), "Dropping stored segments with unknown markers");
            }

            state.segments = usable;
            state.loop_mode = record.loop_mode;
            state.current_index = if state.segments.is_empty() {
                None
            } else {
                Some(0)
            };
            state.active = false;
            state.awaiting_arrival = None;
            Outcome::publish(state.sequence_changed())
        };
        self.apply(outcome);
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    pub fn segments(&self) -> Vec<Segment> {
        self.state.lock().segments.clone()
    }

    pub fn current_index(&self) -> Option<usize> {
        self.state.lock().current_index
    }

    pub fn is_active(&self) -> bool {
        self.state.lock().active
    }

    pub fn loop_mode(&self) -> LoopMode {
        self.state.lock().loop_mode
    }

    /// Live `(start, end)` of segment `index`, ordered ascending.
    ///
    /// `None` if the index is out of range or a marker is missing.
    pub fn resolve_range(&self, index: usize) -> Option<(f64, f64)> {
        let state = self.state.lock();
        state.segments.get(index).and_then(|s| self.resolve(s))
    }

    pub fn describe(&self, index: usize) -> Option<SegmentSummary> {
        let segment = self.state.lock().segments.get(index)?.clone();
        let start = self.registry.get(&segment.start_marker_id)?;
        let end = self.registry.get(&segment.end_marker_id)?;
        Some(SegmentSummary {
            index,
            display_name: segment.display_name,
            start_label: start.label,
            end_label: end.label,
            start: start.position.min(end.position),
            end: start.position.max(end.position),
        })
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    /// Grace ticks to wait after seeking into `range`; only short segments wait.
    fn arrival_guard(&self, range: Option<(f64, f64)>) -> Option<u32> {
        match range {
            Some((start, end)) if end - start <= self.settings.seek_threshold => {
                Some(self.settings.arrival_grace_ticks)
            }
            _ => None,
        }
    }

    fn resolve(&self, segment: &Segment) -> Option<(f64, f64)> {
        let a = self.registry.position_of(&segment.start_marker_id)?;
        let b = self.registry.position_of(&segment.end_marker_id)?;
        Some((a.min(b), a.max(b)))
    }

    fn apply(&self, outcome: Outcome) {
        for event in outcome.events {
            self.bus.publish(event);
        }
        if let Some(position) = outcome.seek {
            let target = self.seek_target.read().clone();
            match target {
                Some(target) => target.request_seek(position),
                None => debug!(position, "No seek target attached; dropping seek"),
            }
        }
    }
}

impl Drop for SequenceEngine {
    fn drop(&mut self) {
        for id in self.subscriptions.lock().drain(..) {
            self.bus.unsubscribe(id);
        }
    }
}

impl fmt::Debug for SequenceEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("SequenceEngine")
            .field("segments", &state.segments.len())
            .field("current_index", &state.current_index)
            .field("active", &state.active)
            .field("loop_mode", &state.loop_mode)
            .finish()
    }
}
