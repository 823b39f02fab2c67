//! # Marker Registry
//!
//! Owns the set of time markers of the current stream.
//!
//! ## Overview
//!
//! A [`Marker`] is a labelled, repositionable time point. Its [`MarkerId`] is
//! assigned once at creation and is the only stable handle: labels can be
//! swapped or edited and positions can move, but segments keep pointing at the
//! same ids.
//!
//! The registry keeps its markers sorted ascending by position after every
//! insertion or move, and publishes [`LooperEvent::MarkersChanged`] with the
//! full snapshot after every mutation. The internal lock is released before
//! publishing, so handlers may call back into the registry.
//!
//! ## Labels and colours
//!
//! Labels follow a bijective base-26 sequence (`A`..`Z`, `AA`, `AB`, ..) drawn
//! from a running counter. Colours come from [`PALETTE`] indexed by how many
//! markers were ever inserted. Neither counter goes down when markers are
//! removed; only [`MarkerRegistry::clear`] resets them.

use crate::error::{Result, SequenceError};
use crate::events::{LooperBus, LooperEvent};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Marker colours, assigned in insertion order.
pub const PALETTE: [&str; 12] = [
    "#FF6B6B", "#4ECDC4", "#45B7D1", "#96CEB4", "#FFEAA7", "#DDA0DD", "#98D8C8", "#F7DC6F",
    "#BB8FCE", "#85C1E9", "#F8C471", "#82E0AA",
];

// ============================================================================
// Types
// ============================================================================

/// Opaque, immutable marker identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MarkerId(String);

impl MarkerId {
    /// Fresh random id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for MarkerId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for MarkerId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for MarkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A named time point in the stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    pub id: MarkerId,
    pub label: String,
    /// Seconds from the start of the stream.
    pub position: f64,
    /// `#RRGGBB`, fixed at insertion.
    pub color: String,
    pub memo: String,
}

/// Persisted form of a [`Marker`].
///
/// Older documents lack `id`, `color` and `memo`; loading fills them in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<MarkerId>,
    pub label: String,
    pub position: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default)]
    pub memo: String,
}

impl From<&Marker> for MarkerRecord {
    fn from(marker: &Marker) -> Self {
        Self {
            id: Some(marker.id.clone()),
            label: marker.label.clone(),
            position: marker.position,
            color: Some(marker.color.clone()),
            memo: marker.memo.clone(),
        }
    }
}

/// Label for the `index`-th automatically labelled marker.
///
/// `0 → A`, `25 → Z`, `26 → AA`, `701 → ZZ`, `702 → AAA`.
pub fn label_for_index(index: usize) -> String {
    let mut n = index;
    let mut letters = Vec::new();
    loop {
        letters.push((b'A' + (n % 26) as u8) as char);
        if n < 26 {
            break;
        }
        n = n / 26 - 1;
    }
    letters.iter().rev().collect()
}

// ============================================================================
// Registry
// ============================================================================

#[derive(Default)]
struct RegistryState {
    markers: Vec<Marker>,
    label_counter: usize,
    insertion_counter: usize,
}

impl RegistryState {
    fn sort(&mut self) {
        self.markers
            .sort_by(|a, b| a.position.total_cmp(&b.position));
    }

    fn find_mut(&mut self, id: &MarkerId) -> Result<&mut Marker> {
        self.markers
            .iter_mut()
            .find(|m| &m.id == id)
            .ok_or_else(|| SequenceError::MarkerNotFound(id.to_string()))
    }
}

/// Thread-safe marker store that announces its changes on the bus.
pub struct MarkerRegistry {
    bus: Arc<LooperBus>,
    state: Mutex<RegistryState>,
}

impl MarkerRegistry {
    pub fn new(bus: Arc<LooperBus>) -> Self {
        Self {
            bus,
            state: Mutex::new(RegistryState::default()),
        }
    }

    /// Insert a marker at `position`.
    ///
    /// When `label` is `None` the next label of the running sequence is used.
    ///
    /// # Errors
    ///
    /// [`SequenceError::InvalidPosition`] for NaN or infinite positions.
    pub fn add(&self, position: f64, label: Option<String>) -> Result<Marker> {
        if !position.is_finite() {
            return Err(SequenceError::InvalidPosition(position));
        }

        let (marker, snapshot) = {
            let mut state = self.state.lock();
            let label = label.unwrap_or_else(|| {
                let next = label_for_index(state.label_counter);
                state.label_counter += 1;
                next
            });
            let color = PALETTE[state.insertion_counter % PALETTE.len()].to_string();
            state.insertion_counter += 1;

            let marker = Marker {
                id: MarkerId::generate(),
                label,
                position,
                color,
                memo: String::new(),
            };
            state.markers.push(marker.clone());
            state.sort();
            (marker, state.markers.clone())
        };

        debug!(id = %marker.id, label = %marker.label, position, "Marker added");
        self.publish(snapshot);
        Ok(marker)
    }

    /// Remove a marker. The label counter is left untouched.
    pub fn remove(&self, id: &MarkerId) -> Result<Marker> {
        let (removed, snapshot) = {
            let mut state = self.state.lock();
            let index = state
                .markers
                .iter()
                .position(|m| &m.id == id)
                .ok_or_else(|| SequenceError::MarkerNotFound(id.to_string()))?;
            let removed = state.markers.remove(index);
            (removed, state.markers.clone())
        };

        debug!(id = %removed.id, label = %removed.label, "Marker removed");
        self.publish(snapshot);
        Ok(removed)
    }

    /// Move a marker. Identity is preserved; only its rank may change.
    pub fn update_position(&self, id: &MarkerId, position: f64) -> Result<()> {
        if !position.is_finite() {
            return Err(SequenceError::InvalidPosition(position));
        }

        let snapshot = {
            let mut state = self.state.lock();
            state.find_mut(id)?.position = position;
            state.sort();
            state.markers.clone()
        };

        debug!(id = %id, position, "Marker moved");
        self.publish(snapshot);
        Ok(())
    }

    pub fn update_memo(&self, id: &MarkerId, memo: impl Into<String>) -> Result<()> {
        let snapshot = {
            let mut state = self.state.lock();
            state.find_mut(id)?.memo = memo.into();
            state.markers.clone()
        };

        self.publish(snapshot);
        Ok(())
    }

    /// Replace one marker's label.
    pub fn relabel(&self, id: &MarkerId, label: impl Into<String>) -> Result<()> {
        let snapshot = {
            let mut state = self.state.lock();
            state.find_mut(id)?.label = label.into();
            state.markers.clone()
        };

        self.publish(snapshot);
        Ok(())
    }

    /// Exchange the labels of two markers and nothing else.
    pub fn swap_labels(&self, a: &MarkerId, b: &MarkerId) -> Result<()> {
        let snapshot = {
            let mut state = self.state.lock();
            let ia = state
                .markers
                .iter()
                .position(|m| &m.id == a)
                .ok_or_else(|| SequenceError::MarkerNotFound(a.to_string()))?;
            let ib = state
                .markers
                .iter()
                .position(|m| &m.id == b)
                .ok_or_else(|| SequenceError::MarkerNotFound(b.to_string()))?;

            if ia != ib {
                let label_a = std::mem::take(&mut state.markers[ia].label);
                let label_b = std::mem::replace(&mut state.markers[ib].label, label_a);
                state.markers[ia].label = label_b;
            }
            state.markers.clone()
        };

        debug!(a = %a, b = %b, "Marker labels swapped");
        self.publish(snapshot);
        Ok(())
    }

    /// Remove every marker and restart the label and colour sequences.
    pub fn clear(&self) {
        {
            let mut state = self.state.lock();
            *state = RegistryState::default();
        }
        self.publish(Vec::new());
    }

    pub fn get(&self, id: &MarkerId) -> Option<Marker> {
        self.state.lock().markers.iter().find(|m| &m.id == id).cloned()
    }

    /// Live position of a marker, if it still exists.
    pub fn position_of(&self, id: &MarkerId) -> Option<f64> {
        self.state
            .lock()
            .markers
            .iter()
            .find(|m| &m.id == id)
            .map(|m| m.position)
    }

    pub fn contains(&self, id: &MarkerId) -> bool {
        self.state.lock().markers.iter().any(|m| &m.id == id)
    }

    /// All markers, ascending by position.
    pub fn snapshot(&self) -> Vec<Marker> {
        self.state.lock().markers.clone()
    }

    pub fn len(&self) -> usize {
        self.state.lock().markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().markers.is_empty()
    }

    pub fn to_record(&self) -> Vec<MarkerRecord> {
        self.state
            .lock()
            .markers
            .iter()
            .map(MarkerRecord::from)
            .collect()
    }

    /// Replace the registry contents with a persisted list.
    ///
    /// Missing ids are generated and missing colours are taken from the
    /// palette by list position. Both counters continue after the loaded
    /// markers so new markers get fresh labels.
    pub fn from_record(&self, records: Vec<MarkerRecord>) {
        let snapshot = {
            let mut state = self.state.lock();
            let markers: Vec<Marker> = records
                .into_iter()
                .enumerate()
                .filter_map(|(i, record)| {
                    if !record.position.is_finite() {
                        warn!(label = %record.label, "Skipping stored marker with invalid position");
                        return None;
                    }
                    let id = record.id.unwrap_or_else(|| {
                        debug!(label = %record.label, "Stored marker has no id; generating one");
                        MarkerId::generate()
                    });
                    Some(Marker {
                        id,
                        label: record.label,
                        position: record.position,
                        color: record
                            .color
                            .unwrap_or_else(|| PALETTE[i % PALETTE.len()].to_string()),
                        memo: record.memo,
                    })
                })
                .collect();

            state.label_counter = markers.len();
            state.insertion_counter = markers.len();
            state.markers = markers;
            state.sort();
            state.markers.clone()
        };

        debug!(count = snapshot.len(), "Markers restored");
        self.publish(snapshot);
    }

    fn publish(&self, snapshot: Vec<Marker>) {
        self.bus.publish(LooperEvent::MarkersChanged(snapshot));
    }
}

impl fmt::Debug for MarkerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MarkerRegistry")
            .field("markers", &self.len())
            .finish()
    }
}
