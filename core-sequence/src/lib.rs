//! # Core Sequence Module
//!
//! Markers, segments and the segment-loop state machine.
//!
//! ## Overview
//!
//! - [`MarkerRegistry`]: labelled time points with stable ids
//! - [`SequenceEngine`]: ordered segments over marker pairs, looped by
//!   position ticks under a [`LoopMode`]
//! - [`SeekDispatcher`]: last-wins seek queue feeding the player
//! - [`LooperEvent`]/[`Topic`]: what travels over the [`LooperBus`]
//!
//! ## Usage
//!
//! ```ignore
//! use core_sequence::{EngineSettings, LooperBus, MarkerRegistry, SeekDispatcher, SequenceEngine};
//!
//! let bus = Arc::new(LooperBus::new());
//! let registry = Arc::new(MarkerRegistry::new(bus.clone()));
//! let engine = SequenceEngine::new(bus.clone(), registry.clone(), EngineSettings::default());
//! engine.set_seek_target(Arc::new(SeekDispatcher::spawn(player)?));
//!
//! let a = registry.add(12.0, None)?;
//! let b = registry.add(18.5, None)?;
//! engine.add_segment(a.id, b.id, None)?;
//! engine.start();
//! ```

pub mod engine;
pub mod error;
pub mod events;
pub mod marker;
pub mod seek;
pub mod segment;
pub mod timefmt;

pub use engine::{EngineSettings, SequenceEngine};
pub use error::{Result, SequenceError};
pub use events::{LooperBus, LooperEvent, Topic};
pub use marker::{Marker, MarkerId, MarkerRecord, MarkerRegistry, PALETTE};
pub use seek::{SeekDispatcher, SeekTarget};
pub use segment::{LoopMode, Segment, SegmentSummary, SequenceRecord};
pub use timefmt::{seconds_to_hms, seconds_to_mmss};
