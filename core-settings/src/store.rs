//! # Loop Settings Store
//!
//! Per-stream persistence of markers, segments and loop mode.
//!
//! ## Overview
//!
//! The whole document is a single JSON object mapping canonical URLs to
//! [`StreamRecord`]s. It is read once when the store opens and rewritten in
//! full on every change; there are no partial updates. A stream with no
//! markers and no segments has no entry at all.
//!
//! Storage is reached through [`DocumentStorage`], so the document can live
//! in a file, in memory, or anywhere the host chooses.

use crate::canonical::UrlCanonicalizer;
use crate::error::Result;
use crate::record::StreamRecord;
use bridge_traits::DocumentStorage;
use core_runtime::logging::redact_query;
use core_sequence::{LoopMode, MarkerRecord, Segment};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct LoopSettingsStore {
    storage: Arc<dyn DocumentStorage>,
    canonicalizer: UrlCanonicalizer,
    entries: Mutex<BTreeMap<String, StreamRecord>>,
}

impl LoopSettingsStore {
    /// Open the store and read the current document.
    ///
    /// A missing document means no saved streams. An unreadable or malformed
    /// document is logged and treated as empty; individual malformed entries
    /// are skipped.
    pub fn open(storage: Arc<dyn DocumentStorage>, canonicalizer: UrlCanonicalizer) -> Self {
        let entries = match storage.read_document() {
            Ok(Some(contents)) => parse_document(&contents),
            Ok(None) => BTreeMap::new(),
            Err(err) => {
                warn!(location = %storage.location(), error = %err, "Failed to read loop settings");
                BTreeMap::new()
            }
        };

        info!(streams = entries.len(), "Loop settings loaded");
        Self {
            storage,
            canonicalizer,
            entries: Mutex::new(entries),
        }
    }

    /// Remember the state of `url`.
    ///
    /// With no markers and no segments the entry is removed instead; the
    /// document is only rewritten if there was an entry to remove.
    pub fn save_for_url(
        &self,
        url: &str,
        markers: Vec<MarkerRecord>,
        segments: Vec<Segment>,
        loop_mode: LoopMode,
    ) -> Result<()> {
        self.save_record(url, StreamRecord::new(markers, segments, loop_mode))
    }

    pub fn save_record(&self, url: &str, record: StreamRecord) -> Result<()> {
        let key = self.canonicalizer.canonicalize(url);
        let mut entries = self.entries.lock();

        if record.is_empty() {
            if entries.remove(&key).is_none() {
                return Ok(());
            }
            debug!(key = %redact_query(&key), "Removing loop settings");
        } else {
            debug!(
                key = %redact_query(&key),
                markers = record.markers.len(),
                segments = record.segments.len(),
                "Saving loop settings"
            );
            entries.insert(key, record);
        }

        self.persist(&entries)
    }

    /// Saved state for `url`, if any.
    pub fn load_for_url(&self, url: &str) -> Option<StreamRecord> {
        let key = self.canonicalizer.canonicalize(url);
        self.entries.lock().get(&key).cloned()
    }

    /// Key `url` is stored under.
    pub fn canonical_key(&self, url: &str) -> String {
        self.canonicalizer.canonicalize(url)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    fn persist(&self, entries: &BTreeMap<String, StreamRecord>) -> Result<()> {
        let document = serde_json::to_string_pretty(entries)?;
        self.storage.write_document(&document)?;
        Ok(())
    }
}

fn parse_document(contents: &str) -> BTreeMap<String, StreamRecord> {
    let raw: BTreeMap<String, Value> = match serde_json::from_str(contents) {
        Ok(raw) => raw,
        Err(err) => {
            warn!(error = %err, "Loop settings document is malformed; starting empty");
            return BTreeMap::new();
        }
    };

    raw.into_iter()
        .filter_map(|(key, value)| match serde_json::from_value(value) {
            Ok(record) => Some((key, record)),
            Err(err) => {
                warn!(key = %redact_query(&key), error = %err, "Skipping malformed loop settings entry");
                None
            }
        })
        .collect()
}

impl fmt::Debug for LoopSettingsStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoopSettingsStore")
            .field("location", &self.storage.location())
            .field("streams", &self.len())
            .finish()
    }
}
