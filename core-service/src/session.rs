//! # Looper Session
//!
//! Application controller that wires the bus, the marker registry, the
//! sequence engine, persistence and the host player together.
//!
//! ## Responsibilities
//!
//! - Opening a stream: save the previous stream's loops, resolve metadata,
//!   stop looping, load the player, restore the saved loops for the new URL
//! - Auto-save on every `MarkersChanged` and `SequenceChanged`, except while
//!   a restore is in progress
//! - Tracking the last reported position, duration and pause state
//! - Saving and stopping when the session closes
//!
//! ## Usage
//!
//! ```ignore
//! let config = LooperConfig::builder().build()?;
//! let session = LooperSession::new(config, SessionDependencies::new(player, resolver))?;
//!
//! session.open_stream("https://www.youtube.com/watch?v=...").await?;
//! session.report_position(12.0);
//! let marker = session.add_marker_at_current()?;
//! ```

use crate::effects::AudioEffects;
use crate::error::{Result, ServiceError};
use anyhow::Context;
use bridge_traits::{PlaybackState, PlayerControl, SeekMode, StreamInfo, StreamResolver};
use core_runtime::config::LooperConfig;
use core_runtime::events::SubscriptionId;
use core_runtime::logging::redact_query;
use core_sequence::{
    EngineSettings, LooperBus, LooperEvent, Marker, MarkerId, MarkerRegistry, SeekDispatcher,
    SequenceEngine, Topic,
};
use core_settings::{LoopSettingsStore, UrlCanonicalizer};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Host collaborators a session needs.
#[derive(Clone)]
pub struct SessionDependencies {
    pub player: Arc<dyn PlayerControl>,
    pub resolver: Arc<dyn StreamResolver>,
}

impl SessionDependencies {
    pub fn new(player: Arc<dyn PlayerControl>, resolver: Arc<dyn StreamResolver>) -> Self {
        Self { player, resolver }
    }
}

/// State shared with the bus handlers.
#[derive(Default)]
struct SessionState {
    current_url: RwLock<Option<String>>,
    stream_info: RwLock<Option<StreamInfo>>,
    restoring: AtomicBool,
    last_position: Mutex<Option<f64>>,
    duration: Mutex<Option<f64>>,
    playback_state: Mutex<Option<PlaybackState>>,
}

/// Clears the restoring flag when dropped, even on early return.
struct RestoreGuard<'a>(&'a AtomicBool);

impl<'a> RestoreGuard<'a> {
    fn engage(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for RestoreGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct LooperSession {
    bus: Arc<LooperBus>,
    registry: Arc<MarkerRegistry>,
    engine: Arc<SequenceEngine>,
    store: Arc<LoopSettingsStore>,
    effects: AudioEffects,
    deps: SessionDependencies,
    state: Arc<SessionState>,
    subscriptions: Vec<SubscriptionId>,
}

impl LooperSession {
    /// Build a session on the current tokio runtime.
    ///
    /// # Errors
    ///
    /// Fails outside a tokio runtime, since seeks are dispatched from a task.
    pub fn new(config: LooperConfig, deps: SessionDependencies) -> Result<Self> {
        let bus = Arc::new(LooperBus::new());
        let registry = Arc::new(MarkerRegistry::new(Arc::clone(&bus)));
        let engine = SequenceEngine::new(
            Arc::clone(&bus),
            Arc::clone(&registry),
            EngineSettings::from(&config),
        );
        let dispatcher = SeekDispatcher::spawn(Arc::clone(&deps.player))?;
        engine.set_seek_target(Arc::new(dispatcher));

        let store = Arc::new(LoopSettingsStore::open(
            Arc::clone(&config.document_storage),
            UrlCanonicalizer::from_config(&config),
        ));
        let effects = AudioEffects::new(Arc::clone(&bus), Arc::clone(&deps.player));
        let state = Arc::new(SessionState::default());

        let mut session = Self {
            bus,
            registry,
            engine,
            store,
            effects,
            deps,
            state,
            subscriptions: Vec::new(),
        };
        session.subscribe_handlers();

        info!(
            seek_threshold = config.seek_threshold,
            streams = session.store.len(),
            "Looper session ready"
        );
        Ok(session)
    }

    fn subscribe_handlers(&mut self) {
        for topic in [Topic::MarkersChanged, Topic::SequenceChanged] {
            let registry = Arc::clone(&self.registry);
            let engine = Arc::clone(&self.engine);
            let store = Arc::clone(&self.store);
            let state = Arc::clone(&self.state);
            let id = self.bus.subscribe(topic, move |_| {
                if state.restoring.load(Ordering::SeqCst) {
                    return Ok(());
                }
                let Some(url) = state.current_url.read().clone() else {
                    return Ok(());
                };
                store
                    .save_for_url(
                        &url,
                        registry.to_record(),
                        engine.segments(),
                        engine.loop_mode(),
                    )
                    .context("auto-save failed")
            });
            self.subscriptions.push(id);
        }

        let state = Arc::clone(&self.state);
        self.subscriptions
            .push(self.bus.subscribe(Topic::PositionChanged, move |event| {
                if let LooperEvent::PositionChanged(position) = event {
                    *state.last_position.lock() = Some(*position);
                }
                Ok(())
            }));

        let state = Arc::clone(&self.state);
        self.subscriptions
            .push(self.bus.subscribe(Topic::DurationChanged, move |event| {
                if let LooperEvent::DurationChanged(duration) = event {
                    *state.duration.lock() = Some(*duration);
                }
                Ok(())
            }));

        let state = Arc::clone(&self.state);
        self.subscriptions
            .push(self.bus.subscribe(Topic::PlaybackStateChanged, move |event| {
                if let LooperEvent::PlaybackStateChanged(playback) = event {
                    *state.playback_state.lock() = Some(*playback);
                }
                Ok(())
            }));
    }

    // ------------------------------------------------------------------------
    // Stream lifecycle
    // ------------------------------------------------------------------------

    /// Switch to `url` and restore whatever was saved for it.
    #[instrument(skip(self, url), fields(url = %redact_query(url)))]
    pub async fn open_stream(&self, url: &str) -> Result<StreamInfo> {
        if let Err(err) = self.save_current() {
            warn!(error = %err, "Failed to save previous stream before switching");
        }

        let info = self.deps.resolver.resolve(url).await?;
        // Stop while the old URL is current so nothing is saved under the new key
        self.engine.stop();
        self.deps.player.load(url).await?;
        if let Err(err) = self.effects.apply_filter().await {
            warn!(error = %err, "Failed to apply audio filter to new stream");
        }

        *self.state.current_url.write() = Some(url.to_string());
        *self.state.stream_info.write() = Some(info.clone());
        *self.state.last_position.lock() = None;
        *self.state.duration.lock() = info.duration;

        self.restore(url);
        info!(title = %info.title, "Stream opened");
        Ok(info)
    }

    fn restore(&self, url: &str) {
        let _guard = RestoreGuard::engage(&self.state.restoring);
        self.engine.stop();

        match self.store.load_for_url(url) {
            Some(record) => {
                debug!(
                    markers = record.markers.len(),
                    segments = record.segments.len(),
                    "Restoring saved loops"
                );
                let sequence = record.sequence();
                self.registry.from_record(record.markers);
                self.engine.from_record(sequence);
            }
            None => {
                self.registry.clear();
                self.engine.set_segments(Vec::new());
            }
        }
    }

    /// Persist the current stream's markers and segments now.
    pub fn save_current(&self) -> Result<()> {
        let Some(url) = self.current_url() else {
            return Ok(());
        };
        self.store.save_for_url(
            &url,
            self.registry.to_record(),
            self.engine.segments(),
            self.engine.loop_mode(),
        )?;
        Ok(())
    }

    /// Save and stop looping. The session stays usable.
    pub fn close(&self) -> Result<()> {
        let saved = self.save_current();
        self.engine.stop();
        info!("Session closed");
        saved
    }

    // ------------------------------------------------------------------------
    // Editing
    // ------------------------------------------------------------------------

    /// Drop a marker at the last reported position.
    pub fn add_marker_at_current(&self) -> Result<Marker> {
        if self.current_url().is_none() {
            return Err(ServiceError::NoStreamLoaded);
        }
        let position = self.last_position().ok_or(ServiceError::NoPosition)?;
        Ok(self.registry.add(position, None)?)
    }

    /// Remove a marker and every segment that uses it.
    pub fn remove_marker(&self, id: &MarkerId) -> Result<Marker> {
        if !self.registry.contains(id) {
            return Err(core_sequence::SequenceError::MarkerNotFound(id.to_string()).into());
        }
        self.engine.remove_segments_referencing(id);
        Ok(self.registry.remove(id)?)
    }

    /// Start looping if stopped, stop if looping. Returns the new state.
    pub fn toggle_looping(&self) -> bool {
        if self.engine.is_active() {
            self.engine.stop();
        } else {
            self.engine.start();
        }
        self.engine.is_active()
    }

    // ------------------------------------------------------------------------
    // Transport
    // ------------------------------------------------------------------------

    pub async fn toggle_pause(&self) -> Result<()> {
        self.deps.player.toggle_pause().await?;
        Ok(())
    }

    /// Nudge playback by `delta` seconds.
    pub async fn seek_relative(&self, delta: f64) -> Result<()> {
        self.deps.player.seek(delta, SeekMode::RelativeExact).await?;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Player adapter entry points
    // ------------------------------------------------------------------------

    pub fn report_position(&self, position: f64) {
        self.bus.publish(LooperEvent::PositionChanged(position));
    }

    pub fn report_duration(&self, duration: f64) {
        self.bus.publish(LooperEvent::DurationChanged(duration));
    }

    pub fn report_playback_state(&self, state: PlaybackState) {
        self.bus.publish(LooperEvent::PlaybackStateChanged(state));
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    pub fn bus(&self) -> &Arc<LooperBus> {
        &self.bus
    }

    pub fn registry(&self) -> &Arc<MarkerRegistry> {
        &self.registry
    }

    pub fn engine(&self) -> &Arc<SequenceEngine> {
        &self.engine
    }

    pub fn store(&self) -> &Arc<LoopSettingsStore> {
        &self.store
    }

    pub fn effects(&self) -> &AudioEffects {
        &self.effects
    }

    pub fn current_url(&self) -> Option<String> {
        self.state.current_url.read().clone()
    }

    pub fn stream_info(&self) -> Option<StreamInfo> {
        self.state.stream_info.read().clone()
    }

    pub fn last_position(&self) -> Option<f64> {
        *self.state.last_position.lock()
    }

    pub fn duration(&self) -> Option<f64> {
        *self.state.duration.lock()
    }

    pub fn playback_state(&self) -> Option<PlaybackState> {
        *self.state.playback_state.lock()
    }
}

impl Drop for LooperSession {
    fn drop(&mut self) {
        for id in self.subscriptions.drain(..) {
            self.bus.unsubscribe(id);
        }
    }
}
