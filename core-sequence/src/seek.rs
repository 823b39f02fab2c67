//! # Seek Dispatch
//!
//! The engine decides *where* to seek while handling a position tick; it must
//! not wait for the player to get there. [`SeekDispatcher`] holds at most one
//! pending target in a `watch` slot and a single tokio task drains it into
//! [`PlayerControl::seek`]. A newer request replaces one the worker has not
//! picked up yet, so the last request wins and at most one seek is in flight.
//!
//! ```text
//! position tick ──> SequenceEngine ──request_seek──> [ slot ] ──> worker ──> player.seek()
//! ```

use crate::error::{Result, SequenceError};
use bridge_traits::{PlayerControl, SeekMode};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Receiver of the engine's seek requests.
///
/// Must return immediately.
pub trait SeekTarget: Send + Sync {
    fn request_seek(&self, position: f64);
}

/// Single-slot, last-wins seek queue backed by one tokio task.
pub struct SeekDispatcher {
    slot: watch::Sender<Option<f64>>,
    worker: JoinHandle<()>,
}

impl SeekDispatcher {
    /// Start the worker on the current tokio runtime.
    ///
    /// # Errors
    ///
    /// [`SequenceError::RuntimeUnavailable`] when called outside a runtime.
    pub fn spawn(player: Arc<dyn PlayerControl>) -> Result<Self> {
        let handle =
            Handle::try_current().map_err(|e| SequenceError::RuntimeUnavailable(e.to_string()))?;
        Ok(Self::spawn_on(&handle, player))
    }

    /// Start the worker on an explicit runtime handle.
    pub fn spawn_on(handle: &Handle, player: Arc<dyn PlayerControl>) -> Self {
        let (slot, mut pending) = watch::channel(None::<f64>);

        let worker = handle.spawn(async move {
            while pending.changed().await.is_ok() {
                let Some(position) = *pending.borrow_and_update() else {
                    continue;
                };
                debug!(position, "Dispatching seek");
                if let Err(err) = player.seek(position, SeekMode::AbsoluteExact).await {
                    warn!(position, error = %err, "Seek failed");
                }
            }
            debug!("Seek dispatcher stopped");
        });

        Self { slot, worker }
    }
}

impl SeekTarget for SeekDispatcher {
    fn request_seek(&self, position: f64) {
        self.slot.send_replace(Some(position));
    }
}

impl Drop for SeekDispatcher {
    fn drop(&mut self) {
        self.worker.abort();
    }
}
