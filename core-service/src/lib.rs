//! Core service façade and bootstrap helpers.
//!
//! This crate wires host-provided bridge implementations (player, stream
//! resolver, settings storage) into the looper core. Desktop apps typically
//! enable the `desktop-shims` feature (which depends on `bridge-desktop`) to
//! get file-backed settings without writing their own storage.

pub mod effects;
pub mod error;
pub mod session;

pub use effects::{pitch_filter, AudioEffects};
pub use error::{Result, ServiceError};
pub use session::{LooperSession, SessionDependencies};

pub use core_runtime::config::{LooperConfig, LooperConfigBuilder};
pub use core_runtime::logging::{LogFormat, LoggingConfig};
pub use core_sequence::{
    seconds_to_hms, seconds_to_mmss, LoopMode, LooperEvent, Marker, MarkerId, Segment,
    SegmentSummary, Topic,
};

#[cfg(feature = "desktop-shims")]
pub use bridge_desktop::{JsonFileStorage, MemoryStorage};

/// Initialize logging from `config` and build a session.
///
/// Hosts that install their own `tracing` subscriber should call
/// [`LooperSession::new`] directly instead.
///
/// ```ignore
/// # async fn example(deps: core_service::SessionDependencies) -> core_service::Result<()> {
/// use core_service::{bootstrap, LooperConfig};
///
/// let config = LooperConfig::builder().seek_threshold(0.2).build()?;
/// let session = bootstrap(config, deps)?;
/// session.open_stream("https://example.com/live.m3u8").await?;
/// # Ok(())
/// # }
/// ```
pub fn bootstrap(config: LooperConfig, deps: SessionDependencies) -> Result<LooperSession> {
    core_runtime::logging::init_logging(config.logging.clone())?;
    LooperSession::new(config, deps)
}
