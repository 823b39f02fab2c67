//! # Host Bridge Traits
//!
//! Abstraction traits for the collaborators the looper core relies on but
//! does not implement itself.
//!
//! ## Overview
//!
//! The core owns markers, segments and the sequencing state machine. Actual
//! media playback, metadata lookup and raw file I/O belong to the host and
//! are reached only through the traits defined here:
//!
//! ### Playback
//! - [`PlayerControl`](playback::PlayerControl) - Seek, pause/resume, speed and audio filter control
//!
//! ### Metadata
//! - [`StreamResolver`](stream::StreamResolver) - Resolve a stream URL to a title and duration
//!
//! ### Storage
//! - [`DocumentStorage`](storage::DocumentStorage) - Read and rewrite the single settings document
//!
//! ### Logging
//! - [`LoggerSink`](log::LoggerSink) - Forward structured logs to host logging
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type. Host
//! implementations should convert their native errors into it and keep the
//! message actionable (file path, player command, resolver backend).
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync`: position updates arrive on the
//! player's callback thread while seeks are issued from a tokio worker.

pub mod error;
pub mod log;
pub mod playback;
pub mod storage;
pub mod stream;

pub use error::BridgeError;

// Re-export commonly used types
pub use playback::{PlaybackState, PlayerControl, SeekMode};
pub use storage::DocumentStorage;
pub use stream::{StreamInfo, StreamResolver};
pub use log::{LogEntry, LogLevel, LoggerSink};
