//! # Sequence Error Types
//!
//! Errors raised by the marker registry and the sequence engine.

use thiserror::Error;

/// Errors that can occur while editing markers or segments.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SequenceError {
    // ========================================================================
    // Marker Errors
    // ========================================================================
    /// No marker with this id is registered.
    #[error("Marker not found: {0}")]
    MarkerNotFound(String),

    /// Marker positions must be finite numbers of seconds.
    #[error("Invalid marker position: {0}")]
    InvalidPosition(f64),

    // ========================================================================
    // Segment Errors
    // ========================================================================
    /// A segment was defined over a marker id the registry does not know.
    #[error("Segment references unknown marker: {0}")]
    UnknownMarker(String),

    // ========================================================================
    // Runtime Errors
    // ========================================================================
    /// Seek dispatch needs a running tokio runtime.
    #[error("No async runtime available: {0}")]
    RuntimeUnavailable(String),
}

/// Result type for sequence operations.
pub type Result<T> = std::result::Result<T, SequenceError>;
