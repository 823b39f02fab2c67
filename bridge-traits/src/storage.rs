//! Settings Document Storage
//!
//! Provides the raw persistence seam for the loop settings document. The core
//! owns the document's shape; the host only has to read and rewrite one blob.

use crate::error::Result;

/// Raw document storage trait
///
/// The settings store keeps one flat mapping in memory and rewrites the whole
/// document on every save, so the storage only needs whole-document reads and
/// writes. Calls are synchronous because saves are triggered from event
/// handlers, which run inline on the publishing thread.
///
/// Implementations:
/// - Desktop: a JSON file at an injected path
/// - Tests: an in-memory buffer
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::DocumentStorage;
///
/// fn reset(storage: &dyn DocumentStorage) -> Result<()> {
///     storage.write_document("{}")
/// }
/// ```
pub trait DocumentStorage: Send + Sync {
    /// Read the stored document.
    ///
    /// Returns `Ok(None)` if nothing has been written yet.
    fn read_document(&self) -> Result<Option<String>>;

    /// Replace the stored document with `contents`.
    fn write_document(&self, contents: &str) -> Result<()>;

    /// Human-readable description of where the document lives, for logging.
    fn location(&self) -> String {
        String::from("<unspecified>")
    }
}
