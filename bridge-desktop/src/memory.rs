//! In-memory settings document

use bridge_traits::{error::Result, storage::DocumentStorage};
use parking_lot::Mutex;

/// Settings document held in memory
///
/// Nothing survives the process. Useful for tests and for sessions that
/// should not touch the user's saved loops.
#[derive(Default)]
pub struct MemoryStorage {
    document: Mutex<Option<String>>,
    writes: Mutex<usize>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with an existing document, as if it had been read from disk
    pub fn with_document(contents: impl Into<String>) -> Self {
        Self {
            document: Mutex::new(Some(contents.into())),
            writes: Mutex::new(0),
        }
    }

    /// Current document contents
    pub fn contents(&self) -> Option<String> {
        self.document.lock().clone()
    }

    /// Number of `write_document` calls so far
    pub fn write_count(&self) -> usize {
        *self.writes.lock()
    }
}

impl DocumentStorage for MemoryStorage {
    fn read_document(&self) -> Result<Option<String>> {
        Ok(self.document.lock().clone())
    }

    fn write_document(&self, contents: &str) -> Result<()> {
        *self.document.lock() = Some(contents.to_string());
        *self.writes.lock() += 1;
        Ok(())
    }

    fn location(&self) -> String {
        String::from("<memory>")
    }
}
