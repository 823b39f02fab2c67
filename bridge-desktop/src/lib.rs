//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! - `DocumentStorage` backed by a single JSON file (`JsonFileStorage`)
//! - `DocumentStorage` kept in memory (`MemoryStorage`), for tests and
//!   ephemeral sessions
//!
//! Player and resolver adapters are host-specific (they wrap a native media
//! engine and a metadata extractor) and are not provided here.
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::JsonFileStorage;
//! use bridge_traits::DocumentStorage;
//!
//! let storage = JsonFileStorage::new(JsonFileStorage::default_path());
//! let document = storage.read_document()?;
//! ```

mod memory;
mod storage;

pub use memory::MemoryStorage;
pub use storage::JsonFileStorage;
