//! # Core Settings Module
//!
//! Per-stream persistence of loop settings.
//!
//! - [`UrlCanonicalizer`]: stable storage key for a stream URL
//! - [`LoopSettingsStore`]: canonical URL → [`StreamRecord`], whole-document
//!   rewrite on every change

pub mod canonical;
pub mod error;
pub mod record;
pub mod store;

pub use canonical::{canonicalize, UrlCanonicalizer, DEFAULT_VOLATILE_PARAMS};
pub use error::{Result, SettingsError};
pub use record::StreamRecord;
pub use store::LoopSettingsStore;
