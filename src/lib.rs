//! Workspace placeholder crate.
//!
//! This crate exists to expose shared feature flags that map to the individual
//! workspace crates. Host applications can depend on `stream-looper-workspace`
//! and enable `desktop-shims` to get the session controller together with the
//! file-backed settings storage, without wiring each crate individually.

#[cfg(feature = "desktop-shims")]
pub use core_service::*;
