//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the stream looper core:
//! - Logging and tracing infrastructure
//! - Configuration management
//! - Synchronous, typed event bus
//!
//! ## Overview
//!
//! This crate contains the runtime utilities that the domain crates depend on.
//! It establishes the logging conventions, the configuration builder and the
//! publish/subscribe mechanism used to decouple the marker registry, the
//! sequence engine, persistence and the host UI.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
