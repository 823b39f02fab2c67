//! # Core Configuration Module
//!
//! Provides configuration management for the stream looper core.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a
//! `LooperConfig` instance that holds the persistence handle and the tuning
//! values of the sequence engine. It enforces fail-fast validation so that a
//! session never starts with an unusable threshold or without storage.
//!
//! ## Required Dependencies
//!
//! - `DocumentStorage` - where per-stream loop settings are persisted
//!
//! When the `desktop-shims` feature is enabled and no storage is injected, a
//! `JsonFileStorage` is created at `settings_path` (or at the platform data
//! directory when no path is given).
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::LooperConfig;
//!
//! let config = LooperConfig::builder()
//!     .settings_path("/path/to/loop_settings.json")
//!     .seek_threshold(0.2)
//!     .build()
//!     .expect("Failed to build config");
//! ```
//!
//! ## Error Handling
//!
//! ```ignore
//! use core_runtime::config::LooperConfig;
//!
//! // Rejected: the lookahead must be positive.
//! let err = LooperConfig::builder().seek_threshold(0.0).build().unwrap_err();
//! ```

use crate::error::{Error, Result};
use crate::logging::LoggingConfig;
use bridge_traits::DocumentStorage;
use std::path::PathBuf;
use std::sync::Arc;

/// Lookahead before a segment's end at which the engine advances, in seconds.
///
/// Compensates for seek and decode latency so loops sound seamless instead of
/// overshooting the end marker.
pub const DEFAULT_SEEK_THRESHOLD: f64 = 0.15;

/// Upper bound accepted for [`LooperConfig::seek_threshold`].
pub const MAX_SEEK_THRESHOLD: f64 = 5.0;

/// Position ticks to wait for a seek into a short segment to land before its
/// boundary is checked anyway.
pub const DEFAULT_ARRIVAL_GRACE_TICKS: u32 = 30;

/// Core configuration for the stream looper.
///
/// Use [`LooperConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct LooperConfig {
    /// Location of the settings document, when file-backed
    pub settings_path: Option<PathBuf>,

    /// Raw persistence for the settings document (required)
    pub document_storage: Arc<dyn DocumentStorage>,

    /// Boundary lookahead in seconds
    pub seek_threshold: f64,

    /// Ticks to wait for a seek into a short segment to land (see the sequence engine)
    pub arrival_grace_ticks: u32,

    /// Query keys stripped from stream URLs in addition to the built-in set
    pub extra_volatile_params: Vec<String>,

    /// Logging setup applied by the session when it initializes logging
    pub logging: LoggingConfig,
}

impl std::fmt::Debug for LooperConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LooperConfig")
            .field("settings_path", &self.settings_path)
            .field("document_storage", &self.document_storage.location())
            .field("seek_threshold", &self.seek_threshold)
            .field("arrival_grace_ticks", &self.arrival_grace_ticks)
            .field("extra_volatile_params", &self.extra_volatile_params)
            .field("logging", &self.logging)
            .finish()
    }
}

impl LooperConfig {
    /// Creates a new builder for constructing a `LooperConfig`.
    pub fn builder() -> LooperConfigBuilder {
        LooperConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - Seek threshold is finite, positive and at most 5 seconds
    /// - Arrival grace is at least one tick
    /// - Extra volatile parameter names are non-empty
    pub fn validate(&self) -> Result<()> {
        if !self.seek_threshold.is_finite() || self.seek_threshold <= 0.0 {
            return Err(Error::Config(format!(
                "Seek threshold must be a positive number of seconds (got {})",
                self.seek_threshold
            )));
        }

        if self.seek_threshold > MAX_SEEK_THRESHOLD {
            return Err(Error::Config(format!(
                "Seek threshold exceeds maximum of {} seconds (got {})",
                MAX_SEEK_THRESHOLD, self.seek_threshold
            )));
        }

        if self.arrival_grace_ticks == 0 {
            return Err(Error::Config(
                "Arrival grace must be at least 1 position tick".to_string(),
            ));
        }

        if self.extra_volatile_params.iter().any(|p| p.trim().is_empty()) {
            return Err(Error::Config(
                "Volatile query parameter names cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn document_storage_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "DocumentStorage".to_string(),
        message: "DocumentStorage implementation is required to persist loop settings. \
                 Desktop: enable the 'desktop-shims' feature to use the default JsonFileStorage. \
                 Tests: inject bridge_desktop::MemoryStorage or a custom implementation."
            .to_string(),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_document_storage(
    settings_path: Option<&PathBuf>,
) -> Result<Arc<dyn DocumentStorage>> {
    use bridge_desktop::JsonFileStorage;

    let path = settings_path
        .cloned()
        .unwrap_or_else(JsonFileStorage::default_path);
    let storage: Arc<dyn DocumentStorage> = Arc::new(JsonFileStorage::new(path));
    Ok(storage)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_document_storage(
    _settings_path: Option<&PathBuf>,
) -> Result<Arc<dyn DocumentStorage>> {
    Err(document_storage_missing_error())
}

/// Builder for constructing [`LooperConfig`] instances.
#[derive(Default)]
pub struct LooperConfigBuilder {
    settings_path: Option<PathBuf>,
    document_storage: Option<Arc<dyn DocumentStorage>>,
    seek_threshold: Option<f64>,
    arrival_grace_ticks: Option<u32>,
    extra_volatile_params: Vec<String>,
    logging: Option<LoggingConfig>,
}

impl LooperConfigBuilder {
    /// Sets the path of the settings document.
    ///
    /// Only used when no storage is injected and the desktop default applies.
    pub fn settings_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.settings_path = Some(path.into());
        self
    }

    /// Injects the storage handle used for the settings document.
    pub fn document_storage(mut self, storage: Arc<dyn DocumentStorage>) -> Self {
        self.document_storage = Some(storage);
        self
    }

    /// Sets the boundary lookahead in seconds.
    ///
    /// Default: 0.15
    pub fn seek_threshold(mut self, seconds: f64) -> Self {
        self.seek_threshold = Some(seconds);
        self
    }

    /// Sets how many position ticks the engine waits for a seek into a short
    /// segment to land.
    ///
    /// Default: 30
    pub fn arrival_grace_ticks(mut self, ticks: u32) -> Self {
        self.arrival_grace_ticks = Some(ticks);
        self
    }

    /// Adds a query key to strip when canonicalizing stream URLs.
    pub fn volatile_param(mut self, key: impl Into<String>) -> Self {
        self.extra_volatile_params.push(key.into());
        self
    }

    /// Sets the logging configuration.
    pub fn logging(mut self, logging: LoggingConfig) -> Self {
        self.logging = Some(logging);
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - No storage was injected and no desktop default is available
    /// - Any value fails [`LooperConfig::validate`]
    pub fn build(self) -> Result<LooperConfig> {
        let document_storage = match self.document_storage {
            Some(storage) => storage,
            None => provide_default_document_storage(self.settings_path.as_ref())?,
        };

        let config = LooperConfig {
            settings_path: self.settings_path,
            document_storage,
            seek_threshold: self.seek_threshold.unwrap_or(DEFAULT_SEEK_THRESHOLD),
            arrival_grace_ticks: self
                .arrival_grace_ticks
                .unwrap_or(DEFAULT_ARRIVAL_GRACE_TICKS),
            extra_volatile_params: self.extra_volatile_params,
            logging: self.logging.unwrap_or_default(),
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::error::Result as BridgeResult;

    struct NullStorage;

    impl DocumentStorage for NullStorage {
        fn read_document(&self) -> BridgeResult<Option<String>> {
            Ok(None)
        }

        fn write_document(&self, _contents: &str) -> BridgeResult<()> {
            Ok(())
        }
    }

    fn builder() -> LooperConfigBuilder {
        LooperConfig::builder().document_storage(Arc::new(NullStorage))
    }

    #[test]
    fn test_builder_defaults() {
        let config = builder().build().unwrap();
        assert_eq!(config.seek_threshold, DEFAULT_SEEK_THRESHOLD);
        assert_eq!(config.arrival_grace_ticks, DEFAULT_ARRIVAL_GRACE_TICKS);
        assert!(config.extra_volatile_params.is_empty());
        assert!(config.settings_path.is_none());
    }

    #[test]
    fn test_builder_custom_values() {
        let config = builder()
            .seek_threshold(0.3)
            .arrival_grace_ticks(5)
            .volatile_param("utm_source")
            .build()
            .unwrap();
        assert_eq!(config.seek_threshold, 0.3);
        assert_eq!(config.arrival_grace_ticks, 5);
        assert_eq!(config.extra_volatile_params, vec!["utm_source".to_string()]);
    }

    #[test]
    fn test_validate_rejects_non_positive_threshold() {
        for bad in [0.0, -0.1, f64::NAN, f64::INFINITY] {
            let result = builder().seek_threshold(bad).build();
            assert!(matches!(result, Err(Error::Config(_))), "accepted {}", bad);
        }
    }

    #[test]
    fn test_validate_rejects_excessive_threshold() {
        let result = builder().seek_threshold(MAX_SEEK_THRESHOLD + 1.0).build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_zero_grace() {
        let result = builder().arrival_grace_ticks(0).build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_blank_volatile_param() {
        let result = builder().volatile_param("  ").build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[cfg(not(feature = "desktop-shims"))]
    #[test]
    fn test_builder_requires_document_storage() {
        let result = LooperConfig::builder().build();
        match result {
            Err(Error::CapabilityMissing { capability, .. }) => {
                assert_eq!(capability, "DocumentStorage");
            }
            other => panic!("expected CapabilityMissing, got {:?}", other),
        }
    }

    #[cfg(feature = "desktop-shims")]
    #[test]
    fn test_build_with_desktop_default_storage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("loop_settings.json");
        let config = LooperConfig::builder()
            .settings_path(&path)
            .build()
            .unwrap();
        assert_eq!(config.settings_path.as_deref(), Some(path.as_path()));
        assert_eq!(config.document_storage.location(), path.display().to_string());
    }

    #[test]
    fn test_config_is_cloneable_and_debuggable() {
        let config = builder().build().unwrap();
        let cloned = config.clone();
        assert_eq!(cloned.seek_threshold, config.seek_threshold);
        assert!(format!("{:?}", cloned).contains("LooperConfig"));
    }
}
