//! Stream metadata resolution.

use crate::error::Result;
use serde::{Deserialize, Serialize};

/// Metadata returned by a [`StreamResolver`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamInfo {
    /// The URL that was resolved, as given by the caller.
    pub url: String,
    /// Display title of the stream.
    pub title: String,
    /// Duration in seconds, when the backend reports one (live streams do not).
    pub duration: Option<f64>,
}

impl StreamInfo {
    pub fn new(url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            duration: None,
        }
    }

    pub fn with_duration(mut self, duration: Option<f64>) -> Self {
        self.duration = duration;
        self
    }
}

/// Resolves stream URLs (video pages, direct media links) into display metadata.
///
/// Resolution usually involves network I/O, so it is async and may be slow;
/// callers must not hold engine locks across it.
#[async_trait::async_trait]
pub trait StreamResolver: Send + Sync {
    /// Look up title and duration for `url`.
    async fn resolve(&self, url: &str) -> Result<StreamInfo>;
}
