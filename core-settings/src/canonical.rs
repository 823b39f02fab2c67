//! # URL Canonicalization
//!
//! Maps a stream URL to the key its loop settings are stored under. Two URLs
//! that differ only in volatile query parameters (start offsets, share and
//! referral tokens), in the order of their query keys or in the fragment
//! produce the same key.
//!
//! Steps:
//! 1. Drop the fragment
//! 2. Remove volatile query keys
//! 3. Sort the remaining keys (stable, so repeated keys keep their order)
//! 4. Re-serialize; an empty query leaves no `?`
//!
//! Inputs that do not parse as absolute URLs (local file paths, for example)
//! go through the same steps on the raw text.

use core_runtime::config::LooperConfig;
use std::collections::BTreeSet;
use url::Url;

/// Query keys that never identify the stream itself.
pub const DEFAULT_VOLATILE_PARAMS: [&str; 3] = ["t", "feature", "si"];

/// Canonicalizer with a configurable set of volatile query keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlCanonicalizer {
    volatile: BTreeSet<String>,
}

impl Default for UrlCanonicalizer {
    fn default() -> Self {
        Self {
            volatile: DEFAULT_VOLATILE_PARAMS.iter().map(|k| k.to_string()).collect(),
        }
    }
}

impl UrlCanonicalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Default keys plus `extra`.
    pub fn with_extra<I, S>(extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut canonicalizer = Self::default();
        canonicalizer
            .volatile
            .extend(extra.into_iter().map(Into::into));
        canonicalizer
    }

    pub fn from_config(config: &LooperConfig) -> Self {
        Self::with_extra(config.extra_volatile_params.iter().cloned())
    }

    pub fn is_volatile(&self, key: &str) -> bool {
        self.volatile.contains(key)
    }

    pub fn canonicalize(&self, url: &str) -> String {
        let trimmed = url.trim();
        match Url::parse(trimmed) {
            Ok(parsed) => self.canonicalize_parsed(parsed),
            Err(_) => self.canonicalize_text(trimmed),
        }
    }

    fn canonicalize_parsed(&self, mut url: Url) -> String {
        url.set_fragment(None);

        let mut pairs: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(key, _)| !self.is_volatile(key))
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();
        pairs.sort_by(|a, b| a.0.cmp(&b.0));

        if pairs.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(pairs);
        }
        url.to_string()
    }

    fn canonicalize_text(&self, url: &str) -> String {
        let without_fragment = url.split('#').next().unwrap_or(url);
        let Some((base, query)) = without_fragment.split_once('?') else {
            return without_fragment.to_string();
        };

        let mut pairs: Vec<&str> = query
            .split('&')
            .filter(|pair| !pair.is_empty())
            .filter(|pair| !self.is_volatile(pair_key(pair)))
            .collect();
        pairs.sort_by(|a, b| pair_key(a).cmp(pair_key(b)));

        if pairs.is_empty() {
            base.to_string()
        } else {
            format!("{}?{}", base, pairs.join("&"))
        }
    }
}

fn pair_key(pair: &str) -> &str {
    pair.split_once('=').map_or(pair, |(key, _)| key)
}

/// Canonicalize with the default volatile keys.
pub fn canonicalize(url: &str) -> String {
    UrlCanonicalizer::default().canonicalize(url)
}
