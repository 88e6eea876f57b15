//! Link freshness cache for incremental link checking.
//!
//! Verifying an external link costs a network round trip, and a book can
//! carry hundreds of them. This module remembers when each URL was last
//! verified so the validation pass only re-checks links whose verification
//! has gone stale.
//!
//! # Design
//!
//! The cache is a flat mapping `url -> verified_at`, where `verified_at` is an
//! ISO-8601 instant. A URL is **fresh** iff
//!
//! ```text
//! now - verified_at <= freshness window   (30 days by default)
//! ```
//!
//! - An absent URL is never fresh.
//! - A timestamp that cannot be parsed is never fresh: the link is simply
//!   verified again and the entry overwritten. A damaged entry never aborts
//!   a build.
//! - Entries are only created or refreshed after a successful verification.
//!   Nothing is ever evicted here.
//!
//! ## Storage
//!
//! The cache file is a pretty-printed JSON object with keys sorted, so it
//! diffs cleanly when checked into the book's repository. It is loaded once
//! at the start of a run and saved once at the end of the validation phase
//! (see [`crate::pipeline`]). Saving goes through
//! [`write_atomic`](crate::persist::write_atomic).
//!
//! Timestamps written by this module are RFC 3339 in UTC. Naive timestamps
//! (`2019-08-01T12:30:00.123456`, no offset) from older cache files are read
//! as UTC.

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use thiserror::Error;
use tracing::warn;

/// Default name of the cache file, placed next to the manifest.
pub const CACHE_FILENAME: &str = ".link-cache.json";

/// Default freshness window.
pub const DEFAULT_FRESHNESS_DAYS: i64 = 30;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Persistent mapping from URL to the instant it was last verified.
#[derive(Debug, Clone)]
pub struct LinkCache {
    entries: BTreeMap<String, String>,
    window: Duration,
}

impl Default for LinkCache {
    fn default() -> Self {
        Self::empty()
    }
}

impl LinkCache {
    /// Create an empty cache with the default 30-day window.
    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
            window: Duration::days(DEFAULT_FRESHNESS_DAYS),
        }
    }

    /// Replace the freshness window.
    pub fn with_window_days(mut self, days: i64) -> Self {
        self.window = Duration::days(days);
        self
    }

    /// Load from `path`. Returns an empty cache if the file doesn't exist or
    /// can't be parsed.
    pub fn load(path: &Path) -> Self {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => return Self::empty(),
        };
        match serde_json::from_str::<BTreeMap<String, String>>(&content) {
            Ok(entries) => Self {
                entries,
                ..Self::empty()
            },
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring unreadable link cache");
                Self::empty()
            }
        }
    }

    /// Save the full mapping to `path`.
    pub fn save(&self, path: &Path) -> Result<(), CacheError> {
        let json = serde_json::to_string_pretty(&self.entries)?;
        crate::persist::write_atomic(path, json.as_bytes())?;
        Ok(())
    }

    /// Whether `url` was verified within the window, as of now.
    pub fn is_fresh(&self, url: &str) -> bool {
        self.is_fresh_at(url, Utc::now())
    }

    /// Whether `url` was verified within the window, as of `now`.
    pub fn is_fresh_at(&self, url: &str, now: DateTime<Utc>) -> bool {
        let Some(raw) = self.entries.get(url) else {
            return false;
        };
        match parse_instant(raw) {
            Some(verified_at) => now.signed_duration_since(verified_at) <= self.window,
            None => false,
        }
    }

    /// Record a successful verification of `url` now.
    pub fn mark_verified(&mut self, url: &str) {
        self.mark_verified_at(url, Utc::now());
    }

    /// Record a successful verification of `url` at `at`.
    pub fn mark_verified_at(&mut self, url: &str, at: DateTime<Utc>) {
        self.entries.insert(url.to_string(), at.to_rfc3339());
    }

    /// Raw stored timestamp for `url`, if any.
    pub fn verified_at(&self, url: &str) -> Option<&str> {
        self.entries.get(url).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn insert_raw(&mut self, url: &str, raw: &str) {
        self.entries.insert(url.to_string(), raw.to_string());
    }
}

/// Parse an ISO-8601 instant. Offset-less timestamps are taken as UTC.
fn parse_instant(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Summary of link checking for a run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LinkStats {
    /// Links trusted from the cache without a network call.
    pub fresh: u32,
    /// Links probed over the network and found alive.
    pub verified: u32,
    /// Same-page `#fragment` links, never checked.
    pub fragments: u32,
}

impl LinkStats {
    pub fn fresh(&mut self) {
        self.fresh += 1;
    }

    pub fn verified(&mut self) {
        self.verified += 1;
    }

    pub fn fragment(&mut self) {
        self.fragments += 1;
    }

    pub fn total(&self) -> u32 {
        self.fresh + self.verified + self.fragments
    }

    /// Fold another document's stats into this one.
    pub fn absorb(&mut self, other: LinkStats) {
        self.fresh += other.fresh;
        self.verified += other.verified;
        self.fragments += other.fragments;
    }
}

impl fmt::Display for LinkStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.total() == 0 {
            return write!(f, "no links");
        }
        write!(
            f,
            "{} cached, {} verified, {} in-page ({} total)",
            self.fresh,
            self.verified,
            self.fragments,
            self.total()
        )
    }
}
