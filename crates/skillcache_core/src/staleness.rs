//! Entry validity checks.

use std::fmt;

use serde::Serialize;

use crate::checksum::{ABSENT_CHECKSUM, ChecksumMap, Fingerprinter};
use crate::CacheEntry;

/// Outcome of evaluating an entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Freshness {
    /// The entry can be used.
    Fresh,
    /// There is no usable entry.
    Missing,
    /// The TTL has elapsed.
    Expired { age: u64, ttl: u64 },
    /// A tracked file's checksum no longer matches.
    Changed { path: String },
}

impl Freshness {
    pub fn is_fresh(&self) -> bool {
        matches!(self, Self::Fresh)
    }
}

impl fmt::Display for Freshness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fresh => write!(f, "fresh"),
            Self::Missing => write!(f, "missing"),
            Self::Expired { age, ttl } => write!(f, "expired ({}s old, ttl {}s)", age, ttl),
            Self::Changed { path } => write!(f, "changed ({})", path),
        }
    }
}

/// Decides whether stored entries are still valid.
pub struct StalenessEvaluator<'a> {
    fingerprinter: &'a Fingerprinter,
}

impl<'a> StalenessEvaluator<'a> {
    pub fn new(fingerprinter: &'a Fingerprinter) -> Self {
        Self { fingerprinter }
    }

    /// Evaluates an entry at time `now`.
    ///
    /// Checks run in order: presence, TTL, then tracked files. Tracked files
    /// are re-hashed from disk unless `current` supplies their checksums; a
    /// path missing from `current` counts as absent.
    pub fn evaluate(
        &self,
        entry: Option<&CacheEntry>,
        now: u64,
        current: Option<&ChecksumMap>,
    ) -> Freshness {
        let Some(entry) = entry else {
            return Freshness::Missing;
        };

        if let Some(ttl) = entry.ttl_seconds
            && entry.is_expired(now)
        {
            return Freshness::Expired {
                age: entry.age(now),
                ttl,
            };
        }

        if entry.tracked_files.is_empty() {
            return Freshness::Fresh;
        }

        let recomputed;
        let current = match current {
            Some(current) => current,
            None => {
                recomputed = self.fingerprinter.fingerprint(entry.tracked_files.keys());
                &recomputed
            }
        };

        for (path, stored) in &entry.tracked_files {
            let now_checksum = current
                .get(path)
                .map(String::as_str)
                .unwrap_or(ABSENT_CHECKSUM);
            if now_checksum != stored {
                return Freshness::Changed { path: path.clone() };
            }
        }

        Freshness::Fresh
    }

    /// Returns true if the entry is present and fresh.
    pub fn is_valid(
        &self,
        entry: Option<&CacheEntry>,
        now: u64,
        current: Option<&ChecksumMap>,
    ) -> bool {
        self.evaluate(entry, now, current).is_fresh()
    }
}
