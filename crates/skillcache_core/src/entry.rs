//! Cache entry types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::checksum::ChecksumMap;
use crate::error::CacheError;

/// On-disk format version written by this crate.
pub const SCHEMA_VERSION: u32 = 1;

/// A cached result for one `(namespace, key)`.
///
/// Entries are immutable once written; a new `put` replaces the whole entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Logical owner of the entry.
    pub namespace: String,

    /// Identifies the cached computation within the namespace.
    pub key: String,

    /// Unix timestamp (UTC seconds) when this entry was written.
    pub created_at: u64,

    /// Seconds after `created_at` the entry expires, if at all.
    #[serde(default)]
    pub ttl_seconds: Option<u64>,

    /// Checksums of tracked files at write time.
    #[serde(default)]
    pub tracked_files: ChecksumMap,

    /// The cached result. Never inspected by the cache.
    pub payload: Value,

    /// Collaborator that wrote the entry.
    pub producer: String,

    /// Format version of this entry.
    pub schema_version: u32,
}

/// Just enough of an entry to check its format version.
#[derive(Deserialize)]
struct VersionProbe {
    schema_version: u32,
}

impl CacheEntry {
    /// Creates a new cache entry.
    pub fn new(
        namespace: impl Into<String>,
        key: impl Into<String>,
        payload: Value,
        producer: impl Into<String>,
        created_at: u64,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            key: key.into(),
            created_at,
            ttl_seconds: None,
            tracked_files: ChecksumMap::new(),
            payload,
            producer: producer.into(),
            schema_version: SCHEMA_VERSION,
        }
    }

    /// Sets the time-to-live.
    pub fn with_ttl(mut self, ttl_seconds: Option<u64>) -> Self {
        self.ttl_seconds = ttl_seconds;
        self
    }

    /// Sets the tracked file checksums.
    pub fn with_tracked_files(mut self, tracked_files: ChecksumMap) -> Self {
        self.tracked_files = tracked_files;
        self
    }

    /// Seconds since the entry was written, zero if the clock went backwards.
    pub fn age(&self, now: u64) -> u64 {
        now.saturating_sub(self.created_at)
    }

    /// Returns true if the TTL has elapsed at `now`.
    pub fn is_expired(&self, now: u64) -> bool {
        match self.ttl_seconds {
            Some(ttl) => self.age(now) > ttl,
            None => false,
        }
    }

    /// Returns true if the entry tracks the given path key.
    pub fn tracks(&self, path: &str) -> bool {
        self.tracked_files.contains_key(path)
    }

    /// Serializes the entry for storage.
    pub fn to_bytes(&self) -> Result<Vec<u8>, CacheError> {
        let mut bytes = serde_json::to_vec_pretty(self)?;
        bytes.push(b'\n');
        Ok(bytes)
    }

    /// Parses a stored entry.
    ///
    /// The format version is checked before anything else is parsed, so an
    /// entry from another version is rejected as a whole.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CacheError> {
        let probe: VersionProbe = serde_json::from_slice(bytes)
            .map_err(|e| CacheError::corrupted(e.to_string()))?;

        if probe.schema_version != SCHEMA_VERSION {
            return Err(CacheError::SchemaMismatch {
                found: probe.schema_version,
                expected: SCHEMA_VERSION,
            });
        }

        serde_json::from_slice(bytes).map_err(|e| CacheError::corrupted(e.to_string()))
    }
}
