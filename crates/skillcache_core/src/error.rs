//! Cache error types.

use thiserror::Error;

/// Errors that can occur in the cache system.
///
/// None of these are fatal to a collaborator: reads turn them into misses,
/// and writes hand them back so the caller can keep its computed payload.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Entry file exists but could not be parsed.
    #[error("Corrupted cache entry: {0}")]
    Corrupted(String),

    /// Entry was written with a different on-disk format.
    #[error("Schema version mismatch: found {found}, expected {expected}")]
    SchemaMismatch { found: u32, expected: u32 },

    /// Namespace cannot be used as a directory name.
    #[error("Invalid namespace: {0:?}")]
    InvalidNamespace(String),

    /// Failed to write cache entry.
    #[error("Failed to write cache: {0}")]
    Write(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CacheError {
    /// Creates a corrupted entry error.
    pub fn corrupted(message: impl Into<String>) -> Self {
        Self::Corrupted(message.into())
    }

    /// Creates a write error.
    pub fn write(message: impl Into<String>) -> Self {
        Self::Write(message.into())
    }

    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Returns true if this error means the entry should be read as a miss.
    pub fn is_miss(&self) -> bool {
        matches!(
            self,
            Self::Corrupted(_) | Self::SchemaMismatch { .. } | Self::Serialization(_)
        )
    }
}
