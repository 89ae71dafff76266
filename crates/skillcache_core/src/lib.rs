//! # skillcache_core
//!
//! Result cache shared by short-lived skill invocations.
//!
//! An expensive, deterministic analysis is computed once, written to disk,
//! and reused by later invocations until it goes stale.
//!
//! ## Cache Strategy
//!
//! 1. **Time-based**: entries expire after a TTL
//! 2. **Content-based**: entries are stale once a tracked file's checksum changes
//! 3. **Manual**: entries live until explicitly invalidated
//!
//! ## Storage
//!
//! One JSON file per `(namespace, key)` under `<root>/<namespace>/`.
//! Writes go to a temporary file that is renamed over the target, so readers
//! never see a torn entry. Anything unreadable is treated as a miss.
//!
//! ## Example
//!
//! ```rust,ignore
//! use skillcache_core::{CacheClient, CachePolicy};
//!
//! let client = CacheClient::builder(".claude/cache").producer("test").build();
//! let framework = client.with_cache(
//!     "test",
//!     "framework-config",
//!     &CachePolicy::checksum_only(["package.json"]),
//!     || serde_json::json!({ "runner": "jest" }),
//! );
//! ```

pub mod checksum;
pub mod clock;
mod client;
mod config;
mod entry;
mod error;
pub mod invalidation;
mod policy;
pub mod shared;
pub mod staleness;
pub mod store;

pub use checksum::{ABSENT_CHECKSUM, ChecksumMap, Fingerprinter};
pub use client::{CacheClient, CacheClientBuilder};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{CacheConfig, DISABLE_ENV, ROOT_ENV, SharedResourceConfig};
pub use entry::{CacheEntry, SCHEMA_VERSION};
pub use error::CacheError;
pub use invalidation::{DEFAULT_TEMP_GRACE_SECS, GcOptions, GcReport, Invalidator};
pub use policy::{CachePolicy, EffectivePolicy};
pub use shared::{SHARED_NAMESPACE, SharedKey, SharedNamespaceCoordinator, SharedOutcome};
pub use staleness::{Freshness, StalenessEvaluator};
pub use store::CacheStore;
