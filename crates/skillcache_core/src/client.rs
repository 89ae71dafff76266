//! The API collaborators use.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::checksum::{ChecksumMap, Fingerprinter};
use crate::clock::{Clock, SystemClock};
use crate::invalidation::{GcOptions, GcReport, Invalidator};
use crate::shared::{SHARED_NAMESPACE, SharedNamespaceCoordinator};
use crate::staleness::{Freshness, StalenessEvaluator};
use crate::store::CacheStore;
use crate::{CacheConfig, CacheEntry, CacheError, CachePolicy};

/// Producer recorded when none is configured.
pub const DEFAULT_PRODUCER: &str = "anonymous";

/// Cache access for one collaborator.
///
/// Entries in ordinary namespaces are only visible to the producer that
/// wrote them; other collaborators go through [`CacheClient::shared`].
pub struct CacheClient {
    store: CacheStore,
    fingerprinter: Fingerprinter,
    producer: String,
    enabled: bool,
    shared: BTreeMap<String, CachePolicy>,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for CacheClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheClient")
            .field("root", &self.store.root())
            .field("producer", &self.producer)
            .field("enabled", &self.enabled)
            .finish_non_exhaustive()
    }
}

impl CacheClient {
    /// Creates a client from configuration.
    pub fn new(config: &CacheConfig) -> Self {
        let mut builder = Self::builder(config.resolved_root())
            .enabled(config.enabled)
            .base_dir(config.resolved_base_dir());
        if let Some(producer) = &config.producer {
            builder = builder.producer(producer.clone());
        }
        for (name, resource) in &config.shared {
            builder = builder.shared_policy(name.clone(), resource.policy.clone());
        }
        builder.build()
    }

    /// Starts building a client rooted at `root`.
    pub fn builder(root: impl Into<PathBuf>) -> CacheClientBuilder {
        CacheClientBuilder::new(root)
    }

    /// Disables caching.
    pub fn disable(&mut self) {
        self.enabled = false;
    }

    /// Enables caching.
    pub fn enable(&mut self) {
        self.enabled = true;
    }

    /// Returns whether caching is enabled.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn producer(&self) -> &str {
        &self.producer
    }

    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    pub fn fingerprinter(&self) -> &Fingerprinter {
        &self.fingerprinter
    }

    /// Current time according to the client's clock.
    pub fn now(&self) -> u64 {
        self.clock.now()
    }

    /// Returns the cached payload if a fresh entry exists.
    ///
    /// Reads in [`SHARED_NAMESPACE`] go through [`CacheClient::shared`], so
    /// they see entries from any producer.
    pub fn get(&self, namespace: &str, key: &str) -> Option<Value> {
        if namespace == SHARED_NAMESPACE {
            return self.shared().get(key);
        }
        self.fresh_entry(namespace, key, true)
            .map(|entry| entry.payload)
    }

    /// Like [`CacheClient::get`], deserialized into `T`.
    ///
    /// A payload that does not fit `T` is a miss.
    pub fn get_as<T: DeserializeOwned>(&self, namespace: &str, key: &str) -> Option<T> {
        let payload = self.get(namespace, key)?;
        match serde_json::from_value(payload) {
            Ok(value) => Some(value),
            Err(e) => {
                debug!("Cached payload {}/{} has unexpected shape: {}", namespace, key, e);
                None
            }
        }
    }

    /// Explains why an entry is or is not usable.
    pub fn freshness(&self, namespace: &str, key: &str) -> Freshness {
        if namespace == SHARED_NAMESPACE {
            return self.shared().freshness(key);
        }
        self.entry_freshness(namespace, key, true)
    }

    /// Evaluates an entry already in hand at the current time.
    pub fn freshness_of(&self, entry: &CacheEntry) -> Freshness {
        StalenessEvaluator::new(&self.fingerprinter).evaluate(Some(entry), self.now(), None)
    }

    /// Returns true if a fresh entry exists.
    pub fn is_valid(&self, namespace: &str, key: &str) -> bool {
        self.freshness(namespace, key).is_fresh()
    }

    /// Stores a payload, replacing any previous entry.
    ///
    /// Tracked file checksums are taken now. Does nothing when disabled.
    pub fn put(
        &self,
        namespace: &str,
        key: &str,
        payload: Value,
        policy: &CachePolicy,
    ) -> Result<(), CacheError> {
        self.write_entry(namespace, key, payload, policy, None)
    }

    /// Like [`CacheClient::put`] for any serializable payload.
    pub fn put_as<T: Serialize>(
        &self,
        namespace: &str,
        key: &str,
        payload: &T,
        policy: &CachePolicy,
    ) -> Result<(), CacheError> {
        let payload = serde_json::to_value(payload)?;
        self.put(namespace, key, payload, policy)
    }

    /// Removes one entry. Succeeds if it is already gone.
    pub fn invalidate(&self, namespace: &str, key: &str) -> Result<(), CacheError> {
        self.invalidator().invalidate(namespace, key)
    }

    /// Removes every entry of a namespace.
    pub fn invalidate_all(&self, namespace: &str) -> Result<usize, CacheError> {
        self.invalidator().invalidate_all(namespace)
    }

    /// Removes entries, in any namespace, that track `path`.
    pub fn invalidate_by_tracked_file(&self, path: impl AsRef<Path>) -> Result<usize, CacheError> {
        self.invalidator().invalidate_by_tracked_file(path, None)
    }

    /// Runs garbage collection at the current time.
    pub fn collect_garbage(&self, options: &GcOptions) -> Result<GcReport, CacheError> {
        self.invalidator().collect_garbage(self.now(), options)
    }

    /// Lists namespaces present on disk.
    pub fn namespaces(&self) -> Result<Vec<String>, CacheError> {
        self.store.namespaces()
    }

    /// Lists readable entries of a namespace, fresh or not.
    pub fn entries(&self, namespace: &str) -> Result<Vec<CacheEntry>, CacheError> {
        self.store.entries(namespace)
    }

    /// Returns the cached payload, or computes and stores it.
    ///
    /// A failed write is logged; the computed payload is returned regardless.
    pub fn with_cache<F>(
        &self,
        namespace: &str,
        key: &str,
        policy: &CachePolicy,
        compute: F,
    ) -> Value
    where
        F: FnOnce() -> Value,
    {
        match self.try_with_cache(namespace, key, policy, || {
            Ok::<_, std::convert::Infallible>(compute())
        }) {
            Ok(payload) => payload,
            Err(never) => match never {},
        }
    }

    /// Like [`CacheClient::with_cache`] for computations that can fail.
    ///
    /// Errors from `compute` are returned and nothing is stored.
    pub fn try_with_cache<F, E>(
        &self,
        namespace: &str,
        key: &str,
        policy: &CachePolicy,
        compute: F,
    ) -> Result<Value, E>
    where
        F: FnOnce() -> Result<Value, E>,
    {
        if let Some(payload) = self.get(namespace, key) {
            debug!("Cache hit: {}/{}", namespace, key);
            return Ok(payload);
        }
        debug!("Cache miss: {}/{}", namespace, key);

        // Checksums are taken before computing: an edit made in the meantime
        // must leave the entry stale.
        let tracked = self.snapshot(policy);
        let payload = compute()?;

        if let Err(e) = self.write_entry(namespace, key, payload.clone(), policy, tracked) {
            warn!("Failed to cache {}/{}: {}", namespace, key, e);
        }
        Ok(payload)
    }

    /// Access to shared namespaces.
    pub fn shared(&self) -> SharedNamespaceCoordinator<'_> {
        SharedNamespaceCoordinator::new(self)
    }

    /// Policy configured for a shared resource.
    pub(crate) fn shared_policy(&self, name: &str) -> CachePolicy {
        self.shared.get(name).cloned().unwrap_or_default()
    }

    /// Evaluates the stored entry for `(namespace, key)`.
    ///
    /// With `enforce_owner`, entries written by another producer are treated
    /// as absent.
    pub(crate) fn entry_freshness(
        &self,
        namespace: &str,
        key: &str,
        enforce_owner: bool,
    ) -> Freshness {
        if !self.enabled {
            return Freshness::Missing;
        }
        match self.owned_entry(namespace, key, enforce_owner) {
            Some(entry) => self.freshness_of(&entry),
            None => Freshness::Missing,
        }
    }

    /// Reads a fresh entry.
    ///
    /// With `enforce_owner`, entries written by another producer are treated
    /// as absent.
    pub(crate) fn fresh_entry(
        &self,
        namespace: &str,
        key: &str,
        enforce_owner: bool,
    ) -> Option<CacheEntry> {
        if !self.enabled {
            return None;
        }
        let entry = self.owned_entry(namespace, key, enforce_owner)?;
        let freshness = self.freshness_of(&entry);
        if freshness.is_fresh() {
            Some(entry)
        } else {
            debug!("Stale cache entry {}/{}: {}", namespace, key, freshness);
            None
        }
    }

    /// Checksums for the policy's tracked files, taken now.
    pub(crate) fn snapshot(&self, policy: &CachePolicy) -> Option<ChecksumMap> {
        let effective = policy.effective();
        if effective.tracked_paths.is_empty() {
            return None;
        }
        Some(self.fingerprinter.fingerprint(&effective.tracked_paths))
    }

    pub(crate) fn write_entry(
        &self,
        namespace: &str,
        key: &str,
        payload: Value,
        policy: &CachePolicy,
        tracked: Option<ChecksumMap>,
    ) -> Result<(), CacheError> {
        if !self.enabled {
            return Ok(());
        }

        let effective = policy.effective();
        let tracked =
            tracked.unwrap_or_else(|| self.fingerprinter.fingerprint(&effective.tracked_paths));
        let entry = CacheEntry::new(namespace, key, payload, self.producer.as_str(), self.now())
            .with_ttl(effective.ttl_seconds)
            .with_tracked_files(tracked);

        self.store.write(&entry)
    }

    fn owned_entry(&self, namespace: &str, key: &str, enforce_owner: bool) -> Option<CacheEntry> {
        let entry = self.store.read(namespace, key)?;
        if enforce_owner && entry.producer != self.producer {
            debug!(
                "Ignoring {}/{}: written by {}, not {}",
                namespace, key, entry.producer, self.producer
            );
            return None;
        }
        Some(entry)
    }

    fn invalidator(&self) -> Invalidator<'_> {
        Invalidator::new(&self.store, &self.fingerprinter)
    }
}

/// Builder for [`CacheClient`].
pub struct CacheClientBuilder {
    root: PathBuf,
    producer: String,
    base_dir: Option<PathBuf>,
    enabled: bool,
    shared: BTreeMap<String, CachePolicy>,
    clock: Arc<dyn Clock>,
}

impl CacheClientBuilder {
    fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            producer: DEFAULT_PRODUCER.to_string(),
            base_dir: None,
            enabled: true,
            shared: BTreeMap::new(),
            clock: Arc::new(SystemClock),
        }
    }

    /// Identity recorded on written entries.
    pub fn producer(mut self, producer: impl Into<String>) -> Self {
        self.producer = producer.into();
        self
    }

    /// Directory relative tracked paths resolve against.
    pub fn base_dir(mut self, base_dir: Option<PathBuf>) -> Self {
        self.base_dir = base_dir;
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Policy used when producing a shared resource.
    pub fn shared_policy(mut self, name: impl Into<String>, policy: CachePolicy) -> Self {
        self.shared.insert(name.into(), policy);
        self
    }

    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn build(self) -> CacheClient {
        CacheClient {
            store: CacheStore::new(self.root),
            fingerprinter: Fingerprinter::new(self.base_dir),
            producer: self.producer,
            enabled: self.enabled,
            shared: self.shared,
            clock: self.clock,
        }
    }
}
