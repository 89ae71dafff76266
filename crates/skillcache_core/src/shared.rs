//! Shared namespace coordination.
//!
//! Some results (the project's test framework, its lint tooling) are the
//! same for every skill that asks. They live under one canonical
//! `(namespace, key)` in [`SHARED_NAMESPACE`]: the first caller to miss
//! computes and becomes the producer, everyone after reads its entry.
//! Callers that miss at the same moment may each compute and overwrite;
//! since every valid write is an admissible cache state, that is only
//! redundant work.

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::client::CacheClient;
use crate::staleness::Freshness;
use crate::{CacheEntry, CacheError, CachePolicy};

/// Namespace holding shared resources.
pub const SHARED_NAMESPACE: &str = "shared";

/// Canonical location of a shared resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SharedKey {
    pub namespace: String,
    pub key: String,
}

/// Result of [`SharedNamespaceCoordinator::get_or_produce`].
#[derive(Debug, Clone, PartialEq)]
pub struct SharedOutcome {
    pub payload: Value,
    /// True if this call computed the payload.
    pub produced: bool,
    /// Producer of the entry the payload came from.
    pub producer: String,
}

/// Lets collaborators read results they did not write.
pub struct SharedNamespaceCoordinator<'a> {
    client: &'a CacheClient,
}

impl<'a> SharedNamespaceCoordinator<'a> {
    pub(crate) fn new(client: &'a CacheClient) -> Self {
        Self { client }
    }

    /// Maps a logical resource name to its canonical location.
    pub fn resolve_shared_key(&self, logical_name: &str) -> SharedKey {
        SharedKey {
            namespace: SHARED_NAMESPACE.to_string(),
            key: logical_name.trim().to_string(),
        }
    }

    /// Policy the resource is produced with.
    pub fn policy(&self, logical_name: &str) -> CachePolicy {
        self.client.shared_policy(logical_name.trim())
    }

    /// Returns the fresh shared entry, whoever produced it.
    pub fn entry(&self, logical_name: &str) -> Option<CacheEntry> {
        let SharedKey { namespace, key } = self.resolve_shared_key(logical_name);
        self.client.fresh_entry(&namespace, &key, false)
    }

    /// Explains why the shared entry is or is not usable.
    pub fn freshness(&self, logical_name: &str) -> Freshness {
        let SharedKey { namespace, key } = self.resolve_shared_key(logical_name);
        self.client.entry_freshness(&namespace, &key, false)
    }

    /// Returns the shared payload, whoever produced it.
    pub fn get(&self, logical_name: &str) -> Option<Value> {
        self.entry(logical_name).map(|entry| entry.payload)
    }

    /// Writes the shared resource with this client as producer.
    pub fn publish(&self, logical_name: &str, payload: Value) -> Result<(), CacheError> {
        let SharedKey { namespace, key } = self.resolve_shared_key(logical_name);
        let policy = self.policy(logical_name);
        self.client.write_entry(&namespace, &key, payload, &policy, None)
    }

    /// Removes the shared resource.
    pub fn invalidate(&self, logical_name: &str) -> Result<(), CacheError> {
        let SharedKey { namespace, key } = self.resolve_shared_key(logical_name);
        self.client.invalidate(&namespace, &key)
    }

    /// Returns the shared payload, computing and publishing it on a miss.
    pub fn get_or_produce<F>(&self, logical_name: &str, compute: F) -> SharedOutcome
    where
        F: FnOnce() -> Value,
    {
        match self.try_get_or_produce(logical_name, || {
            Ok::<_, std::convert::Infallible>(compute())
        }) {
            Ok(outcome) => outcome,
            Err(never) => match never {},
        }
    }

    /// Like [`SharedNamespaceCoordinator::get_or_produce`] for computations that can fail.
    pub fn try_get_or_produce<F, E>(&self, logical_name: &str, compute: F) -> Result<SharedOutcome, E>
    where
        F: FnOnce() -> Result<Value, E>,
    {
        if let Some(entry) = self.entry(logical_name) {
            debug!(
                "Shared hit: {} (produced by {})",
                logical_name, entry.producer
            );
            return Ok(SharedOutcome {
                payload: entry.payload,
                produced: false,
                producer: entry.producer,
            });
        }

        let SharedKey { namespace, key } = self.resolve_shared_key(logical_name);
        let policy = self.policy(logical_name);
        debug!("Shared miss: {}; producing as {}", logical_name, self.client.producer());

        let tracked = self.client.snapshot(&policy);
        let payload = compute()?;

        if let Err(e) = self
            .client
            .write_entry(&namespace, &key, payload.clone(), &policy, tracked)
        {
            warn!("Failed to publish shared {}: {}", logical_name, e);
        }

        Ok(SharedOutcome {
            payload,
            produced: true,
            producer: self.client.producer().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ManualClock;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::cell::Cell;
    use std::fs;
    use std::path::Path;
    use tempfile::tempdir;

    const T0: u64 = 1_700_000_000;

    fn collaborator(root: &Path, producer: &str, clock: &ManualClock) -> CacheClient {
        CacheClient::builder(root.join("cache"))
            .producer(producer)
            .base_dir(Some(root.to_path_buf()))
            .shared_policy(
                "project-framework",
                CachePolicy::checksum_only(["package.json"]),
            )
            .clock(clock.clone())
            .build()
    }

    #[test]
    fn test_resolve_shared_key() {
        let dir = tempdir().unwrap();
        let clock = ManualClock::new(T0);
        let client = collaborator(dir.path(), "test", &clock);

        let key = client.shared().resolve_shared_key("project-framework");

        assert_eq!(
            key,
            SharedKey {
                namespace: "shared".to_string(),
                key: "project-framework".to_string(),
            }
        );
        assert_eq!(key, client.shared().resolve_shared_key(" project-framework "));
    }

    #[test]
    fn test_single_compute_across_collaborators() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("package.json"), r#"{"devDependencies":{"jest":"*"}}"#).unwrap();
        let clock = ManualClock::new(T0);
        let test_skill = collaborator(dir.path(), "test", &clock);
        let review_skill = collaborator(dir.path(), "review", &clock);
        let computations = Cell::new(0);
        let detect = || {
            computations.set(computations.get() + 1);
            json!({ "framework": "jest" })
        };

        let first = test_skill.shared().get_or_produce("project-framework", detect);
        let second = review_skill.shared().get_or_produce("project-framework", detect);

        assert_eq!(computations.get(), 1);
        assert!(first.produced);
        assert!(!second.produced);
        assert_eq!(first.payload, second.payload);
        assert_eq!(second.producer, "test");
    }

    #[test]
    fn test_shared_entry_goes_stale_with_tracked_file() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("package.json"), "{}").unwrap();
        let clock = ManualClock::new(T0);
        let test_skill = collaborator(dir.path(), "test", &clock);
        let review_skill = collaborator(dir.path(), "review", &clock);

        test_skill
            .shared()
            .publish("project-framework", json!("mocha"))
            .unwrap();
        assert_eq!(review_skill.shared().get("project-framework"), Some(json!("mocha")));

        fs::write(dir.path().join("package.json"), r#"{"devDependencies":{"jest":"*"}}"#).unwrap();
        assert_eq!(review_skill.shared().get("project-framework"), None);

        let outcome = review_skill
            .shared()
            .get_or_produce("project-framework", || json!("jest"));
        assert!(outcome.produced);
        assert_eq!(outcome.producer, "review");
        assert_eq!(test_skill.shared().get("project-framework"), Some(json!("jest")));
    }

    #[test]
    fn test_shared_invalidate() {
        let dir = tempdir().unwrap();
        let clock = ManualClock::new(T0);
        let client = collaborator(dir.path(), "test", &clock);
        client.shared().publish("lint-tooling", json!(["eslint"])).unwrap();

        client.shared().invalidate("lint-tooling").unwrap();
        client.shared().invalidate("lint-tooling").unwrap();

        assert_eq!(client.shared().get("lint-tooling"), None);
    }

    #[test]
    fn test_unconfigured_resource_is_manual() {
        let dir = tempdir().unwrap();
        let clock = ManualClock::new(T0);
        let client = collaborator(dir.path(), "test", &clock);

        assert_eq!(client.shared().policy("anything"), CachePolicy::Manual);
    }

    #[test]
    fn test_disabled_always_produces() {
        let dir = tempdir().unwrap();
        let clock = ManualClock::new(T0);
        let mut client = collaborator(dir.path(), "test", &clock);
        client.disable();

        let first = client.shared().get_or_produce("project-framework", || json!(1));
        let second = client.shared().get_or_produce("project-framework", || json!(2));

        assert!(first.produced && second.produced);
        assert_eq!(second.payload, json!(2));
    }
}
