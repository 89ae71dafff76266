//! Invalidation policies.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// How an entry becomes stale.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CachePolicy {
    /// Expires `seconds` after it was written.
    TtlOnly { seconds: i64 },
    /// Stale as soon as any tracked file changes.
    ChecksumOnly { paths: Vec<PathBuf> },
    /// Whichever comes first.
    Both { seconds: i64, paths: Vec<PathBuf> },
    /// Lives until explicitly invalidated.
    #[default]
    Manual,
}

/// A policy reduced to what gets stored on the entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EffectivePolicy {
    pub ttl_seconds: Option<u64>,
    pub tracked_paths: Vec<PathBuf>,
}

impl CachePolicy {
    pub fn ttl_only(seconds: i64) -> Self {
        Self::TtlOnly { seconds }
    }

    pub fn checksum_only<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self::ChecksumOnly {
            paths: paths.into_iter().map(Into::into).collect(),
        }
    }

    pub fn both<I, P>(seconds: i64, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self::Both {
            seconds,
            paths: paths.into_iter().map(Into::into).collect(),
        }
    }

    /// Normalizes the policy.
    ///
    /// A negative TTL never expires by time. A checksum policy without paths
    /// tracks nothing. Both fall back with a warning instead of failing.
    pub fn effective(&self) -> EffectivePolicy {
        match self {
            Self::TtlOnly { seconds } => EffectivePolicy {
                ttl_seconds: checked_ttl(*seconds),
                tracked_paths: Vec::new(),
            },
            Self::ChecksumOnly { paths } => EffectivePolicy {
                ttl_seconds: None,
                tracked_paths: checked_paths(paths),
            },
            Self::Both { seconds, paths } => EffectivePolicy {
                ttl_seconds: checked_ttl(*seconds),
                tracked_paths: checked_paths(paths),
            },
            Self::Manual => EffectivePolicy::default(),
        }
    }
}

fn checked_ttl(seconds: i64) -> Option<u64> {
    match u64::try_from(seconds) {
        Ok(ttl) => Some(ttl),
        Err(_) => {
            warn!("Ignoring negative TTL {}s; entry will not expire by time", seconds);
            None
        }
    }
}

fn checked_paths(paths: &[PathBuf]) -> Vec<PathBuf> {
    if paths.is_empty() {
        warn!("Checksum policy has no tracked files; nothing will be checked");
    }
    paths.to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case::ttl(CachePolicy::ttl_only(60), Some(60), 0)]
    #[case::zero_ttl(CachePolicy::ttl_only(0), Some(0), 0)]
    #[case::negative_ttl(CachePolicy::ttl_only(-5), None, 0)]
    #[case::checksum(CachePolicy::checksum_only(["a.txt", "b.txt"]), None, 2)]
    #[case::both(CachePolicy::both(30, ["a.txt"]), Some(30), 1)]
    #[case::both_negative_ttl(CachePolicy::both(-1, ["a.txt"]), None, 1)]
    #[case::manual(CachePolicy::Manual, None, 0)]
    fn test_effective_policy(
        #[case] policy: CachePolicy,
        #[case] ttl: Option<u64>,
        #[case] tracked: usize,
    ) {
        let effective = policy.effective();
        assert_eq!(effective.ttl_seconds, ttl);
        assert_eq!(effective.tracked_paths.len(), tracked);
    }

    #[test]
    fn test_policy_deserialization() {
        let json = r#"{ "kind": "both", "seconds": 86400, "paths": ["package.json"] }"#;
        let policy: CachePolicy = serde_json::from_str(json).unwrap();

        assert_eq!(policy, CachePolicy::both(86400, ["package.json"]));
    }

    #[test]
    fn test_manual_deserialization() {
        let policy: CachePolicy = serde_json::from_str(r#"{ "kind": "manual" }"#).unwrap();
        assert_eq!(policy, CachePolicy::default());
    }
}
