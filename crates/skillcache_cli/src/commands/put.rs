//! Put command implementation

use std::io::Read;
use std::path::PathBuf;

use miette::{IntoDiagnostic, Result};
use serde_json::Value;
use skillcache_core::{CacheClient, CachePolicy};
use tracing::{debug, info};

pub fn run_put(
    client: &CacheClient,
    namespace: &str,
    key: &str,
    payload: Option<&str>,
    ttl: Option<i64>,
    tracked: &[PathBuf],
) -> Result<()> {
    let payload = match payload {
        Some(payload) => payload.to_string(),
        None => {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .into_diagnostic()?;
            buffer
        }
    };

    let payload: Value = serde_json::from_str(&payload)
        .map_err(|e| miette::miette!("Payload is not valid JSON: {}", e))?;

    let policy = policy_from_flags(ttl, tracked);
    client
        .put(namespace, key, payload, &policy)
        .into_diagnostic()?;

    if client.is_enabled() {
        info!("Stored {}/{}", namespace, key);
    } else {
        debug!("Caching disabled; {}/{} not stored", namespace, key);
    }
    Ok(())
}

fn policy_from_flags(ttl: Option<i64>, tracked: &[PathBuf]) -> CachePolicy {
    match (ttl, tracked.is_empty()) {
        (Some(seconds), true) => CachePolicy::ttl_only(seconds),
        (Some(seconds), false) => CachePolicy::both(seconds, tracked),
        (None, false) => CachePolicy::checksum_only(tracked),
        (None, true) => CachePolicy::Manual,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_from_flags() {
        let tracked = vec![PathBuf::from("package.json")];

        assert_eq!(policy_from_flags(None, &[]), CachePolicy::Manual);
        assert_eq!(policy_from_flags(Some(60), &[]), CachePolicy::ttl_only(60));
        assert_eq!(
            policy_from_flags(None, &tracked),
            CachePolicy::checksum_only(["package.json"])
        );
        assert_eq!(
            policy_from_flags(Some(60), &tracked),
            CachePolicy::both(60, ["package.json"])
        );
    }
}
