//! Get command implementation

use miette::{IntoDiagnostic, Result};
use skillcache_core::CacheClient;
use tracing::debug;

/// Prints the payload. Returns false on a miss.
pub fn run_get(client: &CacheClient, namespace: &str, key: &str) -> Result<bool> {
    match client.get(namespace, key) {
        Some(payload) => {
            println!("{}", serde_json::to_string(&payload).into_diagnostic()?);
            Ok(true)
        }
        None => {
            debug!("No fresh entry for {}/{}", namespace, key);
            Ok(false)
        }
    }
}
