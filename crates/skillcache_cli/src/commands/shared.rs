//! Shared command implementations

use miette::{IntoDiagnostic, Result};
use serde_json::json;
use skillcache_core::CacheClient;
use tracing::debug;

/// Prints the shared payload. Returns false on a miss.
pub fn run_shared_get(client: &CacheClient, name: &str) -> Result<bool> {
    let Some(entry) = client.shared().entry(name) else {
        debug!("No fresh shared entry for {}", name);
        return Ok(false);
    };

    debug!("{} was produced by {}", name, entry.producer);
    println!("{}", serde_json::to_string(&entry.payload).into_diagnostic()?);
    Ok(true)
}

pub fn run_shared_resolve(client: &CacheClient, name: &str) -> Result<()> {
    let shared_key = client.shared().resolve_shared_key(name);
    let path = client
        .store()
        .entry_path(&shared_key.namespace, &shared_key.key)
        .into_diagnostic()?;

    let line = json!({
        "namespace": shared_key.namespace,
        "key": shared_key.key,
        "path": path.display().to_string(),
        "policy": client.shared().policy(name),
    });
    println!("{}", line);
    Ok(())
}
