//! Check command implementation

use miette::{IntoDiagnostic, Result};
use skillcache_core::{CacheClient, Freshness};

/// Prints why an entry is or is not usable. Returns true if fresh.
pub fn run_check(client: &CacheClient, namespace: &str, key: &str) -> Result<bool> {
    let freshness = client.freshness(namespace, key);

    if freshness == Freshness::Missing && client.is_enabled() {
        match client.store().load(namespace, key) {
            Err(e) if e.is_miss() => {
                println!("unreadable ({})", e);
                return Ok(false);
            }
            Err(e) => return Err(e).into_diagnostic(),
            Ok(_) => {}
        }
    }

    println!("{}", freshness);
    Ok(freshness.is_fresh())
}
