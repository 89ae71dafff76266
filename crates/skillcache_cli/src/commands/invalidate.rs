//! Invalidate command implementations

use std::path::Path;

use miette::{IntoDiagnostic, Result};
use skillcache_core::{CacheClient, Invalidator};
use tracing::info;

pub fn run_invalidate(client: &CacheClient, namespace: &str, key: Option<&str>) -> Result<()> {
    match key {
        Some(key) => {
            client.invalidate(namespace, key).into_diagnostic()?;
            info!("Invalidated {}/{}", namespace, key);
        }
        None => {
            client.invalidate_all(namespace).into_diagnostic()?;
        }
    }
    Ok(())
}

pub fn run_invalidate_file(
    client: &CacheClient,
    path: &Path,
    namespace: Option<&str>,
) -> Result<()> {
    // relative to the shell, not to the config's base directory
    let path = std::path::absolute(path).into_diagnostic()?;
    let removed = match namespace {
        Some(namespace) => Invalidator::new(client.store(), client.fingerprinter())
            .invalidate_by_tracked_file(&path, Some(namespace))
            .into_diagnostic()?,
        None => client.invalidate_by_tracked_file(&path).into_diagnostic()?,
    };
    println!("{}", removed);
    Ok(())
}
