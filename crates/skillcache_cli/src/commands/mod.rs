//! Command implementations

pub mod check;
pub mod gc;
pub mod get;
pub mod invalidate;
pub mod list;
pub mod put;
pub mod shared;

use miette::{IntoDiagnostic, Result};
use skillcache_core::{CacheClient, CacheConfig};
use tracing::debug;

use crate::cli::Cli;

/// Builds the client from config file, environment, then flags.
pub fn open_client(cli: &Cli) -> Result<CacheClient> {
    let mut config = if let Some(ref path) = cli.config {
        CacheConfig::from_file(path).into_diagnostic()?
    } else {
        find_config()?
    };

    config.apply_process_env();

    if let Some(ref root) = cli.root {
        let root = std::path::absolute(root).into_diagnostic()?;
        config.root = root.to_string_lossy().into_owned();
    }
    if let Some(ref producer) = cli.producer {
        config.producer = Some(producer.clone());
    }
    if cli.no_cache {
        config.enabled = false;
    }

    let client = CacheClient::new(&config);
    debug!("Opened {:?}", client);
    Ok(client)
}

fn find_config() -> Result<CacheConfig> {
    if let Some(config) = CacheConfig::discover(".").into_diagnostic()? {
        debug!("Using config in current directory");
        return Ok(config);
    }

    debug!("No config file found, using defaults");
    Ok(CacheConfig::new())
}
