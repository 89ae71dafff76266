//! Gc command implementation

use miette::{IntoDiagnostic, Result};
use skillcache_core::{CacheClient, GcOptions};

pub fn run_gc(
    client: &CacheClient,
    dry_run: bool,
    stale: bool,
    known_producers: &[String],
) -> Result<()> {
    let mut options = if stale {
        GcOptions::stale()
    } else {
        GcOptions::default()
    };
    if !known_producers.is_empty() {
        options = options.with_known_producers(known_producers.iter().cloned());
    }
    if dry_run {
        options = options.with_dry_run();
    }

    let report = client.collect_garbage(&options).into_diagnostic()?;

    println!(
        "scanned {}, removed {} (stale {}, orphaned {}, corrupt {}, temp {})",
        report.scanned,
        report.removed(),
        report.stale,
        report.orphaned,
        report.corrupt,
        report.temp_files
    );
    Ok(())
}
