//! List command implementation

use miette::{IntoDiagnostic, Result};
use serde_json::json;
use skillcache_core::CacheClient;

/// Prints namespaces one per line, or a namespace's entries as JSON lines.
pub fn run_list(client: &CacheClient, namespace: Option<&str>) -> Result<()> {
    let Some(namespace) = namespace else {
        for namespace in client.namespaces().into_diagnostic()? {
            println!("{}", namespace);
        }
        return Ok(());
    };

    for entry in client.entries(namespace).into_diagnostic()? {
        let freshness = client.freshness_of(&entry);
        let line = json!({
            "namespace": entry.namespace,
            "key": entry.key,
            "producer": entry.producer,
            "created_at": entry.created_at,
            "ttl_seconds": entry.ttl_seconds,
            "tracked_files": entry.tracked_files.keys().collect::<Vec<_>>(),
            "freshness": freshness.to_string(),
        });
        println!("{}", line);
    }
    Ok(())
}
