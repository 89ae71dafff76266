//! Explicit invalidation and garbage collection.
//!
//! Invalidation is idempotent: removing something that is already gone
//! succeeds. It is never needed for correctness, since staleness is checked
//! on every read, but it saves one stale read after a known change.

use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::time::UNIX_EPOCH;

use tracing::{debug, info};

use crate::checksum::{Fingerprinter, path_key};
use crate::staleness::StalenessEvaluator;
use crate::store::CacheStore;
use crate::CacheError;

/// Age after which a temporary file is taken to be abandoned.
pub const DEFAULT_TEMP_GRACE_SECS: u64 = 600;

/// What a garbage collection run should remove besides broken files.
#[derive(Debug, Clone)]
pub struct GcOptions {
    /// Remove entries that are expired or whose tracked files changed.
    pub remove_stale: bool,
    /// When set, remove entries whose producer is not listed.
    pub known_producers: Option<HashSet<String>>,
    /// Report what would be removed without deleting anything.
    pub dry_run: bool,
    /// Temporary files modified within this many seconds belong to a write
    /// still in progress and are kept.
    pub temp_grace_seconds: u64,
}

impl Default for GcOptions {
    fn default() -> Self {
        Self {
            remove_stale: false,
            known_producers: None,
            dry_run: false,
            temp_grace_seconds: DEFAULT_TEMP_GRACE_SECS,
        }
    }
}

impl GcOptions {
    pub fn stale() -> Self {
        Self {
            remove_stale: true,
            ..Self::default()
        }
    }

    pub fn with_known_producers<I, S>(mut self, producers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.known_producers = Some(producers.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_dry_run(mut self) -> Self {
        self.dry_run = true;
        self
    }

    pub fn with_temp_grace(mut self, seconds: u64) -> Self {
        self.temp_grace_seconds = seconds;
        self
    }
}

/// Result of a garbage collection run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GcReport {
    /// Number of entry files scanned
    pub scanned: usize,
    /// Entries removed because they were stale
    pub stale: usize,
    /// Entries removed because their producer is gone
    pub orphaned: usize,
    /// Files removed because they could not be parsed
    pub corrupt: usize,
    /// Leftover temporary files removed
    pub temp_files: usize,
}

impl GcReport {
    /// Total number of files removed (or that would be, on a dry run).
    pub fn removed(&self) -> usize {
        self.stale + self.orphaned + self.corrupt + self.temp_files
    }
}

/// Removes entries from a store.
pub struct Invalidator<'a> {
    store: &'a CacheStore,
    fingerprinter: &'a Fingerprinter,
}

impl<'a> Invalidator<'a> {
    pub fn new(store: &'a CacheStore, fingerprinter: &'a Fingerprinter) -> Self {
        Self {
            store,
            fingerprinter,
        }
    }

    /// Removes one entry.
    pub fn invalidate(&self, namespace: &str, key: &str) -> Result<(), CacheError> {
        if self.store.delete(namespace, key)? {
            debug!("Invalidated {}/{}", namespace, key);
        }
        Ok(())
    }

    /// Removes every entry of a namespace. Returns how many were removed.
    pub fn invalidate_all(&self, namespace: &str) -> Result<usize, CacheError> {
        let removed = self.store.remove_namespace(namespace)?;
        info!("Invalidated {} entries in {}", removed, namespace);
        Ok(removed)
    }

    /// Removes entries that track `path`.
    ///
    /// Scans `namespace` only, or every namespace when `None`.
    pub fn invalidate_by_tracked_file(
        &self,
        path: impl AsRef<Path>,
        namespace: Option<&str>,
    ) -> Result<usize, CacheError> {
        let path = path.as_ref();
        let namespaces = match namespace {
            Some(namespace) => vec![namespace.to_string()],
            None => self.store.namespaces()?,
        };

        let key = path_key(path);
        let mut removed = 0;
        for namespace in &namespaces {
            for entry in self.store.entries(namespace)? {
                let tracks_path = entry.tracks(&key)
                    || entry
                        .tracked_files
                        .keys()
                        .any(|tracked| self.fingerprinter.same_file(tracked, path));
                if tracks_path && self.store.delete(&entry.namespace, &entry.key)? {
                    debug!("Invalidated {}/{} (tracks {})", entry.namespace, entry.key, path.display());
                    removed += 1;
                }
            }
        }

        info!("Invalidated {} entries tracking {}", removed, path.display());
        Ok(removed)
    }

    /// Sweeps every namespace for files that can go.
    ///
    /// Corrupt entry files are always removed. Temporary files are removed
    /// once they are older than the grace period.
    pub fn collect_garbage(&self, now: u64, options: &GcOptions) -> Result<GcReport, CacheError> {
        let evaluator = StalenessEvaluator::new(self.fingerprinter);
        let mut report = GcReport::default();

        for namespace in self.store.namespaces()? {
            for path in self.store.temp_files(&namespace)? {
                // gone already: the write was persisted
                let Some(modified) = modified_at(&path) else {
                    continue;
                };
                if now.saturating_sub(modified) <= options.temp_grace_seconds {
                    debug!("Keeping in-flight {}", path.display());
                    continue;
                }
                report.temp_files += 1;
                self.remove(&path, options)?;
            }

            for path in self.store.entry_files(&namespace)? {
                report.scanned += 1;

                let entry = match CacheStore::read_file(&path) {
                    Ok(entry) if entry.namespace == namespace => entry,
                    Ok(_) | Err(_) => {
                        report.corrupt += 1;
                        self.remove(&path, options)?;
                        continue;
                    }
                };

                if let Some(known) = &options.known_producers
                    && !known.contains(&entry.producer)
                {
                    report.orphaned += 1;
                    self.remove(&path, options)?;
                    continue;
                }

                if options.remove_stale && !evaluator.is_valid(Some(&entry), now, None) {
                    report.stale += 1;
                    self.remove(&path, options)?;
                }
            }
        }

        info!(
            "Garbage collection {}: scanned {}, removed {} (stale {}, orphaned {}, corrupt {}, temp {})",
            if options.dry_run { "(dry run)" } else { "done" },
            report.scanned,
            report.removed(),
            report.stale,
            report.orphaned,
            report.corrupt,
            report.temp_files
        );
        Ok(report)
    }

    fn remove(&self, path: &Path, options: &GcOptions) -> Result<(), CacheError> {
        if options.dry_run {
            debug!("Would remove {}", path.display());
        } else {
            self.store.remove_file(path)?;
        }
        Ok(())
    }
}

/// Modification time of a file in Unix seconds.
fn modified_at(path: &Path) -> Option<u64> {
    let modified = fs::metadata(path).ok()?.modified().ok()?;
    modified
        .duration_since(UNIX_EPOCH)
        .ok()
        .map(|elapsed| elapsed.as_secs())
}
