//! File-per-entry persistence.
//!
//! Layout: `<root>/<namespace-dir>/<key-file>.json`. Namespaces and keys
//! that are safe file names are used verbatim; anything else is stored under
//! `~<hash>` and the real name is kept inside the entry.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::checksum::Fingerprinter;
use crate::{CacheEntry, CacheError};

/// File extension of entry files.
const ENTRY_EXTENSION: &str = "json";

/// Prefix of in-flight temporary files.
pub const TEMP_PREFIX: &str = ".skc-tmp";

/// Longest namespace or key stored under its own name.
const MAX_PLAIN_NAME_LEN: usize = 100;

/// Durable storage for cache entries.
#[derive(Debug, Clone)]
pub struct CacheStore {
    /// Directory where namespaces are stored.
    root: PathBuf,
}

impl CacheStore {
    /// Creates a store rooted at `root`. Nothing is created until the first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns true if entries can be stored under `namespace`.
    pub fn is_valid_namespace(namespace: &str) -> bool {
        !namespace.is_empty()
    }

    /// Directory holding a namespace's entries.
    ///
    /// Namespaces that are not safe directory names map to `~<hash>`.
    pub fn namespace_dir(&self, namespace: &str) -> Result<PathBuf, CacheError> {
        if !Self::is_valid_namespace(namespace) {
            return Err(CacheError::InvalidNamespace(namespace.to_string()));
        }
        Ok(self.root.join(storage_name(namespace)))
    }

    /// Path of the file for `(namespace, key)`.
    pub fn entry_path(&self, namespace: &str, key: &str) -> Result<PathBuf, CacheError> {
        Ok(self.namespace_dir(namespace)?.join(entry_file_name(key)))
    }

    /// Reads an entry, treating every failure as a miss.
    pub fn read(&self, namespace: &str, key: &str) -> Option<CacheEntry> {
        match self.load(namespace, key) {
            Ok(entry) => entry,
            Err(e) => {
                if e.is_miss() {
                    warn!("Ignoring cache entry {}/{}: {}", namespace, key, e);
                } else {
                    debug!("Cache read failed for {}/{}: {}", namespace, key, e);
                }
                None
            }
        }
    }

    /// Reads an entry, keeping the reason it could not be used.
    ///
    /// Returns `Ok(None)` when no entry file exists.
    pub fn load(&self, namespace: &str, key: &str) -> Result<Option<CacheEntry>, CacheError> {
        let path = self.entry_path(namespace, key)?;

        let entry = match Self::read_file(&path) {
            Ok(entry) => entry,
            Err(CacheError::Io(e)) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };

        if entry.namespace != namespace || entry.key != key {
            return Err(CacheError::corrupted(format!(
                "{} holds {}/{}",
                path.display(),
                entry.namespace,
                entry.key
            )));
        }

        Ok(Some(entry))
    }

    /// Parses a single entry file.
    pub fn read_file(path: &Path) -> Result<CacheEntry, CacheError> {
        let bytes = fs::read(path)?;
        CacheEntry::from_bytes(&bytes)
    }

    /// Writes an entry atomically.
    ///
    /// The entry goes to a temporary file in the namespace directory which is
    /// then renamed over the target. On failure the previous entry (or its
    /// absence) is left as it was.
    pub fn write(&self, entry: &CacheEntry) -> Result<(), CacheError> {
        let dir = self.namespace_dir(&entry.namespace)?;
        let target = dir.join(entry_file_name(&entry.key));
        let bytes = entry.to_bytes()?;

        fs::create_dir_all(&dir)?;

        let mut temp = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .tempfile_in(&dir)?;
        temp.write_all(&bytes)?;
        temp.as_file().sync_all()?;
        temp.persist(&target)
            .map_err(|e| CacheError::write(format!("{}: {}", target.display(), e.error)))?;

        debug!(
            "Wrote cache entry {}/{} ({} bytes)",
            entry.namespace,
            entry.key,
            bytes.len()
        );
        Ok(())
    }

    /// Deletes an entry. Returns `Ok(false)` if it did not exist.
    pub fn delete(&self, namespace: &str, key: &str) -> Result<bool, CacheError> {
        let path = self.entry_path(namespace, key)?;
        remove_if_exists(&path)
    }

    /// Lists namespaces that have a directory under the root.
    pub fn namespaces(&self) -> Result<Vec<String>, CacheError> {
        let read_dir = match fs::read_dir(&self.root) {
            Ok(read_dir) => read_dir,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut namespaces = Vec::new();
        for dir_entry in read_dir {
            let dir_entry = dir_entry?;
            if !dir_entry.file_type()?.is_dir() {
                continue;
            }
            let file_name = dir_entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            if storage_name(name) == name {
                namespaces.push(name.to_string());
            } else if name.starts_with('~') {
                match self.recover_namespace(&dir_entry.path()) {
                    Some(namespace) => namespaces.push(namespace),
                    None => debug!("Skipping {}: no readable entry names it", name),
                }
            }
        }
        namespaces.sort();
        namespaces.dedup();
        Ok(namespaces)
    }

    /// Reads the real namespace of a hashed directory from one of its entries.
    fn recover_namespace(&self, dir: &Path) -> Option<String> {
        fs::read_dir(dir)
            .ok()?
            .filter_map(Result::ok)
            .map(|dir_entry| dir_entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == ENTRY_EXTENSION))
            .filter_map(|path| Self::read_file(&path).ok())
            .map(|entry| entry.namespace)
            .find(|namespace| {
                self.namespace_dir(namespace)
                    .is_ok_and(|expected| expected == dir)
            })
    }

    /// Entry files in a namespace, readable or not.
    pub fn entry_files(&self, namespace: &str) -> Result<Vec<PathBuf>, CacheError> {
        self.list_files(namespace, |name| {
            !name.starts_with('.') && name.ends_with(&format!(".{}", ENTRY_EXTENSION))
        })
    }

    /// Temporary files left behind by interrupted writes.
    pub fn temp_files(&self, namespace: &str) -> Result<Vec<PathBuf>, CacheError> {
        self.list_files(namespace, |name| name.starts_with(TEMP_PREFIX))
    }

    /// Readable entries in a namespace. Unreadable files are skipped.
    pub fn entries(&self, namespace: &str) -> Result<Vec<CacheEntry>, CacheError> {
        let mut entries = Vec::new();
        for path in self.entry_files(namespace)? {
            match Self::read_file(&path) {
                Ok(entry) if entry.namespace == namespace => entries.push(entry),
                Ok(entry) => debug!(
                    "Skipping {}: belongs to namespace {}",
                    path.display(),
                    entry.namespace
                ),
                Err(e) => debug!("Skipping {}: {}", path.display(), e),
            }
        }
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(entries)
    }

    /// Removes a namespace directory. Returns the number of entry files it held.
    pub fn remove_namespace(&self, namespace: &str) -> Result<usize, CacheError> {
        let dir = self.namespace_dir(namespace)?;
        let count = self.entry_files(namespace)?.len();

        match fs::remove_dir_all(&dir) {
            Ok(()) => Ok(count),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    /// Removes a file in the store. Returns `Ok(false)` if it did not exist.
    pub fn remove_file(&self, path: &Path) -> Result<bool, CacheError> {
        remove_if_exists(path)
    }

    fn list_files(
        &self,
        namespace: &str,
        filter: impl Fn(&str) -> bool,
    ) -> Result<Vec<PathBuf>, CacheError> {
        let dir = self.namespace_dir(namespace)?;
        let read_dir = match fs::read_dir(&dir) {
            Ok(read_dir) => read_dir,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut files = Vec::new();
        for dir_entry in read_dir {
            let dir_entry = dir_entry?;
            if !dir_entry.file_type()?.is_file() {
                continue;
            }
            if dir_entry.file_name().to_str().is_some_and(&filter) {
                files.push(dir_entry.path());
            }
        }
        files.sort();
        Ok(files)
    }
}

/// Validation helper: a single path component of safe characters.
fn is_safe_component(s: &str) -> bool {
    !s.is_empty()
        && !s.starts_with('.')
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}

/// On-disk name for a namespace or key: itself when safe, else `~<hash>`.
fn storage_name(name: &str) -> String {
    if name.len() <= MAX_PLAIN_NAME_LEN && is_safe_component(name) {
        name.to_string()
    } else {
        format!("~{}", Fingerprinter::hash_bytes(name.as_bytes()))
    }
}

/// File name for a key inside its namespace directory.
fn entry_file_name(key: &str) -> String {
    format!("{}.{}", storage_name(key), ENTRY_EXTENSION)
}

fn remove_if_exists(path: &Path) -> Result<bool, CacheError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::json;
    use tempfile::tempdir;

    fn entry(namespace: &str, key: &str) -> CacheEntry {
        CacheEntry::new(namespace, key, json!({ "key": key }), "tester", 1_700_000_000)
    }

    #[rstest]
    #[case::plain("lint", true)]
    #[case::dashes("security-scan", true)]
    #[case::dotted("v1.2", true)]
    #[case::empty("", false)]
    #[case::hidden(".git", false)]
    #[case::parent("..", false)]
    #[case::slash("a/b", false)]
    #[case::backslash("a\\b", false)]
    #[case::space("a b", false)]
    #[case::colon("skill:test", false)]
    fn test_safe_component(#[case] name: &str, #[case] safe: bool) {
        assert_eq!(is_safe_component(name), safe);
    }

    #[rstest]
    #[case::plain("lint", true)]
    #[case::colon("skill:test", false)]
    #[case::parent("..", false)]
    #[case::slash("a/b", false)]
    #[case::unicode("レビュー", false)]
    fn test_namespace_dir(#[case] namespace: &str, #[case] verbatim: bool) {
        let store = CacheStore::new("/cache");

        let dir = store.namespace_dir(namespace).unwrap();

        assert_eq!(dir.parent(), Some(Path::new("/cache")));
        let name = dir.file_name().unwrap().to_str().unwrap();
        if verbatim {
            assert_eq!(name, namespace);
        } else {
            assert!(name.starts_with('~'), "{} should be hashed", name);
        }
    }

    #[rstest]
    #[case::colon("skill:test")]
    #[case::parent("..")]
    #[case::escape("../escape")]
    #[case::spaces("security scan")]
    fn test_write_unsafe_namespace(#[case] namespace: &str) {
        let dir = tempdir().unwrap();
        let root = dir.path().join("cache");
        let store = CacheStore::new(&root);
        let entry = entry(namespace, "k");

        store.write(&entry).unwrap();

        assert_eq!(store.read(namespace, "k"), Some(entry));
        assert_eq!(store.namespaces().unwrap(), vec![namespace.to_string()]);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_entry_file_name() {
        assert_eq!(entry_file_name("framework-config"), "framework-config.json");

        let hashed = entry_file_name("scope:src/**/*.ts");
        assert!(hashed.starts_with('~'));
        assert!(hashed.ends_with(".json"));
        assert_eq!(hashed, entry_file_name("scope:src/**/*.ts"));

        let long = "k".repeat(MAX_PLAIN_NAME_LEN + 1);
        assert!(entry_file_name(&long).starts_with('~'));
    }

    #[test]
    fn test_write_then_read() {
        let dir = tempdir().unwrap();
        let store = CacheStore::new(dir.path());
        let entry = entry("test", "framework-config");

        store.write(&entry).unwrap();

        assert_eq!(store.read("test", "framework-config"), Some(entry));
        assert!(dir.path().join("test/framework-config.json").exists());
    }

    #[test]
    fn test_write_key_with_separators() {
        let dir = tempdir().unwrap();
        let store = CacheStore::new(dir.path());
        let entry = entry("lint", "../../etc/passwd");

        store.write(&entry).unwrap();

        assert_eq!(store.read("lint", "../../etc/passwd"), Some(entry));
        assert_eq!(store.entry_files("lint").unwrap().len(), 1);
    }

    #[test]
    fn test_write_replaces_whole_entry() {
        let dir = tempdir().unwrap();
        let store = CacheStore::new(dir.path());

        let mut first = entry("ns", "k");
        first.ttl_seconds = Some(10);
        store.write(&first).unwrap();

        let second = CacheEntry::new("ns", "k", json!("second"), "other", 1_700_000_100);
        store.write(&second).unwrap();

        let read = store.read("ns", "k").unwrap();
        assert_eq!(read, second);
        assert!(read.ttl_seconds.is_none());
    }

    #[test]
    fn test_write_leaves_no_temp_files() {
        let dir = tempdir().unwrap();
        let store = CacheStore::new(dir.path());

        store.write(&entry("ns", "a")).unwrap();
        store.write(&entry("ns", "a")).unwrap();

        assert!(store.temp_files("ns").unwrap().is_empty());
    }

    #[test]
    fn test_write_empty_namespace() {
        let dir = tempdir().unwrap();
        let store = CacheStore::new(dir.path());

        let result = store.write(&entry("", "k"));
        assert!(matches!(result, Err(CacheError::InvalidNamespace(_))));
        assert!(store.read("", "k").is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_failed_write_keeps_previous_entry() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let store = CacheStore::new(dir.path());
        let previous = entry("ns", "k");
        store.write(&previous).unwrap();

        let ns_dir = store.namespace_dir("ns").unwrap();
        fs::set_permissions(&ns_dir, fs::Permissions::from_mode(0o555)).unwrap();
        // Permission bits do not stop a privileged user.
        if fs::write(ns_dir.join("access-check"), "").is_ok() {
            fs::set_permissions(&ns_dir, fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let replacement = CacheEntry::new("ns", "k", json!("new"), "tester", 1_700_000_100);
        let result = store.write(&replacement);
        fs::set_permissions(&ns_dir, fs::Permissions::from_mode(0o755)).unwrap();

        assert!(result.is_err());
        assert_eq!(store.read("ns", "k"), Some(previous));
        assert!(store.temp_files("ns").unwrap().is_empty());
    }

    #[test]
    fn test_read_missing_is_none() {
        let dir = tempdir().unwrap();
        let store = CacheStore::new(dir.path().join("never-created"));

        assert!(store.read("ns", "k").is_none());
        assert!(store.load("ns", "k").unwrap().is_none());
    }

    #[test]
    fn test_read_garbage_fails_closed() {
        let dir = tempdir().unwrap();
        let store = CacheStore::new(dir.path());
        store.write(&entry("ns", "k")).unwrap();

        let path = store.entry_path("ns", "k").unwrap();
        fs::write(&path, b"{\"namespace\": \"ns\", \"key\": tru").unwrap();

        assert!(store.read("ns", "k").is_none());
        assert!(matches!(store.load("ns", "k"), Err(CacheError::Corrupted(_))));
    }

    #[test]
    fn test_read_schema_mismatch_fails_closed() {
        let dir = tempdir().unwrap();
        let store = CacheStore::new(dir.path());

        let mut future = serde_json::to_value(entry("ns", "k")).unwrap();
        future["schema_version"] = json!(99);
        let path = store.entry_path("ns", "k").unwrap();
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, serde_json::to_vec(&future).unwrap()).unwrap();

        assert!(store.read("ns", "k").is_none());
        assert!(matches!(
            store.load("ns", "k"),
            Err(CacheError::SchemaMismatch { found: 99, .. })
        ));
    }

    #[test]
    fn test_read_rejects_misplaced_entry() {
        let dir = tempdir().unwrap();
        let store = CacheStore::new(dir.path());
        store.write(&entry("ns", "a")).unwrap();

        let from = store.entry_path("ns", "a").unwrap();
        let to = store.entry_path("ns", "b").unwrap();
        fs::copy(from, to).unwrap();

        assert!(store.read("ns", "b").is_none());
        assert!(store.read("ns", "a").is_some());
    }

    #[test]
    fn test_delete_is_idempotent() {
        let dir = tempdir().unwrap();
        let store = CacheStore::new(dir.path());
        store.write(&entry("ns", "k")).unwrap();

        assert!(store.delete("ns", "k").unwrap());
        assert!(!store.delete("ns", "k").unwrap());
        assert!(store.read("ns", "k").is_none());
    }

    #[test]
    fn test_namespaces_and_entries() {
        let dir = tempdir().unwrap();
        let store = CacheStore::new(dir.path());
        store.write(&entry("review", "b")).unwrap();
        store.write(&entry("review", "a")).unwrap();
        store.write(&entry("lint", "x")).unwrap();
        fs::write(dir.path().join("stray-file"), "ignored").unwrap();
        fs::write(dir.path().join("review/broken.json"), "nope").unwrap();

        assert_eq!(store.namespaces().unwrap(), vec!["lint", "review"]);

        let keys: Vec<_> = store
            .entries("review")
            .unwrap()
            .into_iter()
            .map(|e| e.key)
            .collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(store.entry_files("review").unwrap().len(), 3);
    }

    #[test]
    fn test_remove_namespace() {
        let dir = tempdir().unwrap();
        let store = CacheStore::new(dir.path());
        store.write(&entry("ns", "a")).unwrap();
        store.write(&entry("ns", "b")).unwrap();

        assert_eq!(store.remove_namespace("ns").unwrap(), 2);
        assert_eq!(store.remove_namespace("ns").unwrap(), 0);
        assert!(store.namespaces().unwrap().is_empty());
    }
}
