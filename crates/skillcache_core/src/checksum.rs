//! Content fingerprints for tracked files.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

/// Checksum recorded for files that are missing or unreadable.
pub const ABSENT_CHECKSUM: &str = "absent";

/// Path (as given by the caller) to checksum, ordered by path.
pub type ChecksumMap = BTreeMap<String, String>;

/// Computes checksums of tracked files.
///
/// Relative paths are resolved against the base directory when one is set,
/// but the returned map is keyed by the paths exactly as they were passed in.
#[derive(Debug, Clone, Default)]
pub struct Fingerprinter {
    base_dir: Option<PathBuf>,
}

impl Fingerprinter {
    /// Creates a fingerprinter.
    ///
    /// # Arguments
    ///
    /// * `base_dir` - Directory that relative paths are resolved against
    pub fn new(base_dir: Option<PathBuf>) -> Self {
        Self { base_dir }
    }

    /// Returns the base directory, if any.
    pub fn base_dir(&self) -> Option<&Path> {
        self.base_dir.as_deref()
    }

    /// Computes the BLAKE3 hash of bytes.
    pub fn hash_bytes(bytes: &[u8]) -> String {
        blake3::hash(bytes).to_hex().to_string()
    }

    /// Resolves a tracked path against the base directory.
    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }

    /// Computes the checksum of a single file.
    ///
    /// Missing and unreadable files both yield [`ABSENT_CHECKSUM`].
    pub fn checksum_file(&self, path: impl AsRef<Path>) -> String {
        let resolved = self.resolve(path);
        match fs::read(&resolved) {
            Ok(bytes) => Self::hash_bytes(&bytes),
            Err(e) => {
                if e.kind() != io::ErrorKind::NotFound {
                    debug!("Treating {} as absent: {}", resolved.display(), e);
                }
                ABSENT_CHECKSUM.to_string()
            }
        }
    }

    /// Computes checksums for a set of paths.
    ///
    /// The input order does not matter; duplicates collapse to one entry.
    pub fn fingerprint<I, P>(&self, paths: I) -> ChecksumMap
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        paths
            .into_iter()
            .map(|path| {
                let path = path.as_ref();
                (path_key(path), self.checksum_file(path))
            })
            .collect()
    }

    /// Returns true if two paths point at the same file once resolved.
    ///
    /// Paths still relative after resolution are taken against the current
    /// directory, so a relative and an absolute spelling compare equal.
    pub fn same_file(&self, a: impl AsRef<Path>, b: impl AsRef<Path>) -> bool {
        normalize(&absolute(self.resolve(a))) == normalize(&absolute(self.resolve(b)))
    }
}

/// Key under which a path is stored in a [`ChecksumMap`].
pub fn path_key(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

fn absolute(path: PathBuf) -> PathBuf {
    std::path::absolute(&path).unwrap_or(path)
}

/// Lexically removes `.` components and folds `..` where possible.
fn normalize(path: &Path) -> PathBuf {
    use std::path::Component;

    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
