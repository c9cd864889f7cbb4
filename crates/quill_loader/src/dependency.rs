//! File dependency records embedded in serialized binary modules.

use quill_common::ContentHash;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// How a recorded dependency is verified against the filesystem.
///
/// Exactly one verifier is stored per dependency. Modification times are
/// opaque 64-bit tick values compared for equality, never ordered.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DependencyVerifier {
    /// Modification-time ticks captured when the module was built.
    ModTime(u64),
    /// Content hash of the dependency's bytes.
    ContentHash(ContentHash),
}

/// A single file dependency of a compiled binary module.
///
/// SDK-relative records store only the path suffix below the SDK root, so a
/// cache entry stays valid when the SDK moves.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDependency {
    /// The recorded path: absolute, or SDK-relative if `sdk_relative` is set.
    pub path: String,
    /// Whether `path` is a suffix below the current SDK root.
    pub sdk_relative: bool,
    /// Size of the file in bytes when the module was built.
    pub size: u64,
    /// The freshness verifier for this dependency.
    pub verifier: DependencyVerifier,
}

impl FileDependency {
    /// Creates a dependency verified by modification time.
    pub fn mod_time_based(
        path: impl Into<String>,
        sdk_relative: bool,
        size: u64,
        mtime: u64,
    ) -> Self {
        Self {
            path: path.into(),
            sdk_relative,
            size,
            verifier: DependencyVerifier::ModTime(mtime),
        }
    }

    /// Creates a dependency verified by content hash.
    pub fn hash_based(
        path: impl Into<String>,
        sdk_relative: bool,
        size: u64,
        hash: ContentHash,
    ) -> Self {
        Self {
            path: path.into(),
            sdk_relative,
            size,
            verifier: DependencyVerifier::ContentHash(hash),
        }
    }

    /// Returns `true` if this dependency is verified by modification time.
    pub fn is_mod_time_based(&self) -> bool {
        matches!(self.verifier, DependencyVerifier::ModTime(_))
    }

    /// Resolves the recorded path to an absolute one, prepending the SDK
    /// root for SDK-relative records.
    pub fn resolved_path(&self, sdk_path: &Path) -> PathBuf {
        if self.sdk_relative {
            sdk_path.join(&self.path)
        } else {
            PathBuf::from(&self.path)
        }
    }
}

/// Extracts the opaque 64-bit modification-time ticks from file metadata.
///
/// Files whose mtime predates the epoch (or platforms without mtime support)
/// read as tick zero; comparisons stay exact either way.
pub fn mod_time_ticks(metadata: &std::fs::Metadata) -> u64 {
    metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolved_path_absolute() {
        let dep = FileDependency::mod_time_based("/usr/include/foo.h", false, 10, 1);
        assert_eq!(
            dep.resolved_path(Path::new("/sdk")),
            PathBuf::from("/usr/include/foo.h")
        );
    }

    #[test]
    fn resolved_path_sdk_relative() {
        let dep = FileDependency::mod_time_based("lib/Foo.qi", true, 10, 1);
        assert_eq!(
            dep.resolved_path(Path::new("/sdk")),
            PathBuf::from("/sdk/lib/Foo.qi")
        );
    }

    #[test]
    fn verifier_kind() {
        let mtime = FileDependency::mod_time_based("a", false, 1, 2);
        assert!(mtime.is_mod_time_based());

        let hashed = FileDependency::hash_based("a", false, 1, ContentHash::from_bytes(b"x"));
        assert!(!hashed.is_mod_time_based());
    }

    #[test]
    fn serde_roundtrip() {
        let dep = FileDependency::hash_based("lib/Foo.qi", true, 42, ContentHash::from_bytes(b"y"));
        let json = serde_json::to_string(&dep).unwrap();
        let back: FileDependency = serde_json::from_str(&json).unwrap();
        assert_eq!(back, dep);
    }

    #[test]
    fn mod_time_ticks_changes_with_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dep.txt");
        std::fs::write(&path, "one").unwrap();
        let first = mod_time_ticks(&std::fs::metadata(&path).unwrap());

        // Make sure the clock advances past filesystem timestamp granularity.
        std::thread::sleep(std::time::Duration::from_millis(20));
        std::fs::write(&path, "two").unwrap();
        let second = mod_time_ticks(&std::fs::metadata(&path).unwrap());
        assert_ne!(first, second);
    }
}
