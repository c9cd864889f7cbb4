//! Content hashing for cache invalidation and dependency verification.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A 64-bit content hash computed using xxHash64 for cache invalidation.
///
/// Two files with the same `ContentHash` are assumed to have identical
/// content. Used throughout the toolchain to detect when interface files or
/// their dependencies have changed and need recompilation.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash(u64);

impl ContentHash {
    /// Computes a content hash from a byte slice using xxHash64.
    pub fn from_bytes(data: &[u8]) -> Self {
        Self(xxhash_rust::xxh64::xxh64(data, 0))
    }

    /// Reconstructs a hash from a previously stored raw digest.
    pub fn from_raw(digest: u64) -> Self {
        Self(digest)
    }

    /// Returns the raw 64-bit digest.
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({:04x}..)", self.0 >> 48)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic() {
        let a = ContentHash::from_bytes(b"hello world");
        let b = ContentHash::from_bytes(b"hello world");
        assert_eq!(a, b);
    }

    #[test]
    fn different_inputs_differ() {
        let a = ContentHash::from_bytes(b"hello");
        let b = ContentHash::from_bytes(b"world");
        assert_ne!(a, b);
    }

    #[test]
    fn raw_roundtrip() {
        let h = ContentHash::from_bytes(b"raw digest");
        assert_eq!(ContentHash::from_raw(h.raw()), h);
    }

    #[test]
    fn display_format() {
        let h = ContentHash::from_bytes(b"test");
        let s = format!("{h}");
        assert_eq!(s.len(), 16, "Display should be 16 hex chars");
        assert!(s.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn debug_abbreviated() {
        let h = ContentHash::from_bytes(b"test");
        let s = format!("{h:?}");
        assert!(s.starts_with("ContentHash("));
        assert!(s.ends_with(")"));
    }

    #[test]
    fn serde_roundtrip() {
        let h = ContentHash::from_bytes(b"serde test");
        let json = serde_json::to_string(&h).unwrap();
        let back: ContentHash = serde_json::from_str(&json).unwrap();
        assert_eq!(h, back);
    }
}
