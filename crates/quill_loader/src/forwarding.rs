//! Forwarding modules: user-cache records that point at prebuilt modules.
//!
//! A forwarding module lets a binary module that physically lives in the
//! read-only prebuilt cache be referenced from the writable user cache. It is
//! a small JSON document naming the underlying module and carrying its own
//! dependency snapshot, which is validated against the live filesystem on
//! every load. Forwarding modules do not start with the serialized-module
//! magic, which is how the discovery probe tells the two apart.

use crate::dependency::{mod_time_ticks, FileDependency};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Write};
use std::path::Path;

/// The forwarding record format version this loader accepts.
pub const FORWARDING_MODULE_VERSION: u32 = 1;

/// A dependency entry in a forwarding module.
///
/// Paths are always absolute: SDK expansion happens when the record is
/// written, so validation never needs an SDK root.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ForwardedDependency {
    /// Modification-time ticks at write time.
    pub mtime: u64,
    /// Absolute path of the dependency.
    pub path: String,
    /// Size in bytes at write time.
    pub size: u64,
}

/// A parsed forwarding module.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ForwardingModule {
    /// Path of the underlying binary module in the prebuilt cache.
    pub path: String,
    /// Dependency snapshot taken when the record was written.
    pub dependencies: Vec<ForwardedDependency>,
    /// Record format version; only [`FORWARDING_MODULE_VERSION`] is accepted.
    pub version: u32,
}

/// Failure to parse a forwarding module.
#[derive(Debug, thiserror::Error)]
pub enum ForwardingError {
    /// The buffer is not a well-formed forwarding record.
    #[error("not a valid forwarding module: {reason}")]
    Malformed {
        /// Description of the parse failure.
        reason: String,
    },

    /// The record declares a version this loader does not support.
    #[error("unsupported forwarding module version {found}")]
    UnsupportedVersion {
        /// The version found in the record.
        found: u32,
    },
}

impl ForwardingModule {
    /// Creates an empty forwarding module pointing at `underlying_path`.
    pub fn new(underlying_path: impl Into<String>) -> Self {
        Self {
            path: underlying_path.into(),
            dependencies: Vec::new(),
            version: FORWARDING_MODULE_VERSION,
        }
    }

    /// Parses a forwarding module from raw bytes.
    ///
    /// Unknown top-level fields and unsupported versions are rejected.
    pub fn load(buf: &[u8]) -> Result<Self, ForwardingError> {
        let fwd: ForwardingModule =
            serde_json::from_slice(buf).map_err(|e| ForwardingError::Malformed {
                reason: e.to_string(),
            })?;
        if fwd.version != FORWARDING_MODULE_VERSION {
            return Err(ForwardingError::UnsupportedVersion { found: fwd.version });
        }
        Ok(fwd)
    }

    /// Appends a dependency snapshot entry.
    pub fn add_dependency(&mut self, path: impl Into<String>, size: u64, mtime: u64) {
        self.dependencies.push(ForwardedDependency {
            mtime,
            path: path.into(),
            size,
        });
    }

    /// Converts the snapshot into freshness-checkable dependency records.
    ///
    /// All entries come back absolute and modification-time based.
    pub fn to_file_dependencies(&self) -> Vec<FileDependency> {
        self.dependencies
            .iter()
            .map(|d| FileDependency::mod_time_based(d.path.clone(), false, d.size, d.mtime))
            .collect()
    }
}

/// Writes a forwarding module into the user cache.
///
/// The record lists the underlying module itself followed by every
/// dependency the prebuilt module was built against, re-statted and with
/// SDK-relative records expanded to absolute paths. Re-statting can race
/// with a concurrent writer and capture a state newer than the one the
/// underlying module was validated against; the single-writer cache model
/// accepts that. The write is atomic (temp file, then rename).
pub fn write_forwarding_module(
    out_path: &Path,
    underlying_path: &Path,
    deps: &[FileDependency],
    sdk_path: &Path,
) -> io::Result<()> {
    let mut fwd = ForwardingModule::new(underlying_path.to_string_lossy().into_owned());

    let mut snapshot = |path: &Path| -> io::Result<()> {
        let metadata = fs::metadata(path)?;
        fwd.add_dependency(
            path.to_string_lossy().into_owned(),
            metadata.len(),
            mod_time_ticks(&metadata),
        );
        Ok(())
    };

    snapshot(underlying_path)?;
    for dep in deps {
        snapshot(&dep.resolved_path(sdk_path))?;
    }

    let json = serde_json::to_vec_pretty(&fwd)?;
    write_or_replace(out_path, &json)
}

/// Atomically replaces `path` with `bytes` via a temp file in the same
/// directory.
fn write_or_replace(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    // A prebuilt hit can land before anything was ever built into the cache.
    fs::create_dir_all(parent)?;
    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    tmp.write_all(bytes)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
