//! Discovery of an up-to-date binary module for an interface.
//!
//! For a given interface the loader may find a loadable module in several
//! places. The probes run in a fixed order — user cache, prebuilt cache,
//! adjacent binary — and the first up-to-date hit wins. Freshness failures
//! fall through to the next probe; only the adjacent-binary probe can end
//! the search early, by deferring to the sibling binary-module loader.

use crate::error::LoadError;
use crate::forwarding::ForwardingModule;
use crate::freshness::FreshnessChecker;
use crate::serialization::{is_serialized_module, validate_serialized_module};
use crate::tracker::DependencyTracker;
use crate::BINARY_MODULE_EXTENSION;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// How the enclosing compilation wants modules resolved.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadMode {
    /// Always rebuild from interfaces; never consult caches or binaries.
    OnlyInterface,
    /// Prefer interfaces: use the caches but skip adjacent binaries.
    PreferInterface,
    /// Prefer binaries: full probe order including adjacent binaries.
    PreferBinary,
    /// Only load binaries. The interface loader is never constructed in
    /// this mode.
    OnlyBinary,
}

/// An up-to-date binary module found for an interface.
///
/// `path` is the filesystem location the buffer came from; for forwarded
/// modules that is the underlying prebuilt module, not the forwarding record.
#[derive(Debug)]
pub enum DiscoveredModule {
    /// Found in the user cache (or alongside the interface).
    Normal {
        /// Location of the serialized module.
        path: PathBuf,
        /// The module's bytes.
        buffer: Vec<u8>,
    },
    /// Found in the prebuilt cache; dependencies validated from its own
    /// embedded records.
    Prebuilt {
        /// Location of the serialized module.
        path: PathBuf,
        /// The module's bytes.
        buffer: Vec<u8>,
    },
    /// Found through a forwarding module; dependencies validated from the
    /// forwarding record, not the underlying module.
    Forwarded {
        /// Location of the underlying serialized module.
        path: PathBuf,
        /// The underlying module's bytes.
        buffer: Vec<u8>,
    },
}

impl DiscoveredModule {
    /// The filesystem location the module's bytes came from.
    pub fn path(&self) -> &Path {
        match self {
            Self::Normal { path, .. } | Self::Prebuilt { path, .. } | Self::Forwarded { path, .. } => {
                path
            }
        }
    }

    /// Borrows the module's bytes.
    pub fn buffer(&self) -> &[u8] {
        match self {
            Self::Normal { buffer, .. }
            | Self::Prebuilt { buffer, .. }
            | Self::Forwarded { buffer, .. } => buffer,
        }
    }

    /// Consumes the discovery, yielding the module's bytes.
    pub fn into_buffer(self) -> Vec<u8> {
        match self {
            Self::Normal { buffer, .. }
            | Self::Prebuilt { buffer, .. }
            | Self::Forwarded { buffer, .. } => buffer,
        }
    }

    /// Returns `true` for prebuilt-cache hits.
    pub fn is_prebuilt(&self) -> bool {
        matches!(self, Self::Prebuilt { .. })
    }
}

/// The discovery pipeline for one interface.
pub struct ModuleDiscovery<'a> {
    /// The interface file being loaded.
    pub interface_path: &'a Path,
    /// The binary module path adjacent to the interface.
    pub module_path: &'a Path,
    /// The computed user-cache entry path for this interface.
    pub cache_path: &'a Path,
    /// SDK root; empty when absent.
    pub sdk_path: &'a Path,
    /// The read-only prebuilt cache, if configured.
    pub prebuilt_cache_dir: Option<&'a Path>,
    /// Caller-owned dependency tracker, if any.
    pub tracker: Option<&'a dyn DependencyTracker>,
}

impl ModuleDiscovery<'_> {
    /// Runs the probes in order and returns the first up-to-date module.
    ///
    /// Errors are part of the protocol: `NotFound` means "build from the
    /// interface", `NotSupported` means "an adjacent binary exists; let the
    /// binary-module loader handle (or diagnose) it".
    pub fn discover(&self, mode: LoadMode) -> Result<DiscoveredModule, LoadError> {
        let mut load_adjacent_module = true;
        match mode {
            // Always build the interface; skip every probe.
            LoadMode::OnlyInterface => return Err(LoadError::NotFound),
            // Use the caches, but ignore any binary next to the interface.
            LoadMode::PreferInterface => load_adjacent_module = false,
            LoadMode::PreferBinary => {}
            LoadMode::OnlyBinary => {
                unreachable!("the interface loader is never constructed for binary-only loads")
            }
        }

        // The user cache holds the most up-to-date knowledge about the
        // module, so it always wins.
        if let Ok(buffer) = fs::read(self.cache_path) {
            if is_serialized_module(&buffer) {
                if self.serialized_buffer_is_up_to_date(&buffer) {
                    return Ok(DiscoveredModule::Normal {
                        path: self.cache_path.to_path_buf(),
                        buffer,
                    });
                }
            } else if let Ok(fwd) = ForwardingModule::load(&buffer) {
                if let Some(underlying) = self.forwarded_module_buffer(&fwd) {
                    return Ok(DiscoveredModule::Forwarded {
                        path: PathBuf::from(&fwd.path),
                        buffer: underlying,
                    });
                }
            }
            // Stale or unreadable entries fall through; they are overwritten
            // on the next successful build.
        }

        if self.prebuilt_cache_dir.is_some() {
            if let Some(candidate) = self.prebuilt_module_path() {
                if let Some(buffer) = self.up_to_date_module_file(&candidate) {
                    return Ok(DiscoveredModule::Prebuilt {
                        path: candidate,
                        buffer,
                    });
                }
            }
        }

        // Any binary sitting next to the interface belongs to the sibling
        // binary-module loader: a fresh one should be loaded by it, and a
        // stale or unreadable one gets a better diagnostic from it.
        if load_adjacent_module {
            match fs::metadata(self.module_path) {
                Ok(_) => return Err(LoadError::NotSupported),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(_) => return Err(LoadError::NotSupported),
            }
        }

        Err(LoadError::NotFound)
    }

    /// Computes the prebuilt-cache candidate path for this interface.
    ///
    /// Only interfaces shipped inside the SDK have prebuilt counterparts.
    /// The candidate is `<prebuilt>/<module-filename>`, or
    /// `<prebuilt>/<parent-dir>/<module-filename>` when the interface lives
    /// in an architecture-fanout directory (a parent named like a binary
    /// module). No cache key participates.
    pub fn prebuilt_module_path(&self) -> Option<PathBuf> {
        let prebuilt_dir = self.prebuilt_cache_dir?;
        if self.sdk_path.as_os_str().is_empty() || !self.interface_path.starts_with(self.sdk_path)
        {
            return None;
        }

        let mut candidate = prebuilt_dir.to_path_buf();
        if let Some(parent_name) = self.interface_path.parent().and_then(Path::file_name) {
            let fanout = Path::new(parent_name)
                .extension()
                .is_some_and(|ext| ext == BINARY_MODULE_EXTENSION);
            if fanout {
                candidate.push(parent_name);
            }
        }
        candidate.push(self.module_path.file_name()?);
        Some(candidate)
    }

    fn freshness(&self) -> FreshnessChecker<'_> {
        FreshnessChecker::new(self.sdk_path, self.tracker)
    }

    fn serialized_buffer_is_up_to_date(&self, buffer: &[u8]) -> bool {
        match validate_serialized_module(buffer) {
            Some(header) => self.freshness().deps_up_to_date(&header.dependencies),
            None => false,
        }
    }

    fn up_to_date_module_file(&self, path: &Path) -> Option<Vec<u8>> {
        let buffer = fs::read(path).ok()?;
        self.serialized_buffer_is_up_to_date(&buffer)
            .then_some(buffer)
    }

    /// Reads and validates the module a forwarding record points at.
    ///
    /// The underlying module must be structurally valid, but freshness is
    /// judged against the forwarding record's own dependency snapshot.
    fn forwarded_module_buffer(&self, fwd: &ForwardingModule) -> Option<Vec<u8>> {
        let buffer = fs::read(&fwd.path).ok()?;
        validate_serialized_module(&buffer)?;
        self.freshness()
            .deps_up_to_date(&fwd.to_file_dependencies())
            .then_some(buffer)
    }
}
