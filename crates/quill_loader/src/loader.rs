//! The loader entry point: find or build a binary module for an interface.

use crate::builder::ModuleBuilder;
use crate::cache_key::cached_output_path;
use crate::discovery::{DiscoveredModule, LoadMode, ModuleDiscovery};
use crate::error::LoadError;
use crate::forwarding::write_forwarding_module;
use crate::frontend::ModuleFrontend;
use crate::invocation::HostContext;
use crate::serialization::validate_serialized_module;
use crate::tracker::DependencyTracker;
use crate::INTERFACE_EXTENSION;
use quill_diagnostics::DiagnosticSink;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Derives the loader's module cache directory from a tool-specific cache
/// path.
///
/// Foreign-importer caches carry a tool-versioned leaf directory; the
/// module cache lives one level above it so it survives tool upgrades.
pub fn module_cache_path_within(tool_cache_path: &Path) -> PathBuf {
    tool_cache_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default()
}

/// A successfully loaded module: the binary module buffer and, when present,
/// its documentation sidecar.
#[derive(Debug)]
pub struct FoundModule {
    /// The loadable binary module bytes.
    pub buffer: Vec<u8>,
    /// The documentation sidecar bytes, if a sidecar exists.
    pub doc_buffer: Option<Vec<u8>>,
}

/// Loads binary modules for textual interfaces, caching what it builds.
///
/// All collaborators are passed in explicitly: the host compilation state,
/// the frontend used for sub-compilations, the diagnostic sink, and the
/// optional dependency tracker. The prebuilt cache is read-only; the user
/// cache is assumed single-writer per interface.
pub struct ModuleLoader<'a> {
    host: &'a HostContext,
    frontend: &'a dyn ModuleFrontend,
    diags: &'a DiagnosticSink,
    cache_dir: PathBuf,
    prebuilt_cache_dir: Option<PathBuf>,
    load_mode: LoadMode,
    tracker: Option<&'a dyn DependencyTracker>,
}

impl<'a> ModuleLoader<'a> {
    /// Creates a loader.
    ///
    /// `load_mode` must not be [`LoadMode::OnlyBinary`]; binary-only loads
    /// are handled entirely by the sibling binary-module loader.
    pub fn new(
        host: &'a HostContext,
        frontend: &'a dyn ModuleFrontend,
        diags: &'a DiagnosticSink,
        cache_dir: impl Into<PathBuf>,
        prebuilt_cache_dir: Option<PathBuf>,
        load_mode: LoadMode,
        tracker: Option<&'a dyn DependencyTracker>,
    ) -> Self {
        debug_assert!(
            load_mode != LoadMode::OnlyBinary,
            "the interface loader is never constructed for binary-only loads"
        );
        Self {
            host,
            frontend,
            diags,
            cache_dir: cache_dir.into(),
            prebuilt_cache_dir,
            load_mode,
            tracker,
        }
    }

    /// Finds or builds a loadable binary module for `module_id` in `dir`.
    ///
    /// `module_filename` and `module_doc_filename` are the canonical
    /// filenames for the module and its doc sidecar; the interface path is
    /// the module path with its extension replaced. Returns `NotFound` when
    /// no interface exists, `NotSupported` when the sibling binary-module
    /// loader should take over, and `InvalidArgument` when building from
    /// the interface failed.
    pub fn find_module(
        &self,
        dir: &Path,
        module_id: &str,
        module_filename: &str,
        module_doc_filename: &str,
    ) -> Result<FoundModule, LoadError> {
        let module_path = dir.join(module_filename);
        let interface_path = module_path.with_extension(INTERFACE_EXTENSION);

        // No interface, nothing to do; the caches are keyed off it.
        if !interface_path.exists() {
            return Err(LoadError::NotFound);
        }

        let track_system_deps = self
            .tracker
            .is_some_and(|t| t.tracks_system_dependencies());

        // The builder doubles as the sub-invocation owner even on the cache
        // path; cache keys derive from the invocation it configures.
        let mut builder = ModuleBuilder::new(
            self.host,
            self.frontend,
            self.diags,
            &interface_path,
            module_id,
            &self.cache_dir,
            self.prebuilt_cache_dir.as_deref(),
            false,
            track_system_deps,
            self.tracker,
        );
        let cache_path = cached_output_path(&self.cache_dir, module_id, builder.sub_invocation());

        let discovery = ModuleDiscovery {
            interface_path: &interface_path,
            module_path: &module_path,
            cache_path: &cache_path,
            sdk_path: &self.host.sdk_path,
            prebuilt_cache_dir: self.prebuilt_cache_dir.as_deref(),
            tracker: self.tracker,
        };

        let buffer = match discovery.discover(self.load_mode) {
            Ok(module) => {
                // Pin prebuilt hits into the user cache so the next load
                // skips the prebuilt probe. A failed write downgrades to
                // "let the sibling loader try".
                if module.is_prebuilt()
                    && self
                        .write_forwarding_for(&module, &cache_path)
                        .is_err()
                {
                    return Err(LoadError::NotSupported);
                }
                module.into_buffer()
            }
            Err(LoadError::NotFound) => builder
                .build(&cache_path, true)
                .map_err(|_| LoadError::InvalidArgument)?,
            Err(other) => return Err(other),
        };

        let doc_buffer = self.open_module_doc(dir, module_doc_filename)?;
        Ok(FoundModule { buffer, doc_buffer })
    }

    fn write_forwarding_for(
        &self,
        module: &DiscoveredModule,
        cache_path: &Path,
    ) -> io::Result<()> {
        // The buffer validated during discovery; its embedded dependency
        // records seed the forwarding snapshot.
        let header = validate_serialized_module(module.buffer()).ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidData, "prebuilt module no longer validates")
        })?;
        write_forwarding_module(
            cache_path,
            module.path(),
            &header.dependencies,
            &self.host.sdk_path,
        )
    }

    /// Loads the documentation sidecar next to the interface.
    ///
    /// A missing sidecar is not an error; anything else unreadable defers
    /// to the sibling loader.
    fn open_module_doc(
        &self,
        dir: &Path,
        module_doc_filename: &str,
    ) -> Result<Option<Vec<u8>>, LoadError> {
        let doc_path = dir.join(module_doc_filename);
        match fs::read(&doc_path) {
            Ok(buffer) => Ok(Some(buffer)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(_) => Err(LoadError::NotSupported),
        }
    }
}

/// Builds a binary module from an interface at an explicit output path.
///
/// This is the standalone driver entry: it skips discovery entirely and
/// always compiles, serializing the collected dependency records into the
/// output.
#[allow(clippy::too_many_arguments)]
pub fn build_module_from_interface(
    host: &HostContext,
    frontend: &dyn ModuleFrontend,
    diags: &DiagnosticSink,
    cache_dir: &Path,
    prebuilt_cache_dir: Option<&Path>,
    module_name: &str,
    interface_path: &Path,
    out_path: &Path,
    serialize_dependency_hashes: bool,
    track_system_deps: bool,
) -> Result<Vec<u8>, crate::error::BuildError> {
    let mut builder = ModuleBuilder::new(
        host,
        frontend,
        diags,
        interface_path,
        module_name,
        cache_dir,
        prebuilt_cache_dir,
        serialize_dependency_hashes,
        track_system_deps,
        None,
    );
    builder.build(out_path, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn module_cache_path_within_takes_parent() {
        assert_eq!(
            module_cache_path_within(Path::new("/home/u/.cache/quill/tool-1.2")),
            PathBuf::from("/home/u/.cache/quill")
        );
    }

    #[test]
    fn module_cache_path_within_bare_path() {
        assert_eq!(module_cache_path_within(Path::new("tool")), PathBuf::new());
    }
}
