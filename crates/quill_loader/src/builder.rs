//! Building a binary module from an interface with a subordinate compilation.

use crate::diag;
use crate::dependency::{mod_time_ticks, FileDependency};
use crate::error::BuildError;
use crate::frontend::ModuleFrontend;
use crate::interface::{extract_interface_header, InterfaceError, CURRENT_INTERFACE_FORMAT_VERSION};
use crate::invocation::{HostContext, SubInvocation};
use crate::serialization::{serialize_module, validate_serialized_module};
use crate::tracker::DependencyTracker;
use crate::BINARY_MODULE_EXTENSION;
use quill_common::ContentHash;
use quill_diagnostics::{Diagnostic, DiagnosticSink};
use std::collections::HashSet;
use std::fs;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};

/// Compiles a module interface into a binary module buffer, collecting the
/// transitive dependency list and writing the artifact into the user cache.
///
/// Construction configures the subordinate invocation from the host context;
/// the invocation is also how callers compute cache keys before deciding
/// whether a build is needed at all.
pub struct ModuleBuilder<'a> {
    frontend: &'a dyn ModuleFrontend,
    diags: &'a DiagnosticSink,
    interface_path: PathBuf,
    module_cache_path: PathBuf,
    prebuilt_cache_path: Option<PathBuf>,
    tracker: Option<&'a dyn DependencyTracker>,
    sub_invocation: SubInvocation,
}

impl<'a> ModuleBuilder<'a> {
    /// Creates a builder for one interface, inheriting compilation state
    /// from the host context.
    pub fn new(
        host: &HostContext,
        frontend: &'a dyn ModuleFrontend,
        diags: &'a DiagnosticSink,
        interface_path: &Path,
        module_name: &str,
        module_cache_path: &Path,
        prebuilt_cache_path: Option<&Path>,
        serialize_dependency_hashes: bool,
        track_system_deps: bool,
        tracker: Option<&'a dyn DependencyTracker>,
    ) -> Self {
        let mut sub_invocation = SubInvocation::inherited(
            host,
            module_name,
            module_cache_path,
            prebuilt_cache_path,
            track_system_deps,
            serialize_dependency_hashes,
        );
        // The interface is the invocation's identity; outputs are wired up
        // per build.
        sub_invocation.primary_input = interface_path.to_path_buf();
        Self {
            frontend,
            diags,
            interface_path: interface_path.to_path_buf(),
            module_cache_path: module_cache_path.to_path_buf(),
            prebuilt_cache_path: prebuilt_cache_path.map(Path::to_path_buf),
            tracker,
            sub_invocation,
        }
    }

    /// The subordinate invocation this builder would compile with.
    pub fn sub_invocation(&self) -> &SubInvocation {
        &self.sub_invocation
    }

    /// Compiles the interface to `out_path` and returns the module buffer.
    ///
    /// Runs inside a crash-recovery boundary: a panic anywhere in the
    /// subordinate compilation surfaces as a build failure instead of
    /// terminating the host.
    pub fn build(&mut self, out_path: &Path, serialize_deps: bool) -> Result<Vec<u8>, BuildError> {
        let outcome = catch_unwind(AssertUnwindSafe(|| self.build_module(out_path, serialize_deps)));
        match outcome {
            Ok(result) => result,
            Err(_) => {
                self.diags.emit(
                    Diagnostic::error(
                        diag::SUB_COMPILATION_FAILED,
                        "sub-compilation crashed while building the module interface",
                    )
                    .with_file(&self.interface_path),
                );
                Err(BuildError::SubCompilationFailed)
            }
        }
    }

    fn build_module(&mut self, out_path: &Path, serialize_deps: bool) -> Result<Vec<u8>, BuildError> {
        // The cache directory may not exist yet on a cold start; failure to
        // create it surfaces later as a write error with better context.
        if !self.module_cache_path.as_os_str().is_empty() {
            let _ = fs::create_dir_all(&self.module_cache_path);
        }
        self.sub_invocation
            .set_inputs_and_outputs(&self.interface_path, out_path);

        let text = match fs::read_to_string(&self.interface_path) {
            Ok(text) => text,
            Err(e) => {
                self.diags.emit(
                    Diagnostic::error(
                        diag::CANNOT_OPEN_INTERFACE,
                        format!("cannot open module interface: {e}"),
                    )
                    .with_file(&self.interface_path),
                );
                return Err(BuildError::OpenInterface {
                    path: self.interface_path.clone(),
                    source: e,
                });
            }
        };

        let header = extract_interface_header(&text).map_err(|e| {
            let code = match e {
                InterfaceError::NoFlags => diag::CANNOT_EXTRACT_FLAGS,
                _ => diag::CANNOT_EXTRACT_VERSION,
            };
            self.diags
                .emit(Diagnostic::error(code, e.to_string()).with_file(&self.interface_path));
            BuildError::from(e)
        })?;

        // Same major version builds; minor drift is tolerated.
        if header.version.major != CURRENT_INTERFACE_FORMAT_VERSION.major {
            self.diags.emit(
                Diagnostic::error(
                    diag::UNSUPPORTED_FORMAT_VERSION,
                    format!(
                        "unsupported module interface format version {}",
                        header.version
                    ),
                )
                .with_file(&self.interface_path)
                .with_note(format!(
                    "this toolchain builds format version {CURRENT_INTERFACE_FORMAT_VERSION}"
                )),
            );
            return Err(BuildError::UnsupportedFormatVersion {
                found: header.version,
            });
        }

        let expected_name = self.sub_invocation.module_name.clone();
        if self
            .sub_invocation
            .parse_args(&header.flags, self.diags)
            .is_err()
        {
            return Err(BuildError::InvalidFlags);
        }

        if self.sub_invocation.module_name != expected_name {
            let found = self.sub_invocation.module_name.clone();
            let message =
                format!("module interface declares module {found}, expected {expected_name}");
            // Debugger sessions get a softer diagnostic, but the load still
            // fails either way.
            let diagnostic = if self.sub_invocation.debugger_support {
                Diagnostic::warning(diag::MODULE_NAME_MISMATCH_DEBUGGER, message)
            } else {
                Diagnostic::error(diag::MODULE_NAME_MISMATCH, message)
            };
            self.diags.emit(diagnostic.with_file(&self.interface_path));
            return Err(BuildError::ModuleNameMismatch {
                expected: expected_name,
                found,
            });
        }

        // Reassert after flag parsing; the embedded flags may carry their
        // own optimization settings.
        self.sub_invocation.optimize_for_speed = true;

        let mut instance = self
            .frontend
            .setup(&self.sub_invocation, self.diags)
            .ok_or(BuildError::SubCompilationFailed)?;

        if instance.perform_sema() {
            return Err(BuildError::SubCompilationFailed);
        }
        if instance.lower() {
            return Err(BuildError::SubCompilationFailed);
        }

        // Dependencies are collected before the optimization pipeline runs,
        // so the serialization callback sees the finished list.
        let deps = self.collect_deps_for_serialization(&instance.dependencies())?;
        let serialized_deps = if serialize_deps { deps } else { Vec::new() };

        let module_name = self.sub_invocation.module_name.clone();
        let toolchain_version = self.sub_invocation.toolchain_version.clone();
        let mut module_buffer: Option<Vec<u8>> = None;
        let mut encode_error: Option<String> = None;
        let mut write_error: Option<std::io::Error> = None;

        let failed = instance.run_passes(&mut |payload| {
            match serialize_module(&module_name, &toolchain_version, &serialized_deps, payload) {
                Ok(bytes) => {
                    if let Err(e) = fs::write(out_path, &bytes) {
                        write_error = Some(e);
                    }
                    module_buffer = Some(bytes);
                }
                Err(e) => encode_error = Some(e.to_string()),
            }
        });

        if failed {
            return Err(BuildError::SubCompilationFailed);
        }
        if let Some(reason) = encode_error {
            self.diags.emit(
                Diagnostic::error(diag::CANNOT_WRITE_MODULE, reason.clone())
                    .with_file(&self.interface_path),
            );
            return Err(BuildError::Serialize { reason });
        }
        if let Some(e) = write_error {
            self.diags.emit(
                Diagnostic::error(
                    diag::CANNOT_WRITE_MODULE,
                    format!("cannot write module to {}: {e}", out_path.display()),
                )
                .with_file(&self.interface_path),
            );
            return Err(BuildError::Write(e));
        }
        match module_buffer {
            Some(buffer) => Ok(buffer),
            None => {
                self.diags.emit(
                    Diagnostic::error(
                        diag::SUB_COMPILATION_FAILED,
                        "the optimization pipeline never serialized the module",
                    )
                    .with_file(&self.interface_path),
                );
                Err(BuildError::SubCompilationFailed)
            }
        }
    }

    /// Flattens the frontend's raw dependency list into serializable records.
    ///
    /// The interface itself is always a dependency. Cached binary modules
    /// contribute their embedded leaf dependencies instead of themselves, so
    /// cache entries never chain through other cache entries and stay
    /// relocatable. Paths under the SDK are stored relative to it.
    fn collect_deps_for_serialization(
        &self,
        raw_deps: &[PathBuf],
    ) -> Result<Vec<FileDependency>, BuildError> {
        let hash_based = self.sub_invocation.serialize_dependency_hashes;
        let sdk_path = &self.sub_invocation.sdk_path;

        let mut initial: Vec<&Path> = raw_deps.iter().map(PathBuf::as_path).collect();
        initial.push(&self.interface_path);

        // Dedup on the original, unrewritten path.
        let mut seen: HashSet<PathBuf> = HashSet::new();
        let mut deps = Vec::new();

        for dep_path in initial {
            if !seen.insert(dep_path.to_path_buf()) {
                continue;
            }
            let (stored_path, sdk_relative) = rewrite_sdk_relative(dep_path, sdk_path);
            if let Some(tracker) = self.tracker {
                tracker.add_dependency(dep_path, sdk_relative);
            }

            // A dependency that is itself a cached binary module gets its
            // embedded dependencies spliced in in its place.
            if self.is_cached_module(dep_path) {
                let bytes = self.read_dependency(dep_path)?;
                let Some(header) = validate_serialized_module(&bytes) else {
                    self.diags.emit(
                        Diagnostic::error(
                            diag::MALFORMED_CACHED_MODULE,
                            format!(
                                "could not extract dependencies from cached module {}",
                                dep_path.display()
                            ),
                        )
                        .with_file(&self.interface_path),
                    );
                    return Err(BuildError::MalformedDependency {
                        path: dep_path.to_path_buf(),
                    });
                };
                for sub_dep in header.dependencies {
                    if seen.insert(PathBuf::from(&sub_dep.path)) {
                        if let Some(tracker) = self.tracker {
                            tracker.add_dependency(Path::new(&sub_dep.path), sub_dep.sdk_relative);
                        }
                        deps.push(sub_dep);
                    }
                }
                continue;
            }

            let metadata = fs::metadata(dep_path).map_err(|_| {
                self.diags.emit(
                    Diagnostic::error(
                        diag::MISSING_DEPENDENCY,
                        format!("missing dependency {}", dep_path.display()),
                    )
                    .with_file(&self.interface_path),
                );
                BuildError::MissingDependency {
                    path: dep_path.to_path_buf(),
                }
            })?;

            let stored = stored_path.to_string_lossy().into_owned();
            if hash_based {
                let bytes = self.read_dependency(dep_path)?;
                deps.push(FileDependency::hash_based(
                    stored,
                    sdk_relative,
                    metadata.len(),
                    ContentHash::from_bytes(&bytes),
                ));
            } else {
                deps.push(FileDependency::mod_time_based(
                    stored,
                    sdk_relative,
                    metadata.len(),
                    mod_time_ticks(&metadata),
                ));
            }
        }
        Ok(deps)
    }

    /// Whether a dependency is a binary module inside either cache.
    fn is_cached_module(&self, dep_path: &Path) -> bool {
        let is_module = dep_path
            .extension()
            .is_some_and(|ext| ext == BINARY_MODULE_EXTENSION);
        if !is_module {
            return false;
        }
        let in_user_cache = !self.module_cache_path.as_os_str().is_empty()
            && dep_path.starts_with(&self.module_cache_path);
        let in_prebuilt_cache = self
            .prebuilt_cache_path
            .as_deref()
            .is_some_and(|p| dep_path.starts_with(p));
        in_user_cache || in_prebuilt_cache
    }

    fn read_dependency(&self, dep_path: &Path) -> Result<Vec<u8>, BuildError> {
        fs::read(dep_path).map_err(|_| {
            self.diags.emit(
                Diagnostic::error(
                    diag::MISSING_DEPENDENCY,
                    format!("missing dependency {}", dep_path.display()),
                )
                .with_file(&self.interface_path),
            );
            BuildError::MissingDependency {
                path: dep_path.to_path_buf(),
            }
        })
    }
}

/// Splits a dependency path into its stored form and SDK-relative flag.
///
/// Matching is component-wise, so a sibling like `<sdk>X.h` stays absolute
/// and a trailing separator on the SDK root makes no difference.
fn rewrite_sdk_relative<'p>(dep_path: &'p Path, sdk_path: &Path) -> (&'p Path, bool) {
    if sdk_path.as_os_str().len() > 1 {
        if let Ok(suffix) = dep_path.strip_prefix(sdk_path) {
            if !suffix.as_os_str().is_empty() {
                return (suffix, true);
            }
        }
    }
    (dep_path, false)
}
