//! Host-supplied compilation state and the subordinate invocation built from it.
//!
//! The loader never consults process-wide state: everything it needs from the
//! enclosing compilation — search paths, the SDK root, the target — arrives
//! in a [`HostContext`]. A [`SubInvocation`] starts as a copy of that state
//! and is then specialized for one emit-module-only compile of an interface.

use crate::diag;
use quill_diagnostics::{Diagnostic, DiagnosticSink};
use std::path::{Path, PathBuf};

/// Marker error for a failed embedded-flag parse.
///
/// The offending flag is diagnosed through the sink; the error itself only
/// signals that parsing stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlagError;

/// Sentinel primary output path for sub-invocations.
///
/// The sub-compilation only produces the supplementary module output; a
/// non-writable main output surfaces any accidental use of it as an error.
pub const UNUSED_PRIMARY_OUTPUT: &str = "/<unused>";

/// Compilation state inherited from the enclosing compiler invocation.
///
/// Passed explicitly on construction so test doubles can inject their own
/// trees; an empty `sdk_path` means no SDK is in play.
#[derive(Clone, Debug, Default)]
pub struct HostContext {
    /// Build identity of the running toolchain (tag name or revision).
    pub toolchain_version: String,

    /// Target triple of the enclosing compilation.
    pub target_triple: String,

    /// SDK root directory; empty when compiling without an SDK.
    pub sdk_path: PathBuf,

    /// Module import search paths.
    pub import_search_paths: Vec<PathBuf>,

    /// Framework-style search paths.
    pub framework_search_paths: Vec<PathBuf>,

    /// Location of the toolchain's runtime resources.
    pub runtime_resource_path: PathBuf,

    /// Whether the host is serving a debugger session.
    pub debugger_support: bool,
}

/// Configuration for one subordinate emit-module-only compilation.
#[derive(Clone, Debug)]
pub struct SubInvocation {
    /// The module being compiled.
    pub module_name: String,

    /// Build identity inherited from the host.
    pub toolchain_version: String,

    /// Target triple inherited from the host.
    pub target_triple: String,

    /// SDK root inherited from the host; empty when absent.
    pub sdk_path: PathBuf,

    /// Import search paths inherited from the host.
    pub import_search_paths: Vec<PathBuf>,

    /// Framework search paths inherited from the host.
    pub framework_search_paths: Vec<PathBuf>,

    /// Runtime resource path inherited from the host.
    pub runtime_resource_path: PathBuf,

    /// The user module cache this sub-compilation writes into.
    pub module_cache_path: PathBuf,

    /// The read-only prebuilt module cache, if one is configured.
    pub prebuilt_cache_path: Option<PathBuf>,

    /// Whether SDK dependencies are reported to the dependency tracker.
    pub track_system_deps: bool,

    /// Whether dependencies are recorded with content hashes instead of
    /// modification times.
    pub serialize_dependency_hashes: bool,

    /// Warnings are suppressed in sub-compilations; the user editing an
    /// interface they do not own cannot act on them.
    pub suppress_warnings: bool,

    /// Inherited debugger-support flag; softens some diagnostics.
    pub debugger_support: bool,

    /// Emitted modules are always optimized for speed.
    pub optimize_for_speed: bool,

    /// The interface file being compiled.
    pub primary_input: PathBuf,

    /// The sentinel main output (see [`UNUSED_PRIMARY_OUTPUT`]).
    pub main_output: PathBuf,

    /// The supplementary module output path.
    pub module_output_path: PathBuf,
}

impl SubInvocation {
    /// Creates a sub-invocation inheriting search paths, SDK, target, and
    /// debugger support from the host context.
    pub fn inherited(
        host: &HostContext,
        module_name: &str,
        module_cache_path: &Path,
        prebuilt_cache_path: Option<&Path>,
        track_system_deps: bool,
        serialize_dependency_hashes: bool,
    ) -> Self {
        Self {
            module_name: module_name.to_string(),
            toolchain_version: host.toolchain_version.clone(),
            target_triple: host.target_triple.clone(),
            sdk_path: host.sdk_path.clone(),
            import_search_paths: host.import_search_paths.clone(),
            framework_search_paths: host.framework_search_paths.clone(),
            runtime_resource_path: host.runtime_resource_path.clone(),
            module_cache_path: module_cache_path.to_path_buf(),
            prebuilt_cache_path: prebuilt_cache_path.map(Path::to_path_buf),
            track_system_deps,
            serialize_dependency_hashes,
            suppress_warnings: true,
            debugger_support: host.debugger_support,
            optimize_for_speed: true,
            primary_input: PathBuf::new(),
            main_output: PathBuf::new(),
            module_output_path: PathBuf::new(),
        }
    }

    /// Points this invocation at an interface input and a module output.
    pub fn set_inputs_and_outputs(&mut self, interface_path: &Path, module_output: &Path) {
        self.primary_input = interface_path.to_path_buf();
        self.main_output = PathBuf::from(UNUSED_PRIMARY_OUTPUT);
        self.module_output_path = module_output.to_path_buf();
    }

    /// The architecture component of the target triple.
    pub fn target_arch(&self) -> &str {
        self.target_triple.split('-').next().unwrap_or("")
    }

    /// Parses driver flags embedded in an interface into this invocation.
    ///
    /// Recognizes the flag set interfaces are allowed to embed. Unrecognized
    /// flags and flags missing their value are diagnosed and fail the parse.
    pub fn parse_args(&mut self, args: &[String], diags: &DiagnosticSink) -> Result<(), FlagError> {
        let mut iter = args.iter();
        while let Some(arg) = iter.next() {
            let mut value_for = |flag: &str| {
                iter.next().cloned().ok_or_else(|| {
                    diags.emit(Diagnostic::error(
                        diag::UNRECOGNIZED_FLAG,
                        format!("flag {flag} is missing its value"),
                    ));
                    FlagError
                })
            };

            match arg.as_str() {
                "-module-name" => self.module_name = value_for("-module-name")?,
                "-target" => self.target_triple = value_for("-target")?,
                "-sdk" => self.sdk_path = PathBuf::from(value_for("-sdk")?),
                "-resource-dir" => {
                    self.runtime_resource_path = PathBuf::from(value_for("-resource-dir")?)
                }
                "-I" => self
                    .import_search_paths
                    .push(PathBuf::from(value_for("-I")?)),
                "-F" => self
                    .framework_search_paths
                    .push(PathBuf::from(value_for("-F")?)),
                "-track-system-dependencies" => self.track_system_deps = true,
                "-serialize-dependency-hashes" => self.serialize_dependency_hashes = true,
                other if other.starts_with("-I") && other.len() > 2 => {
                    self.import_search_paths.push(PathBuf::from(&other[2..]))
                }
                other if other.starts_with("-F") && other.len() > 2 => {
                    self.framework_search_paths.push(PathBuf::from(&other[2..]))
                }
                other => {
                    diags.emit(Diagnostic::error(
                        diag::UNRECOGNIZED_FLAG,
                        format!("unrecognized flag {other} embedded in module interface"),
                    ));
                    return Err(FlagError);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host() -> HostContext {
        HostContext {
            toolchain_version: "quill-0.1.0".to_string(),
            target_triple: "x86_64-unknown-linux".to_string(),
            sdk_path: PathBuf::from("/sdk"),
            import_search_paths: vec![PathBuf::from("/imports")],
            framework_search_paths: Vec::new(),
            runtime_resource_path: PathBuf::from("/toolchain/lib"),
            debugger_support: false,
        }
    }

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn inherited_copies_host_state() {
        let inv = SubInvocation::inherited(&host(), "Foo", Path::new("/cache"), None, false, false);
        assert_eq!(inv.module_name, "Foo");
        assert_eq!(inv.sdk_path, PathBuf::from("/sdk"));
        assert_eq!(inv.import_search_paths, vec![PathBuf::from("/imports")]);
        assert!(inv.suppress_warnings);
        assert!(inv.optimize_for_speed);
        assert!(inv.prebuilt_cache_path.is_none());
    }

    #[test]
    fn set_inputs_and_outputs() {
        let mut inv =
            SubInvocation::inherited(&host(), "Foo", Path::new("/cache"), None, false, false);
        inv.set_inputs_and_outputs(Path::new("/src/Foo.qi"), Path::new("/cache/Foo-k.qmod"));
        assert_eq!(inv.primary_input, PathBuf::from("/src/Foo.qi"));
        assert_eq!(inv.main_output, PathBuf::from(UNUSED_PRIMARY_OUTPUT));
        assert_eq!(inv.module_output_path, PathBuf::from("/cache/Foo-k.qmod"));
    }

    #[test]
    fn target_arch_extraction() {
        let mut inv =
            SubInvocation::inherited(&host(), "Foo", Path::new("/cache"), None, false, false);
        assert_eq!(inv.target_arch(), "x86_64");
        inv.target_triple = "aarch64-apple-darwin".to_string();
        assert_eq!(inv.target_arch(), "aarch64");
    }

    #[test]
    fn parse_args_updates_invocation() {
        let diags = DiagnosticSink::new();
        let mut inv =
            SubInvocation::inherited(&host(), "Foo", Path::new("/cache"), None, false, false);
        inv.parse_args(
            &args(&[
                "-module-name",
                "Bar",
                "-target",
                "aarch64-unknown-linux",
                "-I",
                "/extra",
                "-I/attached",
                "-serialize-dependency-hashes",
            ]),
            &diags,
        )
        .unwrap();
        assert_eq!(inv.module_name, "Bar");
        assert_eq!(inv.target_triple, "aarch64-unknown-linux");
        assert!(inv.import_search_paths.contains(&PathBuf::from("/extra")));
        assert!(inv
            .import_search_paths
            .contains(&PathBuf::from("/attached")));
        assert!(inv.serialize_dependency_hashes);
        assert!(!diags.has_errors());
    }

    #[test]
    fn parse_args_rejects_unknown_flag() {
        let diags = DiagnosticSink::new();
        let mut inv =
            SubInvocation::inherited(&host(), "Foo", Path::new("/cache"), None, false, false);
        assert!(inv.parse_args(&args(&["-frobnicate"]), &diags).is_err());
        assert!(diags.has_errors());
    }

    #[test]
    fn parse_args_rejects_missing_value() {
        let diags = DiagnosticSink::new();
        let mut inv =
            SubInvocation::inherited(&host(), "Foo", Path::new("/cache"), None, false, false);
        assert!(inv.parse_args(&args(&["-module-name"]), &diags).is_err());
        assert!(diags.has_errors());
    }
}
