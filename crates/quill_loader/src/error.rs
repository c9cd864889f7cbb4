//! Error types for module loading and building.

use crate::interface::{FormatVersion, InterfaceError};
use std::path::PathBuf;

/// Errors surfaced to callers of [`ModuleLoader::find_module`](crate::ModuleLoader::find_module).
///
/// `NotSupported` doubles as the "defer to the sibling binary-module loader"
/// sentinel: it means this loader declines the module without judging whether
/// another loader can handle it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum LoadError {
    /// No interface, binary module, or cache entry exists for this module.
    #[error("no module found for this interface")]
    NotFound,

    /// Another loader in the chain is responsible for this module.
    #[error("module load deferred to another loader")]
    NotSupported,

    /// Building the module from its interface failed.
    #[error("failed to build a loadable module from the interface")]
    InvalidArgument,
}

/// Failures raised while building a binary module from an interface.
///
/// Every variant is diagnosed through the [`DiagnosticSink`](quill_diagnostics::DiagnosticSink)
/// at the point of failure; the error value itself carries enough context for
/// programmatic callers.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// The interface file could not be opened.
    #[error("cannot open interface {path}: {source}")]
    OpenInterface {
        /// The interface path.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The interface's header lines are missing or unparseable.
    #[error(transparent)]
    MalformedInterface(#[from] InterfaceError),

    /// The interface declares a format major version this loader cannot build.
    #[error("unsupported interface format version {found}")]
    UnsupportedFormatVersion {
        /// The version declared by the interface.
        found: FormatVersion,
    },

    /// The flags embedded in the interface could not be parsed.
    #[error("invalid flags embedded in the interface")]
    InvalidFlags,

    /// The interface's embedded module name differs from the requested module.
    #[error("interface declares module {found}, expected {expected}")]
    ModuleNameMismatch {
        /// The module name the caller asked for.
        expected: String,
        /// The module name the interface's flags declare.
        found: String,
    },

    /// A dependency recorded during the sub-compilation no longer exists.
    #[error("missing dependency {path}")]
    MissingDependency {
        /// The dependency path.
        path: PathBuf,
    },

    /// A cached binary module's dependency list could not be extracted.
    #[error("could not extract dependencies from cached module {path}")]
    MalformedDependency {
        /// The cached module path.
        path: PathBuf,
    },

    /// The subordinate compilation diagnosed errors or crashed.
    #[error("sub-compilation failed")]
    SubCompilationFailed,

    /// The finished module could not be encoded.
    #[error("failed to encode the built module: {reason}")]
    Serialize {
        /// Description of the encoding failure.
        reason: String,
    },

    /// The finished module could not be written to the cache.
    #[error("failed to write the built module: {0}")]
    Write(std::io::Error),
}
