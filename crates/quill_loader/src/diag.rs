//! Diagnostic codes emitted by the module-interface loader.

use quill_diagnostics::{Category, DiagnosticCode};

/// The interface file could not be opened.
pub const CANNOT_OPEN_INTERFACE: DiagnosticCode = DiagnosticCode::new(Category::Error, 301);

/// The format-version header is missing or appears more than once.
pub const CANNOT_EXTRACT_VERSION: DiagnosticCode = DiagnosticCode::new(Category::Error, 302);

/// The module-flags header is missing or appears more than once.
pub const CANNOT_EXTRACT_FLAGS: DiagnosticCode = DiagnosticCode::new(Category::Error, 303);

/// The interface declares a format major version this loader cannot build.
pub const UNSUPPORTED_FORMAT_VERSION: DiagnosticCode = DiagnosticCode::new(Category::Error, 304);

/// An embedded driver flag was not recognized or was missing its value.
pub const UNRECOGNIZED_FLAG: DiagnosticCode = DiagnosticCode::new(Category::Error, 305);

/// The interface's embedded module name differs from the requested module.
pub const MODULE_NAME_MISMATCH: DiagnosticCode = DiagnosticCode::new(Category::Error, 306);

/// Softer variant of [`MODULE_NAME_MISMATCH`] used under debugger support.
pub const MODULE_NAME_MISMATCH_DEBUGGER: DiagnosticCode =
    DiagnosticCode::new(Category::Warning, 306);

/// A recorded dependency of the interface could not be read or statted.
pub const MISSING_DEPENDENCY: DiagnosticCode = DiagnosticCode::new(Category::Error, 307);

/// A cached binary module's embedded dependency list could not be extracted.
pub const MALFORMED_CACHED_MODULE: DiagnosticCode = DiagnosticCode::new(Category::Error, 308);

/// The subordinate compilation failed or crashed.
pub const SUB_COMPILATION_FAILED: DiagnosticCode = DiagnosticCode::new(Category::Error, 309);

/// The built module could not be encoded or written to the cache.
pub const CANNOT_WRITE_MODULE: DiagnosticCode = DiagnosticCode::new(Category::Error, 310);
