//! Loads Quill modules from textual interface files.
//!
//! A module interface (`.qi`) is a source-like description of a module's
//! public surface. This crate turns an interface into a loadable binary
//! module (`.qmod`) buffer, consulting — in order — the writable user cache,
//! the read-only prebuilt cache shipped with the platform, and any binary
//! module sitting next to the interface, before falling back to compiling
//! the interface with a subordinate frontend invocation and caching the
//! result.
//!
//! Cache entries record the files they were built from; an entry is only
//! reused while every recorded dependency still matches the filesystem by
//! size and modification time (or content hash). Modules discovered in the
//! prebuilt cache are pinned into the user cache through small textual
//! "forwarding modules" that carry their own dependency snapshots.

#![warn(missing_docs)]

pub mod builder;
pub mod cache_key;
pub mod dependency;
pub mod diag;
pub mod discovery;
pub mod error;
pub mod forwarding;
pub mod freshness;
pub mod interface;
pub mod invocation;
pub mod loader;
pub mod serialization;
pub mod tracker;

/// Traits implemented by the compiler driver that performs sub-compilations.
pub mod frontend;

pub use builder::ModuleBuilder;
pub use dependency::{DependencyVerifier, FileDependency};
pub use discovery::{DiscoveredModule, LoadMode, ModuleDiscovery};
pub use error::{BuildError, LoadError};
pub use forwarding::ForwardingModule;
pub use freshness::FreshnessChecker;
pub use frontend::{FrontendInstance, ModuleFrontend};
pub use interface::FormatVersion;
pub use invocation::{HostContext, SubInvocation};
pub use loader::{build_module_from_interface, FoundModule, ModuleLoader};
pub use tracker::{CollectingTracker, DependencyTracker};

/// File extension of textual module interface files.
pub const INTERFACE_EXTENSION: &str = "qi";

/// File extension of compiled binary modules.
pub const BINARY_MODULE_EXTENSION: &str = "qmod";

/// File extension of module documentation sidecars.
pub const MODULE_DOC_EXTENSION: &str = "qdoc";
