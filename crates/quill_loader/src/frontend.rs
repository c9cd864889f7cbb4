//! The seam between the loader and the compiler driver.
//!
//! The loader never links the frontend directly: sub-compilations go through
//! these traits so the host compiler can plug in its real driver and tests
//! can plug in doubles. One [`FrontendInstance`] corresponds to one
//! emit-module-only compilation of a single interface.

use crate::invocation::SubInvocation;
use quill_diagnostics::DiagnosticSink;
use std::path::PathBuf;

/// Factory for subordinate compiler instances.
pub trait ModuleFrontend {
    /// Sets up a fresh compiler instance for the given invocation.
    ///
    /// Diagnostics emitted during setup and compilation go to `diags`, the
    /// parent's sink, so sub-compilation diagnostics surface unchanged.
    /// Returns `None` if setup itself fails.
    fn setup<'a>(
        &'a self,
        invocation: &SubInvocation,
        diags: &'a DiagnosticSink,
    ) -> Option<Box<dyn FrontendInstance + 'a>>;
}

/// One in-flight subordinate compilation.
///
/// The builder drives the instance through its phases in order: semantic
/// analysis, lowering, dependency collection, then the optimization
/// pipeline. The pipeline fires the serialization callback when the module
/// is ready to be written.
pub trait FrontendInstance {
    /// Runs semantic analysis over the interface.
    ///
    /// Returns `true` if any error was diagnosed.
    fn perform_sema(&mut self) -> bool;

    /// Lowers the checked module to the intermediate representation.
    ///
    /// Returns `true` on failure.
    fn lower(&mut self) -> bool;

    /// Every file this instance has read so far, in discovery order.
    ///
    /// Only meaningful after [`perform_sema`](Self::perform_sema).
    fn dependencies(&self) -> Vec<PathBuf>;

    /// Runs the optimization pipeline over the lowered module.
    ///
    /// `serialize` is invoked exactly once from inside the pipeline, on the
    /// same thread, with the payload bytes of the finished module. Returns
    /// `true` on failure; on failure the callback may not have fired.
    fn run_passes(&mut self, serialize: &mut dyn FnMut(&[u8])) -> bool;
}
