//! The `key` subcommand: compute cache keys without touching the cache.

use clap::Parser;
use quill_loader::cache_key::{cache_key, cached_output_path};
use quill_loader::{HostContext, SubInvocation};
use std::path::PathBuf;

/// Arguments for the `key` subcommand.
#[derive(Parser, Debug)]
pub struct KeyArgs {
    /// Path to the module interface (`.qi`).
    pub interface: PathBuf,

    /// Module name; defaults to the interface's file stem.
    #[arg(long)]
    pub module_name: Option<String>,

    /// User cache directory the entry would live in.
    #[arg(long, default_value = ".")]
    pub cache_dir: PathBuf,

    /// SDK root of the invocation; empty for none.
    #[arg(long, default_value = "")]
    pub sdk: PathBuf,

    /// Target triple of the invocation.
    #[arg(long, default_value = "x86_64-unknown-linux")]
    pub target: String,

    /// Toolchain version string participating in the key.
    #[arg(long, default_value = concat!("quill-", env!("CARGO_PKG_VERSION")))]
    pub toolchain_version: String,

    /// Compute the key of an invocation that tracks system dependencies.
    #[arg(long)]
    pub track_system_deps: bool,
}

/// Prints the cache key and the cache entry path for an interface.
pub fn run(args: &KeyArgs) -> bool {
    let module_name = match &args.module_name {
        Some(name) => name.clone(),
        None => match args.interface.file_stem().and_then(|s| s.to_str()) {
            Some(stem) => stem.to_string(),
            None => {
                eprintln!(
                    "error: cannot derive a module name from {}",
                    args.interface.display()
                );
                return false;
            }
        },
    };

    let host = HostContext {
        toolchain_version: args.toolchain_version.clone(),
        target_triple: args.target.clone(),
        sdk_path: args.sdk.clone(),
        ..HostContext::default()
    };
    let mut invocation = SubInvocation::inherited(
        &host,
        &module_name,
        &args.cache_dir,
        None,
        args.track_system_deps,
        false,
    );
    invocation.primary_input = args.interface.clone();

    println!("{}", cache_key(&invocation));
    println!(
        "{}",
        cached_output_path(&args.cache_dir, &module_name, &invocation).display()
    );
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(interface: &str) -> KeyArgs {
        KeyArgs {
            interface: PathBuf::from(interface),
            module_name: None,
            cache_dir: PathBuf::from("/cache"),
            sdk: PathBuf::new(),
            target: "x86_64-unknown-linux".to_string(),
            toolchain_version: "quill-0.1.0".to_string(),
            track_system_deps: false,
        }
    }

    #[test]
    fn run_succeeds_for_plain_interface() {
        assert!(run(&args("/src/Foo.qi")));
    }

    #[test]
    fn run_fails_without_derivable_name() {
        assert!(!run(&args("/")));
    }
}
