//! The `inspect` subcommand: validate a serialized module and its records.

use clap::Parser;
use quill_loader::serialization::{is_serialized_module, payload, validate_serialized_module};
use quill_loader::{FileDependency, FreshnessChecker};
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};

/// Arguments for the `inspect` subcommand.
#[derive(Parser, Debug)]
pub struct InspectArgs {
    /// Path to a serialized binary module (`.qmod`).
    pub module: PathBuf,

    /// SDK root used to resolve SDK-relative dependency records.
    #[arg(long, default_value = "")]
    pub sdk: PathBuf,

    /// Emit machine-readable JSON instead of text.
    #[arg(long)]
    pub json: bool,
}

fn dep_is_fresh(checker: &FreshnessChecker<'_>, dep: &FileDependency) -> bool {
    checker.deps_up_to_date(std::slice::from_ref(dep))
}

/// Validates a module file and reports its header and dependency freshness.
///
/// Returns `false` (exit code 1) if the file is not a valid serialized
/// module or any recorded dependency is stale.
pub fn run(args: &InspectArgs) -> bool {
    let bytes = match fs::read(&args.module) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("error: cannot read {}: {e}", args.module.display());
            return false;
        }
    };

    let Some(header) = validate_serialized_module(&bytes) else {
        if !is_serialized_module(&bytes) {
            eprintln!(
                "error: {} is not a serialized module (forwarding record? try `forward`)",
                args.module.display()
            );
        } else {
            eprintln!(
                "error: {} is corrupt or uses an unsupported format",
                args.module.display()
            );
        }
        return false;
    };

    let checker = FreshnessChecker::new(&args.sdk, None);
    let statuses: Vec<(&FileDependency, bool)> = header
        .dependencies
        .iter()
        .map(|dep| (dep, dep_is_fresh(&checker, dep)))
        .collect();
    let all_fresh = statuses.iter().all(|(_, fresh)| *fresh);

    if args.json {
        let report = json!({
            "module": header.module_name,
            "toolchain": header.toolchain_version,
            "format_version": header.format_version,
            "payload_bytes": payload(&bytes).map(<[u8]>::len).unwrap_or(0),
            "fresh": all_fresh,
            "dependencies": statuses.iter().map(|(dep, fresh)| json!({
                "path": dep.path,
                "sdk_relative": dep.sdk_relative,
                "size": dep.size,
                "kind": if dep.is_mod_time_based() { "mtime" } else { "hash" },
                "fresh": fresh,
            })).collect::<Vec<_>>(),
        });
        println!("{report:#}");
    } else {
        println!("module:    {}", header.module_name);
        println!("toolchain: {}", header.toolchain_version);
        println!("format:    {}", header.format_version);
        println!(
            "payload:   {} bytes",
            payload(&bytes).map(<[u8]>::len).unwrap_or(0)
        );
        println!("dependencies ({}):", statuses.len());
        for (dep, fresh) in &statuses {
            print_dependency(dep, *fresh);
        }
    }
    all_fresh
}

fn print_dependency(dep: &FileDependency, fresh: bool) {
    let marker = if fresh { "fresh" } else { "STALE" };
    let kind = if dep.is_mod_time_based() {
        "mtime"
    } else {
        "hash"
    };
    let origin = if dep.sdk_relative { " (sdk)" } else { "" };
    println!(
        "  [{marker}] {} ({kind}, {} bytes){origin}",
        Path::new(&dep.path).display(),
        dep.size
    );
}
