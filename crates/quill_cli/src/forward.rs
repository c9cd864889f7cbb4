//! The `forward` subcommand: examine forwarding records in the user cache.

use clap::Parser;
use quill_loader::forwarding::ForwardingModule;
use quill_loader::serialization::validate_serialized_module;
use quill_loader::FreshnessChecker;
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};

/// Arguments for the `forward` subcommand.
#[derive(Parser, Debug)]
pub struct ForwardArgs {
    /// Path to a forwarding record in the user cache.
    pub record: PathBuf,

    /// Emit machine-readable JSON instead of text.
    #[arg(long)]
    pub json: bool,
}

/// Parses a forwarding record and validates what it points at.
///
/// Returns `false` (exit code 1) if the record does not parse, the
/// underlying module is gone or invalid, or the snapshot is stale.
pub fn run(args: &ForwardArgs) -> bool {
    let bytes = match fs::read(&args.record) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("error: cannot read {}: {e}", args.record.display());
            return false;
        }
    };

    let fwd = match ForwardingModule::load(&bytes) {
        Ok(fwd) => fwd,
        Err(e) => {
            eprintln!("error: {e}");
            return false;
        }
    };

    let underlying_valid = fs::read(&fwd.path)
        .ok()
        .is_some_and(|buf| validate_serialized_module(&buf).is_some());

    // Snapshot entries are absolute mtime records; no SDK root is needed.
    let checker = FreshnessChecker::new(Path::new(""), None);
    let statuses: Vec<(String, bool)> = fwd
        .to_file_dependencies()
        .into_iter()
        .map(|dep| {
            let fresh = checker.deps_up_to_date(std::slice::from_ref(&dep));
            (dep.path, fresh)
        })
        .collect();
    let all_fresh = underlying_valid && statuses.iter().all(|(_, fresh)| *fresh);

    if args.json {
        let report = json!({
            "underlying": fwd.path,
            "underlying_valid": underlying_valid,
            "version": fwd.version,
            "fresh": all_fresh,
            "dependencies": statuses.iter().map(|(path, fresh)| json!({
                "path": path,
                "fresh": fresh,
            })).collect::<Vec<_>>(),
        });
        println!("{report:#}");
    } else {
        println!("underlying: {}", fwd.path);
        println!(
            "            {}",
            if underlying_valid {
                "valid serialized module"
            } else {
                "MISSING OR INVALID"
            }
        );
        println!("version:    {}", fwd.version);
        println!("snapshot ({}):", statuses.len());
        for (path, fresh) in &statuses {
            let marker = if *fresh { "fresh" } else { "STALE" };
            println!("  [{marker}] {}", Path::new(path).display());
        }
    }
    all_fresh
}
