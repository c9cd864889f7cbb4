//! Quill module-cache tooling — inspect what the module loader would do.
//!
//! Provides `quill-modcache key` for computing cache keys and entry paths,
//! `quill-modcache inspect` for validating serialized binary modules and
//! their recorded dependencies, and `quill-modcache forward` for examining
//! forwarding records in the user cache.

#![warn(missing_docs)]

mod forward;
mod inspect;
mod key;

use clap::{Parser, Subcommand};
use std::process;

/// Quill module cache tooling.
#[derive(Parser, Debug)]
#[command(name = "quill-modcache", version, about = "Quill module cache tooling")]
pub struct Cli {
    /// The subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Compute the cache key and entry path for a module interface.
    Key(key::KeyArgs),
    /// Validate a serialized binary module and report dependency freshness.
    Inspect(inspect::InspectArgs),
    /// Pretty-print a forwarding record and validate its snapshot.
    Forward(forward::ForwardArgs),
}

fn main() {
    let cli = Cli::parse();
    let ok = match cli.command {
        Command::Key(args) => key::run(&args),
        Command::Inspect(args) => inspect::run(&args),
        Command::Forward(args) => forward::run(&args),
    };
    if !ok {
        process::exit(1);
    }
}
