//! # mp-cli
//!
//! Operator tooling for module policy manifests.
//!
//! - `mpolicy check` — validate a policy file
//! - `mpolicy integrity` — assert a file's integrity against a policy
//! - `mpolicy resolve` — show where a policy sends an import
//! - `mpolicy digest` — print an SRI string for writing policies

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use mp_integrity::Algorithm;
use mp_manifest::ManifestOptions;
use tracing_subscriber::EnvFilter;

/// Module policy manifests — check, verify, and resolve.
#[derive(Parser)]
#[command(name = "mpolicy", version, about)]
struct Cli {
    /// With `onerror: "exit"`, abort the process instead of exiting with status 1.
    #[arg(long, global = true)]
    abort_on_uncaught_exception: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a policy file and summarize its entries.
    Check {
        /// Path to the policy JSON file.
        policy: PathBuf,
        /// Print the summary as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Assert a file's integrity against a policy.
    Integrity {
        /// Path to the policy JSON file.
        policy: PathBuf,
        /// File whose contents are checked.
        file: PathBuf,
        /// Address to check the contents under (defaults to the file's URL).
        #[arg(long)]
        url: Option<String>,
    },
    /// Resolve an import made by a requester.
    Resolve {
        /// Path to the policy JSON file.
        policy: PathBuf,
        /// Importing module, as a URL or file path.
        requester: String,
        /// The import specifier.
        specifier: String,
        /// Active condition (repeatable), e.g. --condition node --condition import.
        #[arg(long = "condition")]
        conditions: Vec<String>,
    },
    /// Print the SRI string for a file.
    Digest {
        /// File to hash.
        file: PathBuf,
        /// Hash algorithm.
        #[arg(long, default_value = "sha384")]
        algorithm: Algorithm,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("mp_manifest=info".parse()?)
                .add_directive("mpolicy=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let cli = Cli::parse();
    let options = ManifestOptions::default().with_abort_on_exit(cli.abort_on_uncaught_exception);

    match &cli.command {
        Commands::Check { policy, json } => commands::check::execute(policy, *json, &options),
        Commands::Integrity { policy, file, url } => {
            commands::integrity::execute(policy, file, url.as_deref(), &options)
        }
        Commands::Resolve {
            policy,
            requester,
            specifier,
            conditions,
        } => commands::resolve::execute(policy, requester, specifier, conditions, &options),
        Commands::Digest { file, algorithm } => commands::digest::execute(file, *algorithm),
    }
}
