//! CLI command definitions and execution
//!
//! This module contains all CLI commands and their implementations. Every
//! storage command resolves a profile, binds its configuration to a
//! [`Storage`] engine backed by S3 and reports failures through the shared
//! exit-code mapping.

use std::collections::HashMap;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use stowage_core::{Error, ProfileManager, Storage};
use stowage_s3::S3Connector;
use tracing::debug;

use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

mod cat;
mod completions;
mod cp;
mod find;
mod get;
mod ls;
mod profile;
mod put;
mod rm;
mod share;
mod stat;

/// stow - object storage convenience CLI
///
/// Path-style addressing, recursive listing, search and tree mirroring for
/// S3-compatible object storage. Paths have the form `container/key`; a
/// trailing `/` names a directory.
#[derive(Parser, Debug)]
#[command(name = "stow")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Profile to use (defaults to the configured default profile)
    #[arg(short, long, global = true, env = "STOWAGE_PROFILE")]
    pub profile: Option<String>,

    /// Output format: human-readable or JSON
    #[arg(long, global = true, default_value = "false")]
    pub json: bool,

    /// Disable colored output
    #[arg(long, global = true, default_value = "false")]
    pub no_color: bool,

    /// Disable progress spinners
    #[arg(long, global = true, default_value = "false")]
    pub no_progress: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true, default_value = "false")]
    pub quiet: bool,

    /// Enable debug logging
    #[arg(long, global = true, default_value = "false")]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage connection profiles
    #[command(subcommand)]
    Profile(profile::ProfileCommands),

    /// List objects
    Ls(ls::LsArgs),

    /// Find objects by key pattern or metadata
    Find(find::FindArgs),

    /// Display object contents
    Cat(cat::CatArgs),

    /// Download an object or a directory tree
    Get(get::GetArgs),

    /// Upload a local file, a local directory or literal text
    Put(put::PutArgs),

    /// Remove an object
    Rm(rm::RmArgs),

    /// Server-side copy
    Cp(cp::CpArgs),

    /// Generate a pre-signed download URL
    Share(share::ShareArgs),

    /// Show object metadata
    Stat(stat::StatArgs),

    /// Generate shell completion scripts
    Completions(completions::CompletionsArgs),
}

/// Execute the CLI command and return an exit code
pub async fn execute(cli: Cli) -> ExitCode {
    let output_config = OutputConfig {
        json: cli.json,
        no_color: cli.no_color,
        no_progress: cli.no_progress,
        quiet: cli.quiet,
    };
    let profile = cli.profile.as_deref();

    match cli.command {
        Commands::Profile(cmd) => profile::execute(cmd, output_config).await,
        Commands::Ls(args) => ls::execute(args, profile, output_config).await,
        Commands::Find(args) => find::execute(args, profile, output_config).await,
        Commands::Cat(args) => cat::execute(args, profile, output_config).await,
        Commands::Get(args) => get::execute(args, profile, output_config).await,
        Commands::Put(args) => put::execute(args, profile, output_config).await,
        Commands::Rm(args) => rm::execute(args, profile, output_config).await,
        Commands::Cp(args) => cp::execute(args, profile, output_config).await,
        Commands::Share(args) => share::execute(args, profile, output_config).await,
        Commands::Stat(args) => stat::execute(args, profile, output_config).await,
        Commands::Completions(args) => completions::execute(args),
    }
}

/// Build the engine for a profile, reporting failures
fn open_storage(profile: Option<&str>, formatter: &Formatter) -> Result<Storage, ExitCode> {
    let resolved = ProfileManager::new().and_then(|manager| manager.resolve(profile));
    match resolved {
        Ok(profile) => {
            debug!(
                profile = %profile.name,
                endpoint = profile.client.endpoint.as_deref().unwrap_or("default"),
                "using profile"
            );
            Ok(Storage::with_instance_config(Arc::new(S3Connector), profile.client))
        }
        Err(e) => Err(report(formatter, "Failed to load profile", &e)),
    }
}

/// Print an error and map it to its exit code
fn report(formatter: &Formatter, context: &str, err: &Error) -> ExitCode {
    let code = ExitCode::from_error(err);
    debug!(context, error = ?err, code = code.as_i32(), "command failed");
    formatter.error(&format!("{context}: {err}"));
    code
}

/// Parse repeated `key=value` arguments
fn parse_pairs(pairs: &[String]) -> Result<HashMap<String, String>, String> {
    pairs
        .iter()
        .map(|pair| match pair.split_once('=') {
            Some((key, value)) if !key.trim().is_empty() => {
                Ok((key.trim().to_string(), value.to_string()))
            }
            _ => Err(format!("Invalid metadata '{pair}': expected key=value")),
        })
        .collect()
}
