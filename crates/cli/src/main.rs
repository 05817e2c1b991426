//! stow - object storage convenience CLI
//!
//! A command-line interface over S3-compatible object storage with
//! path-style addressing, recursive listing, search and tree mirroring.

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use stowage_cli::commands::{self, Cli};
use stowage_cli::exit_code::ExitCode;

/// Install the log subscriber; `--debug` overrides `RUST_LOG`
fn init_tracing(debug: bool) -> anyhow::Result<()> {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init()
        .context("failed to install log subscriber")
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_tracing(cli.debug) {
        eprintln!("warning: {e:#}");
    }

    // Dropping the command future on Ctrl+C releases its open sessions.
    let exit_code = tokio::select! {
        code = commands::execute(cli) => code,
        Ok(()) = tokio::signal::ctrl_c() => {
            eprintln!("Interrupted");
            ExitCode::Interrupted
        }
    };

    std::process::exit(exit_code.as_i32());
}
