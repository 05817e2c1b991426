//! cat command - Display object contents
//!
//! Streams the object body to stdout unchanged, so binary objects survive.

use clap::Args;
use stowage_core::resolve;

use super::{open_storage, report};
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

/// Display object contents
#[derive(Args, Debug)]
pub struct CatArgs {
    /// Object path (container/key)
    pub path: String,
}

/// Execute the cat command
pub async fn execute(args: CatArgs, profile: Option<&str>, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config);

    if !resolve(&args.path).is_complete() {
        formatter.error(&format!(
            "Invalid path '{}': expected container/key",
            args.path
        ));
        return ExitCode::UsageError;
    }

    let storage = match open_storage(profile, &formatter) {
        Ok(s) => s,
        Err(code) => return code,
    };

    let mut reader = match storage.download_stream(&args.path).await {
        Ok(r) => r,
        Err(e) => return report(&formatter, "Failed to get object", &e),
    };

    let mut stdout = tokio::io::stdout();
    if let Err(e) = tokio::io::copy(&mut reader, &mut stdout).await {
        formatter.error(&format!("Failed to write to stdout: {e}"));
        return ExitCode::GeneralError;
    }

    ExitCode::Success
}
