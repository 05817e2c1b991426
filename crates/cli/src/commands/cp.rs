//! cp command - Server-side copy
//!
//! Copies one object to another address without downloading it.

use clap::Args;
use stowage_core::resolve;

use super::{open_storage, report};
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

/// Copy an object
#[derive(Args, Debug)]
pub struct CpArgs {
    /// Source object (container/key)
    pub source: String,

    /// Destination object (container/key)
    pub target: String,
}

/// Execute the cp command
pub async fn execute(args: CpArgs, profile: Option<&str>, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config);

    for path in [&args.source, &args.target] {
        if !resolve(path).is_complete() {
            formatter.error(&format!("Invalid path '{path}': expected container/key"));
            return ExitCode::UsageError;
        }
    }

    let storage = match open_storage(profile, &formatter) {
        Ok(s) => s,
        Err(code) => return code,
    };

    match storage.copy(&args.source, &args.target).await {
        Ok(Some(receipt)) => {
            if formatter.is_json() {
                formatter.json(&receipt);
            } else {
                formatter.success(&format!("{} -> {}", args.source, args.target));
            }
            ExitCode::Success
        }
        Ok(None) => ExitCode::UsageError,
        Err(e) => report(&formatter, "Copy failed", &e),
    }
}
