//! rm command - Remove an object
//!
//! Removing an object that does not exist is not an error.

use clap::Args;
use serde::Serialize;
use stowage_core::{Receipt, resolve};

use super::{open_storage, report};
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

/// Remove an object
#[derive(Args, Debug)]
pub struct RmArgs {
    /// Object path (container/key)
    pub path: String,
}

#[derive(Debug, Serialize)]
struct RmOutput {
    path: String,
    deleted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    receipt: Option<Receipt>,
}

/// Execute the rm command
pub async fn execute(args: RmArgs, profile: Option<&str>, output_config: OutputConfig) -> ExitCode {
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

    let receipt = match storage.delete_if_exists(&args.path).await {
        Ok(r) => r,
        Err(e) => return report(&formatter, "Failed to remove object", &e),
    };

    if formatter.is_json() {
        formatter.json(&RmOutput {
            path: args.path,
            deleted: receipt.is_some(),
            receipt,
        });
    } else if receipt.is_some() {
        formatter.success(&format!("Removed {}", args.path));
    } else {
        formatter.warning(&format!("{} does not exist", args.path));
    }

    ExitCode::Success
}
