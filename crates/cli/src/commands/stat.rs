//! stat command - Show object metadata
//!
//! Displays size, type, ETag, modification time and user metadata.

use clap::Args;
use serde::Serialize;
use stowage_core::{ObjectMetadata, resolve};

use super::{open_storage, report};
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

/// Show object metadata
#[derive(Args, Debug)]
pub struct StatArgs {
    /// Object path (container/key)
    pub path: String,
}

#[derive(Debug, Serialize)]
struct StatOutput {
    name: String,
    size_human: String,
    #[serde(flatten)]
    metadata: ObjectMetadata,
}

fn describe(metadata: &ObjectMetadata) -> Vec<String> {
    let mut lines = Vec::new();
    if let Some(modified) = metadata.last_modified {
        lines.push(format!(
            "Date      : {}",
            modified.strftime("%Y-%m-%d %H:%M:%S UTC")
        ));
    }
    lines.push(format!(
        "Size      : {} ({} bytes)",
        humansize::format_size(metadata.size.max(0) as u64, humansize::BINARY),
        metadata.size
    ));
    if let Some(etag) = &metadata.etag {
        lines.push(format!("ETag      : {etag}"));
    }
    if let Some(ct) = &metadata.content_type {
        lines.push(format!("Type      : {ct}"));
    }
    let mut pairs: Vec<_> = metadata.metadata.iter().collect();
    pairs.sort();
    for (key, value) in pairs {
        lines.push(format!("Metadata  : {key}={value}"));
    }
    lines
}

/// Execute the stat command
pub async fn execute(args: StatArgs, profile: Option<&str>, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config);

    let address = resolve(&args.path);
    if !address.is_complete() {
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

    match storage.stat(&args.path).await {
        Ok(metadata) => {
            if formatter.is_json() {
                formatter.json(&StatOutput {
                    name: address.to_string(),
                    size_human: humansize::format_size(metadata.size.max(0) as u64, humansize::BINARY),
                    metadata,
                });
            } else {
                formatter.println(&format!("Name      : {address}"));
                for line in describe(&metadata) {
                    formatter.println(&line);
                }
            }
            ExitCode::Success
        }
        Err(e) => report(&formatter, "Failed to stat object", &e),
    }
}
