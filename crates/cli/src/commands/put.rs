//! put command - Upload a local file, a local directory or literal text
//!
//! A local directory is mirrored below the destination path. A local file is
//! uploaded as-is. Anything else is stored as literal text.

use clap::Args;
use serde::Serialize;
use stowage_core::{Acl, Receipt, UploadOptions, resolve};

use super::{open_storage, parse_pairs, report};
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig, ProgressBar};

/// Upload objects
#[derive(Args, Debug)]
pub struct PutArgs {
    /// Destination path (container/key, or container[/prefix] for a directory)
    pub path: String,

    /// Local file or directory, or literal content
    pub source: String,

    /// User metadata (repeatable)
    #[arg(long, value_name = "KEY=VALUE")]
    pub meta: Vec<String>,

    /// Canned ACL (private, public-read, ...)
    #[arg(long, default_value = "private")]
    pub acl: Acl,

    /// Content type (guessed from the key when omitted)
    #[arg(long)]
    pub content_type: Option<String>,
}

#[derive(Debug, Serialize)]
struct PutOutput {
    uploaded: Vec<Receipt>,
}

fn upload_options(args: &PutArgs) -> Result<UploadOptions, String> {
    Ok(UploadOptions {
        metadata: parse_pairs(&args.meta)?,
        acl: args.acl,
        content_type: args.content_type.clone(),
    })
}

/// Execute the put command
pub async fn execute(args: PutArgs, profile: Option<&str>, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config.clone());

    let opts = match upload_options(&args) {
        Ok(o) => o,
        Err(e) => {
            formatter.error(&e);
            return ExitCode::UsageError;
        }
    };

    if resolve(&args.path).container.is_empty() {
        formatter.error("Destination path must name a container");
        return ExitCode::UsageError;
    }

    let storage = match open_storage(profile, &formatter) {
        Ok(s) => s,
        Err(code) => return code,
    };

    let spinner = ProgressBar::spinner(&output_config, &format!("Uploading to {}", args.path));
    let result = storage.upload(&args.path, &args.source, &opts).await;
    spinner.finish_and_clear();

    let mut uploaded = match result {
        Ok(receipts) => receipts,
        Err(e) => return report(&formatter, "Upload failed", &e),
    };
    uploaded.sort_by(|a, b| a.key.cmp(&b.key));

    if formatter.is_json() {
        formatter.json(&PutOutput { uploaded });
    } else {
        for receipt in &uploaded {
            formatter.println(&format!("{}/{}", receipt.container, receipt.key));
        }
        if uploaded.is_empty() {
            formatter.warning("Nothing uploaded: a file or literal needs a container/key destination");
        } else {
            formatter.success(&format!("Uploaded {} object(s)", uploaded.len()));
        }
    }

    ExitCode::Success
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        args: PutArgs,
    }

    #[test]
    fn test_upload_options_from_args() {
        let harness = Harness::try_parse_from([
            "put",
            "bucket/a.txt",
            "hello",
            "--meta",
            "owner=ops",
            "--acl",
            "public-read",
        ])
        .unwrap();
        let opts = upload_options(&harness.args).unwrap();
        assert_eq!(opts.acl, Acl::PublicRead);
        assert_eq!(opts.metadata.get("owner").map(String::as_str), Some("ops"));
        assert!(opts.content_type.is_none());
    }

    #[test]
    fn test_unknown_acl_rejected() {
        let parsed = Harness::try_parse_from(["put", "bucket/a", "x", "--acl", "everyone"]);
        assert!(parsed.is_err());
    }
}
