//! get command - Download an object or a directory tree
//!
//! A path ending in '/' is treated as a directory: every object below it is
//! written under the destination directory, keeping relative keys.

use std::path::{Path, PathBuf};

use clap::Args;
use serde::Serialize;
use stowage_core::{Storage, is_directory, resolve};

use super::{open_storage, report};
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig, ProgressBar};

/// Download objects
#[derive(Args, Debug)]
pub struct GetArgs {
    /// Source path (container/key, or container/prefix/ for a tree)
    pub path: String,

    /// Local destination (file or directory)
    #[arg(default_value = ".")]
    pub dest: PathBuf,
}

#[derive(Debug, Serialize)]
struct GetOutput {
    source: String,
    files: Vec<PathBuf>,
}

/// Local file an object download lands in
fn target_file(key: &str, dest: &Path, dest_is_dir: bool) -> PathBuf {
    if dest_is_dir {
        dest.join(key.rsplit('/').next().unwrap_or(key))
    } else {
        dest.to_path_buf()
    }
}

async fn download_one(storage: &Storage, path: &str, target: &Path) -> stowage_core::Result<()> {
    let mut reader = storage.download_stream(path).await?;
    if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut file = tokio::fs::File::create(target).await?;
    tokio::io::copy(&mut reader, &mut file).await?;
    Ok(())
}

/// Execute the get command
pub async fn execute(args: GetArgs, profile: Option<&str>, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config.clone());
    let address = resolve(&args.path);
    let tree = is_directory(&args.path) || address.key.is_empty();

    if address.container.is_empty() {
        formatter.error("Source path must name a container");
        return ExitCode::UsageError;
    }

    let storage = match open_storage(profile, &formatter) {
        Ok(s) => s,
        Err(code) => return code,
    };

    let spinner = ProgressBar::spinner(&output_config, &format!("Downloading {}", args.path));
    let result = if tree {
        storage.download_tree(&args.path, &args.dest).await
    } else {
        let target = target_file(&address.key, &args.dest, args.dest.is_dir());
        download_one(&storage, &args.path, &target)
            .await
            .map(|()| vec![target])
    };
    spinner.finish_and_clear();

    let files = match result {
        Ok(files) => files,
        Err(e) => return report(&formatter, "Download failed", &e),
    };

    if formatter.is_json() {
        formatter.json(&GetOutput {
            source: args.path,
            files,
        });
    } else {
        for file in &files {
            formatter.println(&file.display().to_string());
        }
        formatter.success(&format!("Downloaded {} file(s)", files.len()));
    }

    ExitCode::Success
}
