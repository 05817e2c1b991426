//! ls command - List objects
//!
//! Lists one level below a path, or the whole tree with `--recursive`.
//! Directory markers are never shown.

use clap::Args;
use serde::Serialize;
use stowage_core::ListedObject;
use stowage_core::listing::DEFAULT_DELIMITER;

use super::{open_storage, report};
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig, ProgressBar};

/// List objects
#[derive(Args, Debug)]
pub struct LsArgs {
    /// Path (container[/prefix]); a trailing '/' lists inside a directory
    pub path: String,

    /// List recursively
    #[arg(short, long)]
    pub recursive: bool,

    /// Summarize output (show totals only)
    #[arg(long)]
    pub summarize: bool,
}

/// Output structure for ls command (JSON format)
#[derive(Debug, Serialize)]
struct LsOutput {
    items: Vec<ListedObject>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<Summary>,
}

#[derive(Debug, Serialize)]
struct Summary {
    total_objects: usize,
    total_size_bytes: i64,
    total_size_human: String,
}

impl Summary {
    fn of(items: &[ListedObject]) -> Self {
        let total_size: i64 = items.iter().map(|i| i.size).sum();
        Self {
            total_objects: items.len(),
            total_size_bytes: total_size,
            total_size_human: humansize::format_size(total_size.max(0) as u64, humansize::BINARY),
        }
    }
}

/// One human-readable listing line
pub(super) fn format_line(item: &ListedObject) -> String {
    let date = item
        .last_modified
        .map(|d| d.strftime("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| " ".repeat(19));
    let size = humansize::format_size(item.size.max(0) as u64, humansize::BINARY);
    format!("[{date}] {size:>10} {}/{}", item.container, item.key)
}

/// Execute the ls command
pub async fn execute(args: LsArgs, profile: Option<&str>, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config.clone());
    let storage = match open_storage(profile, &formatter) {
        Ok(s) => s,
        Err(code) => return code,
    };

    let spinner = ProgressBar::spinner(&output_config, &format!("Listing {}", args.path));
    let result = storage
        .list_objects(&args.path, Some(DEFAULT_DELIMITER), args.recursive)
        .await;
    spinner.finish_and_clear();

    let mut items = match result {
        Ok(items) => items,
        Err(e) => return report(&formatter, "Failed to list objects", &e),
    };
    // Recursive branches finish in any order.
    items.sort_by(|a, b| a.key.cmp(&b.key));

    if formatter.is_json() {
        let summary = args.summarize.then(|| Summary::of(&items));
        formatter.json(&LsOutput { items, summary });
    } else if args.summarize {
        let summary = Summary::of(&items);
        formatter.println(&format!(
            "Total: {} objects, {}",
            summary.total_objects, summary.total_size_human
        ));
    } else {
        for item in &items {
            formatter.println(&format_line(item));
        }
    }

    ExitCode::Success
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary() {
        let items = vec![
            ListedObject::new("bucket", "a", 1024),
            ListedObject::new("bucket", "b", 1024),
        ];
        let summary = Summary::of(&items);
        assert_eq!(summary.total_objects, 2);
        assert_eq!(summary.total_size_bytes, 2048);
        assert_eq!(summary.total_size_human, "2 KiB");
    }

    #[test]
    fn test_format_line_without_date() {
        let line = format_line(&ListedObject::new("bucket", "dir/a.txt", 0));
        assert!(line.starts_with("[                   ]"));
        assert!(line.ends_with("bucket/dir/a.txt"));
    }
}
