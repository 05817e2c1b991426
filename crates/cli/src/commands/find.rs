//! find command - Search objects by key pattern or metadata
//!
//! Pattern search is a case-insensitive regular expression over keys.
//! Metadata search keeps objects whose user metadata contains every given
//! `key=value` pair.

use clap::Args;
use serde::Serialize;
use stowage_core::{ListedObject, SearchPredicate};

use super::ls::format_line;
use super::{open_storage, parse_pairs, report};
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig, ProgressBar};

/// Find objects
#[derive(Args, Debug)]
pub struct FindArgs {
    /// Path to search below (container[/prefix])
    pub path: String,

    /// Case-insensitive regular expression matched against keys
    #[arg(long, conflicts_with = "meta", required_unless_present = "meta")]
    pub pattern: Option<String>,

    /// Metadata pair that must match (repeatable)
    #[arg(long, value_name = "KEY=VALUE")]
    pub meta: Vec<String>,

    /// Stop after the first match
    #[arg(long)]
    pub first: bool,
}

#[derive(Debug, Serialize)]
struct FindOutput {
    matches: Vec<ListedObject>,
}

fn predicate(args: &FindArgs) -> Result<SearchPredicate, String> {
    match &args.pattern {
        Some(pattern) => SearchPredicate::pattern(pattern).map_err(|e| e.to_string()),
        None => Ok(SearchPredicate::metadata(parse_pairs(&args.meta)?)),
    }
}

/// Execute the find command
pub async fn execute(args: FindArgs, profile: Option<&str>, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config.clone());

    let predicate = match predicate(&args) {
        Ok(p) => p,
        Err(e) => {
            formatter.error(&e);
            return ExitCode::UsageError;
        }
    };

    let storage = match open_storage(profile, &formatter) {
        Ok(s) => s,
        Err(code) => return code,
    };

    let spinner = ProgressBar::spinner(&output_config, &format!("Searching {}", args.path));
    let result = if args.first {
        storage
            .find_object(&args.path, &predicate)
            .await
            .map(|found| found.into_iter().collect::<Vec<_>>())
    } else {
        storage.find_objects(&args.path, &predicate, false).await
    };
    spinner.finish_and_clear();

    let mut matches = match result {
        Ok(m) => m,
        Err(e) => return report(&formatter, "Search failed", &e),
    };
    matches.sort_by(|a, b| a.key.cmp(&b.key));

    if formatter.is_json() {
        formatter.json(&FindOutput { matches });
    } else if matches.is_empty() {
        formatter.println("No matching objects.");
    } else {
        for item in &matches {
            formatter.println(&format_line(item));
        }
    }

    ExitCode::Success
}
