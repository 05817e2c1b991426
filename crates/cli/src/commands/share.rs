//! share command - Generate a pre-signed download URL

use std::time::Duration;

use clap::Args;
use serde::Serialize;
use stowage_core::resolve;

use super::{open_storage, report};
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

/// Longest lifetime S3 accepts for a pre-signed URL
const MAX_EXPIRY: Duration = Duration::from_secs(7 * 24 * 3600);

/// Generate a pre-signed URL
#[derive(Args, Debug)]
pub struct ShareArgs {
    /// Object path (container/key)
    pub path: String,

    /// Lifetime of the URL, e.g. 90s, 30m, 12h, 7d (default: 1h)
    #[arg(long, value_parser = parse_expiry)]
    pub expires: Option<Duration>,
}

#[derive(Debug, Serialize)]
struct ShareOutput {
    path: String,
    url: String,
    expires_secs: u64,
}

/// Parse a lifetime such as `3600`, `90s`, `30m`, `12h` or `7d`
fn parse_expiry(value: &str) -> Result<Duration, String> {
    let value = value.trim();
    let (digits, unit) = match value.find(|c: char| !c.is_ascii_digit()) {
        Some(pos) => value.split_at(pos),
        None => (value, "s"),
    };
    let amount: u64 = digits
        .parse()
        .map_err(|_| format!("Invalid expiry '{value}'"))?;
    let secs = match unit {
        "s" => amount,
        "m" => amount * 60,
        "h" => amount * 3600,
        "d" => amount * 86_400,
        _ => return Err(format!("Invalid expiry unit in '{value}': use s, m, h or d")),
    };
    let expiry = Duration::from_secs(secs);
    if expiry.is_zero() || expiry > MAX_EXPIRY {
        return Err(format!("Expiry must be between 1s and 7d, got '{value}'"));
    }
    Ok(expiry)
}

/// Execute the share command
pub async fn execute(args: ShareArgs, profile: Option<&str>, output_config: OutputConfig) -> ExitCode {
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

    let expires = args.expires.unwrap_or(stowage_core::storage::DEFAULT_PRESIGN_EXPIRY);
    match storage.presigned_url(&args.path, Some(expires)).await {
        Ok(Some(url)) => {
            if formatter.is_json() {
                formatter.json(&ShareOutput {
                    path: args.path,
                    url,
                    expires_secs: expires.as_secs(),
                });
            } else {
                formatter.println(&url);
            }
            ExitCode::Success
        }
        Ok(None) => ExitCode::UsageError,
        Err(e) => report(&formatter, "Failed to generate URL", &e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_expiry_units() {
        assert_eq!(parse_expiry("3600").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_expiry("90s").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_expiry("30m").unwrap(), Duration::from_secs(1800));
        assert_eq!(parse_expiry("12h").unwrap(), Duration::from_secs(43_200));
        assert_eq!(parse_expiry("7d").unwrap(), MAX_EXPIRY);
    }

    #[test]
    fn test_parse_expiry_rejects_bad_input() {
        assert!(parse_expiry("").is_err());
        assert!(parse_expiry("0").is_err());
        assert!(parse_expiry("8d").is_err());
        assert!(parse_expiry("5w").is_err());
        assert!(parse_expiry("h").is_err());
    }
}
