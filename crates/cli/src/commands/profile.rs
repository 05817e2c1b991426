//! Profile management commands
//!
//! Profiles are named client configurations: credentials, region, endpoint,
//! encryption key and payload format.

use clap::Subcommand;
use serde::Serialize;
use stowage_core::{ClientConfig, Profile, ProfileManager, SerializationFormat};

use super::report;
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

/// Profile subcommands
#[derive(Subcommand, Debug)]
pub enum ProfileCommands {
    /// Add or update a profile
    Set(SetArgs),

    /// List all configured profiles
    List(ListArgs),

    /// Remove a profile
    Remove(RemoveArgs),
}

/// Arguments for the `profile set` command
#[derive(clap::Args, Debug)]
pub struct SetArgs {
    /// Profile name (e.g., "local", "prod")
    pub name: String,

    /// Access key ID
    #[arg(long, env = "STOWAGE_ACCESS_KEY_ID")]
    pub access_key: String,

    /// Secret access key
    #[arg(long, env = "STOWAGE_SECRET_ACCESS_KEY", hide_env_values = true)]
    pub secret_key: String,

    /// Region (default: us-east-1)
    #[arg(long, default_value = "us-east-1")]
    pub region: String,

    /// Custom endpoint URL for S3-compatible services
    #[arg(long)]
    pub endpoint: Option<String>,

    /// KMS key ID applied to every upload
    #[arg(long)]
    pub kms_key_id: Option<String>,

    /// Payload format for typed transfers: json or xml
    #[arg(long, default_value = "json")]
    pub format: SerializationFormat,

    /// Use path-style addressing
    #[arg(long, default_value = "false")]
    pub path_style: bool,

    /// Maximum concurrent requests for metadata search and tree transfers
    #[arg(long)]
    pub max_concurrency: Option<usize>,

    /// Make this the default profile
    #[arg(long, default_value = "false")]
    pub default: bool,
}

/// Arguments for the `profile list` command
#[derive(clap::Args, Debug)]
pub struct ListArgs {
    /// Show full details
    #[arg(short, long)]
    pub long: bool,
}

/// Arguments for the `profile remove` command
#[derive(clap::Args, Debug)]
pub struct RemoveArgs {
    /// Name of the profile to remove
    pub name: String,
}

/// Profile information for output (without secrets)
#[derive(Debug, Serialize)]
struct ProfileInfo {
    name: String,
    region: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    endpoint: Option<String>,
    format: SerializationFormat,
    path_style: bool,
    encrypted: bool,
    default: bool,
}

impl ProfileInfo {
    fn new(profile: &Profile, default: Option<&str>) -> Self {
        Self {
            name: profile.name.clone(),
            region: profile.client.region.clone(),
            endpoint: profile.client.endpoint.clone(),
            format: profile.client.serialization_format,
            path_style: profile.client.force_path_style,
            encrypted: profile.client.kms_key_id.is_some(),
            default: default == Some(profile.name.as_str()),
        }
    }
}

#[derive(Debug, Serialize)]
struct ProfileListOutput {
    profiles: Vec<ProfileInfo>,
}

#[derive(Debug, Serialize)]
struct ProfileOperationOutput {
    success: bool,
    profile: String,
}

/// Execute a profile subcommand
pub async fn execute(cmd: ProfileCommands, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config);
    let manager = match ProfileManager::new() {
        Ok(m) => m,
        Err(e) => return report(&formatter, "Failed to load configuration", &e),
    };

    match cmd {
        ProfileCommands::Set(args) => execute_set(args, &manager, &formatter),
        ProfileCommands::List(args) => execute_list(args, &manager, &formatter),
        ProfileCommands::Remove(args) => execute_remove(args, &manager, &formatter),
    }
}

fn client_config(args: &SetArgs) -> ClientConfig {
    let mut client = ClientConfig::new(&args.access_key, &args.secret_key)
        .with_region(&args.region)
        .with_format(args.format);
    if let Some(endpoint) = &args.endpoint {
        client = client.with_endpoint(endpoint);
    }
    if let Some(key_id) = &args.kms_key_id {
        client = client.with_kms_key_id(key_id);
    }
    if let Some(n) = args.max_concurrency {
        client = client.with_max_concurrency(n);
    }
    client.force_path_style = args.path_style;
    client
}

fn execute_set(args: SetArgs, manager: &ProfileManager, formatter: &Formatter) -> ExitCode {
    let profile = Profile::new(&args.name, client_config(&args));

    match manager.set(profile, args.default) {
        Ok(()) => {
            if formatter.is_json() {
                formatter.json(&ProfileOperationOutput {
                    success: true,
                    profile: args.name,
                });
            } else {
                formatter.success(&format!("Profile '{}' configured.", args.name));
            }
            ExitCode::Success
        }
        Err(e) => report(formatter, "Failed to save profile", &e),
    }
}

fn execute_list(args: ListArgs, manager: &ProfileManager, formatter: &Formatter) -> ExitCode {
    let default = manager.default_name().ok().flatten();
    let profiles = match manager.list() {
        Ok(p) => p,
        Err(e) => return report(formatter, "Failed to list profiles", &e),
    };
    let infos: Vec<ProfileInfo> = profiles
        .iter()
        .map(|p| ProfileInfo::new(p, default.as_deref()))
        .collect();

    if formatter.is_json() {
        formatter.json(&ProfileListOutput { profiles: infos });
    } else if infos.is_empty() {
        formatter.println("No profiles configured.");
    } else {
        for info in &infos {
            let marker = if info.default { "*" } else { " " };
            if args.long {
                formatter.println(&format!(
                    "{marker} {:<12} {} (region: {}, format: {:?}, path-style: {}, kms: {})",
                    info.name,
                    info.endpoint.as_deref().unwrap_or("aws"),
                    info.region,
                    info.format,
                    info.path_style,
                    info.encrypted,
                ));
            } else {
                formatter.println(&format!(
                    "{marker} {:<12} {}",
                    info.name,
                    info.endpoint.as_deref().unwrap_or("aws")
                ));
            }
        }
    }
    ExitCode::Success
}

fn execute_remove(args: RemoveArgs, manager: &ProfileManager, formatter: &Formatter) -> ExitCode {
    match manager.remove(&args.name) {
        Ok(()) => {
            if formatter.is_json() {
                formatter.json(&ProfileOperationOutput {
                    success: true,
                    profile: args.name,
                });
            } else {
                formatter.success(&format!("Profile '{}' removed.", args.name));
            }
            ExitCode::Success
        }
        Err(e) => report(formatter, "Failed to remove profile", &e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set_args() -> SetArgs {
        SetArgs {
            name: "local".into(),
            access_key: "ak".into(),
            secret_key: "s3cr3t".into(),
            region: "eu-central-1".into(),
            endpoint: Some("http://localhost:9000".into()),
            kms_key_id: None,
            format: SerializationFormat::Xml,
            path_style: true,
            max_concurrency: Some(4),
            default: false,
        }
    }

    #[test]
    fn test_client_config_from_args() {
        let client = client_config(&set_args());
        assert_eq!(client.region, "eu-central-1");
        assert_eq!(client.endpoint.as_deref(), Some("http://localhost:9000"));
        assert_eq!(client.serialization_format, SerializationFormat::Xml);
        assert!(client.force_path_style);
        assert_eq!(client.max_concurrency, 4);
    }

    #[test]
    fn test_profile_info_hides_secrets() {
        let profile = Profile::new("local", client_config(&set_args()));
        let info = ProfileInfo::new(&profile, Some("local"));
        assert!(info.default);

        let json = serde_json::to_string(&info).unwrap();
        assert!(!json.contains("s3cr3t"));
        assert!(json.contains("\"format\":\"xml\""));
    }
}
