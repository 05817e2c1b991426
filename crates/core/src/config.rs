//! Configuration management
//!
//! Two layers live here:
//! - [`ClientConfig`], the record every engine operation resolves before it
//!   opens a session, together with the explicit > instance > process-default
//!   resolution chain ([`ConfigChain`]).
//! - The on-disk configuration file (TOML, `~/.config/stowage/config.toml`)
//!   holding named profiles.
//!
//! Resolution replaces whole records: the first configured record in the
//! chain wins, fields that are unset in it are not filled in from lower
//! layers.

use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::profile::Profile;

/// Current configuration schema version
pub const SCHEMA_VERSION: u32 = 1;

/// Environment variable overriding the configuration directory
pub const CONFIG_DIR_ENV: &str = "STOWAGE_CONFIG_DIR";

/// Default fan-out for metadata fetches and typed downloads
pub const DEFAULT_MAX_CONCURRENCY: usize = 16;

/// Payload format used by typed uploads and downloads
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SerializationFormat {
    #[default]
    Json,
    Xml,
}

impl SerializationFormat {
    /// MIME type of serialized payloads
    pub const fn content_type(self) -> &'static str {
        match self {
            SerializationFormat::Json => "application/json",
            SerializationFormat::Xml => "application/xml",
        }
    }
}

impl std::str::FromStr for SerializationFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(SerializationFormat::Json),
            "xml" => Ok(SerializationFormat::Xml),
            other => Err(Error::Config(format!(
                "Unknown serialization format '{other}'. Use 'json' or 'xml'"
            ))),
        }
    }
}

/// Connection and behavior settings for one engine call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Access key ID
    pub access_key_id: String,

    /// Secret access key
    pub secret_access_key: String,

    /// Region
    #[serde(default = "default_region")]
    pub region: String,

    /// Custom endpoint URL for S3-compatible services
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// KMS key used for server-side encryption of every upload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kms_key_id: Option<String>,

    /// Format for typed payloads
    #[serde(default)]
    pub serialization_format: SerializationFormat,

    /// Use path-style bucket addressing
    #[serde(default)]
    pub force_path_style: bool,

    /// Upper bound on concurrent metadata fetches
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_max_concurrency() -> usize {
    DEFAULT_MAX_CONCURRENCY
}

impl ClientConfig {
    /// Create a config with required credentials and defaults elsewhere
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            region: default_region(),
            endpoint: None,
            kms_key_id: None,
            serialization_format: SerializationFormat::default(),
            force_path_style: false,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn with_kms_key_id(mut self, key_id: impl Into<String>) -> Self {
        self.kms_key_id = Some(key_id.into());
        self
    }

    pub fn with_format(mut self, format: SerializationFormat) -> Self {
        self.serialization_format = format;
        self
    }

    pub fn with_max_concurrency(mut self, n: usize) -> Self {
        self.max_concurrency = n.max(1);
        self
    }

    /// Check the record before handing it to a connector
    pub fn validate(&self) -> Result<()> {
        if self.access_key_id.is_empty() || self.secret_access_key.is_empty() {
            return Err(Error::Config("Access key and secret key are required".into()));
        }
        if self.region.is_empty() {
            return Err(Error::Config("Region cannot be empty".into()));
        }
        if let Some(endpoint) = &self.endpoint {
            url::Url::parse(endpoint)?;
        }
        Ok(())
    }
}

static DEFAULT_CONFIG: OnceLock<Arc<ClientConfig>> = OnceLock::new();

/// Install the process-wide default configuration
///
/// Meant to be called once at startup. A second call fails instead of
/// replacing the record under running operations.
pub fn set_default_config(config: ClientConfig) -> Result<()> {
    DEFAULT_CONFIG
        .set(Arc::new(config))
        .map_err(|_| Error::Config("Process default configuration is already set".into()))
}

/// The process-wide default configuration, if installed
pub fn default_config() -> Option<Arc<ClientConfig>> {
    DEFAULT_CONFIG.get().cloned()
}

/// Explicit and instance configuration slots, backed by the process default
#[derive(Debug, Clone, Default)]
pub struct ConfigChain {
    explicit: Option<Arc<ClientConfig>>,
    instance: Option<Arc<ClientConfig>>,
}

impl ConfigChain {
    /// Chain with an instance-bound record
    pub fn with_instance(instance: Option<Arc<ClientConfig>>) -> Self {
        Self {
            explicit: None,
            instance,
        }
    }

    /// Replace the instance-bound record
    pub fn set_instance(&mut self, config: Option<Arc<ClientConfig>>) {
        self.instance = config;
    }

    /// Same chain with an explicit per-call record on top
    pub fn with_explicit(&self, config: Arc<ClientConfig>) -> Self {
        Self {
            explicit: Some(config),
            instance: self.instance.clone(),
        }
    }

    /// Resolve against a given process default
    pub fn resolve_with(&self, fallback: Option<Arc<ClientConfig>>) -> Result<Arc<ClientConfig>> {
        self.explicit
            .clone()
            .or_else(|| self.instance.clone())
            .or(fallback)
            .ok_or_else(|| {
                Error::Config(
                    "No client configuration: pass one explicitly, bind one to the instance, \
                     or install a process default"
                        .into(),
                )
            })
    }

    /// Resolve explicit > instance > process default
    pub fn resolve(&self) -> Result<Arc<ClientConfig>> {
        self.resolve_with(default_config())
    }
}

/// Main configuration file structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Schema version for migration support
    pub schema_version: u32,

    /// Default settings
    #[serde(default)]
    pub defaults: Defaults,

    /// Configured profiles
    #[serde(default)]
    pub profiles: Vec<Profile>,
}

/// Defaults applied when a command does not name a profile
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Defaults {
    /// Profile used when none is given
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            defaults: Defaults::default(),
            profiles: Vec::new(),
        }
    }
}

/// Configuration manager handles loading and saving the config file
#[derive(Debug)]
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a ConfigManager at the default location
    ///
    /// `STOWAGE_CONFIG_DIR` overrides the platform config directory.
    pub fn new() -> Result<Self> {
        let config_dir = match std::env::var_os(CONFIG_DIR_ENV) {
            Some(dir) => PathBuf::from(dir),
            None => dirs::config_dir()
                .ok_or_else(|| Error::Config("Could not determine config directory".into()))?
                .join("stowage"),
        };
        Ok(Self {
            config_path: config_dir.join("config.toml"),
        })
    }

    /// Create a ConfigManager with a custom path (useful for testing)
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    /// Get the configuration file path
    pub fn config_path(&self) -> &PathBuf {
        &self.config_path
    }

    /// Load configuration from disk
    ///
    /// A missing file yields the default configuration.
    pub fn load(&self) -> Result<Config> {
        if !self.config_path.exists() {
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(&self.config_path)?;
        let config: Config = toml::from_str(&content)?;

        if config.schema_version > SCHEMA_VERSION {
            return Err(Error::Config(format!(
                "Configuration file version {} is newer than supported version {}. Please upgrade stow.",
                config.schema_version, SCHEMA_VERSION
            )));
        }

        Ok(config)
    }

    /// Save configuration to disk
    ///
    /// Creates parent directories and restricts the file to its owner since
    /// it carries secret keys.
    pub fn save(&self, config: &Config) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(config)?;
        std::fs::write(&self.config_path, content)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let permissions = std::fs::Permissions::from_mode(0o600);
            std::fs::set_permissions(&self.config_path, permissions)?;
        }

        Ok(())
    }
}
