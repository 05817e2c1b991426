//! Profile management
//!
//! Profiles are named client configurations stored in the config file, so a
//! command can select credentials, endpoint and payload format by name.

use serde::{Deserialize, Serialize};

use crate::config::{ClientConfig, ConfigManager};
use crate::error::{Error, Result};

/// A named client configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// Unique name for this profile
    pub name: String,

    /// Connection settings
    pub client: ClientConfig,
}

impl Profile {
    pub fn new(name: impl Into<String>, client: ClientConfig) -> Self {
        Self {
            name: name.into(),
            client,
        }
    }
}

/// Check if a string is a valid profile name
pub fn is_valid_profile_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Manager for profile operations
pub struct ProfileManager {
    config_manager: ConfigManager,
}

impl ProfileManager {
    /// Create a ProfileManager with a specific ConfigManager
    pub fn with_config_manager(config_manager: ConfigManager) -> Self {
        Self { config_manager }
    }

    /// Create a ProfileManager using the default config location
    pub fn new() -> Result<Self> {
        Ok(Self {
            config_manager: ConfigManager::new()?,
        })
    }

    /// List all configured profiles
    pub fn list(&self) -> Result<Vec<Profile>> {
        Ok(self.config_manager.load()?.profiles)
    }

    /// Get a profile by name
    pub fn get(&self, name: &str) -> Result<Profile> {
        self.config_manager
            .load()?
            .profiles
            .into_iter()
            .find(|p| p.name == name)
            .ok_or_else(|| Error::ProfileNotFound(name.to_string()))
    }

    /// Get the named profile, or the configured default when no name is given
    pub fn resolve(&self, name: Option<&str>) -> Result<Profile> {
        let config = self.config_manager.load()?;
        let name = match name {
            Some(n) => n.to_string(),
            None => config.defaults.profile.clone().ok_or_else(|| {
                Error::Config("No profile given and no default profile configured".into())
            })?,
        };
        config
            .profiles
            .into_iter()
            .find(|p| p.name == name)
            .ok_or(Error::ProfileNotFound(name))
    }

    /// Add or update a profile, optionally making it the default
    pub fn set(&self, profile: Profile, make_default: bool) -> Result<()> {
        if !is_valid_profile_name(&profile.name) {
            return Err(Error::Config(format!(
                "Invalid profile name '{}': use letters, digits, '-' or '_'",
                profile.name
            )));
        }
        profile.client.validate()?;

        let mut config = self.config_manager.load()?;
        config.profiles.retain(|p| p.name != profile.name);
        if make_default || config.defaults.profile.is_none() {
            config.defaults.profile = Some(profile.name.clone());
        }
        config.profiles.push(profile);

        self.config_manager.save(&config)
    }

    /// Remove a profile
    pub fn remove(&self, name: &str) -> Result<()> {
        let mut config = self.config_manager.load()?;
        let original_len = config.profiles.len();

        config.profiles.retain(|p| p.name != name);

        if config.profiles.len() == original_len {
            return Err(Error::ProfileNotFound(name.to_string()));
        }
        if config.defaults.profile.as_deref() == Some(name) {
            config.defaults.profile = None;
        }

        self.config_manager.save(&config)
    }

    /// Name of the default profile, if one is configured
    pub fn default_name(&self) -> Result<Option<String>> {
        Ok(self.config_manager.load()?.defaults.profile)
    }

    /// Check if a profile exists
    pub fn exists(&self, name: &str) -> Result<bool> {
        let config = self.config_manager.load()?;
        Ok(config.profiles.iter().any(|p| p.name == name))
    }
}
