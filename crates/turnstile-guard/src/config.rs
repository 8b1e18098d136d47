//! Configuration surface for the guard: the flat user list and realm.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::auth::CredentialIndex;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Guard configuration, owned by whatever CLI or service wrapper embeds
/// the relay engine and handed to this crate at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardConfig {
    /// Flat `user=pass,user=pass` list.
    pub users: String,
    /// Authentication realm used in long-term credential derivation.
    pub realm: String,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            users: String::new(),
            realm: "turnstile".to_string(),
        }
    }
}

impl GuardConfig {
    /// Load configuration from environment variables and an optional
    /// TOML file named by `TURNSTILE_CONFIG`.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(path) = std::env::var("TURNSTILE_CONFIG") {
            config.load_from_toml(&path)?;
        }

        // Environment overrides the file.
        if let Ok(users) = std::env::var("TURNSTILE_USERS") {
            config.users = users;
        }
        if let Ok(realm) = std::env::var("TURNSTILE_REALM") {
            config.realm = realm;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.realm.is_empty() {
            return Err(ConfigError::Invalid("realm must not be empty".to_string()));
        }
        if self.users.is_empty() {
            return Err(ConfigError::Invalid(
                "users must contain at least one user=pass pair".to_string(),
            ));
        }
        if self.build_index().is_empty() {
            return Err(ConfigError::Invalid(format!(
                "no well-formed user=pass pair in {:?}",
                self.users
            )));
        }
        Ok(())
    }

    /// Build the credential index this configuration describes.
    pub fn build_index(&self) -> CredentialIndex {
        CredentialIndex::from_user_list(&self.users, &self.realm)
    }

    fn load_from_toml(&mut self, path: &str) -> Result<(), ConfigError> {
        let content = std::fs::read_to_string(path)?;
        *self = toml::from_str(&content)?;
        Ok(())
    }
}
