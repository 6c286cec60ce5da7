//! Configuration loading from switchyard.toml.

use runtime::ServerConfig;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

/// Top-level configuration.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Tool providers, one `[[providers]]` table each.
    #[serde(default)]
    pub providers: Vec<ServerConfig>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML string.
    pub fn parse(toml: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.providers.is_empty() {
            return Err(ConfigError::NoProviders);
        }

        let mut names = HashSet::new();
        for provider in &self.providers {
            if provider.command.trim().is_empty() {
                return Err(ConfigError::EmptyCommand(provider.name.clone()));
            }
            if !names.insert(provider.name.as_str()) {
                return Err(ConfigError::DuplicateProvider(provider.name.clone()));
            }
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("no providers configured: add at least one [[providers]] table")]
    NoProviders,

    #[error("provider {0} has an empty command")]
    EmptyCommand(String),

    #[error("provider {0} is configured more than once")]
    DuplicateProvider(String),
}
