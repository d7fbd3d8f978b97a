//! Configuration management for Tally
//!
//! Provides hierarchical configuration loading from multiple sources:
//! 1. Environment variables (`TALLY_*` prefix, highest precedence)
//! 2. tally.local.toml (gitignored, local overrides)
//! 3. tally.toml (git-tracked, project config)
//! 4. ~/.config/tally/config.toml (user defaults)
//! 5. Built-in defaults (lowest precedence)

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};

mod error;
mod loader;
mod paths;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use paths::Paths;

/// Log levels accepted by `logging.level`.
pub const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Main Tally configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TallyConfig {
    pub registry: RegistryConfig,
    pub logging: LoggingConfig,
}

/// The `[registry]` section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RegistryConfig {
    /// Quorums initialized when the registry is bootstrapped.
    pub quorums: Vec<u8>,
    /// Optional cap on members per quorum. Unset means unbounded.
    pub max_members_per_quorum: Option<u32>,
    /// Caller id allowed to mutate the registry.
    pub coordinator: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            quorums: Vec::new(),
            max_members_per_quorum: None,
            coordinator: "coordinator".to_string(),
        }
    }
}

/// The `[logging]` section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl TallyConfig {
    /// Load configuration from the current directory
    pub fn load() -> Result<Self> {
        ConfigLoader::new().load()
    }

    /// Load configuration from a specific project directory
    pub fn load_from_dir(project_dir: impl AsRef<Path>) -> Result<Self> {
        ConfigLoader::new().with_project_dir(project_dir).load()
    }

    /// Parse a single TOML document on top of the built-in defaults.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Render this configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Rejects settings the registry cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = BTreeSet::new();
        for quorum in &self.registry.quorums {
            if !seen.insert(quorum) {
                return Err(ConfigError::Validation(format!(
                    "registry.quorums lists quorum {quorum} more than once"
                )));
            }
        }

        if self.registry.max_members_per_quorum == Some(0) {
            return Err(ConfigError::Validation(
                "registry.max_members_per_quorum must be at least 1".to_string(),
            ));
        }

        if self.registry.coordinator.trim().is_empty() {
            return Err(ConfigError::Validation(
                "registry.coordinator must not be empty".to_string(),
            ));
        }

        let level = self.logging.level.to_ascii_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::Validation(format!(
                "logging.level must be one of {}, got {:?}",
                LOG_LEVELS.join(", "),
                self.logging.level
            )));
        }

        Ok(())
    }
}
