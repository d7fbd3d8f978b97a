//! Configuration loader with multi-source merging

use crate::{Paths, TallyConfig};
use anyhow::{Context, Result};
use std::env;
use std::path::{Path, PathBuf};

/// Configuration loader with builder pattern
pub struct ConfigLoader {
    project_dir: PathBuf,
    user_config: Option<PathBuf>,
    env_prefix: String,
    env_vars: Option<config::Map<String, String>>,
}

impl ConfigLoader {
    /// Create a new config loader with default project directory (current dir)
    pub fn new() -> Self {
        Self {
            project_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            user_config: Paths::new().user_config_file().ok(),
            env_prefix: "TALLY".to_string(),
            env_vars: None,
        }
    }

    /// Set the project directory
    pub fn with_project_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.project_dir = dir.as_ref().to_path_buf();
        self
    }

    /// Set the user config file (default: ~/.config/tally/config.toml).
    /// `None` skips the user layer.
    pub fn with_user_config(mut self, file: Option<PathBuf>) -> Self {
        self.user_config = file;
        self
    }

    /// Set the environment variable prefix (default: "TALLY")
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Read environment overrides from `vars` instead of the process
    /// environment.
    pub fn with_env_vars(mut self, vars: impl IntoIterator<Item = (String, String)>) -> Self {
        self.env_vars = Some(vars.into_iter().collect());
        self
    }

    /// Load configuration from all sources with proper precedence
    ///
    /// Environment keys use `_` after the prefix and `__` between nesting
    /// levels, e.g. `TALLY_REGISTRY__MAX_MEMBERS_PER_QUORUM=64` or
    /// `TALLY_REGISTRY__QUORUMS=0,1,2`.
    pub fn load(self) -> Result<TallyConfig> {
        let mut builder = config::Config::builder();

        // 1. Start with built-in defaults
        let defaults = TallyConfig::default();
        builder = builder.add_source(config::Config::try_from(&defaults)?);

        // 2. User config (~/.config/tally/config.toml)
        if let Some(user_config_file) = self.user_config {
            if user_config_file.exists() {
                builder = builder.add_source(
                    config::File::from(user_config_file)
                        .required(false)
                        .format(config::FileFormat::Toml),
                );
            }
        }

        // 3. Project config (tally.toml)
        let project_config_file = Paths::project_config_file(&self.project_dir);
        if project_config_file.exists() {
            builder = builder.add_source(
                config::File::from(project_config_file)
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        // 4. Local config (tally.local.toml, gitignored)
        let local_config_file = Paths::local_config_file(&self.project_dir);
        if local_config_file.exists() {
            builder = builder.add_source(
                config::File::from(local_config_file)
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        // 5. Environment variables (TALLY_*)
        builder = builder.add_source(
            config::Environment::with_prefix(&self.env_prefix)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("registry.quorums")
                .source(self.env_vars),
        );

        // Build, deserialize, validate
        let config = builder.build().context("Failed to build configuration")?;

        let tally_config: TallyConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        tally_config
            .validate()
            .context("Configuration failed validation")?;

        Ok(tally_config)
    }

    /// Load configuration or return defaults if not found
    pub fn load_or_default(self) -> TallyConfig {
        self.load().unwrap_or_default()
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
