//! Configuration error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to parse TOML config: {0}")]
    Parse(#[source] toml::de::Error),

    #[error("Failed to render TOML config: {0}")]
    Serialize(#[source] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Validation(String),

    #[error("XDG directory error: {0}")]
    Xdg(String),
}
