//! CLI command implementations.

pub mod config;
pub mod run;
pub mod version;

use std::path::Path;

use anyhow::{Context, Result};
use tally_config::{ConfigLoader, TallyConfig};

/// Loads layered configuration rooted at `dir`, or the current directory.
pub fn load_config(dir: Option<&Path>) -> Result<TallyConfig> {
    let loader = match dir {
        Some(dir) => ConfigLoader::new().with_project_dir(dir),
        None => ConfigLoader::new(),
    };
    loader.load().context("Failed to load configuration")
}
