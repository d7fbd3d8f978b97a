//! Configuration management commands.

use anyhow::{Result, bail};
use tally_config::TallyConfig;

/// Show the resolved configuration.
pub fn show(config: &TallyConfig, format: &str) -> Result<()> {
    match format {
        "json" => println!("{}", serde_json::to_string_pretty(config)?),
        "toml" => print!("{}", config.to_toml()?),
        other => bail!("unknown format {other:?} (expected toml or json)"),
    }
    Ok(())
}
