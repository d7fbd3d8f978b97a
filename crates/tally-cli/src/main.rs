//! Tally command-line tool.
//!
//! Replays registry scripts against an in-process registry and prints the
//! resulting assignments.
//!
//! # Quick Start
//!
//! ```bash
//! # Show the resolved configuration
//! tally config show
//!
//! # Replay a script and print assignments, events and the state digest
//! tally run ops.toml
//!
//! # Same, as JSON
//! tally run ops.toml --json
//! ```

mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

/// Tally - checkpointed quorum index registry.
#[derive(Parser)]
#[command(name = "tally")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version information.
    Version,

    /// Replay a script of registry operations.
    Run {
        /// Path to the TOML script.
        script: PathBuf,

        /// Directory holding tally.toml / tally.local.toml (default: current dir).
        #[arg(short, long)]
        config_dir: Option<PathBuf>,

        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Configuration management.
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show the resolved configuration.
    Show {
        /// Directory holding tally.toml / tally.local.toml (default: current dir).
        #[arg(short, long)]
        config_dir: Option<PathBuf>,

        /// Output format (toml, json).
        #[arg(short, long, default_value = "toml")]
        format: String,
    },
}

fn init_logging(level: &str) {
    // Logs go to stderr so stdout stays machine-readable
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Version => {
            commands::version::run();
            Ok(())
        }
        Commands::Run {
            script,
            config_dir,
            json,
        } => {
            let config = commands::load_config(config_dir.as_deref())?;
            init_logging(&config.logging.level);
            commands::run::run(&script, &config, json)
        }
        Commands::Config(cmd) => match cmd {
            ConfigCommands::Show { config_dir, format } => {
                let config = commands::load_config(config_dir.as_deref())?;
                init_logging(&config.logging.level);
                commands::config::show(&config, &format)
            }
        },
    }
}
