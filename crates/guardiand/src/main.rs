//! Malcolm Guardian daemon
//!
//! Listens for wake-word commands on stdin, forwards them to the brain
//! service and runs the tools it asks for behind the confirmation gate.

use anyhow::{Context, Result};
use clap::Parser;
use guardian_common::config::DEFAULT_CONFIG_PATH;
use guardian_common::GuardianConfig;
use guardiand::admin;
use guardiand::guardian::Guardian;
use guardiand::listener::StdinSource;
use guardiand::logging;
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "guardiand", version, about = "Malcolm Guardian voice agent")]
struct Cli {
    /// Path to config.toml
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Handle a single command and exit
    #[arg(long)]
    command: Option<String>,

    /// Write the default configuration to --config and exit
    #[arg(long, conflicts_with_all = ["command", "preferences"])]
    write_default_config: bool,

    /// Show recorded confirmation answers per tool and exit
    #[arg(long, conflicts_with = "command")]
    preferences: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.write_default_config {
        admin::write_default_config(&cli.config)?;
        println!("Wrote default configuration to {}", cli.config.display());
        return Ok(());
    }

    let config = GuardianConfig::load_from(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;

    if cli.preferences {
        print!("{}", admin::preference_report(&config)?);
        return Ok(());
    }

    logging::init(&config.log)?;

    info!("Malcolm Guardian v{} starting", env!("CARGO_PKG_VERSION"));
    if !cli.config.exists() {
        warn!("Config file {} not found; using defaults.", cli.config.display());
    }

    let mut guardian = Guardian::build(config)?;

    if let Some(command) = cli.command {
        guardian.orchestrator().handle_command(&command);
        guardian.stop();
        return Ok(());
    }

    guardian.start(Box::new(StdinSource))?;

    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("building signal runtime")?
        .block_on(tokio::signal::ctrl_c())
        .context("waiting for Ctrl-C")?;

    info!("Ctrl-C received; shutting down.");
    guardian.stop();
    Ok(())
}
