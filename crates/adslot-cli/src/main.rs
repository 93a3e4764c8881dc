//! adslot CLI entrypoint.

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod handlers;

use commands::{Commands, ConfigCommands};
use config::CliConfig;

#[derive(Parser)]
#[command(name = "adslot")]
#[command(author, version, about = "Drive the ad lifecycle cache from the command line", long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the user config directory
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => CliConfig::load_from(path)?,
        None => CliConfig::load().unwrap_or_default(),
    };

    match cli.command {
        Commands::Demo(args) => handlers::demo(&config, args).await?,
        Commands::Placements => handlers::list_placements(&config)?,
        Commands::Config { command } => match command {
            ConfigCommands::Show => handlers::show_config(&config)?,
            ConfigCommands::Path => handlers::config_path()?,
            ConfigCommands::Init { force } => handlers::init_config(force)?,
        },
    }

    Ok(())
}
