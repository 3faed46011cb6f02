use anyhow::Result;
use clap::Parser;
use log::info;

mod cli;

use cli::commands::{AppContext, browse_command, entries_command, rings_command};
use cli::{Cli, Commands};
use webring_nav::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env first so RUST_LOG set there reaches the logger
    dotenvy::dotenv().ok();

    // Initialize logger to file (truncate on each run)
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open("webring.log")?;
    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .init();

    let cli = Cli::parse();
    info!("Starting webring-nav");

    let config_path = match cli.config {
        Some(path) => path,
        None => Config::get_config_path()?,
    };
    let mut config = Config::load_from(&config_path)?;
    config.apply_env_overrides()?;

    let context = AppContext::new(config, config_path)?;
    match cli.command {
        Commands::Rings => rings_command(&context).await,
        Commands::Entries(command) => entries_command(&context, command).await,
        Commands::Browse(command) => browse_command(context, command).await,
    }
}
