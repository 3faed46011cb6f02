use super::commands::BrowseCommand;
use super::commands::EntriesCommand;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "webring-nav")]
#[command(about = "Browse webrings: follow the ring catalog and step through the active ring")]
pub struct Cli {
    /// Use this config file instead of the default location
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the rings published in the catalog
    Rings,
    /// List the members of one ring
    Entries(EntriesCommand),
    /// Run the navigator interactively against a simulated tab
    Browse(BrowseCommand),
}
