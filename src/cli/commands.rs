//! CLI command definitions and argument parsing

use clap::Parser;
use clap::Subcommand;

#[derive(Parser)]
#[command(name = "worldsync")]
#[command(about = "worldsync CLI for cache inspection and sync diagnostics")]
#[command(version)]
pub struct Cli {
    /// Enable verbose debug logging (default: info level)
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show the synchronizer state persisted for the configured world
    Status,
    /// Probe the configured snapshot service
    Probe,
    /// Inspect or reset the persistent cache
    Cache {
        #[command(subcommand)]
        command: CacheCommands,
    },
}

#[derive(Subcommand)]
pub enum CacheCommands {
    /// Show the cached state summary
    Show {
        /// Print every cached (component, entity) entry
        #[arg(long)]
        full: bool,
    },
    /// Delete the cached state for the configured world
    Clear {
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },
}
