use clap::Parser;
use worldsync::cli::Cli;
use worldsync::cli::Commands;
use worldsync::AppConfig;
use worldsync::Result;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    if cli.verbose {
        worldsync::logging::init_logging_with_level("debug")?;
    } else {
        worldsync::logging::init_logging()?;
    }

    // Load configuration
    let config = AppConfig::load()?;
    tracing::debug!("Configuration loaded successfully");

    // Execute the requested command
    match cli.command {
        Commands::Status => {
            worldsync::cli::handle_status_command(&config)?;
        }
        Commands::Probe => {
            worldsync::cli::handle_probe_command(&config).await?;
        }
        Commands::Cache { command } => {
            worldsync::cli::handle_cache_command(&config, &command)?;
        }
    }

    Ok(())
}
