//! CLI command handlers

use std::io::Write;
use std::sync::Arc;

use crate::cli::commands::CacheCommands;
use crate::config::AppConfig;
use crate::sync::cache::FileCache;
use crate::sync::cache::PersistentCache;
use crate::sync::cache::SyncCache;
use crate::sync::cache_store::CacheStore;
use crate::sync::snapshot::HttpSnapshotClient;
use crate::sync::snapshot::SnapshotSource;
use crate::sync::types::SyncOptions;
use crate::Result;

fn open_sync_cache(config: &AppConfig) -> Result<SyncCache> {
    let options = SyncOptions::from_config(config);
    let cache: Arc<dyn PersistentCache> = Arc::new(FileCache::open(config.cache_dir())?);
    Ok(SyncCache::new(cache, options.cache_namespace()))
}

/// Show the persisted synchronizer state for the configured world.
pub fn handle_status_command(config: &AppConfig) -> Result<()> {
    let cache = open_sync_cache(config)?;
    let block_number = cache.block_number();

    println!("Chain:        {}", config.chain_id());
    println!("World:        {}", config.world_address());
    println!("Cache dir:    {}", config.cache_dir());
    match cache.state() {
        Some(state) => {
            println!("Cached block: {block_number}");
            println!("Cached state: {} entries", state.state_len());
        }
        None => println!("Cached state: none"),
    }
    Ok(())
}

/// Probe the configured snapshot service for its latest snapshot.
pub async fn handle_probe_command(config: &AppConfig) -> Result<()> {
    let url = config.snapshot_service_url();
    if url.is_empty() {
        println!("No snapshot service configured");
        return Ok(());
    }

    println!("Probing snapshot service at {url} ...");
    let client = HttpSnapshotClient::new(url);
    match client.latest_block_number().await {
        Some(block_number) => println!("Latest snapshot: block {block_number}"),
        None => println!("Snapshot service unavailable"),
    }
    Ok(())
}

/// Inspect or reset the persistent cache.
pub fn handle_cache_command(config: &AppConfig, command: &CacheCommands) -> Result<()> {
    let cache = open_sync_cache(config)?;
    match command {
        CacheCommands::Show { full } => {
            match cache.state() {
                Some(state) => {
                    println!(
                        "{} entries, current to block {}",
                        state.state_len(),
                        cache.block_number()
                    );
                    if *full {
                        for update in state.state() {
                            println!(
                                "{} {} @ {} = {}",
                                update.component, update.entity, update.block_number, update.value
                            );
                        }
                    }
                }
                None => println!("Cache is empty"),
            }
            Ok(())
        }
        CacheCommands::Clear { force } => {
            if !force && !confirm("Clear the cached state?")? {
                println!("Aborted");
                return Ok(());
            }
            cache.write(&CacheStore::new(), 0)?;
            println!("Cache cleared");
            Ok(())
        }
    }
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{prompt} [y/N] ");
    std::io::stdout().flush()?;
    let mut answer = String::new();
    std::io::stdin().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}
