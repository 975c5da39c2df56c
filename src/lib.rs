//! `worldsync` - on-chain ECS component state synchronization
//!
//! `worldsync` reconstructs the current state of an on-chain component
//! database (a world contract) into a local Entity-Component-System view,
//! then keeps it current by streaming live events.
//!
//! # Features
//!
//! - **Seed selection**: picks the cheapest usable state source — a remote
//!   snapshot service when it is far enough ahead, the local persistent
//!   cache otherwise, an empty store as the last resort
//! - **Gap fill**: fetches the block range between the seed and the chain
//!   head observed at boot
//! - **Live streaming**: buffers live events racing ahead of the backfill
//!   and drains them exactly once, without drops or intra-transaction
//!   reordering
//! - **Coherent progression**: backfilled events are relabeled just below
//!   the current head so downstream progress tracking never regresses
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use worldsync::sync::sync_channels;
//! use worldsync::AppConfig;
//! use worldsync::WorldSync;
//!
//! # use worldsync::sync::EventSource;
//! # async fn example(provider: Arc<dyn EventSource>) -> worldsync::Result<()> {
//! // Load configuration
//! let config = AppConfig::load()?;
//!
//! // Wire the provider driver to the synchronizer
//! let (handles, inputs) = sync_channels();
//! // ... hand `handles` to the RPC driver feeding ticks and events ...
//!
//! let worldsync = WorldSync::new(&config, provider)?;
//! let mut updates = worldsync.start_sync(inputs)?;
//!
//! while let Some(update) = tokio_stream::StreamExt::next(&mut updates).await {
//!     println!("{} {} @ block {}", update.component, update.entity, update.block_number);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! ```text
//! blockNumber$ ──┐
//! liveEvent$  ───┤                      ┌── SnapshotClient
//!                ├── SyncOrchestrator ──┼── InitialStateResolver ── PersistentCache
//!                │   (seed → gap →      └── GapFiller ── BlockRangeFetcher ── EventSource
//! output$ <──────┘    drain → live)
//! ```
//!
//! # Modules
//!
//! - [`cli`]: Command-line interface
//! - [`config`]: Configuration management
//! - [`logging`]: Logging setup
//! - [`sync`]: The synchronization pipeline
//!
//! # Error Handling
//!
//! All operations return [`Result<T>`] with [`WorldSyncError`]. The
//! synchronizer recovers internally wherever possible (retries, snapshot →
//! cache → empty fallback); only fatal sync failures escape, through
//! [`WorldSync::join`] / [`WorldSync::stop_sync`].

pub mod cli;
pub mod config;
pub mod errors;
pub mod logging;
pub mod sync;

#[cfg(test)]
pub mod tests;

use std::sync::Arc;

use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::info;

pub use config::AppConfig;
pub use errors::Result;
pub use errors::WorldSyncError;
pub use sync::ComponentUpdate;
pub use sync::SyncPhase;
pub use sync::SyncReport;
pub use sync::SyncService;

use sync::cache::FileCache;
use sync::cache::PersistentCache;
use sync::provider::EventSource;
use sync::provider::SyncInputs;

/// High-level `worldsync` client.
pub struct WorldSync {
    config: AppConfig,
    service: Arc<SyncService>,
}

impl WorldSync {
    /// Create a client with a file-backed persistent cache at the
    /// configured directory.
    ///
    /// # Errors
    /// Returns an error if the cache directory cannot be created.
    pub fn new(config: &AppConfig, source: Arc<dyn EventSource>) -> Result<Self> {
        let cache: Arc<dyn PersistentCache> = Arc::new(FileCache::open(config.cache_dir())?);
        Ok(Self::with_cache(config, source, cache))
    }

    /// Create a client with an explicit persistent cache implementation.
    #[must_use]
    pub fn with_cache(
        config: &AppConfig,
        source: Arc<dyn EventSource>,
        cache: Arc<dyn PersistentCache>,
    ) -> Self {
        let service = Arc::new(SyncService::new(config, source, cache));
        Self {
            config: config.clone(),
            service,
        }
    }

    /// Start synchronizing from the given input streams.
    ///
    /// Returns the ordered output stream of component updates: seed state,
    /// gap backfill, buffered live events, then live pass-through.
    ///
    /// # Errors
    /// Returns an error if a session is already running.
    pub fn start_sync(&self, inputs: SyncInputs) -> Result<UnboundedReceiverStream<ComponentUpdate>> {
        let output = self.service.start(inputs)?;
        info!(
            "Sync started for chain {} (floor block {})",
            self.config.chain_id(),
            self.config.initial_block_number()
        );
        Ok(UnboundedReceiverStream::new(output))
    }

    /// Cancel the running session and wait for it to wind down.
    ///
    /// # Errors
    /// Surfaces a fatal sync error the session already terminated with.
    pub async fn stop_sync(&self) -> Result<()> {
        self.service.stop().await
    }

    /// Wait for the session to end on its own.
    ///
    /// # Errors
    /// Surfaces the session's fatal sync error, if any.
    pub async fn join(&self) -> Result<()> {
        self.service.join().await
    }

    /// Progress of the current session, if one is running.
    #[must_use]
    pub fn sync_status(&self) -> Option<SyncReport> {
        self.service.status()
    }

    /// The underlying sync service.
    #[must_use]
    pub fn service(&self) -> &Arc<SyncService> {
        &self.service
    }

    /// The configuration this client was built from.
    #[must_use]
    pub const fn config(&self) -> &AppConfig {
        &self.config
    }
}
