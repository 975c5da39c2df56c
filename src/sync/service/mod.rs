//! Sync service: wires the pipeline together and manages its lifetime

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::sync::watch;
use tracing::info;

use crate::config::AppConfig;
use crate::sync::cache::PersistentCache;
use crate::sync::cache::SyncCache;
use crate::sync::gap_filler::GapFiller;
use crate::sync::orchestrator::SyncOrchestrator;
use crate::sync::orchestrator::SyncStatus;
use crate::sync::provider::EventSource;
use crate::sync::provider::SyncInputs;
use crate::sync::range_fetcher::BlockRangeFetcher;
use crate::sync::resolver::InitialStateResolver;
use crate::sync::snapshot::HttpSnapshotClient;
use crate::sync::snapshot::SnapshotSource;
use crate::sync::types::ComponentUpdate;
use crate::sync::types::SyncOptions;
use crate::Result;

pub mod lifecycle;

pub use lifecycle::LifecycleManager;
pub use lifecycle::SyncReport;

/// Coordinates one chain's state synchronization.
///
/// Owns the collaborators (event provider, snapshot service, persistent
/// cache) and the lifecycle of the orchestrator task.
pub struct SyncService {
    options: SyncOptions,
    source: Arc<dyn EventSource>,
    snapshot: Arc<dyn SnapshotSource>,
    cache: SyncCache,
    lifecycle: LifecycleManager,
}

impl SyncService {
    /// Create a service from the application config and the chain provider.
    pub fn new(
        config: &AppConfig,
        source: Arc<dyn EventSource>,
        cache: Arc<dyn PersistentCache>,
    ) -> Self {
        let options = SyncOptions::from_config(config);
        let snapshot: Arc<dyn SnapshotSource> =
            Arc::new(HttpSnapshotClient::new(&options.snapshot_service_url));
        Self::with_collaborators(options, source, snapshot, cache)
    }

    /// Create a service with explicit collaborators.
    pub fn with_collaborators(
        options: SyncOptions,
        source: Arc<dyn EventSource>,
        snapshot: Arc<dyn SnapshotSource>,
        cache: Arc<dyn PersistentCache>,
    ) -> Self {
        let cache = SyncCache::new(cache, options.cache_namespace());
        Self {
            options,
            source,
            snapshot,
            cache,
            lifecycle: LifecycleManager::new(),
        }
    }

    /// Start synchronizing from the given input streams.
    ///
    /// Spawns the orchestrator task and returns the output stream of
    /// component updates. The stream ends when the session terminates;
    /// fatal errors surface through [`SyncService::join`] or
    /// [`SyncService::stop`].
    pub fn start(&self, inputs: SyncInputs) -> Result<mpsc::UnboundedReceiver<ComponentUpdate>> {
        info!(
            "Starting sync for chain {} world {}",
            self.options.chain_id, self.options.world_address
        );

        let (output_tx, output_rx) = mpsc::unbounded_channel();
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let (status_tx, status_rx) = watch::channel(SyncStatus::default());

        let resolver = InitialStateResolver::new(self.cache.clone(), self.snapshot.clone());
        let gap_filler = GapFiller::new(BlockRangeFetcher::new(self.source.clone()));
        let orchestrator = SyncOrchestrator::new(
            self.options.clone(),
            resolver,
            gap_filler,
            self.cache.clone(),
            inputs,
            cancel_rx,
            status_tx,
        );

        let handle = tokio::spawn(orchestrator.run(output_tx));
        self.lifecycle.register(lifecycle::Session {
            cancel: cancel_tx,
            status: status_rx,
            handle,
            started_at: Utc::now(),
        })?;

        Ok(output_rx)
    }

    /// Cancel the running session and wait for it to wind down.
    pub async fn stop(&self) -> Result<()> {
        self.lifecycle.stop().await
    }

    /// Wait for the session to end on its own; surfaces a fatal sync error.
    pub async fn join(&self) -> Result<()> {
        self.lifecycle.join().await
    }

    /// Progress report of the current session.
    #[must_use]
    pub fn status(&self) -> Option<SyncReport> {
        self.lifecycle.report()
    }

    /// Whether a session is currently running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.lifecycle.is_running()
    }

    /// Session options in effect.
    #[must_use]
    pub const fn options(&self) -> &SyncOptions {
        &self.options
    }
}
