//! Sync state machine
//!
//! Composes resolver, gap filler and the live input streams into a single
//! ordered output stream: seed state first, then the gap backfill, then the
//! live events buffered while the backfill ran, then live pass-through.
//!
//! The orchestrator is one cooperative task. Every await during the initial
//! phase runs inside a `select!` loop that keeps ingesting head ticks and
//! live events, so no event is dropped and no lock is needed for the
//! ordering guarantees.

use std::future::Future;

use tokio::sync::mpsc;
use tokio::sync::watch;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::sync::cache::SyncCache;
use crate::sync::cache_store::CacheStore;
use crate::sync::gap_filler::GapFiller;
use crate::sync::provider::SyncInputs;
use crate::sync::resolver::InitialStateResolver;
use crate::sync::types::ComponentUpdate;
use crate::sync::types::SyncOptions;
use crate::sync::types::SyncPhase;
use crate::sync::types::CACHE_TX_HASH;
use crate::sync::types::LIVE_BUFFER_HIGH_WATER;
use crate::Result;
use crate::WorldSyncError;

/// Snapshot of the orchestrator's progress, published on a watch channel.
#[derive(Debug, Clone)]
pub struct SyncStatus {
    pub phase: SyncPhase,
    /// Most recent head tick observed
    pub frontier_block: u64,
    /// Live events currently buffered
    pub buffered: usize,
    /// Updates emitted so far
    pub emitted: u64,
}

impl Default for SyncStatus {
    fn default() -> Self {
        Self {
            phase: SyncPhase::Boot,
            frontier_block: 0,
            buffered: 0,
            emitted: 0,
        }
    }
}

/// Resolves when cancellation is requested. A dropped sender counts as a
/// request: the owning service is gone.
async fn cancel_requested(cancel: &mut watch::Receiver<bool>) {
    loop {
        if *cancel.borrow_and_update() {
            return;
        }
        if cancel.changed().await.is_err() {
            return;
        }
    }
}

/// Live-input ingestion state, separate from the pipeline components so the
/// select! loops can borrow it mutably while a resolver or fetch future is
/// in flight.
struct Ingest {
    inputs: SyncInputs,
    cancel: watch::Receiver<bool>,
    target_block: u64,
    buffer: Vec<ComponentUpdate>,
    blocks_open: bool,
    live_open: bool,
}

impl Ingest {
    fn new(inputs: SyncInputs, cancel: watch::Receiver<bool>) -> Self {
        Self {
            inputs,
            cancel,
            target_block: 0,
            buffer: Vec::new(),
            blocks_open: true,
            live_open: true,
        }
    }

    fn observe_tick(&mut self, tick: u64) {
        // The tick stream is non-decreasing; guard against a misbehaving
        // driver anyway so the rewrite frontier never regresses.
        if tick < self.target_block {
            warn!(
                "Ignoring regressing head tick {} (frontier {})",
                tick, self.target_block
            );
            return;
        }
        self.target_block = tick;
    }

    fn buffer_event(&mut self, event: ComponentUpdate) {
        self.buffer.push(event);
        if self.buffer.len() == LIVE_BUFFER_HIGH_WATER {
            warn!(
                "Live buffer crossed {} events while initial sync is running",
                LIVE_BUFFER_HIGH_WATER
            );
        }
    }

    /// Await the first head tick, buffering live events meanwhile.
    async fn first_tick(&mut self) -> Result<u64> {
        loop {
            tokio::select! {
                _ = cancel_requested(&mut self.cancel) => return Err(WorldSyncError::Cancelled),
                tick = self.inputs.block_numbers.recv(), if self.blocks_open => match tick {
                    Some(tick) => {
                        self.observe_tick(tick);
                        return Ok(tick);
                    }
                    None => {
                        self.blocks_open = false;
                        return Err(WorldSyncError::Fatal(
                            "block number stream ended before the first tick".to_string(),
                        ));
                    }
                },
                event = self.inputs.live_events.recv(), if self.live_open => match event {
                    Some(event) => self.buffer_event(event),
                    None => {
                        self.live_open = false;
                        return Err(WorldSyncError::Fatal(
                            "live event stream ended during boot".to_string(),
                        ));
                    }
                },
            }
        }
    }

    /// Drive `fut` to completion while ticks advance the frontier and live
    /// events fill the buffer.
    async fn drive<T>(&mut self, fut: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::pin!(fut);
        loop {
            tokio::select! {
                result = &mut fut => return result,
                _ = cancel_requested(&mut self.cancel) => return Err(WorldSyncError::Cancelled),
                tick = self.inputs.block_numbers.recv(), if self.blocks_open => match tick {
                    Some(tick) => self.observe_tick(tick),
                    None => {
                        self.blocks_open = false;
                        return Err(WorldSyncError::Fatal(
                            "block number stream ended during initial sync".to_string(),
                        ));
                    }
                },
                event = self.inputs.live_events.recv(), if self.live_open => match event {
                    Some(event) => self.buffer_event(event),
                    None => {
                        self.live_open = false;
                        return Err(WorldSyncError::Fatal(
                            "live event stream ended during initial sync".to_string(),
                        ));
                    }
                },
            }
        }
    }

    /// Drain whatever is already queued on the inputs without awaiting.
    fn poll_pending(&mut self) {
        while let Ok(tick) = self.inputs.block_numbers.try_recv() {
            self.observe_tick(tick);
        }
        while let Ok(event) = self.inputs.live_events.try_recv() {
            self.buffer_event(event);
        }
    }
}

/// The synchronizer state machine.
pub struct SyncOrchestrator {
    options: SyncOptions,
    resolver: InitialStateResolver,
    gap_filler: GapFiller,
    cache: SyncCache,
    status: watch::Sender<SyncStatus>,
    ingest: Ingest,
    /// Compacted view of everything emitted, checkpointed to the persistent
    /// cache
    shadow: CacheStore,
    emitted: u64,
    last_checkpoint: u64,
}

impl SyncOrchestrator {
    pub fn new(
        options: SyncOptions,
        resolver: InitialStateResolver,
        gap_filler: GapFiller,
        cache: SyncCache,
        inputs: SyncInputs,
        cancel: watch::Receiver<bool>,
        status: watch::Sender<SyncStatus>,
    ) -> Self {
        Self {
            options,
            resolver,
            gap_filler,
            cache,
            status,
            ingest: Ingest::new(inputs, cancel),
            shadow: CacheStore::new(),
            emitted: 0,
            last_checkpoint: 0,
        }
    }

    /// Run the session to completion.
    ///
    /// Returns `Ok(())` on cancellation or downstream disconnect, an error
    /// only for fatal sync failures. Either way the output sender is dropped
    /// afterwards, terminating the downstream stream.
    pub async fn run(mut self, output: mpsc::UnboundedSender<ComponentUpdate>) -> Result<()> {
        let result = self.run_phases(&output).await;
        self.set_phase(SyncPhase::Terminated);

        // Final checkpoint so the next session can seed from this one
        if !self.shadow.is_empty() {
            if let Err(e) = self.cache.write(&self.shadow, self.ingest.target_block) {
                warn!("Final cache checkpoint failed: {}", e);
            }
        }

        match result {
            Err(WorldSyncError::Cancelled) => {
                info!("Sync cancelled after {} emitted updates", self.emitted);
                Ok(())
            }
            Err(e) => {
                warn!("Sync terminated: {}", e);
                Err(e)
            }
            Ok(()) => Ok(()),
        }
    }

    async fn run_phases(&mut self, output: &mpsc::UnboundedSender<ComponentUpdate>) -> Result<()> {
        // Boot: inputs are already subscribed; buffering starts with the
        // first poll below. The first tick fixes the gap-fill target.
        self.set_phase(SyncPhase::Boot);
        let target_block = self.ingest.first_tick().await?;
        info!(
            "Booted at head {} (floor {})",
            target_block, self.options.initial_block_number
        );

        self.set_phase(SyncPhase::Resolving);
        let initial = self
            .ingest
            .drive(self.resolver.resolve(self.options.initial_block_number))
            .await?;
        let seed_block = initial.block_number;

        self.set_phase(SyncPhase::Seeding);
        self.ingest.poll_pending();
        let seed_updates: Vec<ComponentUpdate> = initial.store.state().collect();
        debug!(
            "Seeding {} entries from {:?} at block {}",
            seed_updates.len(),
            initial.source,
            seed_block
        );
        for update in seed_updates {
            self.emit_rewritten(update, output)?;
        }

        self.set_phase(SyncPhase::GapFetching);
        let gap = self
            .ingest
            .drive(self.gap_filler.fill(seed_block, target_block))
            .await?;
        self.ingest.poll_pending();
        debug!("Gap fill produced {} events", gap.len());
        for update in gap.events().iter().cloned() {
            self.emit_rewritten(update, output)?;
        }

        self.set_phase(SyncPhase::DrainingBuffer);
        self.ingest.poll_pending();
        let buffered = std::mem::take(&mut self.ingest.buffer);
        info!(
            "Initial sync complete at block {}, draining {} buffered live events",
            self.ingest.target_block, buffered.len()
        );
        for update in buffered {
            self.emit_rewritten(update, output)?;
        }

        self.set_phase(SyncPhase::Live);
        self.last_checkpoint = self.ingest.target_block;
        self.live_loop(output).await
    }

    async fn live_loop(&mut self, output: &mpsc::UnboundedSender<ComponentUpdate>) -> Result<()> {
        loop {
            tokio::select! {
                _ = cancel_requested(&mut self.ingest.cancel) => {
                    return Err(WorldSyncError::Cancelled);
                }
                tick = self.ingest.inputs.block_numbers.recv(), if self.ingest.blocks_open => {
                    match tick {
                        Some(tick) => {
                            self.ingest.observe_tick(tick);
                            let frontier = self.ingest.target_block;
                            self.status.send_modify(|s| s.frontier_block = frontier);
                            self.maybe_checkpoint();
                        }
                        None => {
                            self.ingest.blocks_open = false;
                            return Err(WorldSyncError::Fatal(
                                "block number stream dropped without recovery".to_string(),
                            ));
                        }
                    }
                }
                event = self.ingest.inputs.live_events.recv(), if self.ingest.live_open => {
                    match event {
                        Some(event) => self.emit_live(event, output)?,
                        None => {
                            self.ingest.live_open = false;
                            return Err(WorldSyncError::Fatal(
                                "live event stream dropped without recovery".to_string(),
                            ));
                        }
                    }
                }
            }
        }
    }

    /// Emit under the initial-phase rewrite rule: backfilled events are
    /// labeled "just before the current head" and never carry a real
    /// transaction boundary.
    fn emit_rewritten(
        &mut self,
        mut update: ComponentUpdate,
        output: &mpsc::UnboundedSender<ComponentUpdate>,
    ) -> Result<()> {
        update.block_number = self.ingest.target_block.saturating_sub(1);
        update.tx_hash = CACHE_TX_HASH.to_string();
        update.last_event_in_tx = false;
        self.emit(update, output)
    }

    /// Forward a live event unmodified.
    fn emit_live(
        &mut self,
        update: ComponentUpdate,
        output: &mpsc::UnboundedSender<ComponentUpdate>,
    ) -> Result<()> {
        self.emit(update, output)
    }

    fn emit(
        &mut self,
        update: ComponentUpdate,
        output: &mpsc::UnboundedSender<ComponentUpdate>,
    ) -> Result<()> {
        self.shadow.store_event(update.clone());
        self.emitted += 1;
        self.status.send_modify(|s| s.emitted += 1);
        // A closed output means downstream hung up; terminate cleanly.
        output
            .send(update)
            .map_err(|_| WorldSyncError::Cancelled)
    }

    fn maybe_checkpoint(&mut self) {
        let interval = self.options.cache_checkpoint_interval;
        if interval == 0 {
            return;
        }
        let frontier = self.ingest.target_block;
        if frontier.saturating_sub(self.last_checkpoint) < interval {
            return;
        }
        match self.cache.write(&self.shadow, frontier) {
            Ok(()) => self.last_checkpoint = frontier,
            Err(e) => warn!("Cache checkpoint at block {} failed: {}", frontier, e),
        }
    }

    fn set_phase(&self, phase: SyncPhase) {
        debug!("Entering {} phase", phase);
        self.status.send_modify(|s| {
            s.phase = phase;
            s.frontier_block = self.ingest.target_block;
            s.buffered = self.ingest.buffer.len();
        });
    }
}
