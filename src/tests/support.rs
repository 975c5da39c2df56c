//! Shared fixtures for the sync pipeline tests

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::sync::cache::PersistentCache;
use crate::sync::cache_store::CacheStore;
use crate::sync::provider::EventSource;
use crate::sync::snapshot::SnapshotSource;
use crate::sync::types::ComponentUpdate;
use crate::sync::types::SyncOptions;
use crate::sync::types::SyncPhase;
use crate::sync::SyncService;
use crate::Result;
use crate::WorldSyncError;

/// In-memory [`PersistentCache`] shared across sessions within a test.
#[derive(Default)]
pub struct MemoryCache {
    stores: Mutex<HashMap<String, HashMap<String, String>>>,
}

impl PersistentCache for MemoryCache {
    fn get(&self, store: &str, key: &str) -> Result<Option<String>> {
        let stores = self.stores.lock().unwrap();
        Ok(stores.get(store).and_then(|map| map.get(key).cloned()))
    }

    fn put(&self, store: &str, key: &str, value: &str) -> Result<()> {
        let mut stores = self.stores.lock().unwrap();
        stores
            .entry(store.to_string())
            .or_default()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Scripted [`EventSource`]: serves a fixed event log filtered by block
/// range, records every requested range, and can hold requests on a gate
/// until the test releases them.
pub struct ScriptedSource {
    events: Vec<ComponentUpdate>,
    pub calls: Mutex<Vec<(u64, u64)>>,
    gate: Option<Arc<tokio::sync::Semaphore>>,
}

impl ScriptedSource {
    #[must_use]
    pub fn new(events: Vec<ComponentUpdate>) -> Self {
        Self {
            events,
            calls: Mutex::new(Vec::new()),
            gate: None,
        }
    }

    /// Hold every `fetch_range` call until the gate receives a permit.
    #[must_use]
    pub fn gated(events: Vec<ComponentUpdate>, gate: Arc<tokio::sync::Semaphore>) -> Self {
        Self {
            events,
            calls: Mutex::new(Vec::new()),
            gate: Some(gate),
        }
    }
}

#[async_trait]
impl EventSource for ScriptedSource {
    async fn fetch_range(&self, from: u64, to: u64) -> Result<Vec<ComponentUpdate>> {
        self.calls.lock().unwrap().push((from, to));
        if let Some(gate) = &self.gate {
            let permit = gate
                .acquire()
                .await
                .map_err(|_| WorldSyncError::TransientFetch("gate closed".to_string()))?;
            permit.forget();
        }
        Ok(self
            .events
            .iter()
            .filter(|event| event.block_number >= from && event.block_number <= to)
            .cloned()
            .collect())
    }
}

/// Fixed-answer [`SnapshotSource`].
pub struct FixedSnapshot {
    pub latest: Option<u64>,
    pub state: Option<CacheStore>,
}

impl FixedSnapshot {
    #[must_use]
    pub fn unavailable() -> Self {
        Self {
            latest: None,
            state: None,
        }
    }
}

#[async_trait]
impl SnapshotSource for FixedSnapshot {
    async fn latest_block_number(&self) -> Option<u64> {
        self.latest
    }

    async fn fetch(&self) -> Result<CacheStore> {
        self.state
            .clone()
            .ok_or_else(|| WorldSyncError::Custom("no snapshot state scripted".to_string()))
    }
}

/// Session options for a local test world.
#[must_use]
pub fn test_options(initial_block_number: u64) -> SyncOptions {
    SyncOptions {
        snapshot_service_url: String::new(),
        chain_id: 31337,
        world_address: "0x0000000000000000000000000000000000c0ffee".to_string(),
        world_abi_path: None,
        initial_block_number,
        polling_interval_ms: 100,
        batch_events: true,
        skip_network_check: true,
        cache_checkpoint_interval: 100,
    }
}

/// A live update with a real transaction hash.
#[must_use]
pub fn live_update(
    component: &str,
    entity: &str,
    value: u64,
    tx_hash: &str,
    last_event_in_tx: bool,
    block_number: u64,
) -> ComponentUpdate {
    ComponentUpdate {
        component: component.to_string(),
        entity: entity.to_string(),
        value: serde_json::json!(value),
        tx_hash: tx_hash.to_string(),
        last_event_in_tx,
        block_number,
    }
}

/// Poll the service until it reaches `phase`.
///
/// # Panics
/// Panics when the phase is not reached within five seconds.
pub async fn wait_for_phase(service: &SyncService, phase: SyncPhase) {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if service.status().map(|report| report.phase) == Some(phase) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("service did not reach {phase} within 5s"));
}

/// Receive exactly `n` updates, failing fast on a stalled stream.
///
/// # Panics
/// Panics when fewer than `n` updates arrive within five seconds.
pub async fn recv_n(
    rx: &mut tokio::sync::mpsc::UnboundedReceiver<ComponentUpdate>,
    n: usize,
) -> Vec<ComponentUpdate> {
    let mut received = Vec::with_capacity(n);
    for i in 0..n {
        let update = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap_or_else(|_| panic!("timed out waiting for update {}/{n}", i + 1))
            .unwrap_or_else(|| panic!("stream ended after {i}/{n} updates"));
        received.push(update);
    }
    received
}

/// Assert nothing further is queued on the output.
pub async fn assert_no_more(rx: &mut tokio::sync::mpsc::UnboundedReceiver<ComponentUpdate>) {
    tokio::time::sleep(Duration::from_millis(50)).await;
    match rx.try_recv() {
        Err(_) => {}
        Ok(update) => panic!("unexpected extra update: {update:?}"),
    }
}
