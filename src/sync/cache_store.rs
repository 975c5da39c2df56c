//! In-memory component update log with a compacted state view

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::sync::types::ComponentUpdate;
use crate::sync::types::CACHE_TX_HASH;
use crate::Result;

/// Latest value observed for one (component, entity) slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct CompactedEntry {
    value: serde_json::Value,
    block_number: u64,
}

/// Append-only log of component updates plus a compacted state map.
///
/// The log preserves observation order; the compacted map holds the latest
/// value per (component, entity). Replaying the log in order reproduces the
/// compacted state.
#[derive(Debug, Clone, Default)]
pub struct CacheStore {
    events: Vec<ComponentUpdate>,
    state: BTreeMap<(String, String), CompactedEntry>,
}

impl CacheStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an update and fold it into the compacted state.
    pub fn store_event(&mut self, update: ComponentUpdate) {
        self.state.insert(
            (update.component.clone(), update.entity.clone()),
            CompactedEntry {
                value: update.value.clone(),
                block_number: update.block_number,
            },
        );
        self.events.push(update);
    }

    /// Replay every update from `other`'s log, in order.
    pub fn merge_from(&mut self, other: &Self) {
        for update in &other.events {
            self.store_event(update.clone());
        }
    }

    /// The ordered update log.
    #[must_use]
    pub fn events(&self) -> &[ComponentUpdate] {
        &self.events
    }

    /// Iterate the compacted state as synthetic updates.
    ///
    /// Each entry carries the block number of the update that produced it,
    /// the [`CACHE_TX_HASH`] sentinel and a cleared transaction-end flag.
    /// Iteration order is stable between calls without intervening writes.
    pub fn state(&self) -> impl Iterator<Item = ComponentUpdate> + '_ {
        self.state
            .iter()
            .map(|((component, entity), entry)| ComponentUpdate {
                component: component.clone(),
                entity: entity.clone(),
                value: entry.value.clone(),
                tx_hash: CACHE_TX_HASH.to_string(),
                last_event_in_tx: false,
                block_number: entry.block_number,
            })
    }

    /// Number of updates in the log.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Number of live (component, entity) slots.
    #[must_use]
    pub fn state_len(&self) -> usize {
        self.state.len()
    }

    /// Highest block number present in the compacted state, or zero when
    /// empty.
    #[must_use]
    pub fn block_number(&self) -> u64 {
        self.state
            .values()
            .map(|entry| entry.block_number)
            .max()
            .unwrap_or(0)
    }

    /// Serialize the compacted state as a JSON update log.
    ///
    /// The log form is enough: replaying it reconstructs the state, and the
    /// compacted view is far smaller than the raw event history.
    pub fn to_persisted(&self) -> Result<String> {
        let compacted: Vec<ComponentUpdate> = self.state().collect();
        Ok(serde_json::to_string(&compacted)?)
    }

    /// Rebuild a store by replaying a persisted JSON update log.
    pub fn from_persisted(json: &str) -> Result<Self> {
        let events: Vec<ComponentUpdate> = serde_json::from_str(json)?;
        let mut store = Self::new();
        for update in events {
            store.store_event(update);
        }
        Ok(store)
    }

    /// Build a store from a raw update sequence, in observation order.
    #[must_use]
    pub fn from_events(events: Vec<ComponentUpdate>) -> Self {
        let mut store = Self::new();
        for update in events {
            store.store_event(update);
        }
        store
    }
}
