//! Core data types and tunables for the sync pipeline

use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use crate::config::AppConfig;

/// Transaction hash sentinel for updates synthesized from cache, snapshot or
/// gap backfill rather than observed in a real transaction.
pub const CACHE_TX_HASH: &str = "cache";

/// Snapshot must be ahead of the best cache candidate by more than this many
/// blocks before it is preferred. Below that, an incremental range fetch is
/// cheaper than the snapshot round-trip plus merge.
pub const SNAPSHOT_PREFER_THRESHOLD: u64 = 100;

/// Upper bound on the snapshot latest-block probe.
pub const SNAPSHOT_QUERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Retry budget for block-range fetches.
pub const RANGE_FETCH_MAX_RETRIES: u32 = 5;

/// Base delay of the range-fetch backoff (doubles per attempt).
pub const RANGE_FETCH_BASE_DELAY: Duration = Duration::from_millis(100);

/// Ceiling on a single backoff sleep.
pub const RANGE_FETCH_MAX_DELAY: Duration = Duration::from_secs(30);

/// Live-event buffer high-water mark. Crossing it logs a warning; events are
/// never dropped on overflow.
pub const LIVE_BUFFER_HIGH_WATER: usize = 100_000;

/// Persistent cache store holding the current block number (key `"current"`).
pub const BLOCK_NUMBER_STORE: &str = "BlockNumber";

/// Persistent cache store holding the serialized state.
pub const STATE_STORE: &str = "State";

/// Key under [`BLOCK_NUMBER_STORE`].
pub const CURRENT_BLOCK_KEY: &str = "current";

/// A single component write observed on chain.
///
/// This is the atomic unit flowing through the synchronizer: one value
/// assigned to one (component, entity) slot in some block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentUpdate {
    /// Opaque hex identifier of the component type
    pub component: String,
    /// Opaque hex identifier of the entity
    pub entity: String,
    /// Opaque component payload
    pub value: serde_json::Value,
    /// Originating transaction, or [`CACHE_TX_HASH`] for synthesized updates
    pub tx_hash: String,
    /// True only on the final update of a real transaction
    pub last_event_in_tx: bool,
    /// Block this update is associated with; rewritten during initial sync
    pub block_number: u64,
}

impl ComponentUpdate {
    /// Whether this update was synthesized rather than observed in a
    /// transaction.
    #[must_use]
    pub fn is_synthesized(&self) -> bool {
        self.tx_hash == CACHE_TX_HASH
    }
}

/// Phase of the synchronizer state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SyncPhase {
    Boot,
    Resolving,
    Seeding,
    GapFetching,
    DrainingBuffer,
    Live,
    Terminated,
}

impl SyncPhase {
    /// True while the block-number rewrite rule applies.
    #[must_use]
    pub const fn is_initial(self) -> bool {
        matches!(self, Self::Seeding | Self::GapFetching | Self::DrainingBuffer)
    }
}

impl std::fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Boot => "boot",
            Self::Resolving => "resolving",
            Self::Seeding => "seeding",
            Self::GapFetching => "gap_fetching",
            Self::DrainingBuffer => "draining_buffer",
            Self::Live => "live",
            Self::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// Immutable configuration for one synchronization session.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Snapshot service endpoint; empty means no snapshot service
    pub snapshot_service_url: String,
    /// Chain the world contract lives on
    pub chain_id: u64,
    /// World contract address (hex)
    pub world_address: String,
    /// World contract ABI location, consumed by the provider driver
    pub world_abi_path: Option<String>,
    /// Sync never starts earlier than this block
    pub initial_block_number: u64,
    /// Provider polling interval
    pub polling_interval_ms: u64,
    /// Whether the provider batches event queries
    pub batch_events: bool,
    /// Skip the provider network preflight check
    pub skip_network_check: bool,
    /// Checkpoint the shadow state every this many blocks during live sync
    pub cache_checkpoint_interval: u64,
}

impl SyncOptions {
    /// Build session options from the application config.
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            snapshot_service_url: config.snapshot.service_url.clone(),
            chain_id: config.sync.chain_id,
            world_address: config.sync.world_address.clone(),
            world_abi_path: config.sync.world_abi_path.clone(),
            initial_block_number: config.sync.initial_block_number,
            polling_interval_ms: config.provider.polling_interval_ms,
            batch_events: config.provider.batch_events,
            skip_network_check: config.provider.skip_network_check,
            cache_checkpoint_interval: config.cache.checkpoint_interval,
        }
    }

    /// Key space this session owns in the persistent cache.
    #[must_use]
    pub fn cache_namespace(&self) -> String {
        format!("{}-{}", self.chain_id, self.world_address)
    }

    /// Whether a snapshot service is configured at all.
    #[must_use]
    pub fn has_snapshot_service(&self) -> bool {
        !self.snapshot_service_url.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_ordering_matches_pipeline() {
        assert!(SyncPhase::Boot < SyncPhase::Resolving);
        assert!(SyncPhase::Seeding < SyncPhase::GapFetching);
        assert!(SyncPhase::GapFetching < SyncPhase::DrainingBuffer);
        assert!(SyncPhase::DrainingBuffer < SyncPhase::Live);
        assert!(SyncPhase::Live < SyncPhase::Terminated);
    }

    #[test]
    fn test_initial_phases() {
        assert!(!SyncPhase::Boot.is_initial());
        assert!(!SyncPhase::Resolving.is_initial());
        assert!(SyncPhase::Seeding.is_initial());
        assert!(SyncPhase::GapFetching.is_initial());
        assert!(SyncPhase::DrainingBuffer.is_initial());
        assert!(!SyncPhase::Live.is_initial());
    }

    #[test]
    fn test_synthesized_marker() {
        let update = ComponentUpdate {
            component: "0x10".to_string(),
            entity: "0x11".to_string(),
            value: serde_json::json!({ "x": 1 }),
            tx_hash: CACHE_TX_HASH.to_string(),
            last_event_in_tx: false,
            block_number: 42,
        };
        assert!(update.is_synthesized());
    }
}
