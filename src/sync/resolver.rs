//! Initial state source selection
//!
//! Seeds a sync session from the cheapest state source that is worth using:
//! a remote snapshot when it is far enough ahead, the local persistent cache
//! otherwise, an empty store as the last resort.

use std::sync::Arc;

use tracing::info;
use tracing::warn;

use crate::sync::cache::SyncCache;
use crate::sync::cache_store::CacheStore;
use crate::sync::snapshot::SnapshotSource;
use crate::sync::types::SNAPSHOT_PREFER_THRESHOLD;
use crate::Result;

/// Where the seed state came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedSource {
    Snapshot,
    Cache,
    Empty,
}

/// Seed state plus the block number it is current to.
pub struct InitialState {
    pub store: CacheStore,
    pub block_number: u64,
    pub source: SeedSource,
}

/// Snapshot wins only when it is more than [`SNAPSHOT_PREFER_THRESHOLD`]
/// blocks ahead of the best cache candidate. A snapshot fetch is a fixed
/// cost; below the threshold the incremental range fetch is cheaper.
fn snapshot_preferred(cache_block: u64, snapshot_block: Option<u64>, floor: u64) -> bool {
    let candidate_cache = cache_block.max(floor);
    snapshot_block
        .is_some_and(|block| block > candidate_cache.saturating_add(SNAPSHOT_PREFER_THRESHOLD))
}

/// Decides and loads the seed state for one session.
pub struct InitialStateResolver {
    cache: SyncCache,
    snapshot: Arc<dyn SnapshotSource>,
}

impl InitialStateResolver {
    pub fn new(cache: SyncCache, snapshot: Arc<dyn SnapshotSource>) -> Self {
        Self { cache, snapshot }
    }

    /// Resolve the seed store and the block number it is current to.
    ///
    /// Sync never starts earlier than `initial_block_number`. Snapshot fetch
    /// failure falls back to the cache path; a missing or corrupt cache
    /// falls back to an empty seed at the floor.
    pub async fn resolve(&self, initial_block_number: u64) -> Result<InitialState> {
        let (cache_block, snapshot_block) = tokio::join!(
            async { self.cache.block_number() },
            self.snapshot.latest_block_number()
        );
        let candidate_cache = cache_block.max(initial_block_number);

        info!(
            "Resolving initial state: cache block {}, snapshot block {:?}, floor {}",
            cache_block, snapshot_block, initial_block_number
        );

        if snapshot_preferred(cache_block, snapshot_block, initial_block_number) {
            match self.snapshot.fetch().await {
                Ok(store) => {
                    let block_number = snapshot_block.unwrap_or_else(|| store.block_number());
                    info!(
                        "Seeding from snapshot at block {} ({} entries)",
                        block_number,
                        store.state_len()
                    );
                    return Ok(InitialState {
                        store,
                        block_number,
                        source: SeedSource::Snapshot,
                    });
                }
                Err(e) => {
                    warn!("Snapshot fetch failed, falling back to cache: {}", e);
                }
            }
        }

        match self.cache.state() {
            Some(store) if !store.is_empty() => {
                info!(
                    "Seeding from persistent cache at block {} ({} entries)",
                    candidate_cache,
                    store.state_len()
                );
                Ok(InitialState {
                    store,
                    block_number: candidate_cache,
                    source: SeedSource::Cache,
                })
            }
            _ => {
                info!("No usable seed, starting empty at block {}", initial_block_number);
                Ok(InitialState {
                    store: CacheStore::new(),
                    block_number: initial_block_number,
                    source: SeedSource::Empty,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use tempfile::TempDir;

    use super::*;
    use crate::sync::cache::FileCache;
    use crate::sync::cache::PersistentCache;
    use crate::sync::types::ComponentUpdate;
    use crate::WorldSyncError;

    struct FixedSnapshot {
        latest: Option<u64>,
        state: Option<CacheStore>,
    }

    #[async_trait]
    impl SnapshotSource for FixedSnapshot {
        async fn latest_block_number(&self) -> Option<u64> {
            self.latest
        }

        async fn fetch(&self) -> Result<CacheStore> {
            self.state
                .clone()
                .ok_or_else(|| WorldSyncError::Custom("snapshot fetch refused".to_string()))
        }
    }

    fn cached_update(block: u64) -> ComponentUpdate {
        ComponentUpdate {
            component: "0x10".to_string(),
            entity: "0x11".to_string(),
            value: serde_json::json!(1),
            tx_hash: "0xfeed".to_string(),
            last_event_in_tx: true,
            block_number: block,
        }
    }

    fn sync_cache(dir: &TempDir) -> SyncCache {
        let cache: Arc<dyn PersistentCache> = Arc::new(FileCache::open(dir.path()).unwrap());
        SyncCache::new(cache, "1-0xworld")
    }

    #[test]
    fn test_snapshot_preference_threshold() {
        // snapshot wins iff snapshot_bn > max(cache_bn, floor) + 100
        assert!(snapshot_preferred(99, Some(9999), 0));
        assert!(!snapshot_preferred(99, None, 0));
        assert!(!snapshot_preferred(500, Some(600), 0));
        assert!(snapshot_preferred(500, Some(601), 0));
        // floor dominates a smaller cache block
        assert!(!snapshot_preferred(0, Some(700), 600));
        assert!(snapshot_preferred(0, Some(701), 600));
        // snapshot behind cache always loses
        assert!(!snapshot_preferred(1000, Some(500), 0));
    }

    #[tokio::test]
    async fn test_snapshot_wins_when_far_ahead() {
        let dir = TempDir::new().unwrap();
        let cache = sync_cache(&dir);
        let mut seed = CacheStore::new();
        seed.store_event(cached_update(9999));

        let mut cached = CacheStore::new();
        cached.store_event(cached_update(99));
        cache.write(&cached, 99).unwrap();

        let resolver = InitialStateResolver::new(
            cache,
            Arc::new(FixedSnapshot {
                latest: Some(9999),
                state: Some(seed),
            }),
        );
        let initial = resolver.resolve(0).await.unwrap();
        assert_eq!(initial.source, SeedSource::Snapshot);
        assert_eq!(initial.block_number, 9999);
    }

    #[tokio::test]
    async fn test_cache_wins_when_snapshot_unavailable() {
        let dir = TempDir::new().unwrap();
        let cache = sync_cache(&dir);
        let mut cached = CacheStore::new();
        cached.store_event(cached_update(100));
        cache.write(&cached, 100).unwrap();

        let resolver = InitialStateResolver::new(
            cache,
            Arc::new(FixedSnapshot {
                latest: None,
                state: None,
            }),
        );
        let initial = resolver.resolve(0).await.unwrap();
        assert_eq!(initial.source, SeedSource::Cache);
        assert_eq!(initial.block_number, 100);
        assert_eq!(initial.store.state_len(), 1);
    }

    #[tokio::test]
    async fn test_snapshot_fetch_failure_falls_back_to_cache() {
        let dir = TempDir::new().unwrap();
        let cache = sync_cache(&dir);
        let mut cached = CacheStore::new();
        cached.store_event(cached_update(50));
        cache.write(&cached, 50).unwrap();

        let resolver = InitialStateResolver::new(
            cache,
            Arc::new(FixedSnapshot {
                latest: Some(10_000),
                state: None,
            }),
        );
        let initial = resolver.resolve(0).await.unwrap();
        assert_eq!(initial.source, SeedSource::Cache);
        assert_eq!(initial.block_number, 50);
    }

    #[tokio::test]
    async fn test_empty_everything_starts_at_floor() {
        let dir = TempDir::new().unwrap();
        let resolver = InitialStateResolver::new(
            sync_cache(&dir),
            Arc::new(FixedSnapshot {
                latest: None,
                state: None,
            }),
        );
        let initial = resolver.resolve(42).await.unwrap();
        assert_eq!(initial.source, SeedSource::Empty);
        assert_eq!(initial.block_number, 42);
        assert!(initial.store.is_empty());
    }

    #[tokio::test]
    async fn test_floor_raises_cache_candidate() {
        let dir = TempDir::new().unwrap();
        let cache = sync_cache(&dir);
        let mut cached = CacheStore::new();
        cached.store_event(cached_update(10));
        cache.write(&cached, 10).unwrap();

        let resolver = InitialStateResolver::new(
            cache,
            Arc::new(FixedSnapshot {
                latest: None,
                state: None,
            }),
        );
        let initial = resolver.resolve(500).await.unwrap();
        assert_eq!(initial.source, SeedSource::Cache);
        assert_eq!(initial.block_number, 500);
    }
}
