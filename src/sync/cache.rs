//! Persistent key-value cache backing the synchronizer state

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;

use tracing::debug;
use tracing::warn;

use crate::sync::cache_store::CacheStore;
use crate::sync::types::BLOCK_NUMBER_STORE;
use crate::sync::types::CURRENT_BLOCK_KEY;
use crate::sync::types::STATE_STORE;
use crate::Result;

/// String-keyed persistent store the synchronizer checkpoints into.
///
/// The synchronizer uses two stores per key space: `"BlockNumber"` with key
/// `"current"`, and `"State"` holding a serialized [`CacheStore`].
pub trait PersistentCache: Send + Sync {
    fn get(&self, store: &str, key: &str) -> Result<Option<String>>;
    fn put(&self, store: &str, key: &str, value: &str) -> Result<()>;
}

/// Directory-backed [`PersistentCache`]: one JSON object file per store.
pub struct FileCache {
    dir: PathBuf,
    // Serializes read-modify-write cycles on the store files
    lock: Mutex<()>,
}

impl FileCache {
    /// Open a cache rooted at `dir`, creating the directory if needed.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        if !dir.exists() {
            fs::create_dir_all(&dir)?;
        }
        Ok(Self {
            dir,
            lock: Mutex::new(()),
        })
    }

    fn store_path(&self, store: &str) -> PathBuf {
        // Store names may embed a chain-address namespace; keep them
        // filesystem-safe.
        let safe: String = store
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '.' {
                c
            } else {
                '_'
            })
            .collect();
        self.dir.join(format!("{safe}.json"))
    }

    fn read_store(&self, store: &str) -> HashMap<String, String> {
        let path = self.store_path(store);
        if !path.exists() {
            return HashMap::new();
        }
        match fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                warn!("Cache store {} is corrupt, treating as empty: {}", store, e);
                HashMap::new()
            }),
            Err(e) => {
                warn!("Failed to read cache store {}: {}", store, e);
                HashMap::new()
            }
        }
    }
}

impl PersistentCache for FileCache {
    fn get(&self, store: &str, key: &str) -> Result<Option<String>> {
        let _guard = self.lock.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        Ok(self.read_store(store).remove(key))
    }

    fn put(&self, store: &str, key: &str, value: &str) -> Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut map = self.read_store(store);
        map.insert(key.to_string(), value.to_string());
        let content = serde_json::to_string(&map)?;
        fs::write(self.store_path(store), content)?;
        debug!("Wrote cache store {} key {}", store, key);
        Ok(())
    }
}

/// Typed view over a [`PersistentCache`] for one (chain, world) key space.
///
/// Centralizes the corrupt-cache policy: unreadable data reads as empty with
/// a recoverable warning, never as an error.
#[derive(Clone)]
pub struct SyncCache {
    cache: Arc<dyn PersistentCache>,
    namespace: String,
}

impl SyncCache {
    pub fn new(cache: Arc<dyn PersistentCache>, namespace: impl Into<String>) -> Self {
        Self {
            cache,
            namespace: namespace.into(),
        }
    }

    fn store_name(&self, store: &str) -> String {
        format!("{}-{}", store, self.namespace)
    }

    /// Block number the cached state is current to, zero when absent or
    /// corrupt.
    #[must_use]
    pub fn block_number(&self) -> u64 {
        let raw = match self
            .cache
            .get(&self.store_name(BLOCK_NUMBER_STORE), CURRENT_BLOCK_KEY)
        {
            Ok(Some(raw)) => raw,
            Ok(None) => return 0,
            Err(e) => {
                warn!("Failed to read cached block number: {}", e);
                return 0;
            }
        };
        raw.parse().unwrap_or_else(|e| {
            warn!("Cached block number {:?} is corrupt: {}", raw, e);
            0
        })
    }

    /// Cached state, or `None` when absent or corrupt.
    #[must_use]
    pub fn state(&self) -> Option<CacheStore> {
        let raw = match self.cache.get(&self.store_name(STATE_STORE), CURRENT_BLOCK_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!("Failed to read cached state: {}", e);
                return None;
            }
        };
        match CacheStore::from_persisted(&raw) {
            Ok(store) => Some(store),
            Err(e) => {
                warn!("Cached state is corrupt, falling back to empty: {}", e);
                None
            }
        }
    }

    /// Checkpoint `store` as current to `block_number`.
    pub fn write(&self, store: &CacheStore, block_number: u64) -> Result<()> {
        self.cache.put(
            &self.store_name(STATE_STORE),
            CURRENT_BLOCK_KEY,
            &store.to_persisted()?,
        )?;
        self.cache.put(
            &self.store_name(BLOCK_NUMBER_STORE),
            CURRENT_BLOCK_KEY,
            &block_number.to_string(),
        )?;
        debug!(
            "Checkpointed {} entries at block {}",
            store.state_len(),
            block_number
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::sync::types::ComponentUpdate;

    #[test]
    fn test_file_cache_get_put_roundtrip() {
        let dir = TempDir::new().unwrap();
        let cache = FileCache::open(dir.path()).unwrap();

        assert!(cache.get("BlockNumber", "current").unwrap().is_none());
        cache.put("BlockNumber", "current", "123").unwrap();
        assert_eq!(
            cache.get("BlockNumber", "current").unwrap().as_deref(),
            Some("123")
        );

        // A second open sees the persisted value
        let reopened = FileCache::open(dir.path()).unwrap();
        assert_eq!(
            reopened.get("BlockNumber", "current").unwrap().as_deref(),
            Some("123")
        );
    }

    #[test]
    fn test_corrupt_store_file_reads_as_empty() {
        let dir = TempDir::new().unwrap();
        let cache = FileCache::open(dir.path()).unwrap();
        cache.put("State", "current", "[]").unwrap();

        std::fs::write(dir.path().join("State.json"), "not json at all").unwrap();
        assert!(cache.get("State", "current").unwrap().is_none());
    }

    #[test]
    fn test_sync_cache_checkpoint_roundtrip() {
        let dir = TempDir::new().unwrap();
        let cache: Arc<dyn PersistentCache> = Arc::new(FileCache::open(dir.path()).unwrap());
        let sync_cache = SyncCache::new(cache, "31337-0xworld");

        assert_eq!(sync_cache.block_number(), 0);
        assert!(sync_cache.state().is_none());

        let mut store = CacheStore::new();
        store.store_event(ComponentUpdate {
            component: "0x10".to_string(),
            entity: "0x11".to_string(),
            value: serde_json::json!({ "hp": 7 }),
            tx_hash: "0xabc".to_string(),
            last_event_in_tx: true,
            block_number: 100,
        });
        sync_cache.write(&store, 100).unwrap();

        assert_eq!(sync_cache.block_number(), 100);
        let restored = sync_cache.state().unwrap();
        assert_eq!(restored.state_len(), 1);
        assert_eq!(restored.block_number(), 100);
    }

    #[test]
    fn test_corrupt_block_number_reads_as_zero() {
        let dir = TempDir::new().unwrap();
        let cache: Arc<dyn PersistentCache> = Arc::new(FileCache::open(dir.path()).unwrap());
        cache
            .put("BlockNumber-1-0xw", "current", "not-a-number")
            .unwrap();
        let sync_cache = SyncCache::new(cache, "1-0xw");
        assert_eq!(sync_cache.block_number(), 0);
    }
}
