//! Gap fill between the seed state and the chain head

use tracing::info;

use crate::sync::cache_store::CacheStore;
use crate::sync::range_fetcher::BlockRangeFetcher;
use crate::Result;

/// Fetches the block range between the seed block and the head observed at
/// seeding time.
pub struct GapFiller {
    fetcher: BlockRangeFetcher,
}

impl GapFiller {
    pub fn new(fetcher: BlockRangeFetcher) -> Self {
        Self { fetcher }
    }

    /// Fetch `(from, to]`-adjacent updates, empty when there is no gap.
    ///
    /// The interval handed to the fetcher is inclusive on both ends; a seed
    /// already at or past the head needs nothing.
    pub async fn fill(&self, from: u64, to: u64) -> Result<CacheStore> {
        if to <= from {
            info!("No gap to fill (seed block {} >= head {})", from, to);
            return Ok(CacheStore::new());
        }
        info!("Filling gap from block {} to {}", from, to);
        self.fetcher.fetch(from, to).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;

    use super::*;
    use crate::sync::provider::EventSource;
    use crate::sync::types::ComponentUpdate;

    struct RecordingSource;

    #[async_trait]
    impl EventSource for RecordingSource {
        async fn fetch_range(&self, from: u64, to: u64) -> Result<Vec<ComponentUpdate>> {
            Ok(vec![ComponentUpdate {
                component: "0x20".to_string(),
                entity: "0x21".to_string(),
                value: serde_json::json!({ "from": from, "to": to }),
                tx_hash: "0xbeef".to_string(),
                last_event_in_tx: true,
                block_number: to,
            }])
        }
    }

    #[tokio::test]
    async fn test_no_gap_returns_empty() {
        let filler = GapFiller::new(BlockRangeFetcher::new(Arc::new(RecordingSource)));
        assert!(filler.fill(100, 100).await.unwrap().is_empty());
        assert!(filler.fill(100, 50).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_gap_delegates_to_fetcher() {
        let filler = GapFiller::new(BlockRangeFetcher::new(Arc::new(RecordingSource)));
        let store = filler.fill(99, 1001).await.unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(
            store.events()[0].value,
            serde_json::json!({ "from": 99, "to": 1001 })
        );
    }
}
