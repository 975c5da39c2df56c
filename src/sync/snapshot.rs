//! Snapshot service client

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::sync::cache_store::CacheStore;
use crate::sync::types::ComponentUpdate;
use crate::sync::types::CACHE_TX_HASH;
use crate::sync::types::SNAPSHOT_QUERY_TIMEOUT;
use crate::Result;
use crate::WorldSyncError;

/// Snapshot service surface the resolver consults.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Block number of the latest available snapshot, or `None` when no
    /// snapshot service is reachable. Never errors: unavailability is a
    /// normal resolver input, not a failure.
    async fn latest_block_number(&self) -> Option<u64>;

    /// Fetch the full snapshot state.
    async fn fetch(&self) -> Result<CacheStore>;
}

#[derive(Debug, Deserialize)]
struct LatestBlockResponse {
    block_number: u64,
}

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotEntry {
    component: String,
    entity: String,
    value: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct SnapshotResponse {
    block_number: u64,
    state: Vec<SnapshotEntry>,
}

/// HTTP client for the snapshot service.
///
/// Any failure of the latest-block probe (empty URL, DNS, 4xx/5xx, timeout,
/// malformed body) collapses to "snapshot unavailable".
#[derive(Clone)]
pub struct HttpSnapshotClient {
    client: Client,
    base_url: String,
}

impl HttpSnapshotClient {
    #[must_use]
    pub fn new(service_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: service_url.trim_end_matches('/').to_string(),
        }
    }

    async fn query_latest(&self) -> Result<u64> {
        let url = format!("{}/latest_block_number", self.base_url);
        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(WorldSyncError::Custom(format!(
                "snapshot latest block query failed: HTTP {}",
                response.status()
            )));
        }
        let latest: LatestBlockResponse = response.json().await?;
        Ok(latest.block_number)
    }
}

#[async_trait]
impl SnapshotSource for HttpSnapshotClient {
    async fn latest_block_number(&self) -> Option<u64> {
        if self.base_url.is_empty() {
            debug!("No snapshot service configured");
            return None;
        }

        match tokio::time::timeout(SNAPSHOT_QUERY_TIMEOUT, self.query_latest()).await {
            Ok(Ok(block_number)) => {
                debug!("Snapshot service has snapshot at block {}", block_number);
                Some(block_number)
            }
            Ok(Err(e)) => {
                warn!("Snapshot service unavailable: {}", e);
                None
            }
            Err(_) => {
                warn!(
                    "Snapshot service did not answer within {:?}",
                    SNAPSHOT_QUERY_TIMEOUT
                );
                None
            }
        }
    }

    async fn fetch(&self) -> Result<CacheStore> {
        if self.base_url.is_empty() {
            return Err(WorldSyncError::Custom(
                "no snapshot service configured".to_string(),
            ));
        }

        let url = format!("{}/snapshot", self.base_url);
        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(WorldSyncError::Custom(format!(
                "snapshot fetch failed: HTTP {}",
                response.status()
            )));
        }
        let snapshot: SnapshotResponse = response.json().await?;

        info!(
            "Fetched snapshot at block {} with {} entries",
            snapshot.block_number,
            snapshot.state.len()
        );

        let mut store = CacheStore::new();
        for entry in snapshot.state {
            store.store_event(ComponentUpdate {
                component: entry.component,
                entity: entry.entity,
                value: entry.value,
                tx_hash: CACHE_TX_HASH.to_string(),
                last_event_in_tx: false,
                block_number: snapshot.block_number,
            });
        }
        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_url_means_unavailable() {
        let client = HttpSnapshotClient::new("");
        assert_eq!(client.latest_block_number().await, None);
        assert!(client.fetch().await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreachable_service_means_unavailable() {
        // Reserved TEST-NET-1 address, nothing listens there
        let client = HttpSnapshotClient::new("http://192.0.2.1:1");
        assert_eq!(client.latest_block_number().await, None);
    }
}
