//! Block-range event fetching with bounded retry

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;
use tracing::warn;

use crate::sync::cache_store::CacheStore;
use crate::sync::provider::EventSource;
use crate::sync::types::RANGE_FETCH_BASE_DELAY;
use crate::sync::types::RANGE_FETCH_MAX_DELAY;
use crate::sync::types::RANGE_FETCH_MAX_RETRIES;
use crate::Result;
use crate::WorldSyncError;

/// Fetches all component updates in an inclusive block range.
///
/// Transient provider failures are retried with exponential backoff;
/// exhausting the retry budget or hitting a non-transient failure escalates
/// to [`WorldSyncError::Fatal`].
#[derive(Clone)]
pub struct BlockRangeFetcher {
    source: Arc<dyn EventSource>,
}

impl BlockRangeFetcher {
    pub fn new(source: Arc<dyn EventSource>) -> Self {
        Self { source }
    }

    /// Fetch every update with `block_number` in `[from, to]`, in
    /// observation order.
    pub async fn fetch(&self, from: u64, to: u64) -> Result<CacheStore> {
        if from > to {
            return Err(WorldSyncError::InvalidRange { from, to });
        }

        let mut attempt = 1u32;
        loop {
            match self.source.fetch_range(from, to).await {
                Ok(events) => {
                    debug!(
                        "Fetched {} events for block range {}-{}",
                        events.len(),
                        from,
                        to
                    );
                    return Ok(CacheStore::from_events(events));
                }
                Err(e) if e.is_transient() && attempt < RANGE_FETCH_MAX_RETRIES => {
                    let delay = backoff_delay(attempt);
                    warn!(
                        "Range fetch {}-{} failed (attempt {}/{}): {}. Retrying in {:?}",
                        from, to, attempt, RANGE_FETCH_MAX_RETRIES, e, delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) if e.is_transient() => {
                    return Err(WorldSyncError::Fatal(format!(
                        "range fetch {from}-{to} failed after {RANGE_FETCH_MAX_RETRIES} attempts: {e}"
                    )));
                }
                Err(e) => {
                    return Err(WorldSyncError::Fatal(format!(
                        "range fetch {from}-{to} failed: {e}"
                    )));
                }
            }
        }
    }
}

/// Exponential backoff: 100ms, 200ms, 400ms, ... capped at 30s.
fn backoff_delay(attempt: u32) -> Duration {
    let exp = attempt.saturating_sub(1).min(16);
    let delay = RANGE_FETCH_BASE_DELAY.saturating_mul(1 << exp);
    delay.min(RANGE_FETCH_MAX_DELAY)
}
