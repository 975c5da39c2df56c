//! Collaborator seam to the chain event provider
//!
//! The low-level JSON-RPC / log-subscription driver lives outside this
//! crate. It feeds the synchronizer through two channels (head ticks and
//! live component updates) and answers historical range queries through the
//! [`EventSource`] trait.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::sync::types::ComponentUpdate;
use crate::Result;

/// Historical event query surface of the chain provider.
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Every component update the world contract emitted in the inclusive
    /// block range, in observation order.
    async fn fetch_range(&self, from: u64, to: u64) -> Result<Vec<ComponentUpdate>>;
}

/// Input streams one synchronization session consumes.
pub struct SyncInputs {
    /// Monotonically non-decreasing chain head ticks
    pub block_numbers: mpsc::UnboundedReceiver<u64>,
    /// Component updates in chain-observed order
    pub live_events: mpsc::UnboundedReceiver<ComponentUpdate>,
}

/// Sender halves of [`SyncInputs`], held by the driver.
pub struct SyncInputHandles {
    pub block_numbers: mpsc::UnboundedSender<u64>,
    pub live_events: mpsc::UnboundedSender<ComponentUpdate>,
}

/// Create a connected input channel pair.
#[must_use]
pub fn sync_channels() -> (SyncInputHandles, SyncInputs) {
    let (block_tx, block_rx) = mpsc::unbounded_channel();
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    (
        SyncInputHandles {
            block_numbers: block_tx,
            live_events: event_tx,
        },
        SyncInputs {
            block_numbers: block_rx,
            live_events: event_rx,
        },
    )
}
