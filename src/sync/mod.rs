//! Chain state synchronization
//!
//! Reconstructs the on-chain component database into a local view (seeded
//! from a snapshot service, the persistent cache, or a block-range query),
//! then keeps it current from the live event stream.

pub mod cache;
pub mod cache_store;
pub mod gap_filler;
pub mod orchestrator;
pub mod provider;
pub mod range_fetcher;
pub mod resolver;
pub mod service;
pub mod snapshot;
pub mod types;

pub use cache::FileCache;
pub use cache::PersistentCache;
pub use cache::SyncCache;
pub use cache_store::CacheStore;
pub use gap_filler::GapFiller;
pub use orchestrator::SyncOrchestrator;
pub use orchestrator::SyncStatus;
pub use provider::sync_channels;
pub use provider::EventSource;
pub use provider::SyncInputHandles;
pub use provider::SyncInputs;
pub use range_fetcher::BlockRangeFetcher;
pub use resolver::InitialStateResolver;
pub use resolver::SeedSource;
pub use service::SyncReport;
pub use service::SyncService;
pub use snapshot::HttpSnapshotClient;
pub use snapshot::SnapshotSource;
pub use types::*;
