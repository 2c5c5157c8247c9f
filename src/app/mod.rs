//! Application layer containing business logic and shared state.

pub mod cache_invalidator;
pub mod dispatcher;
pub mod ingest;
pub mod service;
pub mod state;
pub mod sync;
pub mod worker;

pub use cache_invalidator::{CacheInvalidator, LEADERBOARD_CACHE_KEY, TOTAL_CACHE_KEY};
pub use dispatcher::{
    PRODUCTION_DONATION_WEBHOOK_URL, TESTNET_DONATION_WEBHOOK_URL, WebhookDispatcher,
    WebhookDispatcherConfig,
};
pub use ingest::DonationIngestor;
pub use service::{AppService, PRODUCTION_DOGE_ADDRESS, TESTNET_DOGE_ADDRESS};
pub use state::AppState;
pub use sync::{SyncOrchestrator, derive_state};
pub use worker::{SyncWorker, SyncWorkerConfig, spawn_sync_worker};
