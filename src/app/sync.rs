//! Sync orchestration.
//!
//! Each cycle derives its mode from the store: with no donation that carries a
//! block number the whole history is pulled, otherwise only transactions after
//! the highest stored block. Transactions are ingested one at a time in the
//! order the explorer returns them.

use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, instrument, warn};

use crate::domain::{
    AppError, Blockchain, Campaign, DOGE_CURRENCY_SYMBOL, Donation, DonationFilter, DonationOrder,
    DonationRepository, ExplorerClient, SyncReport, SyncState,
};

use super::cache_invalidator::CacheInvalidator;
use super::ingest::DonationIngestor;

/// Mode of the next cycle given the most recent donation that has a block number
#[must_use]
pub fn derive_state(latest: Option<&Donation>) -> SyncState {
    match latest.and_then(|donation| donation.block_number) {
        Some(cursor) => SyncState::IncrementalSync { cursor },
        None => SyncState::FullSync,
    }
}

/// Filter selecting the cursor donation of the monitored campaign
#[must_use]
pub fn cursor_filter() -> DonationFilter {
    DonationFilter::for_campaign(Blockchain::Dogecoin, Campaign::Ph, DOGE_CURRENCY_SYMBOL)
        .with_block_number()
        .ordered_by(DonationOrder::BlockNumberDesc)
}

/// Stateless driver of full and incremental sync cycles
#[derive(Clone)]
pub struct SyncOrchestrator {
    explorer: Arc<dyn ExplorerClient>,
    repository: Arc<dyn DonationRepository>,
    ingestor: DonationIngestor,
    invalidator: CacheInvalidator,
}

impl SyncOrchestrator {
    #[must_use]
    pub fn new(
        explorer: Arc<dyn ExplorerClient>,
        repository: Arc<dyn DonationRepository>,
        ingestor: DonationIngestor,
        invalidator: CacheInvalidator,
    ) -> Self {
        Self {
            explorer,
            repository,
            ingestor,
            invalidator,
        }
    }

    /// Mode the next cycle would run in
    pub async fn current_state(&self) -> Result<SyncState, AppError> {
        let latest = self.repository.find_first(&cursor_filter()).await?;
        Ok(derive_state(latest.as_ref()))
    }

    /// Run one sync cycle.
    ///
    /// An explorer failure aborts the cycle. Donations stored before the failure
    /// stay, so the next cycle resumes from them.
    #[instrument(skip(self), fields(address = %self.ingestor.monitored_address()))]
    pub async fn run_cycle(&self) -> Result<SyncReport, AppError> {
        let started_at = Utc::now();
        let state = self.current_state().await?;
        match state {
            SyncState::FullSync => info!("Syncing all donations"),
            SyncState::IncrementalSync { cursor } => {
                info!(cursor = cursor, "Syncing donations from block")
            }
        }

        if let Err(e) = self.invalidator.invalidate_aggregates().await {
            warn!(error = %e, "Cache invalidation failed");
        }

        let transactions = self
            .explorer
            .fetch_transactions(self.ingestor.monitored_address(), state.cursor())
            .await
            .inspect_err(|e| {
                if e.is_upstream_unavailable() {
                    error!(error = %e, "Explorer unavailable, aborting sync cycle");
                }
            })?;
        info!(count = transactions.len(), "Fetched transactions");

        let mut ingested = 0;
        for tx in &transactions {
            if self.ingestor.upsert_transaction(tx).await?.is_some() {
                ingested += 1;
            }
        }

        let report = SyncReport {
            state,
            fetched: transactions.len(),
            ingested,
            skipped: transactions.len() - ingested,
            started_at,
            finished_at: Utc::now(),
        };
        info!(
            fetched = report.fetched,
            ingested = report.ingested,
            skipped = report.skipped,
            "Sync cycle complete"
        );
        Ok(report)
    }
}
