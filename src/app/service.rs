//! Application service layer.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, info, instrument, warn};
use validator::Validate;

use crate::domain::{
    AddressBalance, AppError, Blockchain, Cache, Campaign, CreateHookRequest, DOGE_CURRENCY_SYMBOL,
    DeliveryLogRepository, DeliveryOutcome, Donation, DonationFilter, DonationOrder,
    DonationQuery, DonationRepository, ExplorerClient, ExplorerHook, HealthResponse,
    HealthStatus, LeaderboardEntry, NameResolver, SyncReport, TotalReceived, Transaction,
    ValidationError, WebhookDeliveryRecord, to_whole_units,
};

use super::cache_invalidator::{CacheInvalidator, LEADERBOARD_CACHE_KEY, TOTAL_CACHE_KEY};
use super::dispatcher::WebhookDispatcher;
use super::ingest::DonationIngestor;
use super::sync::SyncOrchestrator;

/// Monitored address in production
pub const PRODUCTION_DOGE_ADDRESS: &str = "D7JykcnAKNVmreu97EcdRY58n4q5MrTRzV";

/// Monitored address in every other environment
pub const TESTNET_DOGE_ADDRESS: &str = "DNk1wuxV4DqiPMvqnwXU6R1AirdB7YZh32";

/// Lifetime of the total and leaderboard aggregates
pub const AGGREGATE_CACHE_TTL_SECS: u64 = 300;

/// Donations before this instant do not count towards the leaderboard
#[must_use]
pub fn leaderboard_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Per-sender totals, largest first. Donations without a sender are left out.
#[must_use]
pub fn build_leaderboard(donations: &[Donation]) -> Vec<LeaderboardEntry> {
    let mut totals: HashMap<&str, (Decimal, u64)> = HashMap::new();
    for donation in donations.iter().filter(|d| !d.from_address.is_empty()) {
        let entry = totals
            .entry(donation.from_address.as_str())
            .or_insert((Decimal::ZERO, 0));
        entry.0 += donation.amount;
        entry.1 += 1;
    }

    let mut leaderboard: Vec<LeaderboardEntry> = totals
        .into_iter()
        .map(|(address, (total_amount, donation_count))| LeaderboardEntry {
            address: address.to_string(),
            total_amount,
            donation_count,
        })
        .collect();
    leaderboard.sort_by(|a, b| {
        b.total_amount
            .cmp(&a.total_amount)
            .then_with(|| a.address.cmp(&b.address))
    });
    leaderboard
}

/// Application service containing business logic
pub struct AppService {
    repository: Arc<dyn DonationRepository>,
    delivery_log: Arc<dyn DeliveryLogRepository>,
    explorer: Arc<dyn ExplorerClient>,
    cache: Arc<dyn Cache>,
    ingestor: DonationIngestor,
    invalidator: CacheInvalidator,
    orchestrator: SyncOrchestrator,
    /// Absent when no downstream webhook is configured
    dispatcher: Option<WebhookDispatcher>,
}

impl AppService {
    #[must_use]
    pub fn new(
        repository: Arc<dyn DonationRepository>,
        delivery_log: Arc<dyn DeliveryLogRepository>,
        explorer: Arc<dyn ExplorerClient>,
        cache: Arc<dyn Cache>,
        names: Arc<dyn NameResolver>,
        monitored_address: impl Into<String>,
    ) -> Self {
        let ingestor =
            DonationIngestor::new(Arc::clone(&repository), names, monitored_address);
        let invalidator = CacheInvalidator::new(Arc::clone(&cache));
        let orchestrator = SyncOrchestrator::new(
            Arc::clone(&explorer),
            Arc::clone(&repository),
            ingestor.clone(),
            invalidator.clone(),
        );
        Self {
            repository,
            delivery_log,
            explorer,
            cache,
            ingestor,
            invalidator,
            orchestrator,
            dispatcher: None,
        }
    }

    /// Enable outbound delivery of webhook-notified donations
    #[must_use]
    pub fn with_dispatcher(mut self, dispatcher: WebhookDispatcher) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    #[must_use]
    pub fn monitored_address(&self) -> &str {
        self.ingestor.monitored_address()
    }

    /// Run one full or incremental sync cycle. Never dispatches outbound webhooks.
    pub async fn sync_donations(&self) -> Result<SyncReport, AppError> {
        self.orchestrator.run_cycle().await
    }

    /// Sweep expired cache entries. A failing cache is logged and reported as zero.
    pub async fn purge_expired_cache(&self) -> usize {
        match self.cache.purge_expired().await {
            Ok(purged) => {
                if purged > 0 {
                    debug!(purged, "Purged expired cache entries");
                }
                purged
            }
            Err(e) => {
                warn!(error = %e, "Cache purge failed");
                0
            }
        }
    }

    /// Handle a transaction pushed by the explorer.
    ///
    /// Returns `None` when the transaction is not a donation. A new or updated
    /// donation is forwarded downstream when a dispatcher is configured.
    #[instrument(skip(self, tx), fields(tx_hash = %tx.hash))]
    pub async fn process_webhook(&self, tx: &Transaction) -> Result<Option<Donation>, AppError> {
        info!("Processing explorer notification");
        if let Err(e) = self.invalidator.invalidate_aggregates().await {
            warn!(error = %e, "Cache invalidation failed");
        }

        let Some(donation) = self.ingestor.upsert_transaction(tx).await? else {
            info!("Notification is not a donation");
            return Ok(None);
        };

        if let Some(dispatcher) = &self.dispatcher {
            dispatcher.deliver(&donation).await;
        }
        Ok(Some(donation))
    }

    /// Donations of the campaign, newest first
    #[instrument(skip(self))]
    pub async fn get_donations(&self, query: &DonationQuery) -> Result<Vec<Donation>, AppError> {
        query
            .validate()
            .map_err(|e| AppError::Validation(ValidationError::Multiple(e.to_string())))?;

        let mut filter = DonationFilter {
            campaign: Some(Campaign::Ph),
            ..Default::default()
        }
        .ordered_by(DonationOrder::BlockCreatedAtDesc)
        .limit(query.limit);
        if let Some(since) = query.since {
            filter = filter.since(since);
        }
        self.repository.find_many(&filter).await
    }

    /// Total received by the monitored address, cached
    #[instrument(skip(self))]
    pub async fn get_total_received(&self) -> Result<TotalReceived, AppError> {
        self.cached(TOTAL_CACHE_KEY, || async {
            let summary = self.explorer.get_address(self.monitored_address()).await?;
            Ok::<_, AppError>(TotalReceived {
                total_received: to_whole_units(summary.total_received),
                currency: DOGE_CURRENCY_SYMBOL.to_string(),
            })
        })
        .await
    }

    /// Donor leaderboard since 2023, cached
    #[instrument(skip(self))]
    pub async fn get_leaderboard(&self) -> Result<Vec<LeaderboardEntry>, AppError> {
        self.cached(LEADERBOARD_CACHE_KEY, || async {
            let filter = DonationFilter::for_campaign(
                Blockchain::Dogecoin,
                Campaign::Ph,
                DOGE_CURRENCY_SYMBOL,
            )
            .since(leaderboard_start())
            .ordered_by(DonationOrder::BlockCreatedAtDesc);
            let donations = self.repository.find_many(&filter).await?;
            Ok::<_, AppError>(build_leaderboard(&donations))
        })
        .await
    }

    /// Read-through cache. Cache failures fall back to `load`.
    async fn cached<T, F, Fut>(&self, key: &str, load: F) -> Result<T, AppError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        match self.cache.get(key).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(value) => return Ok(value),
                Err(e) => warn!(key = %key, error = %e, "Discarding unreadable cache entry"),
            },
            Ok(None) => {}
            Err(e) => warn!(key = %key, error = %e, "Cache read failed"),
        }

        let value = load().await?;
        match serde_json::to_string(&value) {
            Ok(raw) => {
                if let Err(e) = self.cache.set(key, raw, AGGREGATE_CACHE_TTL_SECS).await {
                    warn!(key = %key, error = %e, "Cache write failed");
                }
            }
            Err(e) => warn!(key = %key, error = %e, "Failed to serialize cache entry"),
        }
        Ok(value)
    }

    /// Most recent delivery records first
    pub async fn list_deliveries(&self, limit: i64) -> Result<Vec<WebhookDeliveryRecord>, AppError> {
        self.delivery_log.find_many(limit).await
    }

    /// Send a stored donation downstream again
    #[instrument(skip(self))]
    pub async fn dispatch_donation(&self, id: i64) -> Result<DeliveryOutcome, AppError> {
        let dispatcher = self.dispatcher.as_ref().ok_or_else(|| {
            AppError::NotSupported("donation webhook is not configured".to_string())
        })?;
        let donation = self
            .repository
            .find_first_or_throw(&DonationFilter::by_id(id))
            .await?;
        Ok(dispatcher.deliver(&donation).await)
    }

    /// Subscribe the monitored address to confirmed-transaction notifications
    #[instrument(skip(self, request), fields(url = %request.url))]
    pub async fn create_hook(&self, request: &CreateHookRequest) -> Result<ExplorerHook, AppError> {
        request
            .validate()
            .map_err(|e| AppError::Validation(ValidationError::Multiple(e.to_string())))?;
        self.explorer
            .create_hook(self.monitored_address(), request)
            .await
    }

    pub async fn list_hooks(&self) -> Result<Vec<ExplorerHook>, AppError> {
        self.explorer.list_hooks().await
    }

    pub async fn get_hook(&self, id: &str) -> Result<ExplorerHook, AppError> {
        self.explorer.get_hook(id).await
    }

    #[instrument(skip(self))]
    pub async fn delete_hook(&self, id: &str) -> Result<(), AppError> {
        self.explorer.delete_hook(id).await
    }

    /// Final balance of the monitored address, in whole DOGE
    pub async fn get_balance(&self) -> Result<AddressBalance, AppError> {
        let balance = self.explorer.get_balance(self.monitored_address()).await?;
        Ok(AddressBalance {
            address: self.monitored_address().to_string(),
            balance,
            currency: DOGE_CURRENCY_SYMBOL.to_string(),
        })
    }

    /// Perform health check on all dependencies
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> HealthResponse {
        let database = match self.repository.health_check().await {
            Ok(()) => HealthStatus::Healthy,
            Err(_) => HealthStatus::Unhealthy,
        };
        let explorer = match self.explorer.health_check().await {
            Ok(()) => HealthStatus::Healthy,
            Err(_) => HealthStatus::Unhealthy,
        };
        HealthResponse::new(database, explorer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn donation(id: i64, from: &str, amount: &str) -> Donation {
        let at = Utc.with_ymd_and_hms(2023, 6, 1, 0, 0, 0).unwrap();
        Donation {
            id,
            tx_hash: format!("tx{}", id),
            amount: Decimal::from_str(amount).unwrap(),
            from_address: from.to_string(),
            to_address: TESTNET_DOGE_ADDRESS.to_string(),
            blockchain: Blockchain::Dogecoin,
            campaign: Campaign::Ph,
            currency: DOGE_CURRENCY_SYMBOL.to_string(),
            block_created_at: at,
            block_number: Some(id),
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn test_leaderboard_groups_and_sorts() {
        let donations = vec![
            donation(1, "DAlice", "10.5"),
            donation(2, "DBob", "100"),
            donation(3, "DAlice", "0.25"),
            donation(4, "", "999"),
        ];
        let board = build_leaderboard(&donations);

        assert_eq!(board.len(), 2);
        assert_eq!(board[0].address, "DBob");
        assert_eq!(board[0].donation_count, 1);
        assert_eq!(board[1].address, "DAlice");
        assert_eq!(board[1].total_amount, Decimal::from_str("10.75").unwrap());
        assert_eq!(board[1].donation_count, 2);
    }

    #[test]
    fn test_leaderboard_ties_break_by_address() {
        let board = build_leaderboard(&[donation(1, "DZed", "5"), donation(2, "DAmy", "5")]);
        assert_eq!(board[0].address, "DAmy");
        assert_eq!(board[1].address, "DZed");
    }

    #[test]
    fn test_leaderboard_start() {
        assert_eq!(leaderboard_start().to_rfc3339(), "2023-01-01T00:00:00+00:00");
    }
}
