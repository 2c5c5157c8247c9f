//! Mock implementations for testing.

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::domain::{
    AddressSummary, AppError, AuxiliaryError, Cache, CreateHookRequest, DatabaseError,
    DeliveryLogRepository, Donation, DonationFilter, DonationRepository, ErrorReporter,
    ExplorerClient, ExplorerHook, ExternalServiceError, NameResolver, NewDonation,
    NewWebhookDeliveryRecord, Transaction, WebhookDeliveryRecord, to_whole_units,
};

/// Configuration for mock behavior
#[derive(Debug, Clone, Default)]
pub struct MockConfig {
    pub should_fail: bool,
    pub error_message: Option<String>,
}

impl MockConfig {
    #[must_use]
    pub fn success() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            should_fail: true,
            error_message: Some(message.into()),
        }
    }

    fn message(&self) -> String {
        self.error_message
            .clone()
            .unwrap_or_else(|| "Mock error".to_string())
    }
}

/// Ordered record of calls shared between several mocks
pub type CallLog = Arc<Mutex<Vec<String>>>;

fn record_call(log: &Option<CallLog>, call: String) {
    if let Some(log) = log {
        log.lock().unwrap().push(call);
    }
}

/// In-memory donation store keyed by transaction hash
pub struct MockDonationRepository {
    storage: Arc<Mutex<HashMap<String, Donation>>>,
    next_id: AtomicI64,
    upsert_calls: AtomicI64,
    config: MockConfig,
    is_healthy: AtomicBool,
}

impl MockDonationRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(MockConfig::success())
    }

    #[must_use]
    pub fn with_config(config: MockConfig) -> Self {
        Self {
            storage: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicI64::new(1),
            upsert_calls: AtomicI64::new(0),
            config,
            is_healthy: AtomicBool::new(true),
        }
    }

    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self::with_config(MockConfig::failure(message))
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.is_healthy.store(healthy, Ordering::Relaxed);
    }

    /// All stored donations ordered by id
    pub fn get_all_items(&self) -> Vec<Donation> {
        let mut items: Vec<Donation> = self.storage.lock().unwrap().values().cloned().collect();
        items.sort_by_key(|d| d.id);
        items
    }

    /// Number of `upsert` calls so far
    pub fn upsert_count(&self) -> i64 {
        self.upsert_calls.load(Ordering::Relaxed)
    }

    fn check_should_fail(&self) -> Result<(), AppError> {
        if self.config.should_fail {
            return Err(AppError::Database(DatabaseError::Query(
                self.config.message(),
            )));
        }
        Ok(())
    }
}

impl Default for MockDonationRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DonationRepository for MockDonationRepository {
    async fn health_check(&self) -> Result<(), AppError> {
        if !self.is_healthy.load(Ordering::Relaxed) {
            return Err(AppError::Database(DatabaseError::Connection(
                "Unhealthy".to_string(),
            )));
        }
        self.check_should_fail()
    }

    async fn find_many(&self, filter: &DonationFilter) -> Result<Vec<Donation>, AppError> {
        self.check_should_fail()?;
        let mut items: Vec<Donation> = self
            .get_all_items()
            .into_iter()
            .filter(|d| filter.matches(d))
            .collect();
        if let Some(order) = filter.order_by {
            items.sort_by(|a, b| order.compare(a, b).then_with(|| b.id.cmp(&a.id)));
        }
        if let Some(limit) = filter.limit {
            items.truncate(limit.max(0) as usize);
        }
        Ok(items)
    }

    async fn find_first(&self, filter: &DonationFilter) -> Result<Option<Donation>, AppError> {
        let filter = filter.clone().limit(1);
        Ok(self.find_many(&filter).await?.into_iter().next())
    }

    async fn upsert(&self, donation: &NewDonation) -> Result<i64, AppError> {
        self.check_should_fail()?;
        self.upsert_calls.fetch_add(1, Ordering::Relaxed);
        let now = Utc::now();
        let mut storage = self.storage.lock().unwrap();
        let (id, created_at) = match storage.get(&donation.tx_hash) {
            Some(existing) => (existing.id, existing.created_at),
            None => (self.next_id.fetch_add(1, Ordering::Relaxed), now),
        };
        storage.insert(
            donation.tx_hash.clone(),
            Donation {
                id,
                tx_hash: donation.tx_hash.clone(),
                amount: donation.amount,
                from_address: donation.from_address.clone(),
                to_address: donation.to_address.clone(),
                blockchain: donation.blockchain,
                campaign: donation.campaign,
                currency: donation.currency.clone(),
                block_created_at: donation.block_created_at,
                block_number: donation.block_number,
                created_at,
                updated_at: now,
            },
        );
        Ok(id)
    }
}

/// In-memory delivery audit log
pub struct MockDeliveryLog {
    records: Arc<Mutex<Vec<WebhookDeliveryRecord>>>,
    config: MockConfig,
}

impl MockDeliveryLog {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(MockConfig::success())
    }

    #[must_use]
    pub fn with_config(config: MockConfig) -> Self {
        Self {
            records: Arc::new(Mutex::new(Vec::new())),
            config,
        }
    }

    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self::with_config(MockConfig::failure(message))
    }

    /// Records in insertion order
    pub fn get_records(&self) -> Vec<WebhookDeliveryRecord> {
        self.records.lock().unwrap().clone()
    }
}

impl Default for MockDeliveryLog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeliveryLogRepository for MockDeliveryLog {
    async fn create(
        &self,
        record: &NewWebhookDeliveryRecord,
    ) -> Result<WebhookDeliveryRecord, AppError> {
        if self.config.should_fail {
            return Err(AppError::Database(DatabaseError::Query(
                self.config.message(),
            )));
        }
        let stored = WebhookDeliveryRecord {
            id: Uuid::now_v7(),
            donation_id: record.donation_id,
            url: record.url.clone(),
            is_successful: record.is_successful,
            response_code: record.response_code,
            response: record.response.clone(),
            inserted_at: Utc::now(),
        };
        self.records.lock().unwrap().push(stored.clone());
        Ok(stored)
    }

    async fn find_many(&self, limit: i64) -> Result<Vec<WebhookDeliveryRecord>, AppError> {
        let mut records = self.get_records();
        records.reverse();
        records.truncate(limit.max(0) as usize);
        Ok(records)
    }
}

/// Cache that remembers every deleted key. TTLs are ignored.
pub struct MockCache {
    entries: Arc<Mutex<HashMap<String, String>>>,
    deleted: Arc<Mutex<Vec<String>>>,
    purges: AtomicUsize,
    calls: Option<CallLog>,
    config: MockConfig,
}

impl MockCache {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(MockConfig::success())
    }

    #[must_use]
    pub fn with_config(config: MockConfig) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            deleted: Arc::new(Mutex::new(Vec::new())),
            purges: AtomicUsize::new(0),
            calls: None,
            config,
        }
    }

    /// Append `del <key>` to `log` on every delete
    #[must_use]
    pub fn with_call_log(mut self, log: CallLog) -> Self {
        self.calls = Some(log);
        self
    }

    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self::with_config(MockConfig::failure(message))
    }

    /// Keys passed to `del`, in call order
    pub fn deleted_keys(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.lock().unwrap().contains_key(key)
    }

    /// Number of `purge_expired` calls so far
    pub fn purge_count(&self) -> usize {
        self.purges.load(Ordering::Relaxed)
    }

    fn check_should_fail(&self) -> Result<(), AuxiliaryError> {
        if self.config.should_fail {
            return Err(AuxiliaryError::Cache(self.config.message()));
        }
        Ok(())
    }
}

impl Default for MockCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Cache for MockCache {
    async fn get(&self, key: &str) -> Result<Option<String>, AuxiliaryError> {
        self.check_should_fail()?;
        Ok(self.entries.lock().unwrap().get(key).cloned())
    }

    async fn set(&self, key: &str, value: String, _ttl_secs: u64) -> Result<(), AuxiliaryError> {
        self.check_should_fail()?;
        self.entries.lock().unwrap().insert(key.to_string(), value);
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<(), AuxiliaryError> {
        self.deleted.lock().unwrap().push(key.to_string());
        record_call(&self.calls, format!("del {}", key));
        self.check_should_fail()?;
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }

    async fn purge_expired(&self) -> Result<usize, AuxiliaryError> {
        self.purges.fetch_add(1, Ordering::Relaxed);
        self.check_should_fail()?;
        Ok(0)
    }
}

/// Explorer serving a fixed transaction list.
///
/// `fetch_transactions` returns the transactions above the cursor height,
/// plus unconfirmed ones, in the order they were added.
pub struct MockExplorerClient {
    transactions: Arc<Mutex<Vec<Transaction>>>,
    cursors: Arc<Mutex<Vec<Option<i64>>>>,
    hooks: Arc<Mutex<Vec<ExplorerHook>>>,
    summary: Arc<Mutex<AddressSummary>>,
    calls: Option<CallLog>,
    config: MockConfig,
    is_healthy: AtomicBool,
}

impl MockExplorerClient {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(MockConfig::success())
    }

    #[must_use]
    pub fn with_config(config: MockConfig) -> Self {
        Self {
            transactions: Arc::new(Mutex::new(Vec::new())),
            cursors: Arc::new(Mutex::new(Vec::new())),
            hooks: Arc::new(Mutex::new(Vec::new())),
            summary: Arc::new(Mutex::new(AddressSummary::default())),
            calls: None,
            config,
            is_healthy: AtomicBool::new(true),
        }
    }

    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self::with_config(MockConfig::failure(message))
    }

    #[must_use]
    pub fn with_transactions(self, transactions: Vec<Transaction>) -> Self {
        *self.transactions.lock().unwrap() = transactions;
        self
    }

    /// Append `fetch` to `log` on every `fetch_transactions` call
    #[must_use]
    pub fn with_call_log(mut self, log: CallLog) -> Self {
        self.calls = Some(log);
        self
    }

    #[must_use]
    pub fn with_summary(self, summary: AddressSummary) -> Self {
        *self.summary.lock().unwrap() = summary;
        self
    }

    pub fn push_transaction(&self, tx: Transaction) {
        self.transactions.lock().unwrap().push(tx);
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.is_healthy.store(healthy, Ordering::Relaxed);
    }

    /// Cursor argument of every `fetch_transactions` call
    pub fn get_cursors(&self) -> Vec<Option<i64>> {
        self.cursors.lock().unwrap().clone()
    }

    fn check_should_fail(&self) -> Result<(), AppError> {
        if self.config.should_fail {
            return Err(AppError::ExternalService(ExternalServiceError::Unavailable(
                self.config.message(),
            )));
        }
        Ok(())
    }
}

impl Default for MockExplorerClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExplorerClient for MockExplorerClient {
    async fn health_check(&self) -> Result<(), AppError> {
        if !self.is_healthy.load(Ordering::Relaxed) {
            return Err(AppError::ExternalService(ExternalServiceError::Unavailable(
                "Unhealthy".to_string(),
            )));
        }
        self.check_should_fail()
    }

    async fn fetch_transactions(
        &self,
        _address: &str,
        cursor_block_height: Option<i64>,
    ) -> Result<Vec<Transaction>, AppError> {
        self.cursors.lock().unwrap().push(cursor_block_height);
        record_call(&self.calls, "fetch".to_string());
        self.check_should_fail()?;
        let transactions = self.transactions.lock().unwrap();
        Ok(transactions
            .iter()
            .filter(|tx| match (cursor_block_height, tx.block_height) {
                (Some(cursor), Some(height)) => height > cursor,
                _ => true,
            })
            .cloned()
            .collect())
    }

    async fn get_address(&self, address: &str) -> Result<AddressSummary, AppError> {
        self.check_should_fail()?;
        let mut summary = self.summary.lock().unwrap().clone();
        summary.address = address.to_string();
        Ok(summary)
    }

    async fn get_balance(&self, _address: &str) -> Result<Decimal, AppError> {
        self.check_should_fail()?;
        Ok(to_whole_units(self.summary.lock().unwrap().final_balance))
    }

    async fn create_hook(
        &self,
        address: &str,
        request: &CreateHookRequest,
    ) -> Result<ExplorerHook, AppError> {
        self.check_should_fail()?;
        let hook = ExplorerHook {
            id: Some(Uuid::new_v4().to_string()),
            event: "confirmed-tx".to_string(),
            address: Some(address.to_string()),
            url: request.url.clone(),
            confirmations: Some(6),
            sign_key: Some("preset".to_string()),
        };
        self.hooks.lock().unwrap().push(hook.clone());
        Ok(hook)
    }

    async fn list_hooks(&self) -> Result<Vec<ExplorerHook>, AppError> {
        self.check_should_fail()?;
        Ok(self.hooks.lock().unwrap().clone())
    }

    async fn get_hook(&self, id: &str) -> Result<ExplorerHook, AppError> {
        self.check_should_fail()?;
        self.hooks
            .lock()
            .unwrap()
            .iter()
            .find(|h| h.id.as_deref() == Some(id))
            .cloned()
            .ok_or_else(|| {
                AppError::ExternalService(ExternalServiceError::ApiError {
                    status_code: 404,
                    message: format!("hook {} not found", id),
                })
            })
    }

    async fn delete_hook(&self, id: &str) -> Result<(), AppError> {
        self.check_should_fail()?;
        self.hooks
            .lock()
            .unwrap()
            .retain(|h| h.id.as_deref() != Some(id));
        Ok(())
    }
}

/// Name resolver that records refreshed addresses
pub struct MockNameResolver {
    refreshed: Arc<Mutex<Vec<String>>>,
    config: MockConfig,
}

impl MockNameResolver {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(MockConfig::success())
    }

    #[must_use]
    pub fn with_config(config: MockConfig) -> Self {
        Self {
            refreshed: Arc::new(Mutex::new(Vec::new())),
            config,
        }
    }

    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self::with_config(MockConfig::failure(message))
    }

    pub fn get_refreshed(&self) -> Vec<String> {
        self.refreshed.lock().unwrap().clone()
    }
}

impl Default for MockNameResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NameResolver for MockNameResolver {
    async fn refresh_cached_name(&self, address: &str) -> Result<(), AuxiliaryError> {
        self.refreshed.lock().unwrap().push(address.to_string());
        if self.config.should_fail {
            return Err(AuxiliaryError::NameResolution(self.config.message()));
        }
        Ok(())
    }
}

/// Error reporter that keeps every captured `(context, error)` pair
#[derive(Default)]
pub struct RecordingErrorReporter {
    captured: Mutex<Vec<(String, String)>>,
}

impl RecordingErrorReporter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_captured(&self) -> Vec<(String, String)> {
        self.captured.lock().unwrap().clone()
    }
}

impl ErrorReporter for RecordingErrorReporter {
    fn capture(&self, context: &str, error: &str) {
        self.captured
            .lock()
            .unwrap()
            .push((context.to_string(), error.to_string()));
    }
}
