//! Domain traits defining contracts for external systems.

use async_trait::async_trait;
use rust_decimal::Decimal;

use super::error::{AppError, AuxiliaryError, DatabaseError};
use super::types::{
    AddressSummary, CreateHookRequest, Donation, DonationFilter, ExplorerHook, NewDonation,
    NewWebhookDeliveryRecord, Transaction, WebhookDeliveryRecord,
};

/// Block explorer client
#[async_trait]
pub trait ExplorerClient: Send + Sync {
    /// Check explorer connectivity
    async fn health_check(&self) -> Result<(), AppError>;

    /// Full transaction history of `address`, newest first.
    /// With a cursor, only transactions after that block height are returned.
    async fn fetch_transactions(
        &self,
        address: &str,
        cursor_block_height: Option<i64>,
    ) -> Result<Vec<Transaction>, AppError>;

    /// Address summary including total received
    async fn get_address(&self, address: &str) -> Result<AddressSummary, AppError>;

    /// Final balance in whole units
    async fn get_balance(&self, address: &str) -> Result<Decimal, AppError> {
        let _ = address;
        Err(AppError::NotSupported(
            "get_balance not implemented".to_string(),
        ))
    }

    /// Subscribe `address` to confirmed-transaction notifications
    async fn create_hook(
        &self,
        address: &str,
        request: &CreateHookRequest,
    ) -> Result<ExplorerHook, AppError> {
        let _ = (address, request);
        Err(AppError::NotSupported(
            "create_hook not implemented".to_string(),
        ))
    }

    /// List registered webhook subscriptions
    async fn list_hooks(&self) -> Result<Vec<ExplorerHook>, AppError> {
        Err(AppError::NotSupported(
            "list_hooks not implemented".to_string(),
        ))
    }

    /// Get a webhook subscription by id
    async fn get_hook(&self, id: &str) -> Result<ExplorerHook, AppError> {
        let _ = id;
        Err(AppError::NotSupported(
            "get_hook not implemented".to_string(),
        ))
    }

    /// Delete a webhook subscription by id
    async fn delete_hook(&self, id: &str) -> Result<(), AppError> {
        let _ = id;
        Err(AppError::NotSupported(
            "delete_hook not implemented".to_string(),
        ))
    }
}

/// Donation persistence. `tx_hash` is unique.
#[async_trait]
pub trait DonationRepository: Send + Sync {
    /// Check database connectivity
    async fn health_check(&self) -> Result<(), AppError>;

    async fn find_many(&self, filter: &DonationFilter) -> Result<Vec<Donation>, AppError>;

    async fn find_first(&self, filter: &DonationFilter) -> Result<Option<Donation>, AppError>;

    async fn find_first_or_throw(&self, filter: &DonationFilter) -> Result<Donation, AppError> {
        self.find_first(filter).await?.ok_or_else(|| {
            AppError::Database(DatabaseError::NotFound(format!(
                "donation matching {:?}",
                filter
            )))
        })
    }

    /// Insert, or update the row with the same `tx_hash`. Returns the row id.
    async fn upsert(&self, donation: &NewDonation) -> Result<i64, AppError>;
}

/// Append-only log of outbound webhook attempts
#[async_trait]
pub trait DeliveryLogRepository: Send + Sync {
    async fn create(
        &self,
        record: &NewWebhookDeliveryRecord,
    ) -> Result<WebhookDeliveryRecord, AppError>;

    /// Most recent first
    async fn find_many(&self, limit: i64) -> Result<Vec<WebhookDeliveryRecord>, AppError>;
}

/// Key-value cache for derived aggregates
#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, AuxiliaryError>;

    async fn set(&self, key: &str, value: String, ttl_secs: u64) -> Result<(), AuxiliaryError>;

    async fn del(&self, key: &str) -> Result<(), AuxiliaryError>;

    /// Drop expired entries and return how many were removed.
    /// Backends that evict on their own keep the default.
    async fn purge_expired(&self) -> Result<usize, AuxiliaryError> {
        Ok(0)
    }
}

/// Display-name lookup for donor addresses
#[async_trait]
pub trait NameResolver: Send + Sync {
    /// Re-resolve the display name of `address` and store it in the name cache
    async fn refresh_cached_name(&self, address: &str) -> Result<(), AuxiliaryError>;
}

/// Sink for failures worth a human's attention
pub trait ErrorReporter: Send + Sync {
    fn capture(&self, context: &str, error: &str);
}
