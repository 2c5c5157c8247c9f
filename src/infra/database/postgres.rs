//! PostgreSQL donation store and delivery audit log.

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder, Row, postgres::PgPoolOptions, postgres::PgRow};
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::domain::{
    AppError, DatabaseError, DeliveryLogRepository, Donation, DonationFilter, DonationOrder,
    DonationRepository, NewDonation, NewWebhookDeliveryRecord, WebhookDeliveryRecord,
};

const DONATION_COLUMNS: &str = "id, tx_hash, amount, from_address, to_address, blockchain, \
     campaign, currency, block_created_at, block_number, created_at, updated_at";

/// PostgreSQL connection pool configuration
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: Duration,
    pub idle_timeout: Duration,
    pub max_lifetime: Duration,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 2,
            acquire_timeout: Duration::from_secs(3),
            idle_timeout: Duration::from_secs(600),
            max_lifetime: Duration::from_secs(1800),
        }
    }
}

/// PostgreSQL client with connection pooling. Implements both repositories.
pub struct PostgresClient {
    pool: PgPool,
}

impl PostgresClient {
    /// Create a new PostgreSQL client with custom configuration
    pub async fn new(database_url: &str, config: PostgresConfig) -> Result<Self, AppError> {
        info!("Connecting to PostgreSQL...");
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.acquire_timeout)
            .idle_timeout(config.idle_timeout)
            .max_lifetime(config.max_lifetime)
            .connect(database_url)
            .await
            .map_err(|e| AppError::Database(DatabaseError::Connection(e.to_string())))?;
        info!("Connected to PostgreSQL");
        Ok(Self { pool })
    }

    pub async fn with_defaults(database_url: &str) -> Result<Self, AppError> {
        Self::new(database_url, PostgresConfig::default()).await
    }

    /// Run embedded migrations
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations...");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::Database(DatabaseError::Migration(e.to_string())))?;
        info!("Database migrations completed successfully");
        Ok(())
    }

    /// Get the underlying connection pool (for testing)
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn row_to_donation(row: &PgRow) -> Result<Donation, AppError> {
        let blockchain: String = row.try_get("blockchain")?;
        let campaign: String = row.try_get("campaign")?;

        Ok(Donation {
            id: row.try_get("id")?,
            tx_hash: row.try_get("tx_hash")?,
            amount: row.try_get("amount")?,
            from_address: row.try_get("from_address")?,
            to_address: row.try_get("to_address")?,
            blockchain: blockchain
                .parse()
                .map_err(|e: String| AppError::Database(DatabaseError::Query(e)))?,
            campaign: campaign
                .parse()
                .map_err(|e: String| AppError::Database(DatabaseError::Query(e)))?,
            currency: row.try_get("currency")?,
            block_created_at: row.try_get("block_created_at")?,
            block_number: row.try_get("block_number")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn row_to_delivery_record(row: &PgRow) -> Result<WebhookDeliveryRecord, AppError> {
        Ok(WebhookDeliveryRecord {
            id: row.try_get("id")?,
            donation_id: row.try_get("donation_id")?,
            url: row.try_get("url")?,
            is_successful: row.try_get("is_successful")?,
            response_code: row.try_get("response_code")?,
            response: row.try_get("response")?,
            inserted_at: row.try_get("inserted_at")?,
        })
    }
}

/// Build the SELECT for a donation filter
fn donation_query(filter: &DonationFilter) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new(format!(
        "SELECT {} FROM donations WHERE TRUE",
        DONATION_COLUMNS
    ));

    if let Some(id) = filter.id {
        builder.push(" AND id = ").push_bind(id);
    }
    if let Some(tx_hash) = &filter.tx_hash {
        builder.push(" AND tx_hash = ").push_bind(tx_hash.clone());
    }
    if let Some(blockchain) = filter.blockchain {
        builder.push(" AND blockchain = ").push_bind(blockchain.as_str());
    }
    if let Some(campaign) = filter.campaign {
        builder.push(" AND campaign = ").push_bind(campaign.as_str());
    }
    if let Some(currency) = &filter.currency {
        builder.push(" AND currency = ").push_bind(currency.clone());
    }
    if let Some(since) = filter.created_since {
        builder.push(" AND block_created_at >= ").push_bind(since);
    }
    if filter.has_block_number {
        builder.push(" AND block_number IS NOT NULL");
    }

    builder.push(match filter.order_by {
        Some(DonationOrder::BlockNumberDesc) => " ORDER BY block_number DESC NULLS LAST, id DESC",
        Some(DonationOrder::BlockCreatedAtDesc) => " ORDER BY block_created_at DESC, id DESC",
        None => " ORDER BY id ASC",
    });

    if let Some(limit) = filter.limit {
        builder.push(" LIMIT ").push_bind(limit);
    }

    builder
}

#[async_trait]
impl DonationRepository for PostgresClient {
    #[instrument(skip(self))]
    async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::Database(DatabaseError::Connection(e.to_string())))?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn find_many(&self, filter: &DonationFilter) -> Result<Vec<Donation>, AppError> {
        let rows = donation_query(filter)
            .build()
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(Self::row_to_donation).collect()
    }

    #[instrument(skip(self))]
    async fn find_first(&self, filter: &DonationFilter) -> Result<Option<Donation>, AppError> {
        let filter = filter.clone().limit(1);
        let row = donation_query(&filter)
            .build()
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_donation).transpose()
    }

    #[instrument(skip(self, donation), fields(tx_hash = %donation.tx_hash, amount = %donation.amount))]
    async fn upsert(&self, donation: &NewDonation) -> Result<i64, AppError> {
        let row = sqlx::query(
            r#"
            INSERT INTO donations (
                tx_hash, amount, from_address, to_address, blockchain,
                campaign, currency, block_created_at, block_number
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (tx_hash) DO UPDATE SET
                amount = EXCLUDED.amount,
                from_address = EXCLUDED.from_address,
                to_address = EXCLUDED.to_address,
                blockchain = EXCLUDED.blockchain,
                campaign = EXCLUDED.campaign,
                currency = EXCLUDED.currency,
                block_created_at = EXCLUDED.block_created_at,
                block_number = EXCLUDED.block_number,
                updated_at = NOW()
            RETURNING id
            "#,
        )
        .bind(&donation.tx_hash)
        .bind(donation.amount)
        .bind(&donation.from_address)
        .bind(&donation.to_address)
        .bind(donation.blockchain.as_str())
        .bind(donation.campaign.as_str())
        .bind(&donation.currency)
        .bind(donation.block_created_at)
        .bind(donation.block_number)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.try_get("id")?)
    }
}

#[async_trait]
impl DeliveryLogRepository for PostgresClient {
    #[instrument(skip(self, record), fields(donation_id = record.donation_id, success = record.is_successful))]
    async fn create(
        &self,
        record: &NewWebhookDeliveryRecord,
    ) -> Result<WebhookDeliveryRecord, AppError> {
        let row = sqlx::query(
            r#"
            INSERT INTO webhook_delivery_records (
                id, donation_id, url, is_successful, response_code, response
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, donation_id, url, is_successful, response_code, response, inserted_at
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(record.donation_id)
        .bind(&record.url)
        .bind(record.is_successful)
        .bind(record.response_code)
        .bind(&record.response)
        .fetch_one(&self.pool)
        .await?;

        Self::row_to_delivery_record(&row)
    }

    #[instrument(skip(self))]
    async fn find_many(&self, limit: i64) -> Result<Vec<WebhookDeliveryRecord>, AppError> {
        let rows = sqlx::query(
            r#"
            SELECT id, donation_id, url, is_successful, response_code, response, inserted_at
            FROM webhook_delivery_records
            ORDER BY inserted_at DESC, id DESC
            LIMIT $1
            "#,
        )
        .bind(limit.clamp(1, 1000))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_delivery_record).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Blockchain, Campaign, DOGE_CURRENCY_SYMBOL};

    #[test]
    fn test_postgres_config_default() {
        let config = PostgresConfig::default();
        assert_eq!(config.max_connections, 10);
        assert_eq!(config.min_connections, 2);
        assert_eq!(config.acquire_timeout, Duration::from_secs(3));
        assert_eq!(config.idle_timeout, Duration::from_secs(600));
        assert_eq!(config.max_lifetime, Duration::from_secs(1800));
    }

    #[test]
    fn test_empty_filter_query() {
        let sql = donation_query(&DonationFilter::default()).into_sql();
        assert!(sql.ends_with("WHERE TRUE ORDER BY id ASC"));
    }

    #[test]
    fn test_cursor_filter_query() {
        let filter =
            DonationFilter::for_campaign(Blockchain::Dogecoin, Campaign::Ph, DOGE_CURRENCY_SYMBOL)
                .with_block_number()
                .ordered_by(DonationOrder::BlockNumberDesc)
                .limit(1);
        let sql = donation_query(&filter).into_sql();

        assert!(sql.contains("AND blockchain = $1"));
        assert!(sql.contains("AND campaign = $2"));
        assert!(sql.contains("AND currency = $3"));
        assert!(sql.contains("AND block_number IS NOT NULL"));
        assert!(sql.contains("ORDER BY block_number DESC NULLS LAST, id DESC"));
        assert!(sql.ends_with("LIMIT $4"));
    }

    #[test]
    fn test_leaderboard_filter_query() {
        let since = chrono::DateTime::parse_from_rfc3339("2023-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&chrono::Utc);
        let filter = DonationFilter::default()
            .since(since)
            .ordered_by(DonationOrder::BlockCreatedAtDesc);
        let sql = donation_query(&filter).into_sql();

        assert!(sql.contains("AND block_created_at >= $1"));
        assert!(sql.ends_with("ORDER BY block_created_at DESC, id DESC"));
    }
}
