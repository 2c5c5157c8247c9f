//! Domain types: explorer payloads, persisted entities, and API shapes.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Currency symbol of every donation this service records
pub const DOGE_CURRENCY_SYMBOL: &str = "DOGE";

/// Blockchain a donation was observed on
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Blockchain {
    #[default]
    Dogecoin,
}

impl Blockchain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dogecoin => "DOGECOIN",
        }
    }
}

impl std::str::FromStr for Blockchain {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DOGECOIN" => Ok(Self::Dogecoin),
            _ => Err(format!("Invalid blockchain: {}", s)),
        }
    }
}

impl std::fmt::Display for Blockchain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Fundraising campaign a donation is attributed to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Campaign {
    #[default]
    Ph,
}

impl Campaign {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ph => "PH",
        }
    }
}

impl std::str::FromStr for Campaign {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PH" => Ok(Self::Ph),
            _ => Err(format!("Invalid campaign: {}", s)),
        }
    }
}

impl std::fmt::Display for Campaign {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// EXPLORER PAYLOADS
// ============================================================================

/// Transaction input as reported by the explorer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct TxInput {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub addresses: Vec<String>,
    /// Value of the spent output, in koinu
    #[serde(rename = "output_value", alias = "value", default)]
    pub value: u64,
}

/// Transaction output as reported by the explorer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct TxOutput {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub addresses: Vec<String>,
    /// Output value, in koinu
    #[serde(default)]
    pub value: u64,
}

/// A blockchain transaction fetched from the explorer. Never mutated locally.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Transaction {
    pub hash: String,
    #[serde(default)]
    pub inputs: Vec<TxInput>,
    #[serde(default)]
    pub outputs: Vec<TxOutput>,
    /// Height of the including block; `None` while unconfirmed
    #[serde(default, deserialize_with = "confirmed_height")]
    pub block_height: Option<i64>,
    pub received: DateTime<Utc>,
}

/// One page of `GET /addrs/{address}/full`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddressFullPage {
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub txs: Vec<Transaction>,
    #[serde(rename = "hasMore", default)]
    pub has_more: bool,
}

/// Address summary from `GET /addrs/{address}` and `GET /addrs/{address}/balance`
#[derive(Debug, Clone, Serialize, Deserialize, Default, ToSchema)]
pub struct AddressSummary {
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub total_received: u64,
    #[serde(default)]
    pub total_sent: u64,
    #[serde(default)]
    pub balance: u64,
    #[serde(default)]
    pub unconfirmed_balance: i64,
    #[serde(default)]
    pub final_balance: u64,
    #[serde(default)]
    pub n_tx: u64,
}

/// Explorer webhook subscription
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct ExplorerHook {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[schema(example = "confirmed-tx")]
    pub event: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmations: Option<u32>,
    #[serde(rename = "signKey", default, skip_serializing_if = "Option::is_none")]
    pub sign_key: Option<String>,
}

/// Request to subscribe the monitored address to explorer notifications
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateHookRequest {
    /// Public URL the explorer should call
    #[validate(url(message = "url must be a valid URL"))]
    #[schema(example = "https://relayer.example.com/webhooks/blockcypher")]
    pub url: String,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

/// The explorer reports unconfirmed transactions with a height of -1
fn confirmed_height<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<i64>::deserialize(deserializer)?.filter(|h| *h >= 0))
}

// ============================================================================
// PERSISTED ENTITIES
// ============================================================================

/// A recorded donation, unique per transaction hash
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Donation {
    pub id: i64,
    #[schema(example = "4c8b0a5b2d4f6e1a9c3b7d2e8f0a1b2c3d4e5f60718293a4b5c6d7e8f9a0b1c2")]
    pub tx_hash: String,
    /// Whole DOGE
    #[schema(value_type = String, example = "420.69000000")]
    pub amount: Decimal,
    pub from_address: String,
    pub to_address: String,
    pub blockchain: Blockchain,
    pub campaign: Campaign,
    #[schema(example = "DOGE")]
    pub currency: String,
    pub block_created_at: DateTime<Utc>,
    pub block_number: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields written by an upsert keyed on `tx_hash`
#[derive(Debug, Clone, PartialEq)]
pub struct NewDonation {
    pub tx_hash: String,
    pub amount: Decimal,
    pub from_address: String,
    pub to_address: String,
    pub blockchain: Blockchain,
    pub campaign: Campaign,
    pub currency: String,
    pub block_created_at: DateTime<Utc>,
    pub block_number: Option<i64>,
}

/// Ordering applied to donation queries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DonationOrder {
    /// Highest block first; rows without a block number last
    BlockNumberDesc,
    /// Most recent transaction first
    BlockCreatedAtDesc,
}

impl DonationOrder {
    pub fn compare(&self, a: &Donation, b: &Donation) -> Ordering {
        match self {
            Self::BlockNumberDesc => match (a.block_number, b.block_number) {
                (Some(x), Some(y)) => y.cmp(&x),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            },
            Self::BlockCreatedAtDesc => b.block_created_at.cmp(&a.block_created_at),
        }
    }
}

/// Query filter for the donation repository
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DonationFilter {
    pub id: Option<i64>,
    pub tx_hash: Option<String>,
    pub blockchain: Option<Blockchain>,
    pub campaign: Option<Campaign>,
    pub currency: Option<String>,
    /// Lower bound (inclusive) on `block_created_at`
    pub created_since: Option<DateTime<Utc>>,
    /// Only rows that carry a block number
    pub has_block_number: bool,
    pub order_by: Option<DonationOrder>,
    pub limit: Option<i64>,
}

impl DonationFilter {
    #[must_use]
    pub fn by_id(id: i64) -> Self {
        Self {
            id: Some(id),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn by_tx_hash(tx_hash: impl Into<String>) -> Self {
        Self {
            tx_hash: Some(tx_hash.into()),
            ..Default::default()
        }
    }

    /// Donations of one (chain, campaign, currency) tuple
    #[must_use]
    pub fn for_campaign(blockchain: Blockchain, campaign: Campaign, currency: &str) -> Self {
        Self {
            blockchain: Some(blockchain),
            campaign: Some(campaign),
            currency: Some(currency.to_string()),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn ordered_by(mut self, order: DonationOrder) -> Self {
        self.order_by = Some(order);
        self
    }

    #[must_use]
    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.created_since = Some(since);
        self
    }

    #[must_use]
    pub fn with_block_number(mut self) -> Self {
        self.has_block_number = true;
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// In-memory evaluation of the equality and range predicates (ordering and limit excluded)
    pub fn matches(&self, donation: &Donation) -> bool {
        self.id.is_none_or(|id| donation.id == id)
            && self
                .tx_hash
                .as_deref()
                .is_none_or(|h| donation.tx_hash == h)
            && self.blockchain.is_none_or(|b| donation.blockchain == b)
            && self.campaign.is_none_or(|c| donation.campaign == c)
            && self
                .currency
                .as_deref()
                .is_none_or(|c| donation.currency == c)
            && self
                .created_since
                .is_none_or(|since| donation.block_created_at >= since)
            && (!self.has_block_number || donation.block_number.is_some())
    }
}

/// Audit row for one outbound webhook attempt
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WebhookDeliveryRecord {
    pub id: Uuid,
    pub donation_id: i64,
    pub url: String,
    pub is_successful: bool,
    pub response_code: Option<i32>,
    /// Raw downstream response body, stored as received and not truncated.
    /// When no response arrived it holds `{"error": "<reason>"}` instead.
    /// Served as-is by the delivery listing endpoint.
    pub response: Option<String>,
    pub inserted_at: DateTime<Utc>,
}

/// Fields of a delivery record about to be appended
#[derive(Debug, Clone, PartialEq)]
pub struct NewWebhookDeliveryRecord {
    pub donation_id: i64,
    pub url: String,
    pub is_successful: bool,
    pub response_code: Option<i32>,
    pub response: Option<String>,
}

/// Result of a single delivery attempt
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DeliveryOutcome {
    Delivered {
        status_code: u16,
    },
    Failed {
        status_code: Option<u16>,
        error: String,
    },
}

impl DeliveryOutcome {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Delivered { .. })
    }
}

// ============================================================================
// SYNC
// ============================================================================

/// What a sync cycle does, reconstructed from the store each time
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SyncState {
    /// No donation with a block number is stored yet
    FullSync,
    /// Resume from the newest stored block height
    IncrementalSync { cursor: i64 },
}

impl SyncState {
    #[must_use]
    pub fn cursor(&self) -> Option<i64> {
        match self {
            Self::FullSync => None,
            Self::IncrementalSync { cursor } => Some(*cursor),
        }
    }
}

/// Summary of one completed sync cycle
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct SyncReport {
    pub state: SyncState,
    /// Transactions returned by the explorer
    pub fetched: usize,
    /// Transactions recorded as donations
    pub ingested: usize,
    /// Transactions that were not donations
    pub skipped: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

// ============================================================================
// READ MODELS
// ============================================================================

/// Per-donor aggregate
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub address: String,
    #[schema(value_type = String, example = "1000.00000000")]
    pub total_amount: Decimal,
    pub donation_count: u64,
}

/// Total received by the monitored address, per the explorer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TotalReceived {
    #[schema(value_type = String, example = "123456.78900000")]
    pub total_received: Decimal,
    pub currency: String,
}

/// Final balance of the monitored address
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddressBalance {
    pub address: String,
    #[schema(value_type = String, example = "42.00000000")]
    pub balance: Decimal,
    pub currency: String,
}

/// Query parameters for listing delivery records
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct DeliveryQuery {
    /// Maximum number of records to return (1-1000, default: 100)
    #[validate(range(min = 1, max = 1000, message = "Limit must be between 1 and 1000"))]
    #[serde(default = "default_limit")]
    pub limit: i64,
}

impl Default for DeliveryQuery {
    fn default() -> Self {
        Self {
            limit: default_limit(),
        }
    }
}

/// Acknowledgement for webhook notifications that are not donations
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WebhookAck {
    #[schema(example = "success")]
    pub status: String,
}

impl WebhookAck {
    #[must_use]
    pub fn success() -> Self {
        Self {
            status: "success".to_string(),
        }
    }
}

/// Query parameters for listing donations
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct DonationQuery {
    /// Maximum number of donations to return (1-1000, default: 100)
    #[validate(range(min = 1, max = 1000, message = "Limit must be between 1 and 1000"))]
    #[serde(default = "default_limit")]
    #[schema(example = 100)]
    pub limit: i64,
    /// Only donations at or after this time
    pub since: Option<DateTime<Utc>>,
}

fn default_limit() -> i64 {
    100
}

impl Default for DonationQuery {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            since: None,
        }
    }
}

// ============================================================================
// HEALTH & ERRORS
// ============================================================================

/// Health status enum
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// All systems operational
    Healthy,
    /// Some systems degraded but functional
    Degraded,
    /// Critical systems unavailable
    Unhealthy,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Overall system status
    pub status: HealthStatus,
    /// Database health status
    pub database: HealthStatus,
    /// Block explorer health status
    pub explorer: HealthStatus,
    /// Current server timestamp
    pub timestamp: DateTime<Utc>,
    /// Application version
    #[schema(example = "0.1.0")]
    pub version: String,
}

impl HealthResponse {
    /// The database is critical; the explorer only degrades the service
    #[must_use]
    pub fn new(database: HealthStatus, explorer: HealthStatus) -> Self {
        let status = match (&database, &explorer) {
            (HealthStatus::Healthy, HealthStatus::Healthy) => HealthStatus::Healthy,
            (HealthStatus::Unhealthy, _) => HealthStatus::Unhealthy,
            _ => HealthStatus::Degraded,
        };
        Self {
            status,
            database,
            explorer,
            timestamp: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Error response structure
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Error details
    pub error: ErrorDetail,
}

/// Error detail structure
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Error type identifier
    #[schema(example = "validation_error")]
    pub r#type: String,
    /// Human-readable error message
    pub message: String,
}
