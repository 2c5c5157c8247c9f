//! Domain layer containing core business types, traits, and error definitions.

pub mod classifier;
pub mod error;
pub mod traits;
pub mod types;

pub use classifier::{attributed_sender, donation_amount, is_donation, to_whole_units};
pub use error::{
    AppError, AuxiliaryError, ConfigError, DatabaseError, ExternalServiceError, ValidationError,
};
pub use traits::{
    Cache, DeliveryLogRepository, DonationRepository, ErrorReporter, ExplorerClient, NameResolver,
};
pub use types::{
    AddressBalance, AddressFullPage, AddressSummary, Blockchain, Campaign, CreateHookRequest,
    DOGE_CURRENCY_SYMBOL, DeliveryOutcome, DeliveryQuery, Donation, DonationFilter, DonationOrder,
    DonationQuery, ErrorDetail, ErrorResponse, ExplorerHook, HealthResponse, HealthStatus,
    LeaderboardEntry, NewDonation, NewWebhookDeliveryRecord, SyncReport, SyncState,
    TotalReceived, Transaction, TxInput, TxOutput, WebhookAck, WebhookDeliveryRecord,
};
