//! Error types for the application, layered by concern.

use thiserror::Error;

/// Top-level application error
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("External service error: {0}")]
    ExternalService(#[from] ExternalServiceError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Operation not supported: {0}")]
    NotSupported(String),
}

impl AppError {
    /// True when the block explorer could not be reached, timed out, or answered with an error.
    /// A sync cycle that hits this stops early and resumes from the cursor next time.
    #[must_use]
    pub fn is_upstream_unavailable(&self) -> bool {
        matches!(
            self,
            AppError::ExternalService(
                ExternalServiceError::Unavailable(_)
                    | ExternalServiceError::Timeout(_)
                    | ExternalServiceError::RateLimited(_)
            )
        )
    }
}

/// Database-related errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Duplicate record: {0}")]
    Duplicate(String),

    #[error("Migration failed: {0}")]
    Migration(String),
}

impl From<sqlx::Error> for DatabaseError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => DatabaseError::NotFound(err.to_string()),
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                DatabaseError::Connection(err.to_string())
            }
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                DatabaseError::Duplicate(db_err.message().to_string())
            }
            _ => DatabaseError::Query(err.to_string()),
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Database(DatabaseError::from(err))
    }
}

/// Errors from third-party HTTP services (block explorer, name service, downstream webhook)
#[derive(Debug, Error)]
pub enum ExternalServiceError {
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("API error (status {status_code}): {message}")]
    ApiError { status_code: u16, message: String },

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    #[error("Service misconfigured: {0}")]
    Configuration(String),
}

/// Configuration errors raised while wiring the application
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration for {key}: {message}")]
    Invalid { key: String, message: String },
}

/// Request validation errors
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid field {field}: {message}")]
    InvalidField { field: String, message: String },

    #[error("{0}")]
    Multiple(String),
}

/// Failures of best-effort side effects.
///
/// These never abort the operation that triggered them: callers log the error
/// and carry on. Returning them as values keeps that contract in the signature.
#[derive(Debug, Error)]
pub enum AuxiliaryError {
    #[error("Cache operation failed: {0}")]
    Cache(String),

    #[error("Name resolution failed: {0}")]
    NameResolution(String),

    #[error("Delivery audit write failed: {0}")]
    AuditLog(String),
}
