//! Outbound donation webhook with a durable audit trail.
//!
//! Every call to [`WebhookDispatcher::deliver`] makes exactly one POST and
//! appends exactly one delivery record, whatever the outcome. There is no
//! retry: a failed delivery is recorded and reported.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use tracing::{error, info, instrument, warn};

use crate::domain::{
    AppError, AuxiliaryError, DeliveryLogRepository, DeliveryOutcome, Donation, ErrorReporter,
    ExternalServiceError, NewWebhookDeliveryRecord,
};

/// Downstream donation webhook for production
pub const PRODUCTION_DONATION_WEBHOOK_URL: &str = "https://pleasr.house/api/webhooks/donations";

/// Downstream donation webhook for every other environment
pub const TESTNET_DONATION_WEBHOOK_URL: &str =
    "https://testnet.pleasr.house/api/webhooks/donations";

/// Header carrying the downstream API key
pub const API_KEY_HEADER: &str = "X-API-Key";

#[derive(Debug, Clone)]
pub struct WebhookDispatcherConfig {
    pub url: String,
    pub api_key: SecretString,
    pub request_timeout: Duration,
}

impl WebhookDispatcherConfig {
    #[must_use]
    pub fn new(url: impl Into<String>, api_key: SecretString) -> Self {
        Self {
            url: url.into(),
            api_key,
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Audit record for one delivery attempt.
///
/// [`DeliveryAttempt::complete`] writes the record. If the attempt is dropped
/// first (the delivering future was cancelled), a failed record is written
/// from `Drop` on the current runtime.
struct DeliveryAttempt {
    audit_log: Arc<dyn DeliveryLogRepository>,
    donation_id: i64,
    url: String,
    completed: bool,
}

impl DeliveryAttempt {
    fn begin(audit_log: Arc<dyn DeliveryLogRepository>, donation_id: i64, url: &str) -> Self {
        Self {
            audit_log,
            donation_id,
            url: url.to_string(),
            completed: false,
        }
    }

    async fn complete(
        mut self,
        outcome: &DeliveryOutcome,
        response: Option<String>,
    ) -> Result<(), AuxiliaryError> {
        self.completed = true;
        let response_code = match outcome {
            DeliveryOutcome::Delivered { status_code } => Some(i32::from(*status_code)),
            DeliveryOutcome::Failed { status_code, .. } => status_code.map(i32::from),
        };
        let record = NewWebhookDeliveryRecord {
            donation_id: self.donation_id,
            url: self.url.clone(),
            is_successful: outcome.is_success(),
            response_code,
            response,
        };
        self.audit_log
            .create(&record)
            .await
            .map(|_| ())
            .map_err(|e| AuxiliaryError::AuditLog(e.to_string()))
    }
}

impl Drop for DeliveryAttempt {
    fn drop(&mut self) {
        if self.completed {
            return;
        }
        let record = NewWebhookDeliveryRecord {
            donation_id: self.donation_id,
            url: std::mem::take(&mut self.url),
            is_successful: false,
            response_code: None,
            response: Some(error_body("delivery attempt abandoned")),
        };
        let audit_log = Arc::clone(&self.audit_log);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = audit_log.create(&record).await {
                        warn!(donation_id = record.donation_id, error = %e, "Failed to record abandoned delivery");
                    }
                });
            }
            Err(_) => {
                warn!(donation_id = record.donation_id, "No runtime to record abandoned delivery");
            }
        }
    }
}

fn error_body(message: &str) -> String {
    serde_json::json!({ "error": message }).to_string()
}

/// Single-attempt POST of donations to the downstream consumer
pub struct WebhookDispatcher {
    http_client: Client,
    config: WebhookDispatcherConfig,
    audit_log: Arc<dyn DeliveryLogRepository>,
    reporter: Arc<dyn ErrorReporter>,
}

impl WebhookDispatcher {
    pub fn new(
        config: WebhookDispatcherConfig,
        audit_log: Arc<dyn DeliveryLogRepository>,
        reporter: Arc<dyn ErrorReporter>,
    ) -> Result<Self, AppError> {
        let http_client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| {
                AppError::ExternalService(ExternalServiceError::Configuration(e.to_string()))
            })?;
        Ok(Self {
            http_client,
            config,
            audit_log,
            reporter,
        })
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.config.url
    }

    /// POST `donation` once and record the attempt
    #[instrument(skip(self, donation), fields(donation_id = donation.id, tx_hash = %donation.tx_hash))]
    pub async fn deliver(&self, donation: &Donation) -> DeliveryOutcome {
        let attempt = DeliveryAttempt::begin(
            Arc::clone(&self.audit_log),
            donation.id,
            &self.config.url,
        );

        let (outcome, response) = self.post(donation).await;
        match &outcome {
            DeliveryOutcome::Delivered { status_code } => {
                info!(status = status_code, "Donation webhook delivered");
            }
            DeliveryOutcome::Failed { status_code, error } => {
                error!(status = ?status_code, error = %error, "Donation webhook failed");
                self.reporter.capture(
                    &format!("donation webhook delivery for donation {}", donation.id),
                    error,
                );
            }
        }

        if let Err(e) = attempt.complete(&outcome, response).await {
            warn!(error = %e, "Failed to record webhook delivery");
        }
        outcome
    }

    async fn post(&self, donation: &Donation) -> (DeliveryOutcome, Option<String>) {
        let result = self
            .http_client
            .post(&self.config.url)
            .header(API_KEY_HEADER, self.config.api_key.expose_secret())
            .json(donation)
            .send()
            .await;

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                let message = e.to_string();
                let body = error_body(&message);
                return (
                    DeliveryOutcome::Failed {
                        status_code: e.status().map(|s| s.as_u16()),
                        error: message,
                    },
                    Some(body),
                );
            }
        };

        let status = response.status();
        let body = response.text().await.ok().filter(|b| !b.is_empty());
        if status.is_success() {
            (
                DeliveryOutcome::Delivered {
                    status_code: status.as_u16(),
                },
                body,
            )
        } else {
            (
                DeliveryOutcome::Failed {
                    status_code: Some(status.as_u16()),
                    error: format!("downstream responded {}", status),
                },
                body,
            )
        }
    }
}
