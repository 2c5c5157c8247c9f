//! HTTP request handlers with OpenAPI documentation.

use std::sync::Arc;

use axum::{
    Json,
    body::Bytes,
    extract::{OriginalUri, Path, Query, State},
    http::{HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
};
use tracing::{error, info, warn};
use utoipa::OpenApi;
use validator::Validate;

use crate::app::AppState;
use crate::domain::{
    AddressBalance, AppError, CreateHookRequest, DatabaseError, DeliveryOutcome, DeliveryQuery,
    Donation, DonationQuery, ErrorDetail, ErrorResponse, ExplorerHook, ExternalServiceError,
    HealthResponse, HealthStatus, LeaderboardEntry, SyncReport, SyncState, TotalReceived,
    Transaction, ValidationError, WebhookAck, WebhookDeliveryRecord,
};

/// OpenAPI documentation structure
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Doge Donation Relayer API",
        version = "0.1.0",
        description = "Reconciles Dogecoin donations from the block explorer and forwards them downstream",
        license(
            name = "MIT"
        )
    ),
    paths(
        list_donations_handler,
        total_received_handler,
        leaderboard_handler,
        dispatch_donation_handler,
        list_deliveries_handler,
        sync_handler,
        blockcypher_webhook_handler,
        list_hooks_handler,
        create_hook_handler,
        get_hook_handler,
        delete_hook_handler,
        balance_handler,
        health_check_handler,
        liveness_handler,
        readiness_handler,
    ),
    components(
        schemas(
            Donation,
            crate::domain::Blockchain,
            crate::domain::Campaign,
            DonationQuery,
            DeliveryQuery,
            TotalReceived,
            LeaderboardEntry,
            WebhookDeliveryRecord,
            DeliveryOutcome,
            SyncReport,
            SyncState,
            WebhookAck,
            ExplorerHook,
            CreateHookRequest,
            AddressBalance,
            HealthResponse,
            HealthStatus,
            ErrorResponse,
            ErrorDetail,
        )
    ),
    tags(
        (name = "donations", description = "Recorded donations and aggregates"),
        (name = "sync", description = "Explorer reconciliation"),
        (name = "webhooks", description = "Inbound explorer notifications and outbound delivery"),
        (name = "explorer", description = "Explorer subscription management"),
        (name = "health", description = "Health check endpoints")
    )
)]
pub struct ApiDoc;

/// List donations, newest first
#[utoipa::path(
    get,
    path = "/donations",
    tag = "donations",
    params(
        ("limit" = Option<i64>, Query, description = "Maximum number of donations to return (1-1000, default: 100)"),
        ("since" = Option<String>, Query, description = "Only donations at or after this RFC 3339 timestamp")
    ),
    responses(
        (status = 200, description = "Donations", body = Vec<Donation>),
        (status = 400, description = "Invalid query parameters", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn list_donations_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DonationQuery>,
) -> Result<Json<Vec<Donation>>, AppError> {
    let donations = state.service.get_donations(&query).await?;
    Ok(Json(donations))
}

/// Total received by the monitored address
#[utoipa::path(
    get,
    path = "/donations/total",
    tag = "donations",
    responses(
        (status = 200, description = "Total received", body = TotalReceived),
        (status = 502, description = "Explorer unavailable", body = ErrorResponse)
    )
)]
pub async fn total_received_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<TotalReceived>, AppError> {
    let total = state.service.get_total_received().await?;
    Ok(Json(total))
}

/// Donor leaderboard
#[utoipa::path(
    get,
    path = "/donations/leaderboard",
    tag = "donations",
    responses(
        (status = 200, description = "Per-donor totals, largest first", body = Vec<LeaderboardEntry>),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn leaderboard_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<LeaderboardEntry>>, AppError> {
    let leaderboard = state.service.get_leaderboard().await?;
    Ok(Json(leaderboard))
}

/// Send a stored donation to the downstream webhook again
///
/// Makes a single attempt and records it in the delivery log.
#[utoipa::path(
    post,
    path = "/donations/{id}/dispatch",
    tag = "webhooks",
    params(
        ("id" = i64, Path, description = "Donation ID")
    ),
    responses(
        (status = 200, description = "Outcome of the attempt", body = DeliveryOutcome),
        (status = 404, description = "Donation not found", body = ErrorResponse),
        (status = 501, description = "Downstream webhook not configured", body = ErrorResponse)
    )
)]
pub async fn dispatch_donation_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<DeliveryOutcome>, AppError> {
    let outcome = state.service.dispatch_donation(id).await?;
    Ok(Json(outcome))
}

/// List outbound webhook delivery records, most recent first
#[utoipa::path(
    get,
    path = "/deliveries",
    tag = "webhooks",
    params(
        ("limit" = Option<i64>, Query, description = "Maximum number of records to return (1-1000, default: 100)")
    ),
    responses(
        (status = 200, description = "Delivery records", body = Vec<WebhookDeliveryRecord>),
        (status = 400, description = "Invalid query parameters", body = ErrorResponse)
    )
)]
pub async fn list_deliveries_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DeliveryQuery>,
) -> Result<Json<Vec<WebhookDeliveryRecord>>, AppError> {
    query
        .validate()
        .map_err(|e| AppError::Validation(ValidationError::Multiple(e.to_string())))?;
    let records = state.service.list_deliveries(query.limit).await?;
    Ok(Json(records))
}

/// Run one sync cycle now
#[utoipa::path(
    post,
    path = "/sync",
    tag = "sync",
    responses(
        (status = 200, description = "Cycle completed", body = SyncReport),
        (status = 502, description = "Explorer unavailable, cycle aborted", body = ErrorResponse)
    )
)]
pub async fn sync_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SyncReport>, AppError> {
    let report = state.service.sync_donations().await?;
    Ok(Json(report))
}

/// Receive a confirmed-transaction notification from BlockCypher
///
/// The request must be signed with the BlockCypher key when verification is
/// enabled. Transactions that are not donations are acknowledged and dropped.
#[utoipa::path(
    post,
    path = "/webhooks/blockcypher",
    tag = "webhooks",
    request_body(content = String, description = "BlockCypher transaction", content_type = "application/json"),
    responses(
        (status = 200, description = "Recorded donation, or an acknowledgement for other transactions", body = Donation),
        (status = 400, description = "Malformed transaction", body = ErrorResponse),
        (status = 401, description = "Invalid signature", body = ErrorResponse)
    )
)]
pub async fn blockcypher_webhook_handler(
    State(state): State<Arc<AppState>>,
    method: Method,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    if let Some(verifier) = &state.signature_verifier {
        let target = uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or_else(|| uri.path());
        if !verifier.verify(&method, target, &headers, &body) {
            return Err(AppError::Authentication(
                "Invalid webhook signature".to_string(),
            ));
        }
    }

    let tx: Transaction = serde_json::from_slice(&body).map_err(|e| {
        warn!(error = %e, "Malformed explorer notification");
        AppError::Validation(ValidationError::InvalidField {
            field: "body".to_string(),
            message: e.to_string(),
        })
    })?;

    match state.service.process_webhook(&tx).await? {
        Some(donation) => {
            info!(id = donation.id, tx_hash = %donation.tx_hash, "Explorer webhook recorded donation");
            Ok(Json(donation).into_response())
        }
        None => Ok(Json(WebhookAck::success()).into_response()),
    }
}

/// List explorer webhook subscriptions
#[utoipa::path(
    get,
    path = "/explorer/hooks",
    tag = "explorer",
    responses(
        (status = 200, description = "Subscriptions", body = Vec<ExplorerHook>),
        (status = 502, description = "Explorer unavailable", body = ErrorResponse)
    )
)]
pub async fn list_hooks_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<ExplorerHook>>, AppError> {
    let hooks = state.service.list_hooks().await?;
    Ok(Json(hooks))
}

/// Subscribe the monitored address to confirmed-transaction notifications
#[utoipa::path(
    post,
    path = "/explorer/hooks",
    tag = "explorer",
    request_body = CreateHookRequest,
    responses(
        (status = 200, description = "Subscription created", body = ExplorerHook),
        (status = 400, description = "Invalid URL", body = ErrorResponse),
        (status = 502, description = "Explorer unavailable", body = ErrorResponse)
    )
)]
pub async fn create_hook_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateHookRequest>,
) -> Result<Json<ExplorerHook>, AppError> {
    let hook = state.service.create_hook(&payload).await?;
    Ok(Json(hook))
}

/// Get an explorer webhook subscription
#[utoipa::path(
    get,
    path = "/explorer/hooks/{id}",
    tag = "explorer",
    params(
        ("id" = String, Path, description = "Subscription ID")
    ),
    responses(
        (status = 200, description = "Subscription", body = ExplorerHook),
        (status = 502, description = "Explorer unavailable", body = ErrorResponse)
    )
)]
pub async fn get_hook_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ExplorerHook>, AppError> {
    let hook = state.service.get_hook(&id).await?;
    Ok(Json(hook))
}

/// Delete an explorer webhook subscription
#[utoipa::path(
    delete,
    path = "/explorer/hooks/{id}",
    tag = "explorer",
    params(
        ("id" = String, Path, description = "Subscription ID")
    ),
    responses(
        (status = 204, description = "Subscription deleted"),
        (status = 502, description = "Explorer unavailable", body = ErrorResponse)
    )
)]
pub async fn delete_hook_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.service.delete_hook(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Final balance of the monitored address
#[utoipa::path(
    get,
    path = "/explorer/balance",
    tag = "explorer",
    responses(
        (status = 200, description = "Balance", body = AddressBalance),
        (status = 502, description = "Explorer unavailable", body = ErrorResponse)
    )
)]
pub async fn balance_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<AddressBalance>, AppError> {
    let balance = state.service.get_balance().await?;
    Ok(Json(balance))
}

/// Detailed health check
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Health status", body = HealthResponse)
    )
)]
pub async fn health_check_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let health = state.service.health_check().await;
    Json(health)
}

/// Kubernetes liveness probe
#[utoipa::path(
    get,
    path = "/health/live",
    tag = "health",
    responses(
        (status = 200, description = "Application is alive")
    )
)]
pub async fn liveness_handler() -> StatusCode {
    StatusCode::OK
}

/// Kubernetes readiness probe
#[utoipa::path(
    get,
    path = "/health/ready",
    tag = "health",
    responses(
        (status = 200, description = "Application is ready to serve traffic"),
        (status = 503, description = "Application is not ready")
    )
)]
pub async fn readiness_handler(State(state): State<Arc<AppState>>) -> StatusCode {
    let health = state.service.health_check().await;
    match health.status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, error_type, message) = match &self {
            AppError::Database(db_err) => match db_err {
                DatabaseError::Connection(_) => (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "database_error",
                    self.to_string(),
                ),
                DatabaseError::NotFound(_) => {
                    (StatusCode::NOT_FOUND, "not_found", self.to_string())
                }
                DatabaseError::Duplicate(_) => {
                    (StatusCode::CONFLICT, "duplicate", self.to_string())
                }
                _ => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "database_error",
                    self.to_string(),
                ),
            },
            AppError::ExternalService(ext_err) => match ext_err {
                ExternalServiceError::Timeout(_) => {
                    (StatusCode::GATEWAY_TIMEOUT, "timeout", self.to_string())
                }
                ExternalServiceError::RateLimited(_) => (
                    StatusCode::TOO_MANY_REQUESTS,
                    "rate_limited",
                    self.to_string(),
                ),
                _ => (
                    StatusCode::BAD_GATEWAY,
                    "external_service_error",
                    self.to_string(),
                ),
            },
            AppError::Config(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "configuration_error",
                self.to_string(),
            ),
            AppError::Validation(_) => (
                StatusCode::BAD_REQUEST,
                "validation_error",
                self.to_string(),
            ),
            AppError::Authentication(_) => (
                StatusCode::UNAUTHORIZED,
                "authentication_error",
                self.to_string(),
            ),
            AppError::NotSupported(_) => (
                StatusCode::NOT_IMPLEMENTED,
                "not_supported",
                self.to_string(),
            ),
        };

        if status.is_server_error() {
            error!(error_type = %error_type, message = %message, "Server error");
        }

        let body = Json(ErrorResponse {
            error: ErrorDetail {
                r#type: error_type.to_string(),
                message,
            },
        });

        (status, body).into_response()
    }
}
