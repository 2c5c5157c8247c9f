//! Route table.

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::app::AppState;

use super::handlers::{
    ApiDoc, balance_handler, blockcypher_webhook_handler, create_hook_handler,
    delete_hook_handler, dispatch_donation_handler, get_hook_handler, health_check_handler,
    leaderboard_handler, list_deliveries_handler, list_donations_handler, list_hooks_handler,
    liveness_handler, readiness_handler, sync_handler, total_received_handler,
};

/// Build the application router with tracing and Swagger UI
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/donations", get(list_donations_handler))
        .route("/donations/total", get(total_received_handler))
        .route("/donations/leaderboard", get(leaderboard_handler))
        .route("/donations/{id}/dispatch", post(dispatch_donation_handler))
        .route("/deliveries", get(list_deliveries_handler))
        .route("/sync", post(sync_handler))
        .route("/webhooks/blockcypher", post(blockcypher_webhook_handler))
        .route(
            "/explorer/hooks",
            get(list_hooks_handler).post(create_hook_handler),
        )
        .route(
            "/explorer/hooks/{id}",
            get(get_hook_handler).delete(delete_hook_handler),
        )
        .route("/explorer/balance", get(balance_handler))
        .route("/health", get(health_check_handler))
        .route("/health/live", get(liveness_handler))
        .route("/health/ready", get(readiness_handler))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
