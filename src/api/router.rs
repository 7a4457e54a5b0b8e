//! Router assembly and middleware layers.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{
    cors::CorsLayer,
    limit::RequestBodyLimitLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::app::AppState;

use super::handlers::{
    ApiDoc, blockchain_history_handler, confirm_escrow_handler, dispute_escrow_handler,
    get_escrow_handler, get_watch_handler, health_check_handler, list_escrows_handler,
    list_for_sale_handler, liveness_handler, marketplace_handler, notifications_handler,
    open_escrow_handler, purchase_handler, readiness_handler, register_watch_handler,
    tokenize_watch_handler, watch_history_handler,
};

/// Request timeout for all routes
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum request body size (64 KiB; payloads here are small JSON)
const MAX_BODY_BYTES: usize = 64 * 1024;

/// Create the application router with all routes and middleware
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/watches", post(register_watch_handler))
        .route("/watches/{id}", get(get_watch_handler))
        .route("/watches/{id}/tokenize", post(tokenize_watch_handler))
        .route("/watches/{id}/list", post(list_for_sale_handler))
        .route("/watches/{id}/purchase", post(purchase_handler))
        .route("/watches/{id}/history", get(watch_history_handler))
        .route(
            "/watches/{id}/blockchain-history",
            get(blockchain_history_handler),
        )
        .route("/watches/{id}/escrow", post(open_escrow_handler))
        .route("/marketplace", get(marketplace_handler))
        .route("/escrows", get(list_escrows_handler))
        .route("/escrows/{id}", get(get_escrow_handler))
        .route("/escrows/{id}/confirm", post(confirm_escrow_handler))
        .route("/escrows/{id}/dispute", post(dispute_escrow_handler))
        .route("/notifications", get(notifications_handler))
        .route("/health", get(health_check_handler))
        .route("/health/live", get(liveness_handler))
        .route("/health/ready", get(readiness_handler))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(REQUEST_TIMEOUT_SECS)))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
