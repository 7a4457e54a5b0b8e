//! HTTP request handlers with OpenAPI documentation.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use utoipa::{OpenApi, ToSchema};

use crate::app::AppState;
use crate::domain::{
    AdapterError, AppError, AssetEvent, DatabaseError, ErrorDetail, ErrorResponse, Escrow,
    EscrowParty, HealthResponse, HealthStatus, ListForSaleRequest, Notification, Operation,
    OwnershipTransfer, PurchasePayload, RegisterWatchRequest, SaleReceipt, User, Watch, policy,
};

/// OpenAPI documentation structure
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Watchledger API",
        version = "0.1.0",
        description = "Tokenized luxury watch marketplace: registration, tokenization, sales, and escrow",
        license(
            name = "MIT"
        )
    ),
    paths(
        register_watch_handler,
        get_watch_handler,
        marketplace_handler,
        list_for_sale_handler,
        purchase_handler,
        tokenize_watch_handler,
        watch_history_handler,
        blockchain_history_handler,
        open_escrow_handler,
        get_escrow_handler,
        confirm_escrow_handler,
        dispute_escrow_handler,
        list_escrows_handler,
        notifications_handler,
        health_check_handler,
        liveness_handler,
        readiness_handler,
    ),
    components(
        schemas(
            Watch,
            RegisterWatchRequest,
            ListForSaleRequest,
            PurchasePayload,
            SaleReceipt,
            OwnershipTransfer,
            AssetEvent,
            Escrow,
            ConfirmEscrowRequest,
            crate::domain::EscrowParty,
            crate::domain::EscrowStatus,
            crate::domain::WatchStatus,
            crate::domain::PaymentMethod,
            Notification,
            HealthResponse,
            HealthStatus,
            ErrorResponse,
            ErrorDetail,
        )
    ),
    tags(
        (name = "watches", description = "Watch registration, tokenization, and sales"),
        (name = "escrows", description = "Escrow management endpoints"),
        (name = "health", description = "Health check endpoints")
    )
)]
pub struct ApiDoc;

/// Header carrying the caller identity asserted by the upstream gateway
pub const ACTOR_HEADER: &str = "x-actor-id";

/// Resolve the calling user from the gateway identity header and check the
/// role policy for the requested operation.
async fn resolve_actor(
    state: &AppState,
    headers: &HeaderMap,
    operation: Operation,
) -> Result<User, AppError> {
    let actor_id = headers
        .get(ACTOR_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Authentication("Missing X-Actor-Id header".to_string()))?
        .parse::<i64>()
        .map_err(|_| AppError::Authentication("Invalid X-Actor-Id header".to_string()))?;

    let actor = state
        .ledger
        .get_user(actor_id)
        .await?
        .ok_or_else(|| AppError::Authentication(format!("Unknown actor {}", actor_id)))?;

    policy::require(actor.role, operation)?;
    Ok(actor)
}

/// Request body for escrow confirmation
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ConfirmEscrowRequest {
    /// Which release party is confirming
    pub party: EscrowParty,
}

/// Register a new watch
///
/// Evaluator-registered watches start `evaluated`; admin-registered watches
/// start `registered`. Serial numbers are unique across the ledger.
#[utoipa::path(
    post,
    path = "/watches",
    tag = "watches",
    request_body = RegisterWatchRequest,
    responses(
        (status = 200, description = "Watch registered", body = Watch),
        (status = 400, description = "Validation error", body = ErrorResponse),
        (status = 401, description = "Missing or unknown actor", body = ErrorResponse),
        (status = 403, description = "Role not permitted to register watches", body = ErrorResponse),
        (status = 409, description = "Duplicate serial number", body = ErrorResponse)
    )
)]
pub async fn register_watch_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<RegisterWatchRequest>,
) -> Result<Json<Watch>, AppError> {
    let actor = resolve_actor(&state, &headers, Operation::RegisterWatch).await?;
    let watch = state.service.register_watch(&actor, &payload).await?;
    Ok(Json(watch))
}

/// Get a single watch by ID
#[utoipa::path(
    get,
    path = "/watches/{id}",
    tag = "watches",
    params(
        ("id" = i64, Path, description = "Watch ID")
    ),
    responses(
        (status = 200, description = "Watch found", body = Watch),
        (status = 404, description = "Watch not found", body = ErrorResponse)
    )
)]
pub async fn get_watch_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<Watch>, AppError> {
    resolve_actor(&state, &headers, Operation::ViewWatch).await?;
    let watch = state.service.get_watch(id).await?;
    Ok(Json(watch))
}

/// List watches currently for sale
#[utoipa::path(
    get,
    path = "/marketplace",
    tag = "watches",
    responses(
        (status = 200, description = "Watches listed for sale", body = [Watch])
    )
)]
pub async fn marketplace_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<Watch>>, AppError> {
    resolve_actor(&state, &headers, Operation::ViewMarketplace).await?;
    let watches = state.service.marketplace().await?;
    Ok(Json(watches))
}

/// List a watch for sale
#[utoipa::path(
    post,
    path = "/watches/{id}/list",
    tag = "watches",
    params(
        ("id" = i64, Path, description = "Watch ID")
    ),
    request_body = ListForSaleRequest,
    responses(
        (status = 200, description = "Watch listed", body = Watch),
        (status = 403, description = "Actor's store does not hold the watch", body = ErrorResponse),
        (status = 404, description = "Watch not found", body = ErrorResponse),
        (status = 409, description = "Watch not in a listable state", body = ErrorResponse)
    )
)]
pub async fn list_for_sale_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(payload): Json<ListForSaleRequest>,
) -> Result<Json<Watch>, AppError> {
    let actor = resolve_actor(&state, &headers, Operation::ListForSale).await?;
    let watch = state.service.list_for_sale(id, &actor, &payload).await?;
    Ok(Json(watch))
}

/// Purchase a listed watch
///
/// Charges the buyer, moves token custody, and commits the ownership
/// transfer with its platform commission atomically. A payment decline or
/// a lost purchase race leaves the listing unchanged.
#[utoipa::path(
    post,
    path = "/watches/{id}/purchase",
    tag = "watches",
    params(
        ("id" = i64, Path, description = "Watch ID")
    ),
    request_body = PurchasePayload,
    responses(
        (status = 200, description = "Purchase complete", body = SaleReceipt),
        (status = 400, description = "Invalid payment details", body = ErrorResponse),
        (status = 402, description = "Payment declined", body = ErrorResponse),
        (status = 403, description = "Self-purchase or non-store seller", body = ErrorResponse),
        (status = 404, description = "Watch not found", body = ErrorResponse),
        (status = 409, description = "Watch not for sale or purchase race lost", body = ErrorResponse)
    )
)]
pub async fn purchase_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(payload): Json<PurchasePayload>,
) -> Result<Json<SaleReceipt>, AppError> {
    let actor = resolve_actor(&state, &headers, Operation::PurchaseWatch).await?;
    let receipt = state.service.purchase(id, &actor, &payload).await?;
    Ok(Json(receipt))
}

/// Tokenize a watch on the blockchain
#[utoipa::path(
    post,
    path = "/watches/{id}/tokenize",
    tag = "watches",
    params(
        ("id" = i64, Path, description = "Watch ID")
    ),
    responses(
        (status = 200, description = "Watch tokenized", body = Watch),
        (status = 403, description = "Actor is not a credentialed evaluator", body = ErrorResponse),
        (status = 404, description = "Watch not found", body = ErrorResponse),
        (status = 409, description = "Watch already tokenized or not tokenizable", body = ErrorResponse),
        (status = 502, description = "Blockchain adapter failure", body = ErrorResponse)
    )
)]
pub async fn tokenize_watch_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<Watch>, AppError> {
    let actor = resolve_actor(&state, &headers, Operation::TokenizeWatch).await?;
    let watch = state.service.tokenize_watch(id, &actor).await?;
    Ok(Json(watch))
}

/// Ownership transfer history for a watch, oldest first
#[utoipa::path(
    get,
    path = "/watches/{id}/history",
    tag = "watches",
    params(
        ("id" = i64, Path, description = "Watch ID")
    ),
    responses(
        (status = 200, description = "Transfer history", body = [OwnershipTransfer]),
        (status = 404, description = "Watch not found", body = ErrorResponse)
    )
)]
pub async fn watch_history_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<Vec<OwnershipTransfer>>, AppError> {
    resolve_actor(&state, &headers, Operation::ViewHistory).await?;
    let transfers = state.service.watch_history(id).await?;
    Ok(Json(transfers))
}

/// On-chain event history for a tokenized watch
#[utoipa::path(
    get,
    path = "/watches/{id}/blockchain-history",
    tag = "watches",
    params(
        ("id" = i64, Path, description = "Watch ID")
    ),
    responses(
        (status = 200, description = "On-chain events", body = [AssetEvent]),
        (status = 404, description = "Watch not found", body = ErrorResponse),
        (status = 409, description = "Watch is not tokenized", body = ErrorResponse),
        (status = 501, description = "Adapter does not expose history", body = ErrorResponse)
    )
)]
pub async fn blockchain_history_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<Vec<AssetEvent>>, AppError> {
    resolve_actor(&state, &headers, Operation::ViewHistory).await?;
    let events = state.service.blockchain_history(id).await?;
    Ok(Json(events))
}

/// Open an escrow for a listed watch
#[utoipa::path(
    post,
    path = "/watches/{id}/escrow",
    tag = "escrows",
    params(
        ("id" = i64, Path, description = "Watch ID")
    ),
    responses(
        (status = 200, description = "Escrow opened", body = Escrow),
        (status = 403, description = "Buyer already owns the watch", body = ErrorResponse),
        (status = 404, description = "Watch not found", body = ErrorResponse),
        (status = 409, description = "Watch not listed for sale", body = ErrorResponse)
    )
)]
pub async fn open_escrow_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<Escrow>, AppError> {
    let actor = resolve_actor(&state, &headers, Operation::OpenEscrow).await?;
    let escrow = state.service.open_escrow(id, &actor).await?;
    Ok(Json(escrow))
}

/// Get a single escrow by ID
#[utoipa::path(
    get,
    path = "/escrows/{id}",
    tag = "escrows",
    params(
        ("id" = i64, Path, description = "Escrow ID")
    ),
    responses(
        (status = 200, description = "Escrow found", body = Escrow),
        (status = 404, description = "Escrow not found", body = ErrorResponse)
    )
)]
pub async fn get_escrow_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<Escrow>, AppError> {
    resolve_actor(&state, &headers, Operation::ViewEscrow).await?;
    let escrow = state.service.get_escrow(id).await?;
    Ok(Json(escrow))
}

/// Confirm an escrow as the seller or evaluator party
///
/// The escrow releases when both parties have confirmed.
#[utoipa::path(
    post,
    path = "/escrows/{id}/confirm",
    tag = "escrows",
    params(
        ("id" = i64, Path, description = "Escrow ID")
    ),
    request_body = ConfirmEscrowRequest,
    responses(
        (status = 200, description = "Confirmation recorded", body = Escrow),
        (status = 403, description = "Actor does not match the confirming party", body = ErrorResponse),
        (status = 404, description = "Escrow not found", body = ErrorResponse),
        (status = 409, description = "Escrow already released or disputed", body = ErrorResponse)
    )
)]
pub async fn confirm_escrow_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(payload): Json<ConfirmEscrowRequest>,
) -> Result<Json<Escrow>, AppError> {
    let actor = resolve_actor(&state, &headers, Operation::ConfirmEscrow).await?;
    let escrow = state
        .service
        .confirm_escrow(id, payload.party, &actor)
        .await?;
    Ok(Json(escrow))
}

/// Raise a dispute on a pending escrow
#[utoipa::path(
    post,
    path = "/escrows/{id}/dispute",
    tag = "escrows",
    params(
        ("id" = i64, Path, description = "Escrow ID")
    ),
    responses(
        (status = 200, description = "Escrow disputed", body = Escrow),
        (status = 403, description = "Actor is not a party to the escrow", body = ErrorResponse),
        (status = 404, description = "Escrow not found", body = ErrorResponse),
        (status = 409, description = "Escrow already released or disputed", body = ErrorResponse)
    )
)]
pub async fn dispute_escrow_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<Escrow>, AppError> {
    let actor = resolve_actor(&state, &headers, Operation::DisputeEscrow).await?;
    let escrow = state.service.dispute_escrow(id, &actor).await?;
    Ok(Json(escrow))
}

/// List all escrows (admin only)
#[utoipa::path(
    get,
    path = "/escrows",
    tag = "escrows",
    responses(
        (status = 200, description = "All escrows", body = [Escrow]),
        (status = 403, description = "Admin role required", body = ErrorResponse)
    )
)]
pub async fn list_escrows_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<Escrow>>, AppError> {
    resolve_actor(&state, &headers, Operation::ListEscrows).await?;
    let escrows = state.service.list_escrows().await?;
    Ok(Json(escrows))
}

/// Stored notifications for the calling user
#[utoipa::path(
    get,
    path = "/notifications",
    tag = "watches",
    responses(
        (status = 200, description = "Notifications for the actor", body = [Notification]),
        (status = 401, description = "Missing or unknown actor", body = ErrorResponse)
    )
)]
pub async fn notifications_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<Notification>>, AppError> {
    let actor = resolve_actor(&state, &headers, Operation::ViewNotifications).await?;
    let notifications = state.service.notifications(actor.id).await?;
    Ok(Json(notifications))
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
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found", self.to_string()),
            AppError::Policy(_) => (StatusCode::FORBIDDEN, "policy_violation", self.to_string()),
            AppError::InvalidRequest(_) => (
                StatusCode::BAD_REQUEST,
                "invalid_request",
                self.to_string(),
            ),
            AppError::Conflict(_) => (StatusCode::CONFLICT, "conflict_state", self.to_string()),
            AppError::Adapter(adapter_err) => match adapter_err {
                AdapterError::PaymentDeclined(_) => (
                    StatusCode::PAYMENT_REQUIRED,
                    "payment_declined",
                    self.to_string(),
                ),
                AdapterError::PaymentUnavailable(_) | AdapterError::Blockchain(_) => (
                    StatusCode::BAD_GATEWAY,
                    "adapter_failure",
                    self.to_string(),
                ),
                AdapterError::Timeout(_) => {
                    (StatusCode::GATEWAY_TIMEOUT, "timeout", self.to_string())
                }
                AdapterError::Notification(_) => (
                    StatusCode::BAD_GATEWAY,
                    "adapter_failure",
                    self.to_string(),
                ),
            },
            AppError::Database(db_err) => match db_err {
                DatabaseError::Connection(_) => (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "database_error",
                    self.to_string(),
                ),
                DatabaseError::Duplicate(_) => {
                    (StatusCode::CONFLICT, "conflict_state", self.to_string())
                }
                _ => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "database_error",
                    self.to_string(),
                ),
            },
            AppError::Authentication(_) => (
                StatusCode::UNAUTHORIZED,
                "authentication_error",
                self.to_string(),
            ),
            AppError::Config(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "configuration_error",
                self.to_string(),
            ),
            AppError::NotSupported(_) => (
                StatusCode::NOT_IMPLEMENTED,
                "not_supported",
                self.to_string(),
            ),
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                self.to_string(),
            ),
        };

        let body = Json(ErrorResponse {
            error: ErrorDetail {
                r#type: error_type.to_string(),
                message,
            },
        });

        (status, body).into_response()
    }
}
