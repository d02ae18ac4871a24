//! # REST API
//!
//! Builds the axum router that exposes the keeper's view of the order book.
//! Everything is read-only except `POST /orders/:id/expire`, which anyone may
//! call once an order is overdue.
//!
//! ## Endpoints
//!
//! | Method | Path                       | Description                          |
//! |--------|----------------------------|--------------------------------------|
//! | GET    | `/health`                  | Liveness probe                       |
//! | GET    | `/status`                  | Order book summary                   |
//! | GET    | `/params`                  | Active escrow parameters             |
//! | GET    | `/orders/:id`              | Order with its deadline              |
//! | GET    | `/orders/:id/collateral`   | Collateral required to accept        |
//! | GET    | `/orders/:id/expired`      | Whether the order is past deadline   |
//! | POST   | `/orders/:id/expire`       | Expire an overdue order              |
//! | GET    | `/users/:address/orders`   | Order ids an address takes part in   |

use axum::{
    extract::{Path, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use hashdrop_contracts::{
    EscrowError, EscrowParams, ExpiryOutcome, HashDropEscrow, Order, OrderId, OrderState,
    StateError,
};
use hashdrop_protocol::crypto::Address;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::metrics::SharedMetrics;

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

/// Shared application state available to all request handlers.
///
/// Cheap to clone, everything behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// The node's reported version string.
    pub version: String,
    pub escrow: Arc<HashDropEscrow>,
    pub metrics: SharedMetrics,
}

// ---------------------------------------------------------------------------
// Router Construction
// ---------------------------------------------------------------------------

/// Builds the full axum [`Router`] with all API routes, CORS, and tracing.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/params", get(params_handler))
        .route("/orders/:id", get(order_handler))
        .route("/orders/:id/collateral", get(collateral_handler))
        .route("/orders/:id/expired", get(is_expired_handler))
        .route("/orders/:id/expire", post(expire_handler))
        .route("/users/:address/orders", get(user_orders_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Response Types
// ---------------------------------------------------------------------------

/// Response payload for `GET /status`.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub version: String,
    pub orders: usize,
    pub next_order_id: OrderId,
    /// Ledger time, unix seconds.
    pub ledger_time: u64,
    pub by_state: Vec<StateCount>,
    /// ISO-8601 timestamp of the response.
    pub timestamp: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StateCount {
    pub state: OrderState,
    pub count: usize,
}

/// Response payload for `GET /orders/:id`.
#[derive(Debug, Serialize, Deserialize)]
pub struct OrderResponse {
    #[serde(flatten)]
    pub order: Order,
    /// Instant after which the order may be expired; absent once terminal.
    pub deadline: Option<u64>,
    pub time_remaining: Option<u64>,
    pub escrowed_amount: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CollateralResponse {
    pub order_id: OrderId,
    pub required_collateral: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExpiredResponse {
    pub order_id: OrderId,
    pub expired: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExpireResponse {
    pub order_id: OrderId,
    pub outcome: ExpiryOutcome,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserOrdersResponse {
    pub address: Address,
    pub orders: Vec<OrderId>,
}

/// Generic error body returned by REST endpoints on failure.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: String,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Escrow error on its way out as an HTTP response.
pub struct ApiError(EscrowError);

impl From<EscrowError> for ApiError {
    fn from(err: EscrowError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            EscrowError::State(StateError::NotFound(_)) => StatusCode::NOT_FOUND,
            EscrowError::State(StateError::Unauthorized { .. }) => StatusCode::FORBIDDEN,
            EscrowError::State(_) => StatusCode::CONFLICT,
            EscrowError::CryptoVerification(_)
            | EscrowError::ProofGeneration(_)
            | EscrowError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            EscrowError::Arithmetic(_) => StatusCode::UNPROCESSABLE_ENTITY,
            EscrowError::ExternalCollaborator(_) => StatusCode::SERVICE_UNAVAILABLE,
        };
        let body = ErrorResponse {
            error: self.0.to_string(),
            kind: self.0.kind().to_string(),
        };
        (status, Json(body)).into_response()
    }
}

fn bad_request(msg: impl Into<String>) -> Response {
    let body = ErrorResponse {
        error: msg.into(),
        kind: "invalid_request".into(),
    };
    (StatusCode::BAD_REQUEST, Json(body)).into_response()
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /health` — returns 200 if the node is alive.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

/// `GET /status`
async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    let escrow = &state.escrow;
    let mut by_state: Vec<StateCount> = escrow
        .state_counts()
        .into_iter()
        .map(|(state, count)| StateCount { state, count })
        .collect();
    by_state.sort_by_key(|c| c.state.as_str());

    Json(StatusResponse {
        version: state.version.clone(),
        orders: escrow.order_count(),
        next_order_id: escrow.next_order_id(),
        ledger_time: escrow.now(),
        by_state,
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// `GET /params`
async fn params_handler(State(state): State<AppState>) -> Json<EscrowParams> {
    Json(state.escrow.params().clone())
}

/// `GET /orders/:id`
async fn order_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<OrderResponse>, ApiError> {
    let escrow = &state.escrow;
    let order = escrow
        .get_order(OrderId(id))
        .ok_or(StateError::NotFound(OrderId(id)))
        .map_err(EscrowError::from)?;
    let now = escrow.now();
    Ok(Json(OrderResponse {
        deadline: order.deadline(escrow.params()),
        time_remaining: order.time_remaining(escrow.params(), now),
        escrowed_amount: order.escrowed_amount(),
        order,
    }))
}

/// `GET /orders/:id/collateral`
async fn collateral_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<CollateralResponse>, ApiError> {
    let required_collateral = state.escrow.get_required_collateral(OrderId(id))?;
    Ok(Json(CollateralResponse {
        order_id: OrderId(id),
        required_collateral,
    }))
}

/// `GET /orders/:id/expired`
async fn is_expired_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<ExpiredResponse>, ApiError> {
    let expired = state.escrow.is_expired(OrderId(id))?;
    Ok(Json(ExpiredResponse {
        order_id: OrderId(id),
        expired,
    }))
}

/// `POST /orders/:id/expire` — permissionless.
async fn expire_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<ExpireResponse>, ApiError> {
    let outcome = state.escrow.expire(OrderId(id)).map_err(|e| {
        state.metrics.record_error(&e);
        ApiError(e)
    })?;
    state.metrics.record_events(&state.escrow.take_events());
    Ok(Json(ExpireResponse {
        order_id: OrderId(id),
        outcome,
    }))
}

/// `GET /users/:address/orders`
async fn user_orders_handler(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Response {
    match address.parse::<Address>() {
        Ok(address) => Json(UserOrdersResponse {
            orders: state.escrow.user_orders(&address),
            address,
        })
        .into_response(),
        Err(e) => bad_request(e.to_string()),
    }
}
