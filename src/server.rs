use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::error;

use crate::chat::ChatRouter;
use crate::ledger::{LedgerClient, LedgerError};
use crate::models::{
    ActivityLogRequest, ChatReply, ChatRequest, Product, SaleReceipt, TransactionRequest,
};
use crate::store::Store;

pub struct AppState {
    pub chat: ChatRouter,
    pub ledger: LedgerClient,
    pub store: Store,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/chat", post(chat))
        .route("/products", get(products))
        .route("/record-transaction", post(record_transaction))
        .route("/verify-transaction", get(verify_transaction))
        .route("/log-activity", post(log_activity))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Caller-visible error conditions with their HTTP mapping. Internal causes
/// are logged, never leaked; only the upstream-error detail intentionally
/// carries the ledger's own response text.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("The ledger service is unavailable.")]
    ServiceUnavailable,
    #[error("An error occurred in the ledger service: {0}")]
    UpstreamError(String),
    #[error("Received an invalid (non-JSON) response from the ledger service.")]
    BadUpstreamBody,
    #[error("Invalid response format from the ledger service.")]
    InvalidUpstreamFormat,
    #[error("Transaction ID not found for the given product.")]
    NotFound,
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::UpstreamError(_) => StatusCode::BAD_GATEWAY,
            ApiError::BadUpstreamBody | ApiError::InvalidUpstreamFormat | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::NotFound => StatusCode::NOT_FOUND,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "detail": self.to_string() }))).into_response()
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Unavailable(_) => ApiError::ServiceUnavailable,
            LedgerError::UpstreamStatus { body, .. } => ApiError::UpstreamError(body),
            LedgerError::BadBody(_) => ApiError::BadUpstreamBody,
            LedgerError::InvalidFormat => ApiError::InvalidUpstreamFormat,
            LedgerError::NotFound => ApiError::NotFound,
            LedgerError::Internal(e) => {
                error!("Ledger call failed unexpectedly: {e:#}");
                ApiError::Internal("An internal error occurred.".to_string())
            }
        }
    }
}

async fn root() -> Json<serde_json::Value> {
    Json(json!({ "message": "Yatra tourism API is running" }))
}

async fn chat(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatRequest>,
) -> Json<ChatReply> {
    let user_id = request.user_id.as_deref().unwrap_or("default");
    let reply = state.chat.handle(user_id, &request.message).await;
    Json(ChatReply { reply })
}

async fn products(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Product>>, ApiError> {
    match state.store.list_products().await {
        Ok(products) => Ok(Json(products)),
        Err(e) => {
            error!("Failed to fetch products: {e:#}");
            Err(ApiError::Internal("An unexpected error occurred.".to_string()))
        }
    }
}

async fn record_transaction(
    State(state): State<Arc<AppState>>,
    Json(request): Json<TransactionRequest>,
) -> Result<Json<SaleReceipt>, ApiError> {
    let receipt = state.ledger.forward(request.product_id, request.price).await?;
    Ok(Json(receipt))
}

#[derive(Debug, Deserialize)]
struct VerifyParams {
    product_id: String,
    tx_id: String,
}

async fn verify_transaction(
    State(state): State<Arc<AppState>>,
    Query(params): Query<VerifyParams>,
) -> Result<Json<SaleReceipt>, ApiError> {
    let receipt = state.ledger.verify(&params.product_id, &params.tx_id).await?;
    Ok(Json(receipt))
}

#[derive(Serialize)]
struct LogActivityReply {
    status: &'static str,
    message: &'static str,
}

async fn log_activity(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ActivityLogRequest>,
) -> Result<Json<LogActivityReply>, ApiError> {
    let user_id = request.user_id.as_deref().unwrap_or("guest");

    if let Err(e) = state.store.insert_activity_log(user_id, &request.action).await {
        error!("Failed to log activity: {e:#}");
        return Err(ApiError::Internal("Failed to log activity.".to_string()));
    }

    Ok(Json(LogActivityReply {
        status: "success",
        message: "Activity logged.",
    }))
}
