//! HTTP request handlers

use super::types::{
    ChatRequest, ErrorResponse, HealthResponse, HistoryQuery, HistoryResponse, ServiceStatus,
};
use super::AppState;
use crate::assistant::AssistantReply;
use crate::resilience::{CallError, FailureReason};
use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{SecondsFormat, Utc};

pub const DEFAULT_HISTORY_LIMIT: u32 = 20;
pub const MAX_HISTORY_LIMIT: u32 = 100;

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/api/assistant/chat", post(chat))
        .route("/api/assistant/history", get(history))
        .with_state(state)
}

async fn root() -> &'static str {
    "API is running..."
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let database = if state.datastore.is_ready() {
        "connected"
    } else {
        "disconnected"
    };

    Json(HealthResponse {
        status: "ok",
        message: "API is up and running",
        services: ServiceStatus {
            database,
            server: "running",
        },
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    })
}

async fn chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<AssistantReply>, AppError> {
    // Malformed bodies get the same answer as a missing message
    let Json(req) = payload.map_err(|rejection| {
        tracing::debug!(error = %rejection.body_text(), "Rejected chat body");
        AppError::BadRequest("Message is required".to_string())
    })?;
    let message = req
        .message
        .filter(|m| !m.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest("Message is required".to_string()))?;

    tracing::info!(chars = message.len(), "Received chat request");

    let reply = state.assistant.reply(&message).await?;

    if reply.is_fallback {
        tracing::info!("Serving fallback reply");
    }

    // The journal is best effort; a datastore problem never fails the chat
    if let Some(db) = state.datastore.handle() {
        if let Err(e) = db
            .record_exchange(&message, &reply.reply, reply.is_fallback)
            .await
        {
            tracing::warn!(error = %e, "Failed to record exchange");
        }
    }

    Ok(Json(reply))
}

async fn history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, AppError> {
    let db = state
        .datastore
        .handle()
        .ok_or_else(|| AppError::ServiceUnavailable("Database is not connected".to_string()))?;

    let limit = query
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT);

    let exchanges = db
        .recent_exchanges(limit)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(Json(HistoryResponse { exchanges }))
}

// ============================================================
// Error Handling
// ============================================================

pub enum AppError {
    BadRequest(String),
    ServiceUnavailable(String),
    Upstream(CallError),
    Internal(String),
}

impl From<CallError> for AppError {
    fn from(err: CallError) -> Self {
        AppError::Upstream(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::ServiceUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            AppError::Upstream(err) => {
                tracing::warn!(reason = %err.reason, error = %err.message, "AI call failed");
                let status = match err.reason {
                    FailureReason::Timeout => StatusCode::GATEWAY_TIMEOUT,
                    FailureReason::RateLimited => StatusCode::TOO_MANY_REQUESTS,
                    FailureReason::RemoteError => StatusCode::BAD_GATEWAY,
                };
                (status, err.message)
            }
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
