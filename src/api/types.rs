//! API request and response types

use crate::db::Exchange;
use serde::{Deserialize, Serialize};

/// Body of `POST /api/assistant/chat`. The message is optional here so a
/// missing field gets the same 400 as a blank one.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: Option<String>,
}

/// Query for `GET /api/assistant/history`
#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub exchanges: Vec<Exchange>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub message: &'static str,
    pub services: ServiceStatus,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
pub struct ServiceStatus {
    pub database: &'static str,
    pub server: &'static str,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}
