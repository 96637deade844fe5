//! Assistant client that talks to the chat endpoint over HTTP

use super::{AssistantReply, AssistantRequest};
use crate::resilience::{CallError, FailureReason};
use crate::runtime::AssistantClient;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

const CHAT_PATH: &str = "/api/assistant/chat";

pub struct HttpAssistantClient {
    client: Client,
    endpoint: String,
}

impl HttpAssistantClient {
    /// `base_url` is the service root, e.g. `http://localhost:3000`
    pub fn new(base_url: &str) -> Result<Self, CallError> {
        let client = Client::builder()
            .build()
            .map_err(|e| CallError::remote(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: format!("{}{CHAT_PATH}", base_url.trim_end_matches('/')),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

fn classify_status(status: StatusCode, body: &str) -> CallError {
    let message = serde_json::from_str::<ErrorBody>(body)
        .map_or_else(|_| body.to_string(), |b| b.error);

    match status {
        StatusCode::TOO_MANY_REQUESTS => CallError::rate_limited(message),
        _ => CallError::remote(format!("HTTP {status}: {message}")),
    }
}

#[async_trait]
impl AssistantClient for HttpAssistantClient {
    async fn ask(&self, message: &str) -> Result<AssistantReply, CallError> {
        let request = AssistantRequest {
            message: message.to_string(),
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CallError::new(FailureReason::Timeout, e.to_string())
                } else {
                    CallError::remote(format!("Request failed: {e}"))
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| CallError::remote(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            return Err(classify_status(status, &body));
        }

        serde_json::from_str(&body)
            .map_err(|e| CallError::remote(format!("Malformed reply: {e}")))
    }
}
