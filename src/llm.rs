//! Generative-AI provider boundary
//!
//! One provider today (Gemini) behind [`LlmService`], so the assistant and
//! its tests can swap in scripted models.

mod error;
mod gemini;
mod types;

pub use error::{LlmError, LlmErrorKind};
pub use gemini::{GeminiService, DEFAULT_GEMINI_MODEL};
pub use types::*;

use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait LlmService: Send + Sync {
    /// Single-shot completion of a prompt
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError>;

    fn model_id(&self) -> &str;
}

/// Records the latency and outcome of every completion.
///
/// Retryable failures log at `warn`, everything else at `error`.
pub struct LoggingService {
    inner: Arc<dyn LlmService>,
    model_id: String,
}

impl LoggingService {
    pub fn new(inner: Arc<dyn LlmService>) -> Self {
        let model_id = inner.model_id().to_string();
        Self { inner, model_id }
    }
}

#[async_trait]
impl LlmService for LoggingService {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let started = std::time::Instant::now();
        let result = self.inner.complete(request).await;
        let elapsed_ms = started.elapsed().as_millis();

        match &result {
            Ok(response) => tracing::info!(
                model = %self.model_id,
                elapsed_ms = %elapsed_ms,
                reply_chars = response.text.len(),
                input_tokens = response.usage.input_tokens,
                output_tokens = response.usage.output_tokens,
                "Gemini reply received"
            ),
            Err(e) if e.kind.is_retryable() => tracing::warn!(
                model = %self.model_id,
                elapsed_ms = %elapsed_ms,
                reason = %e.kind.failure_reason(),
                retry_after_ms = e
                    .retry_after
                    .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX)),
                error = %e.message,
                "Gemini call failed"
            ),
            Err(e) => tracing::error!(
                model = %self.model_id,
                elapsed_ms = %elapsed_ms,
                kind = ?e.kind,
                error = %e.message,
                "Gemini call rejected"
            ),
        }

        result
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}
