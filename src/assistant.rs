//! The AI dispatch boundary
//!
//! [`AssistantService`] is the server side of `POST /api/assistant/chat`: it
//! runs the prompt through the configured LLM under the resilient-call policy.
//! The clients implement [`AssistantClient`](crate::runtime::AssistantClient)
//! for the conversation controller, either over HTTP or straight to the LLM.

mod direct;
mod http;

pub use direct::DirectAssistantClient;
pub use http::HttpAssistantClient;

use crate::config::Config;
use crate::llm::{GeminiService, LlmError, LlmRequest, LlmService, LoggingService};
use crate::resilience::{
    CallError, CallOptions, CallOutcome, FallbackReplies, ResilientCaller,
};
use crate::runtime::AssistantClient;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Request body of the chat endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantRequest {
    pub message: String,
}

/// Reply body of the chat endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssistantReply {
    pub reply: String,
    /// Older servers call this flag `isMock`
    #[serde(
        rename = "isFallback",
        alias = "isMock",
        default,
        skip_serializing_if = "is_false"
    )]
    pub is_fallback: bool,
}

#[allow(clippy::trivially_copy_pass_by_ref)] // serde's skip_serializing_if passes &T
fn is_false(flag: &bool) -> bool {
    !*flag
}

impl AssistantReply {
    pub fn real(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            is_fallback: false,
        }
    }

    pub fn fallback(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            is_fallback: true,
        }
    }
}

/// Server-side assistant: LLM call wrapped in timeout, retry and fallback
pub struct AssistantService {
    llm: Option<Arc<dyn LlmService>>,
    system_prompt: Option<String>,
    caller: ResilientCaller,
    options: CallOptions<String>,
}

impl AssistantService {
    /// `llm` of `None` means the AI service is not configured
    pub fn new(llm: Option<Arc<dyn LlmService>>, options: CallOptions<String>) -> Self {
        Self {
            llm,
            system_prompt: None,
            caller: ResilientCaller::new("gemini"),
            options,
        }
    }

    #[must_use]
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn from_config(config: &Config) -> Result<Self, LlmError> {
        let llm: Option<Arc<dyn LlmService>> = match &config.gemini_api_key {
            Some(key) => {
                let gemini = GeminiService::new(key, &config.gemini_model, config.ai_timeout)?;
                Some(Arc::new(LoggingService::new(Arc::new(gemini))))
            }
            None => None,
        };

        Ok(Self::new(llm, call_options(config))
            .with_system_prompt(system_prompt(&config.assistant_name)))
    }

    /// Service with no AI backend: fallback replies only, or errors if disabled
    pub fn offline(config: &Config) -> Self {
        Self::new(None, call_options(config))
    }

    pub async fn reply(&self, message: &str) -> Result<AssistantReply, CallError> {
        let Some(llm) = &self.llm else {
            return match &self.options.fallback {
                Some(fallback) => {
                    tracing::debug!("AI service not configured, serving fallback reply");
                    Ok(AssistantReply::fallback(fallback()))
                }
                None => Err(CallError::remote("AI service is not configured")),
            };
        };

        let request = spoken_request(message, self.system_prompt.as_deref());
        let outcome = self
            .caller
            .invoke(
                || {
                    let llm = Arc::clone(llm);
                    let request = request.clone();
                    async move {
                        llm.complete(&request)
                            .await
                            .map(|response| response.text)
                            .map_err(CallError::from)
                    }
                },
                &self.options,
            )
            .await;

        match outcome {
            CallOutcome::Success {
                payload,
                is_fallback,
            } => Ok(AssistantReply {
                reply: payload,
                is_fallback,
            }),
            CallOutcome::Failure { reason, message } => Err(CallError::new(reason, message)),
        }
    }
}

/// Upper bound on reply length; anything longer is tedious to listen to
pub const MAX_REPLY_TOKENS: u32 = 256;

/// Prompt for one spoken turn, with the persona instruction when there is one
pub(crate) fn spoken_request(message: &str, system_prompt: Option<&str>) -> LlmRequest {
    let request = LlmRequest::prompt(message).with_max_tokens(MAX_REPLY_TOKENS);
    match system_prompt {
        Some(system) => request.with_system(system),
        None => request,
    }
}

/// Persona instruction; replies are read aloud, so they stay short and plain
pub fn system_prompt(name: &str) -> String {
    format!(
        "You are {name}, a friendly voice assistant. Answer in one to three short \
         spoken sentences without markdown, lists, or emoji."
    )
}

fn call_options(config: &Config) -> CallOptions<String> {
    let options = CallOptions::new(config.ai_timeout)
        .with_retries(config.ai_max_retries, config.ai_retry_delay);
    if config.ai_fallback {
        let replies = Arc::new(FallbackReplies::assistant_defaults());
        options.with_fallback(move || replies.pick())
    } else {
        options
    }
}

/// Lets the console run in-process against the same service the HTTP API uses
#[async_trait]
impl AssistantClient for AssistantService {
    async fn ask(&self, message: &str) -> Result<AssistantReply, CallError> {
        self.reply(message).await
    }
}
