//! Assistant client that calls the LLM provider in-process

use super::{spoken_request, system_prompt, AssistantReply};
use crate::llm::LlmService;
use crate::resilience::CallError;
use crate::runtime::AssistantClient;
use async_trait::async_trait;
use std::sync::Arc;

/// Used by the console when no chat endpoint is configured. Fallback
/// substitution is left to the controller's resilient-call policy.
pub struct DirectAssistantClient {
    llm: Arc<dyn LlmService>,
    system_prompt: String,
}

impl DirectAssistantClient {
    /// Replies in the same persona the server uses for `assistant_name`
    pub fn new(llm: Arc<dyn LlmService>, assistant_name: &str) -> Self {
        Self {
            llm,
            system_prompt: system_prompt(assistant_name),
        }
    }
}

#[async_trait]
impl AssistantClient for DirectAssistantClient {
    async fn ask(&self, message: &str) -> Result<AssistantReply, CallError> {
        let request = spoken_request(message, Some(self.system_prompt.as_str()));
        let response = self.llm.complete(&request).await?;
        Ok(AssistantReply::real(response.text))
    }
}
