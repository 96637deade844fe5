//! Trait abstractions for runtime I/O
//!
//! These traits enable testing the controller with mock implementations.

use crate::assistant::AssistantReply;
use crate::resilience::CallError;
use async_trait::async_trait;
use std::sync::Arc;

/// Client for the AI dispatch boundary: `{ message }` -> `{ reply, isFallback? }`
#[async_trait]
pub trait AssistantClient: Send + Sync {
    async fn ask(&self, message: &str) -> Result<AssistantReply, CallError>;
}

/// Text-to-speech sink. Fire-and-forget: returns before the audio finishes.
pub trait SpeechPlayback: Send + Sync {
    fn speak(&self, text: &str);
}

/// Speech-to-text source
///
/// Produces one finalized transcript per completed listening session. Sessions
/// with no speech are skipped rather than reported as empty strings.
#[async_trait]
pub trait SpeechCapture: Send {
    fn start(&mut self);

    fn stop(&mut self);

    /// Next finalized transcript, or `None` once the source is exhausted or stopped
    async fn next_transcript(&mut self) -> Option<String>;
}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: AssistantClient + ?Sized> AssistantClient for Arc<T> {
    async fn ask(&self, message: &str) -> Result<AssistantReply, CallError> {
        (**self).ask(message).await
    }
}

impl<T: SpeechPlayback + ?Sized> SpeechPlayback for Arc<T> {
    fn speak(&self, text: &str) {
        (**self).speak(text);
    }
}
