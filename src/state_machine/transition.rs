//! Pure state transition function
//!
//! Turns are strictly sequential. A transcript arriving mid-turn is queued
//! and its user message is appended only when its own turn starts, so the
//! log always alternates user/assistant.

use super::{Effect, Event, TurnState};
use crate::assistant::AssistantReply;
use crate::resilience::CallOutcome;
use std::collections::VecDeque;
use thiserror::Error;

/// Assistant message appended when the call fails and no fallback is configured
pub const CONNECTION_ERROR_TEXT: &str = "Connection error. Please try again.";

/// Spoken instead of [`CONNECTION_ERROR_TEXT`]
pub const APOLOGY_TEXT: &str = "I'm having trouble connecting.";

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: TurnState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: TurnState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    #[must_use]
    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    #[must_use]
    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects.extend(effects);
        self
    }
}

/// Errors that can occur during transition
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("Transcript is empty")]
    EmptyTranscript,
    #[error("Reply received with no turn in flight")]
    UnexpectedReply,
    #[error("Session has been disposed")]
    Disposed,
}

/// Pure transition function
///
/// Given the same inputs it always produces the same outputs and performs no I/O.
pub fn transition(state: &TurnState, event: Event) -> Result<TransitionResult, TransitionError> {
    match (state, event) {
        // Disposal is terminal and idempotent
        (TurnState::Disposed, Event::Dispose) => Ok(TransitionResult::new(TurnState::Disposed)),
        (TurnState::Disposed, _) => Err(TransitionError::Disposed),

        (_, Event::Transcript { text }) if text.trim().is_empty() => {
            Err(TransitionError::EmptyTranscript)
        }

        // Idle + Transcript -> Processing
        (TurnState::Idle, Event::Transcript { text }) => Ok(TransitionResult::new(
            TurnState::Processing {
                in_flight: text.clone(),
                queued: VecDeque::new(),
            },
        )
        .with_effect(Effect::user_message(text.clone()))
        .with_effect(Effect::SetProcessing(true))
        .with_effect(Effect::dispatch(text))),

        // Processing + Transcript -> queue behind the in-flight turn
        (TurnState::Processing { in_flight, queued }, Event::Transcript { text }) => {
            let mut queued = queued.clone();
            queued.push_back(text);
            Ok(TransitionResult::new(TurnState::Processing {
                in_flight: in_flight.clone(),
                queued,
            }))
        }

        (TurnState::Idle, Event::Reply { .. }) => Err(TransitionError::UnexpectedReply),

        // Processing + Reply -> next queued turn, or Idle
        (TurnState::Processing { queued, .. }, Event::Reply { outcome }) => {
            let mut queued = queued.clone();
            let effects = reply_effects(outcome);

            let result = match queued.pop_front() {
                Some(next) => TransitionResult::new(TurnState::Processing {
                    in_flight: next.clone(),
                    queued,
                })
                .with_effects(effects)
                .with_effect(Effect::user_message(next.clone()))
                .with_effect(Effect::dispatch(next)),
                None => TransitionResult::new(TurnState::Idle)
                    .with_effects(effects)
                    .with_effect(Effect::SetProcessing(false)),
            };
            Ok(result)
        }

        (TurnState::Idle, Event::Dispose) => Ok(TransitionResult::new(TurnState::Disposed)),

        (TurnState::Processing { .. }, Event::Dispose) => Ok(TransitionResult::new(
            TurnState::Disposed,
        )
        .with_effect(Effect::CancelInFlight)
        .with_effect(Effect::SetProcessing(false))),
    }
}

/// Exactly one assistant message plus its playback for a finished call
fn reply_effects(outcome: CallOutcome<AssistantReply>) -> [Effect; 2] {
    match outcome {
        CallOutcome::Success {
            payload,
            is_fallback,
        } => {
            let is_fallback = is_fallback || payload.is_fallback;
            [
                Effect::assistant_message(payload.reply.clone(), is_fallback),
                Effect::speak(payload.reply),
            ]
        }
        CallOutcome::Failure { reason, .. } => {
            tracing::debug!(%reason, "Turn failed without fallback");
            [
                Effect::assistant_message(CONNECTION_ERROR_TEXT, false),
                Effect::speak(APOLOGY_TEXT),
            ]
        }
    }
}
