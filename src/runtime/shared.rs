//! Turn state shared by the controller handle and its executor
//!
//! Both sides run events through the pure transition function under one lock.
//! Effects that only touch the log or the `processing` flag are applied on the
//! spot; the rest (dispatch, playback, cancellation) are handed back to the
//! caller, which forwards them to the executor task.

use super::TurnUpdate;
use crate::conversation::{ConversationLog, Message, Role};
use crate::state_machine::{transition, Effect, Event, TransitionError, TurnState};
use std::sync::{Mutex, PoisonError, RwLock};
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;

pub(super) struct SharedTurn {
    state: Mutex<TurnState>,
    log: RwLock<ConversationLog>,
    processing_tx: watch::Sender<bool>,
    completed_tx: watch::Sender<u64>,
    updates_tx: broadcast::Sender<TurnUpdate>,
    session: CancellationToken,
}

impl SharedTurn {
    pub(super) fn new(
        processing_tx: watch::Sender<bool>,
        completed_tx: watch::Sender<u64>,
        updates_tx: broadcast::Sender<TurnUpdate>,
        session: CancellationToken,
    ) -> Self {
        Self {
            state: Mutex::new(TurnState::Idle),
            log: RwLock::new(ConversationLog::new()),
            processing_tx,
            completed_tx,
            updates_tx,
            session,
        }
    }

    /// Apply one event. Returns the effects that still need the executor.
    pub(super) fn apply(&self, event: Event) -> Result<Vec<Effect>, TransitionError> {
        let is_reply = matches!(event, Event::Reply { .. });

        // Held across the local effects so log order follows state order
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let result = transition(&state, event)?;
        *state = result.new_state;

        let mut deferred = Vec::new();
        for effect in result.effects {
            match effect {
                Effect::AppendMessage {
                    role,
                    text,
                    is_fallback,
                } => self.append(role, text, is_fallback),
                Effect::SetProcessing(flag) => {
                    self.processing_tx.send_replace(flag);
                }
                other => deferred.push(other),
            }
        }

        if is_reply {
            self.completed_tx.send_modify(|done| *done += 1);
            let _ = self.updates_tx.send(TurnUpdate::TurnCompleted {
                queued: state.queued_len(),
            });
        }

        Ok(deferred)
    }

    fn append(&self, role: Role, text: String, is_fallback: bool) {
        if self.session.is_cancelled() {
            tracing::debug!(role = role.as_str(), "Session disposed, not appending");
            return;
        }

        let message = {
            let mut log = self.log.write().unwrap_or_else(PoisonError::into_inner);
            log.append(role, text, is_fallback).clone()
        };

        tracing::info!(
            role = role.as_str(),
            sequence = message.sequence,
            is_fallback = message.is_fallback,
            "Message appended"
        );
        let _ = self.updates_tx.send(TurnUpdate::Message(message));
    }

    pub(super) fn messages(&self) -> Vec<Message> {
        self.log
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .messages()
            .to_vec()
    }

    pub(super) fn state_name(&self) -> &'static str {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .display_name()
    }
}
