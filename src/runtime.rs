//! Runtime for the conversation turn controller
//!
//! [`ConversationController`] is the handle callers hold. Transcripts run
//! through the state machine on the caller's side (see `shared`), so the log
//! and `processing` flag update before `handle_transcript` returns. Dispatch
//! and playback run on a dedicated tokio task (see `executor`), which is
//! stopped when the controller is disposed or dropped.

mod executor;
mod shared;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub use traits::*;

use crate::assistant::AssistantReply;
use crate::conversation::Message;
use crate::resilience::{CallOptions, FallbackReplies};
use crate::state_machine::{Event, TransitionError};
use executor::{Command, ExecutorChannels, TurnExecutor};
use shared::SharedTurn;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;

/// Default per-call budget for the AI round trip
pub const DEFAULT_TURN_TIMEOUT: Duration = Duration::from_secs(30);

const UPDATE_CHANNEL_CAPACITY: usize = 64;

/// Resilient-call policy applied to every turn
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub timeout: Duration,
    pub max_retries: u32,
    pub retry_delay: Duration,
    /// `None` turns a failed call into the apologetic error message
    pub fallback: Option<Arc<FallbackReplies>>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TURN_TIMEOUT,
            max_retries: 0,
            retry_delay: Duration::from_secs(1),
            fallback: Some(Arc::new(FallbackReplies::assistant_defaults())),
        }
    }
}

impl ControllerConfig {
    pub fn from_config(config: &crate::config::Config) -> Self {
        Self {
            timeout: config.ai_timeout,
            max_retries: config.ai_max_retries,
            retry_delay: config.ai_retry_delay,
            fallback: config
                .ai_fallback
                .then(|| Arc::new(FallbackReplies::assistant_defaults())),
        }
    }

    pub fn call_options(&self) -> CallOptions<AssistantReply> {
        let options = CallOptions::new(self.timeout).with_retries(self.max_retries, self.retry_delay);
        match &self.fallback {
            Some(replies) => {
                let replies = Arc::clone(replies);
                options.with_fallback(move || AssistantReply::fallback(replies.pick()))
            }
            None => options,
        }
    }
}

/// Notifications published while turns progress
#[derive(Debug, Clone)]
pub enum TurnUpdate {
    /// A message was appended to the log
    Message(Message),
    /// A turn finished; `queued` transcripts are still waiting
    TurnCompleted { queued: usize },
}

/// Handle to a running conversation session
pub struct ConversationController {
    command_tx: mpsc::UnboundedSender<Command>,
    shared: Arc<SharedTurn>,
    processing_rx: watch::Receiver<bool>,
    completed_rx: watch::Receiver<u64>,
    updates_tx: broadcast::Sender<TurnUpdate>,
    submitted: AtomicU64,
    session: CancellationToken,
}

impl ConversationController {
    /// Start a session on the current tokio runtime
    pub fn spawn<A, P>(assistant: A, playback: P, config: &ControllerConfig) -> Self
    where
        A: AssistantClient + 'static,
        P: SpeechPlayback + 'static,
    {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (processing_tx, processing_rx) = watch::channel(false);
        let (completed_tx, completed_rx) = watch::channel(0);
        let (updates_tx, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        let session = CancellationToken::new();
        let shared = Arc::new(SharedTurn::new(
            processing_tx,
            completed_tx,
            updates_tx.clone(),
            session.clone(),
        ));

        let executor = TurnExecutor::new(
            assistant,
            playback,
            config.call_options(),
            ExecutorChannels {
                shared: Arc::clone(&shared),
                command_rx,
                command_tx: command_tx.clone(),
                session: session.clone(),
            },
        );
        tokio::spawn(executor.run());

        Self {
            command_tx,
            shared,
            processing_rx,
            completed_rx,
            updates_tx,
            submitted: AtomicU64::new(0),
            session,
        }
    }

    /// Submit a finalized transcript. Fire-and-forget; blank input is ignored.
    ///
    /// When no turn is in flight the user message is in the log and
    /// `processing` is set by the time this returns. A transcript arriving
    /// mid-turn is queued and logged when its own turn starts.
    pub fn handle_transcript(&self, transcript: impl Into<String>) {
        let text = transcript.into();
        if text.trim().is_empty() {
            tracing::debug!("Ignoring empty transcript");
            return;
        }
        if self.session.is_cancelled() {
            tracing::debug!("Ignoring transcript after disposal");
            return;
        }

        let deferred = match self.shared.apply(Event::Transcript { text }) {
            Ok(deferred) => deferred,
            Err(TransitionError::Disposed) => {
                tracing::debug!("Ignoring transcript after disposal");
                return;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Transcript rejected");
                return;
            }
        };

        self.submitted.fetch_add(1, Ordering::SeqCst);
        for effect in deferred {
            if self.command_tx.send(Command::Run(effect)).is_err() {
                tracing::warn!("Turn controller is not running");
                return;
            }
        }
    }

    pub fn is_processing(&self) -> bool {
        *self.processing_rx.borrow()
    }

    /// Watch the `processing` flag
    pub fn processing(&self) -> watch::Receiver<bool> {
        self.processing_rx.clone()
    }

    /// Snapshot of the log in display order
    pub fn messages(&self) -> Vec<Message> {
        self.shared.messages()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TurnUpdate> {
        self.updates_tx.subscribe()
    }

    /// Wait until every transcript accepted so far has completed its turn.
    /// Returns early if the session is disposed.
    pub async fn drain(&self) {
        let target = self.submitted.load(Ordering::SeqCst);
        let mut completed = self.completed_rx.clone();

        tokio::select! {
            reached = async { completed.wait_for(|done| *done >= target).await.is_ok() } => {
                if !reached {
                    tracing::debug!("Controller stopped before draining");
                }
            }
            () = self.session.cancelled() => {}
        }
    }

    /// End the session: cancels the in-flight call and freezes the log
    pub fn dispose(&self) {
        if !self.session.is_cancelled() {
            tracing::debug!("Disposing turn controller");
            self.session.cancel();
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.session.is_cancelled()
    }
}

impl Drop for ConversationController {
    fn drop(&mut self) {
        self.session.cancel();
    }
}
