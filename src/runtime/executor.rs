//! Turn controller executor
//!
//! Carries out the effects that need the async runtime: dispatching to the
//! assistant, playback, and cancelling the in-flight call. Replies from
//! dispatch tasks come back through the same command channel and are run
//! through the shared transition.

use super::shared::SharedTurn;
use super::traits::{AssistantClient, SpeechPlayback};

use crate::assistant::AssistantReply;
use crate::resilience::{CallOptions, CallOutcome, ResilientCaller};
use crate::state_machine::{Effect, Event, TransitionError};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Work queued for the executor task
#[derive(Debug)]
pub(super) enum Command {
    /// An effect produced by a transition on the controller side
    Run(Effect),
    /// A dispatch finished
    Replied(CallOutcome<AssistantReply>),
}

/// Channels shared between the executor and its controller handle
pub(super) struct ExecutorChannels {
    pub shared: Arc<SharedTurn>,
    pub command_rx: mpsc::UnboundedReceiver<Command>,
    pub command_tx: mpsc::UnboundedSender<Command>,
    pub session: CancellationToken,
}

pub(super) struct TurnExecutor<A, P>
where
    A: AssistantClient + 'static,
    P: SpeechPlayback + 'static,
{
    shared: Arc<SharedTurn>,
    assistant: Arc<A>,
    playback: P,
    caller: ResilientCaller,
    options: CallOptions<AssistantReply>,
    command_rx: mpsc::UnboundedReceiver<Command>,
    command_tx: mpsc::UnboundedSender<Command>,
    session: CancellationToken,
    /// Token for the dispatch currently in flight
    in_flight: Option<CancellationToken>,
}

impl<A, P> TurnExecutor<A, P>
where
    A: AssistantClient + 'static,
    P: SpeechPlayback + 'static,
{
    pub(super) fn new(
        assistant: A,
        playback: P,
        options: CallOptions<AssistantReply>,
        channels: ExecutorChannels,
    ) -> Self {
        Self {
            shared: channels.shared,
            assistant: Arc::new(assistant),
            playback,
            caller: ResilientCaller::new("assistant"),
            options,
            command_rx: channels.command_rx,
            command_tx: channels.command_tx,
            session: channels.session,
            in_flight: None,
        }
    }

    pub(super) async fn run(mut self) {
        tracing::debug!("Starting turn controller");

        loop {
            tokio::select! {
                biased;
                () = self.session.cancelled() => {
                    self.process_event(Event::Dispose);
                    break;
                }
                Some(command) = self.command_rx.recv() => match command {
                    Command::Run(effect) => self.execute_effect(effect),
                    Command::Replied(outcome) => self.process_event(Event::Reply { outcome }),
                },
                else => break,
            }
        }

        tracing::debug!("Turn controller stopped");
    }

    fn process_event(&mut self, event: Event) {
        match self.shared.apply(event) {
            Ok(deferred) => {
                for effect in deferred {
                    self.execute_effect(effect);
                }
            }
            Err(TransitionError::Disposed) => {
                tracing::debug!("Discarding event after disposal");
            }
            Err(e) => {
                tracing::warn!(error = %e, state = self.shared.state_name(), "Rejected event");
            }
        }
    }

    fn execute_effect(&mut self, effect: Effect) {
        match effect {
            Effect::Dispatch { transcript } => self.dispatch(transcript),

            Effect::Speak { text } => {
                if self.session.is_cancelled() {
                    return;
                }
                self.playback.speak(&text);
            }

            Effect::CancelInFlight => {
                if let Some(token) = self.in_flight.take() {
                    token.cancel();
                }
            }

            // Applied by `SharedTurn::apply` before anything reaches the executor
            Effect::AppendMessage { .. } | Effect::SetProcessing(_) => {
                tracing::debug!("Ignoring state-local effect");
            }
        }
    }

    fn dispatch(&mut self, transcript: String) {
        let token = self.session.child_token();
        self.in_flight = Some(token.clone());
        tracing::debug!(
            chars = transcript.len(),
            budget_ms = %self.options.budget().as_millis(),
            "Dispatching transcript"
        );

        let assistant = Arc::clone(&self.assistant);
        let caller = self.caller.clone();
        let options = self.options.clone();
        let command_tx = self.command_tx.clone();

        tokio::spawn(async move {
            let outcome = caller
                .invoke_with_cancel(
                    || {
                        let assistant = Arc::clone(&assistant);
                        let transcript = transcript.clone();
                        async move { assistant.ask(&transcript).await }
                    },
                    &options,
                    &token,
                )
                .await;

            match outcome {
                Some(outcome) => {
                    let _ = command_tx.send(Command::Replied(outcome));
                }
                None => tracing::debug!("Dispatch cancelled"),
            }
        });
    }
}
