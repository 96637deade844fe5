//! Property-based tests for the state machine
//!
//! These tests verify key invariants hold across all possible event sequences.

use super::transition::*;
use super::*;
use crate::assistant::AssistantReply;
use crate::conversation::Role;
use crate::resilience::{CallOutcome, FailureReason};
use proptest::prelude::*;

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_transcript_text() -> impl Strategy<Value = String> {
    prop_oneof![
        3 => "[a-zA-Z]{1,12}( [a-zA-Z]{1,12}){0,3}".prop_map(String::from),
        1 => "[ \t]{0,3}".prop_map(String::from),
    ]
}

fn arb_failure_reason() -> impl Strategy<Value = FailureReason> {
    prop_oneof![
        Just(FailureReason::Timeout),
        Just(FailureReason::RemoteError),
        Just(FailureReason::RateLimited),
    ]
}

fn arb_outcome() -> impl Strategy<Value = CallOutcome<AssistantReply>> {
    prop_oneof![
        "[a-zA-Z .]{1,30}".prop_map(|text| CallOutcome::success(AssistantReply::real(text))),
        "[a-zA-Z .]{1,30}".prop_map(|text| CallOutcome::fallback(AssistantReply::fallback(text))),
        (arb_failure_reason(), "[a-z ]{0,20}")
            .prop_map(|(reason, message)| CallOutcome::Failure { reason, message }),
    ]
}

fn arb_event() -> impl Strategy<Value = Event> {
    prop_oneof![
        4 => arb_transcript_text().prop_map(|text| Event::Transcript { text }),
        4 => arb_outcome().prop_map(|outcome| Event::Reply { outcome }),
        1 => Just(Event::Dispose),
    ]
}

/// Observable consequences of applying effects in order
#[derive(Debug, Default)]
struct Trace {
    roles: Vec<Role>,
    dispatched: Vec<String>,
    spoken: usize,
    processing: bool,
    replies_accepted: usize,
}

impl Trace {
    fn apply(&mut self, effects: &[Effect]) {
        for effect in effects {
            match effect {
                Effect::AppendMessage { role, .. } => self.roles.push(*role),
                Effect::SetProcessing(flag) => self.processing = *flag,
                Effect::Dispatch { transcript } => self.dispatched.push(transcript.clone()),
                Effect::Speak { .. } => self.spoken += 1,
                Effect::CancelInFlight => {}
            }
        }
    }

    fn assistant_count(&self) -> usize {
        self.roles.iter().filter(|r| **r == Role::Assistant).count()
    }

    fn user_count(&self) -> usize {
        self.roles.iter().filter(|r| **r == Role::User).count()
    }
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    // Every accepted reply yields exactly one assistant message and one playback
    #[test]
    fn prop_one_assistant_message_per_reply(events in proptest::collection::vec(arb_event(), 0..40)) {
        let mut state = TurnState::Idle;
        let mut trace = Trace::default();

        for event in events {
            let is_reply = matches!(event, Event::Reply { .. });
            if let Ok(result) = transition(&state, event) {
                if is_reply {
                    trace.replies_accepted += 1;
                }
                trace.apply(&result.effects);
                state = result.new_state;
            }
        }

        prop_assert_eq!(trace.assistant_count(), trace.replies_accepted);
        prop_assert_eq!(trace.spoken, trace.replies_accepted);
    }

    // The log alternates user/assistant, starting with a user message
    #[test]
    fn prop_log_alternates(events in proptest::collection::vec(arb_event(), 0..40)) {
        let mut state = TurnState::Idle;
        let mut trace = Trace::default();

        for event in events {
            if let Ok(result) = transition(&state, event) {
                trace.apply(&result.effects);
                state = result.new_state;
            }
        }

        for (i, role) in trace.roles.iter().enumerate() {
            let expected = if i % 2 == 0 { Role::User } else { Role::Assistant };
            prop_assert_eq!(*role, expected, "position {} in {:?}", i, trace.roles);
        }
    }

    // Every user message is dispatched exactly once, in submission order
    #[test]
    fn prop_dispatch_order_matches_submission(events in proptest::collection::vec(arb_event(), 0..40)) {
        let mut state = TurnState::Idle;
        let mut trace = Trace::default();
        let mut submitted = Vec::new();
        let mut dropped = 0;

        for event in events {
            let text = match &event {
                Event::Transcript { text } => Some(text.clone()),
                Event::Dispose => {
                    dropped += state.queued_len();
                    None
                }
                Event::Reply { .. } => None,
            };
            if let Ok(result) = transition(&state, event) {
                if let Some(text) = text {
                    submitted.push(text);
                }
                trace.apply(&result.effects);
                state = result.new_state;
            }
        }

        prop_assert_eq!(trace.dispatched.len(), trace.user_count());
        prop_assert!(submitted.starts_with(&trace.dispatched));
        prop_assert_eq!(submitted.len(), trace.dispatched.len() + state.queued_len() + dropped);
    }

    // The published processing flag always matches the state
    #[test]
    fn prop_processing_flag_tracks_state(events in proptest::collection::vec(arb_event(), 0..40)) {
        let mut state = TurnState::Idle;
        let mut trace = Trace::default();

        for event in events {
            if let Ok(result) = transition(&state, event) {
                trace.apply(&result.effects);
                state = result.new_state;
                prop_assert_eq!(trace.processing, state.is_processing());
            }
        }
    }

    // Blank transcripts never produce effects
    #[test]
    fn prop_blank_transcripts_are_inert(
        events in proptest::collection::vec(arb_event(), 0..20),
        blank in "[ \t\n]{0,4}",
    ) {
        let mut state = TurnState::Idle;
        for event in events {
            if let Ok(result) = transition(&state, event) {
                state = result.new_state;
            }
        }

        let result = transition(&state, Event::Transcript { text: blank });
        prop_assert!(result.is_err());
    }

    // Nothing happens after disposal
    #[test]
    fn prop_disposed_is_terminal(
        before in proptest::collection::vec(arb_event(), 0..20),
        after in proptest::collection::vec(arb_event(), 1..20),
    ) {
        let mut state = TurnState::Idle;
        for event in before {
            if let Ok(result) = transition(&state, event) {
                state = result.new_state;
            }
        }

        state = transition(&state, Event::Dispose).unwrap().new_state;
        prop_assert!(state.is_disposed());

        for event in after {
            match transition(&state, event) {
                Ok(result) => {
                    prop_assert!(result.effects.is_empty());
                    prop_assert!(result.new_state.is_disposed());
                }
                Err(e) => prop_assert_eq!(e, TransitionError::Disposed),
            }
        }
    }
}
