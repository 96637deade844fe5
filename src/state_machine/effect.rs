//! Effects produced by state transitions

use crate::conversation::Role;

/// Effects to be executed after state transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Append a message to the conversation log
    AppendMessage {
        role: Role,
        text: String,
        is_fallback: bool,
    },

    /// Publish the externally observable `processing` flag
    SetProcessing(bool),

    /// Send the transcript to the assistant through the resilient caller
    Dispatch { transcript: String },

    /// Hand text to speech playback
    Speak { text: String },

    /// Abandon the in-flight call, if any
    CancelInFlight,
}

impl Effect {
    pub fn user_message(text: impl Into<String>) -> Self {
        Effect::AppendMessage {
            role: Role::User,
            text: text.into(),
            is_fallback: false,
        }
    }

    pub fn assistant_message(text: impl Into<String>, is_fallback: bool) -> Self {
        Effect::AppendMessage {
            role: Role::Assistant,
            text: text.into(),
            is_fallback,
        }
    }

    pub fn speak(text: impl Into<String>) -> Self {
        Effect::Speak { text: text.into() }
    }

    pub fn dispatch(transcript: impl Into<String>) -> Self {
        Effect::Dispatch {
            transcript: transcript.into(),
        }
    }
}
