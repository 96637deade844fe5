//! Turn state types

use serde::Serialize;
use std::collections::VecDeque;

/// Where the controller is in its turn cycle
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnState {
    /// Waiting for a transcript
    #[default]
    Idle,

    /// One AI call in flight; later transcripts wait their turn
    Processing {
        in_flight: String,
        queued: VecDeque<String>,
    },

    /// Session over; every event is rejected
    Disposed,
}

impl TurnState {
    pub fn is_processing(&self) -> bool {
        matches!(self, TurnState::Processing { .. })
    }

    pub fn is_disposed(&self) -> bool {
        matches!(self, TurnState::Disposed)
    }

    /// Transcripts waiting behind the in-flight one
    pub fn queued_len(&self) -> usize {
        match self {
            TurnState::Processing { queued, .. } => queued.len(),
            TurnState::Idle | TurnState::Disposed => 0,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            TurnState::Idle => "idle",
            TurnState::Processing { .. } => "processing",
            TurnState::Disposed => "disposed",
        }
    }
}
