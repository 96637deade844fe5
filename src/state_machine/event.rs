//! Events that drive the turn controller

use crate::assistant::AssistantReply;
use crate::resilience::CallOutcome;

/// Events that trigger state transitions
#[derive(Debug, Clone)]
pub enum Event {
    /// A finalized transcript from speech capture
    Transcript { text: String },

    /// The resilient call for the in-flight transcript finished
    Reply { outcome: CallOutcome<AssistantReply> },

    /// End of session
    Dispose,
}
