//! In-memory conversation log

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who produced a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// A single entry in the log. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub sequence: u64,
    pub role: Role,
    pub text: String,
    /// Assistant text came from the fallback set rather than the AI service
    #[serde(default)]
    pub is_fallback: bool,
    pub created_at: DateTime<Utc>,
}

/// Append-only, ordered log for one session
#[derive(Debug, Default, Clone)]
pub struct ConversationLog {
    messages: Vec<Message>,
}

impl ConversationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, role: Role, text: impl Into<String>, is_fallback: bool) -> &Message {
        let sequence = self.messages.len() as u64 + 1;
        self.messages.push(Message {
            id: uuid::Uuid::new_v4().to_string(),
            sequence,
            role,
            text: text.into(),
            is_fallback,
            created_at: Utc::now(),
        });
        &self.messages[self.messages.len() - 1]
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }
}
