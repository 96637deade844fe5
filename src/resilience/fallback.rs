//! Placeholder replies used when the AI service cannot answer

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{RngCore, SeedableRng};
use std::sync::Mutex;

/// In-character replies served while the AI backend is unreachable
pub const DEFAULT_FALLBACK_REPLIES: &[&str] = &[
    "I am currently unable to access the neural net, Sir, but all systems are nominal.",
    "My connection to the cloud is restricted. I am operating in offline mode.",
    "I heard you, but I cannot process that request right now due to server limits.",
    "Greetings. I am here, though my cognitive functions are temporarily limited.",
    "Access denied at the moment. Please try again later, Sir.",
];

/// A fixed set of fallback lines with an injectable random source.
///
/// Selection is uniform over the set. Tests pin the choice by passing a
/// seeded `StdRng` to [`FallbackReplies::with_rng`].
pub struct FallbackReplies {
    replies: Vec<String>,
    rng: Mutex<Box<dyn RngCore + Send>>,
}

impl FallbackReplies {
    pub fn new(replies: Vec<String>) -> Self {
        Self::with_rng(replies, StdRng::from_entropy())
    }

    pub fn with_rng(replies: Vec<String>, rng: impl RngCore + Send + 'static) -> Self {
        let replies = if replies.is_empty() {
            default_replies()
        } else {
            replies
        };
        Self {
            replies,
            rng: Mutex::new(Box::new(rng)),
        }
    }

    /// The assistant's default set
    pub fn assistant_defaults() -> Self {
        Self::new(default_replies())
    }

    /// Pick one reply uniformly at random
    pub fn pick(&self) -> String {
        // A poisoned lock only means another picker panicked mid-choice;
        // the rng state is still usable.
        let mut rng = self
            .rng
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        self.replies
            .choose(&mut **rng)
            .cloned()
            .unwrap_or_else(|| DEFAULT_FALLBACK_REPLIES[0].to_string())
    }

    pub fn replies(&self) -> &[String] {
        &self.replies
    }

    pub fn contains(&self, text: &str) -> bool {
        self.replies.iter().any(|r| r == text)
    }
}

impl std::fmt::Debug for FallbackReplies {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FallbackReplies")
            .field("replies", &self.replies.len())
            .finish_non_exhaustive()
    }
}

fn default_replies() -> Vec<String> {
    DEFAULT_FALLBACK_REPLIES
        .iter()
        .map(|s| (*s).to_string())
        .collect()
}
