//! Failure taxonomy for resilient calls

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Why a remote operation did not produce a payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// The operation exceeded its time budget
    Timeout,
    /// The operation completed but signalled failure
    RemoteError,
    /// The remote side rejected the call for rate limiting (429)
    RateLimited,
}

impl FailureReason {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureReason::Timeout => "timeout",
            FailureReason::RemoteError => "remote_error",
            FailureReason::RateLimited => "rate_limited",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned by a single attempt of a remote operation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}: {message}")]
pub struct CallError {
    pub reason: FailureReason,
    pub message: String,
}

impl CallError {
    pub fn new(reason: FailureReason, message: impl Into<String>) -> Self {
        Self {
            reason,
            message: message.into(),
        }
    }

    pub fn timeout(budget: Duration) -> Self {
        Self::new(
            FailureReason::Timeout,
            format!("no response within {}ms", budget.as_millis()),
        )
    }

    pub fn remote(message: impl Into<String>) -> Self {
        Self::new(FailureReason::RemoteError, message)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(FailureReason::RateLimited, message)
    }
}
