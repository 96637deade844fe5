//! Mock implementations for testing
//!
//! These mocks enable testing the controller and bootstrapper without real I/O.

use super::traits::*;
use crate::assistant::AssistantReply;
use crate::bootstrap::{DatastoreConnector, Established};
use crate::resilience::CallError;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

// ============================================================================
// Mock Assistant Client
// ============================================================================

/// Assistant that returns queued results, optionally after a delay
#[allow(dead_code)]
pub struct MockAssistantClient {
    responses: Mutex<VecDeque<Result<AssistantReply, CallError>>>,
    delay: Option<Duration>,
    /// Record of every message asked
    pub calls: Mutex<Vec<String>>,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

#[allow(dead_code)]
impl MockAssistantClient {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            delay: None,
            calls: Mutex::new(Vec::new()),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
        }
    }

    /// Every call sleeps this long before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn queue_reply(&self, text: &str) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Ok(AssistantReply::real(text)));
    }

    pub fn queue_error(&self, error: CallError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Highest number of calls observed in flight at once
    pub fn max_concurrent(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AssistantClient for MockAssistantClient {
    async fn ask(&self, message: &str) -> Result<AssistantReply, CallError> {
        self.calls.lock().unwrap().push(message.to_string());
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(active, Ordering::SeqCst);

        let response = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(CallError::remote("No mock response queued")));

        if let Some(delay) = self.delay {
            let guard = ActiveGuard(&self.active);
            tokio::time::sleep(delay).await;
            drop(guard);
        } else {
            self.active.fetch_sub(1, Ordering::SeqCst);
        }

        response
    }
}

/// Decrements the in-flight count even when the call is cancelled mid-sleep
struct ActiveGuard<'a>(&'a AtomicUsize);

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

// ============================================================================
// Recording Playback
// ============================================================================

/// Playback that records what it was asked to say
#[derive(Default)]
pub struct RecordingPlayback {
    spoken: Mutex<Vec<String>>,
}

impl RecordingPlayback {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap().clone()
    }
}

impl SpeechPlayback for RecordingPlayback {
    fn speak(&self, text: &str) {
        self.spoken.lock().unwrap().push(text.to_string());
    }
}

// ============================================================================
// Scripted Capture
// ============================================================================

/// Capture that replays fixed listening sessions; blank ones carry no speech
#[allow(dead_code)]
pub struct ScriptedCapture {
    sessions: VecDeque<String>,
    listening: bool,
    pub starts: u32,
    pub stops: u32,
}

#[allow(dead_code)]
impl ScriptedCapture {
    pub fn new(sessions: &[&str]) -> Self {
        Self {
            sessions: sessions.iter().map(|s| (*s).to_string()).collect(),
            listening: false,
            starts: 0,
            stops: 0,
        }
    }
}

#[async_trait]
impl SpeechCapture for ScriptedCapture {
    fn start(&mut self) {
        self.listening = true;
        self.starts += 1;
    }

    fn stop(&mut self) {
        self.listening = false;
        self.stops += 1;
    }

    async fn next_transcript(&mut self) -> Option<String> {
        while self.listening {
            let session = self.sessions.pop_front()?;
            if !session.trim().is_empty() {
                return Some(session);
            }
        }
        None
    }
}

// ============================================================================
// Flaky Connector
// ============================================================================

/// Datastore connector that fails a set number of times before succeeding
#[allow(dead_code)]
pub struct FlakyConnector {
    /// `None` fails forever
    failures_before_success: Option<u32>,
    delay: Option<Duration>,
    attempts: Mutex<Vec<tokio::time::Instant>>,
    disconnects: AtomicU32,
}

#[allow(dead_code)]
impl FlakyConnector {
    pub fn succeed_after(failures: u32) -> Self {
        Self {
            failures_before_success: Some(failures),
            delay: None,
            attempts: Mutex::new(Vec::new()),
            disconnects: AtomicU32::new(0),
        }
    }

    pub fn always_fail() -> Self {
        Self {
            failures_before_success: None,
            ..Self::succeed_after(0)
        }
    }

    /// Every attempt takes this long before resolving
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn attempt_count(&self) -> usize {
        self.attempts.lock().unwrap().len()
    }

    pub fn attempt_times(&self) -> Vec<tokio::time::Instant> {
        self.attempts.lock().unwrap().clone()
    }

    pub fn disconnect_count(&self) -> u32 {
        self.disconnects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DatastoreConnector for FlakyConnector {
    type Handle = String;

    async fn connect(&self, target: &str) -> Result<Established<String>, CallError> {
        let attempt = {
            let mut attempts = self.attempts.lock().unwrap();
            attempts.push(tokio::time::Instant::now());
            attempts.len()
        };

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match self.failures_before_success {
            Some(failures) if attempt > failures as usize => Ok(Established {
                handle: format!("handle-{attempt}"),
                host: target.to_string(),
            }),
            _ => Err(CallError::remote(format!("connection refused (attempt {attempt})"))),
        }
    }

    async fn disconnect(&self, _handle: String) {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
    }
}
