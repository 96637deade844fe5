//! Datastore connection bootstrapper
//!
//! Establishes the datastore connection once at startup, retrying through
//! [`ResilientCaller`], without ever surfacing an error to its caller. The
//! resulting readiness flag is read by the health check and the history
//! endpoint.

use crate::resilience::{CallError, CallOptions, CallOutcome, ResilientCaller};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::{watch, Mutex};

pub const DEFAULT_CONNECT_RETRIES: u32 = 3;
pub const CONNECT_ATTEMPT_TIMEOUT: Duration = Duration::from_millis(5000);
pub const CONNECT_RETRY_DELAY: Duration = Duration::from_millis(2000);

/// Connection lifecycle. Moves forward only; `teardown` is the way back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting { attempts_remaining: u32 },
    Connected,
    GivenUp,
}

/// A live connection and the host it reached
#[derive(Debug, Clone)]
pub struct Established<H> {
    pub handle: H,
    pub host: String,
}

/// Opens and closes connections to a concrete datastore
#[async_trait]
pub trait DatastoreConnector: Send + Sync {
    type Handle: Clone + Send + Sync + 'static;

    async fn connect(&self, target: &str) -> Result<Established<Self::Handle>, CallError>;

    async fn disconnect(&self, handle: Self::Handle);
}

pub struct ConnectionBootstrapper<C: DatastoreConnector> {
    target: Option<String>,
    connector: C,
    caller: ResilientCaller,
    state_tx: watch::Sender<ConnectionState>,
    handle: RwLock<Option<C::Handle>>,
    /// Serializes `connect` and `teardown`
    lifecycle: Mutex<()>,
}

impl<C: DatastoreConnector> ConnectionBootstrapper<C> {
    /// `target` of `None` means no datastore is configured
    pub fn new(target: Option<String>, connector: C) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            target,
            connector,
            caller: ResilientCaller::new("datastore"),
            state_tx,
            handle: RwLock::new(None),
            lifecycle: Mutex::new(()),
        }
    }

    /// Attempt the connection, retrying up to `max_retries` times.
    ///
    /// Returns whether the datastore is connected afterwards. Never errors.
    pub async fn connect(&self, max_retries: u32) -> bool {
        let Some(target) = self.target.as_deref() else {
            tracing::warn!("No datastore URL configured, skipping connection");
            return false;
        };

        let _guard = self.lifecycle.lock().await;
        if self.is_ready() {
            return true;
        }

        let options = CallOptions::new(CONNECT_ATTEMPT_TIMEOUT)
            .with_retries(max_retries, CONNECT_RETRY_DELAY);
        let connector = &self.connector;
        let state_tx = &self.state_tx;
        let mut attempts_remaining = max_retries;

        let outcome = self
            .caller
            .invoke(
                move || {
                    state_tx.send_replace(ConnectionState::Connecting { attempts_remaining });
                    attempts_remaining = attempts_remaining.saturating_sub(1);
                    connector.connect(target)
                },
                &options,
            )
            .await;

        match outcome {
            CallOutcome::Success { payload, .. } => {
                tracing::info!(host = %payload.host, "Datastore connected");
                *self.handle.write().unwrap_or_else(PoisonError::into_inner) = Some(payload.handle);
                self.state_tx.send_replace(ConnectionState::Connected);
                true
            }
            CallOutcome::Failure { reason, message } => {
                tracing::warn!(
                    %reason,
                    error = %message,
                    attempts = max_retries + 1,
                    "Datastore connection failed, giving up"
                );
                self.state_tx.send_replace(ConnectionState::GivenUp);
                false
            }
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(*self.state_tx.borrow(), ConnectionState::Connected)
    }

    pub fn state(&self) -> ConnectionState {
        self.state_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// The established handle, when connected
    pub fn handle(&self) -> Option<C::Handle> {
        self.handle
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Close the connection (if any) and return to `Disconnected`
    pub async fn teardown(&self) {
        let _guard = self.lifecycle.lock().await;
        let handle = self
            .handle
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(handle) = handle {
            self.connector.disconnect(handle).await;
            tracing::info!("Datastore disconnected");
        }
        self.state_tx.send_replace(ConnectionState::Disconnected);
    }
}
