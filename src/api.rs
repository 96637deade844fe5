//! HTTP API for the voice assistant
//!
//! Health check, the AI chat endpoint, and the exchange history.

mod handlers;
mod types;

pub use handlers::{create_router, AppError, DEFAULT_HISTORY_LIMIT, MAX_HISTORY_LIMIT};
pub use types::*;

use crate::assistant::AssistantService;
use crate::bootstrap::ConnectionBootstrapper;
use crate::db::SqliteConnector;
use std::sync::Arc;

pub type Datastore = ConnectionBootstrapper<SqliteConnector>;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub assistant: Arc<AssistantService>,
    pub datastore: Arc<Datastore>,
}

impl AppState {
    pub fn new(assistant: AssistantService, datastore: Datastore) -> Self {
        Self {
            assistant: Arc::new(assistant),
            datastore: Arc::new(datastore),
        }
    }
}
