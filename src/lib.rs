//! Voice assistant backend and conversation runtime
//!
//! The server binary exposes the AI chat endpoint with timeout, retry and
//! fallback handling and journals exchanges to SQLite once the datastore
//! bootstrapper has connected. The console binary drives a spoken-style
//! conversation loop over stdin with the same turn controller a UI would use.

// Library-surface pedantic lints; the binaries are the only consumers
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]

pub mod api;
pub mod assistant;
pub mod bootstrap;
pub mod config;
pub mod conversation;
pub mod db;
pub mod llm;
pub mod resilience;
pub mod runtime;
pub mod speech;
pub mod state_machine;
