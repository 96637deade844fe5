//! Process configuration from environment variables
//!
//! Values may come from a `.env` file (loaded by the binaries through
//! `dotenvy`). A value starting with `your_` is a template placeholder and
//! counts as not configured.

use crate::llm::DEFAULT_GEMINI_MODEL;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_CLIENT_URL: &str = "http://localhost:5173";
pub const DEFAULT_ASSISTANT_NAME: &str = "Jarvis";
pub const DEFAULT_AI_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_AI_RETRY_DELAY_MS: u64 = 1_000;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub db_url: Option<String>,
    pub client_url: String,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub ai_timeout: Duration,
    pub ai_max_retries: u32,
    pub ai_retry_delay: Duration,
    pub ai_fallback: bool,
    pub db_max_retries: u32,
    pub assistant_name: String,
    pub assistant_url: Option<String>,
    pub tts_command: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            db_url: None,
            client_url: DEFAULT_CLIENT_URL.to_string(),
            gemini_api_key: None,
            gemini_model: DEFAULT_GEMINI_MODEL.to_string(),
            ai_timeout: Duration::from_millis(DEFAULT_AI_TIMEOUT_MS),
            ai_max_retries: 0,
            ai_retry_delay: Duration::from_millis(DEFAULT_AI_RETRY_DELAY_MS),
            ai_fallback: true,
            db_max_retries: crate::bootstrap::DEFAULT_CONNECT_RETRIES,
            assistant_name: DEFAULT_ASSISTANT_NAME.to_string(),
            assistant_url: None,
            tts_command: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; unparseable numbers keep their defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let configured = |key: &str| lookup(key).and_then(|v| configured_value(&v));

        Self {
            port: parse_or(configured("PORT"), defaults.port),
            db_url: configured("DB_URL"),
            client_url: configured("CLIENT_URL").unwrap_or(defaults.client_url),
            gemini_api_key: configured("GEMINI_API_KEY"),
            gemini_model: configured("GEMINI_MODEL").unwrap_or(defaults.gemini_model),
            ai_timeout: configured("AI_TIMEOUT_MS")
                .and_then(|v| v.parse().ok())
                .map_or(defaults.ai_timeout, Duration::from_millis),
            ai_max_retries: parse_or(configured("AI_MAX_RETRIES"), defaults.ai_max_retries),
            ai_retry_delay: configured("AI_RETRY_DELAY_MS")
                .and_then(|v| v.parse().ok())
                .map_or(defaults.ai_retry_delay, Duration::from_millis),
            ai_fallback: configured("AI_FALLBACK")
                .and_then(|v| parse_flag(&v))
                .unwrap_or(defaults.ai_fallback),
            db_max_retries: parse_or(configured("DB_MAX_RETRIES"), defaults.db_max_retries),
            assistant_name: configured("ASSISTANT_NAME").unwrap_or(defaults.assistant_name),
            assistant_url: configured("ASSISTANT_URL"),
            tts_command: configured("TTS_COMMAND"),
        }
    }

    /// Log which services are configured, never their values
    pub fn log_summary(&self) {
        let status = |present: bool| if present { "configured" } else { "missing" };

        tracing::info!(
            port = self.port,
            database = status(self.db_url.is_some()),
            gemini = status(self.gemini_api_key.is_some()),
            model = %self.gemini_model,
            client_url = %self.client_url,
            ai_timeout_ms = %self.ai_timeout.as_millis(),
            ai_max_retries = self.ai_max_retries,
            ai_fallback = self.ai_fallback,
            "Configuration loaded"
        );

        if self.db_url.is_none() {
            tracing::warn!("DB_URL not set; running without a datastore");
        }
        if self.gemini_api_key.is_none() {
            tracing::warn!("GEMINI_API_KEY not set; every reply will come from the fallback set");
        }
    }
}

/// Trimmed value, or `None` when empty or a `your_...` placeholder
fn configured_value(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.starts_with("your_") {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn parse_or<T: std::str::FromStr>(value: Option<String>, default: T) -> T {
    value.and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
