//! Terminal front end for the conversation controller
//!
//! Each line typed on stdin is one listening session. Replies are printed
//! under the assistant's name and, when `TTS_COMMAND` is set, spoken aloud.

use std::sync::Arc;
use tokio::io::BufReader;
use voice_assistant::assistant::{AssistantService, DirectAssistantClient, HttpAssistantClient};
use voice_assistant::config::Config;
use voice_assistant::llm::{GeminiService, LlmService, LoggingService};
use voice_assistant::runtime::{AssistantClient, ControllerConfig, ConversationController};
use voice_assistant::speech::{pump_transcripts, CommandPlayback, ConsolePlayback, LineCapture};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // stdout carries the conversation, so logs go to stderr
    tracing_subscriber::fmt()
        .compact()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "voice_assistant=warn".into()),
        )
        .init();

    let config = Config::from_env();
    let assistant = build_client(&config)?;

    let mut playback = ConsolePlayback::new(&config.assistant_name);
    if let Some(command) = &config.tts_command {
        match CommandPlayback::from_command_line(command) {
            Ok(voice) => playback = playback.with_voice(voice),
            Err(e) => tracing::warn!(error = %e, "Ignoring TTS_COMMAND"),
        }
    }

    let controller = ConversationController::spawn(
        assistant,
        playback,
        &ControllerConfig::from_config(&config),
    );

    eprintln!(
        "{} is listening. Type a message and press Enter (Ctrl-D to quit).",
        config.assistant_name
    );

    let mut capture = LineCapture::new(BufReader::new(tokio::io::stdin()));
    let heard = pump_transcripts(&mut capture, &controller).await;
    controller.drain().await;
    controller.dispose();

    tracing::info!(transcripts = heard, "Session ended");
    Ok(())
}

/// Remote server when `ASSISTANT_URL` is set, otherwise Gemini in-process.
/// Without a key every turn is served from the fallback set.
fn build_client(config: &Config) -> Result<Arc<dyn AssistantClient>, Box<dyn std::error::Error>> {
    if let Some(url) = &config.assistant_url {
        let client = HttpAssistantClient::new(url)?;
        tracing::info!(endpoint = client.endpoint(), "Using remote assistant");
        return Ok(Arc::new(client));
    }

    match &config.gemini_api_key {
        Some(key) => {
            let gemini = GeminiService::new(key, &config.gemini_model, config.ai_timeout)?;
            let llm: Arc<dyn LlmService> = Arc::new(LoggingService::new(Arc::new(gemini)));
            Ok(Arc::new(DirectAssistantClient::new(llm, &config.assistant_name)))
        }
        None => {
            tracing::warn!("No ASSISTANT_URL or GEMINI_API_KEY, replies come from the fallback set");
            Ok(Arc::new(AssistantService::offline(config)))
        }
    }
}
