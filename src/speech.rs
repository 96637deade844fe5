//! Speech capture and playback adapters for terminal use
//!
//! Capture reads one listening session per input line; playback prints the
//! reply and can hand it to a system text-to-speech command.

use crate::runtime::{ConversationController, SpeechCapture, SpeechPlayback};
use async_trait::async_trait;
use std::process::Stdio;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

#[derive(Error, Debug)]
pub enum SpeechError {
    #[error("TTS command is empty")]
    EmptyCommand,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Capture that treats each line of a reader as one listening session
pub struct LineCapture<R> {
    reader: R,
    listening: bool,
}

impl<R> LineCapture<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            listening: false,
        }
    }

    async fn read_session(&mut self) -> Result<Option<String>, SpeechError> {
        let mut line = String::new();
        if self.reader.read_line(&mut line).await? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }
}

#[async_trait]
impl<R> SpeechCapture for LineCapture<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    fn start(&mut self) {
        self.listening = true;
    }

    fn stop(&mut self) {
        self.listening = false;
    }

    async fn next_transcript(&mut self) -> Option<String> {
        while self.listening {
            match self.read_session().await {
                Ok(Some(text)) if text.is_empty() => {
                    tracing::debug!("No speech detected");
                }
                Ok(Some(text)) => return Some(text),
                Ok(None) => return None,
                Err(e) => {
                    tracing::warn!(error = %e, "Speech capture failed");
                    return None;
                }
            }
        }
        None
    }
}

/// Prints replies as `<name>: <text>`, optionally speaking them too
pub struct ConsolePlayback {
    name: String,
    voice: Option<CommandPlayback>,
}

impl ConsolePlayback {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            voice: None,
        }
    }

    #[must_use]
    pub fn with_voice(mut self, voice: CommandPlayback) -> Self {
        self.voice = Some(voice);
        self
    }
}

impl SpeechPlayback for ConsolePlayback {
    fn speak(&self, text: &str) {
        println!("{}: {text}", self.name);
        if let Some(voice) = &self.voice {
            voice.speak(text);
        }
    }
}

/// Runs a TTS program (e.g. `espeak`, `say`) with the text as its last argument
#[derive(Debug, Clone)]
pub struct CommandPlayback {
    program: String,
    args: Vec<String>,
}

impl CommandPlayback {
    /// Parse a whitespace-separated command line such as `espeak -s 150`
    pub fn from_command_line(command: &str) -> Result<Self, SpeechError> {
        let mut parts = command.split_whitespace().map(str::to_string);
        let program = parts.next().ok_or(SpeechError::EmptyCommand)?;
        Ok(Self {
            program,
            args: parts.collect(),
        })
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    fn spawn(&self, text: &str) -> Result<(), SpeechError> {
        tokio::process::Command::new(&self.program)
            .args(&self.args)
            .arg(text)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;
        Ok(())
    }
}

impl SpeechPlayback for CommandPlayback {
    fn speak(&self, text: &str) {
        if let Err(e) = self.spawn(text) {
            tracing::warn!(program = %self.program, error = %e, "TTS command failed to start");
        }
    }
}

/// Forward every finalized transcript to the controller until capture ends.
/// Returns the number of transcripts forwarded.
pub async fn pump_transcripts<C>(capture: &mut C, controller: &ConversationController) -> usize
where
    C: SpeechCapture + ?Sized,
{
    capture.start();
    let mut forwarded = 0;
    while let Some(transcript) = capture.next_transcript().await {
        controller.handle_transcript(transcript);
        forwarded += 1;
    }
    capture.stop();
    forwarded
}
