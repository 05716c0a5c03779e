//! Daemon - the main assistant loop
//!
//! Captures an utterance, routes it, prints and speaks the response, and
//! repeats until "exit", end of input, or Ctrl-C.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::cache::ResponseCache;
use crate::code_session::TerminalPrompter;
use crate::db::{self, MemoryRepo};
use crate::editor::DesktopEditor;
use crate::executor::{CommandExecutor, ShellRunner};
use crate::responder::{GenerativeResponder, OpenAiGenerator};
use crate::router::{Collaborators, Router};
use crate::voice::{
    AudioPlayback, Capture, ConsoleListener, ConsoleSpeaker, Listener, MicListener, Speaker,
    SpeechToText, TextToSpeech, VoiceSpeaker,
};
use crate::{Config, Result};

/// Utterance that ends the loop (case-insensitive, trimmed)
pub const EXIT_WORD: &str = "exit";

/// Pause before retrying an unavailable capture device
const DEVICE_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Open the response cache at the configured path
///
/// # Errors
///
/// Returns error if the database cannot be opened
pub fn open_cache(config: &Config) -> Result<ResponseCache> {
    let pool = db::init(&config.db_path)?;
    tracing::info!(path = %config.db_path.display(), "database initialized");
    Ok(ResponseCache::new(Arc::new(MemoryRepo::new(pool))))
}

/// Build a router over real collaborators
///
/// # Errors
///
/// Returns error if the API key is missing or the database cannot be opened
pub fn build_router(config: &Config, listener: Box<dyn Listener>) -> Result<Router> {
    let cache = open_cache(config)?;

    let generator = OpenAiGenerator::new(
        config.openai_key()?.to_string(),
        config.llm.model.clone(),
        config.llm.base_url.clone(),
    )?;
    let responder = GenerativeResponder::new(Arc::new(generator))
        .with_system_prompt(config.llm.system_prompt.clone())
        .with_max_tokens(config.llm.max_tokens)
        .with_timeout(config.llm.timeout);

    let executor = CommandExecutor::new(Arc::new(ShellRunner)).with_timeout(config.commands.timeout);
    let editor = DesktopEditor::new(
        CommandExecutor::new(Arc::new(ShellRunner)),
        config.editor.launch_command.clone(),
        config.editor.settle_delay,
    );

    let collaborators = Collaborators {
        listener,
        prompter: Box::new(TerminalPrompter),
        executor,
        responder,
        editor: Arc::new(editor),
    };

    Ok(Router::new(cache, collaborators, config.router_settings()))
}

/// The techbot assistant loop
pub struct Daemon {
    router: Router,
    speaker: Box<dyn Speaker>,
    cancel: CancellationToken,
}

impl Daemon {
    /// Create a daemon from configuration
    ///
    /// Voice input is used when voice is enabled and `text_input` is false;
    /// otherwise utterances are read from stdin.
    ///
    /// # Errors
    ///
    /// Returns error if initialization fails
    pub fn new(config: &Config, text_input: bool) -> Result<Self> {
        let listener: Box<dyn Listener> = if config.voice.enabled && !text_input {
            let stt = SpeechToText::new(
                config.openai_key()?.to_string(),
                config.voice.stt_model.clone(),
                config.llm.base_url.clone(),
            )?;
            Box::new(MicListener::new(stt, config.voice.energy_threshold))
        } else {
            Box::new(ConsoleListener::new())
        };

        let speaker: Box<dyn Speaker> = if config.voice.enabled {
            let tts = TextToSpeech::new(
                config.openai_key()?.to_string(),
                config.voice.tts_model.clone(),
                config.voice.tts_voice.clone(),
                config.voice.tts_speed,
                config.llm.base_url.clone(),
            )?;
            Box::new(VoiceSpeaker::new(tts, AudioPlayback::new()?))
        } else {
            tracing::info!("voice disabled - responses are printed only");
            Box::new(ConsoleSpeaker)
        };

        let cancel = CancellationToken::new();
        let router = build_router(config, listener)?.with_cancellation(cancel.clone());

        Ok(Self::from_parts(router, speaker, cancel))
    }

    /// Assemble a daemon from prebuilt parts
    #[must_use]
    pub fn from_parts(router: Router, speaker: Box<dyn Speaker>, cancel: CancellationToken) -> Self {
        Self {
            router,
            speaker,
            cancel,
        }
    }

    /// Token that stops the loop when cancelled
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run until "exit", end of input, or Ctrl-C
    ///
    /// Storage failures end the current turn only.
    ///
    /// # Errors
    ///
    /// Returns error if the loop cannot start
    #[allow(clippy::future_not_send)]
    pub async fn run(mut self) -> Result<()> {
        let shutdown = self.cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("shutdown requested");
                shutdown.cancel();
            }
        });

        tracing::info!("assistant running - say \"{EXIT_WORD}\" to quit");

        loop {
            let capture = tokio::select! {
                biased;
                () = self.cancel.cancelled() => break,
                capture = self.router.listen() => capture,
            };

            match capture {
                Capture::Utterance(text) => {
                    tracing::info!(utterance = %text, "heard");
                    if is_exit(&text) {
                        tracing::info!("exit requested");
                        break;
                    }
                    self.turn(&text).await;
                }
                Capture::NoSpeech => {
                    tracing::info!("no speech recognized");
                }
                Capture::ServiceError(e) => {
                    tracing::warn!(error = %e, "transcription service error");
                }
                Capture::DeviceUnavailable(e) => {
                    if self.router.listener_exhausted() {
                        tracing::info!("input closed");
                        break;
                    }
                    tracing::error!(error = %e, "capture device unavailable");
                    tokio::time::sleep(DEVICE_RETRY_DELAY).await;
                }
            }

            if self.cancel.is_cancelled() {
                break;
            }
        }

        tracing::info!("assistant stopped");
        Ok(())
    }

    /// Handle one utterance: route, print, speak
    async fn turn(&mut self, utterance: &str) {
        let response = tokio::select! {
            biased;
            () = self.cancel.cancelled() => return,
            response = self.router.handle(utterance) => response,
        };

        match response {
            Ok(response) => {
                println!("Bot: {response}");
                if let Err(e) = self.speaker.speak(&response).await {
                    tracing::warn!(error = %e, "failed to speak response");
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "turn failed - response not stored");
            }
        }
    }
}

fn is_exit(utterance: &str) -> bool {
    utterance.trim().eq_ignore_ascii_case(EXIT_WORD)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_exit() {
        assert!(is_exit("exit"));
        assert!(is_exit("  EXIT "));
        assert!(!is_exit("exit now"));
        assert!(!is_exit("please exit"));
    }
}
