//! Spoken output

use async_trait::async_trait;

use super::playback::AudioPlayback;
use super::tts::TextToSpeech;
use crate::Result;

/// Speaks response text
#[async_trait(?Send)]
pub trait Speaker {
    /// Speak `text`, returning once playback is finished
    ///
    /// # Errors
    ///
    /// Returns error if synthesis or playback fails
    async fn speak(&mut self, text: &str) -> Result<()>;
}

/// Synthesizes with the TTS API and plays through the default output
pub struct VoiceSpeaker {
    tts: TextToSpeech,
    playback: AudioPlayback,
}

impl VoiceSpeaker {
    /// Create a speaker
    #[must_use]
    pub const fn new(tts: TextToSpeech, playback: AudioPlayback) -> Self {
        Self { tts, playback }
    }
}

#[async_trait(?Send)]
impl Speaker for VoiceSpeaker {
    async fn speak(&mut self, text: &str) -> Result<()> {
        if text.trim().is_empty() {
            return Ok(());
        }
        tracing::debug!(text_len = text.len(), "speaking");
        let mp3 = self.tts.synthesize(text).await?;
        self.playback.play_mp3(&mp3)
    }
}

/// Silent speaker for text mode; the printed reply is the only output
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleSpeaker;

#[async_trait(?Send)]
impl Speaker for ConsoleSpeaker {
    async fn speak(&mut self, _text: &str) -> Result<()> {
        Ok(())
    }
}
