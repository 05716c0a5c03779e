//! Utterance capture: microphone or typed input

use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin};

use super::capture::{AudioCapture, SAMPLE_RATE, samples_to_wav};
use super::segmenter::SpeechSegmenter;
use super::stt::SpeechToText;

/// How often the microphone buffer is drained
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Result of one capture attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Capture {
    /// Speech was recognized
    Utterance(String),
    /// Nothing intelligible was heard before the timeout
    NoSpeech,
    /// The transcription service failed; retrying may succeed
    ServiceError(String),
    /// The capture device is missing or broken
    DeviceUnavailable(String),
}

/// Produces one utterance per call
///
/// Implementations may hold audio streams, which are not `Send`.
#[async_trait(?Send)]
pub trait Listener {
    /// Wait up to `timeout` for speech to begin, then record at most
    /// `phrase_limit` of it and transcribe
    async fn capture_utterance(&mut self, timeout: Duration, phrase_limit: Duration) -> Capture;

    /// True once the input source can never produce another utterance
    fn exhausted(&self) -> bool {
        false
    }
}

/// Captures from the default microphone and transcribes with Whisper
pub struct MicListener {
    stt: SpeechToText,
    energy_threshold: f32,
}

impl MicListener {
    /// Create a microphone listener
    #[must_use]
    pub const fn new(stt: SpeechToText, energy_threshold: f32) -> Self {
        Self {
            stt,
            energy_threshold,
        }
    }

    /// Record one speech segment, or `None` if none began within `timeout`
    async fn record(
        &self,
        capture: &AudioCapture,
        timeout: Duration,
        phrase_limit: Duration,
    ) -> Option<Vec<f32>> {
        let mut segmenter = SpeechSegmenter::new(self.energy_threshold);
        let started = Instant::now();
        let mut speech_began: Option<Instant> = None;

        loop {
            tokio::time::sleep(POLL_INTERVAL).await;

            let complete = segmenter.process(&capture.take_buffer());

            speech_began = match (speech_began, segmenter.is_speaking()) {
                (None, true) => Some(Instant::now()),
                (_, false) => None,
                (began, true) => began,
            };

            match speech_began {
                Some(began) if complete || began.elapsed() >= phrase_limit => {
                    return Some(segmenter.take_segment());
                }
                None if started.elapsed() >= timeout => return None,
                _ => {}
            }
        }
    }
}

#[async_trait(?Send)]
impl Listener for MicListener {
    async fn capture_utterance(&mut self, timeout: Duration, phrase_limit: Duration) -> Capture {
        let mut capture = match AudioCapture::new() {
            Ok(capture) => capture,
            Err(e) => return Capture::DeviceUnavailable(e.to_string()),
        };
        if let Err(e) = capture.start() {
            return Capture::DeviceUnavailable(e.to_string());
        }

        tracing::debug!("listening");
        let segment = self.record(&capture, timeout, phrase_limit).await;
        capture.stop();

        let Some(segment) = segment else {
            tracing::debug!("no speech before timeout");
            return Capture::NoSpeech;
        };

        let wav = match samples_to_wav(&segment, SAMPLE_RATE) {
            Ok(wav) => wav,
            Err(e) => return Capture::ServiceError(e.to_string()),
        };

        match self.stt.transcribe(wav).await {
            Ok(text) if text.is_empty() => Capture::NoSpeech,
            Ok(text) => Capture::Utterance(text),
            Err(e) => Capture::ServiceError(e.to_string()),
        }
    }
}

/// Reads utterances as lines from standard input
pub struct ConsoleListener {
    lines: Lines<BufReader<Stdin>>,
    closed: bool,
}

impl ConsoleListener {
    /// Create a listener over stdin
    #[must_use]
    pub fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
            closed: false,
        }
    }
}

impl Default for ConsoleListener {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait(?Send)]
impl Listener for ConsoleListener {
    /// Typed input is operator-paced, so the time limits do not apply
    async fn capture_utterance(&mut self, _timeout: Duration, _phrase_limit: Duration) -> Capture {
        let mut stdout = tokio::io::stdout();
        let _ = stdout.write_all(b"> ").await;
        let _ = stdout.flush().await;

        match self.lines.next_line().await {
            Ok(Some(line)) if line.trim().is_empty() => Capture::NoSpeech,
            Ok(Some(line)) => Capture::Utterance(line.trim().to_string()),
            Ok(None) => {
                self.closed = true;
                Capture::DeviceUnavailable("stdin closed".to_string())
            }
            Err(e) => Capture::ServiceError(e.to_string()),
        }
    }

    fn exhausted(&self) -> bool {
        self.closed
    }
}
