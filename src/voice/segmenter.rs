//! Energy-based speech segmentation
//!
//! Splits a microphone stream into utterances: speech starts when block
//! energy crosses the threshold and ends after a run of silence.

use super::capture::{SAMPLE_RATE, rms};

/// Default minimum RMS energy considered speech
pub const DEFAULT_ENERGY_THRESHOLD: f32 = 0.03;

/// Minimum speech length to count as an utterance (0.3s at 16kHz)
const MIN_SPEECH_SAMPLES: usize = SAMPLE_RATE as usize * 3 / 10;

/// Trailing silence that ends an utterance (0.5s at 16kHz)
const SILENCE_SAMPLES: usize = SAMPLE_RATE as usize / 2;

/// State of the segmenter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmenterState {
    /// Waiting for speech
    Silent,
    /// Speech detected, accumulating
    Speaking,
}

/// Groups audio blocks into utterances
pub struct SpeechSegmenter {
    threshold: f32,
    state: SegmenterState,
    speech_buffer: Vec<f32>,
    silence_counter: usize,
}

impl SpeechSegmenter {
    /// Create a segmenter with the given energy threshold
    #[must_use]
    pub const fn new(threshold: f32) -> Self {
        Self {
            threshold,
            state: SegmenterState::Silent,
            speech_buffer: Vec::new(),
            silence_counter: 0,
        }
    }

    /// Feed a block of samples
    ///
    /// Returns true once an utterance is complete (enough speech followed by
    /// enough silence). The segment stays buffered until taken.
    pub fn process(&mut self, samples: &[f32]) -> bool {
        let is_speech = rms(samples) > self.threshold;

        match self.state {
            SegmenterState::Silent => {
                if is_speech {
                    self.state = SegmenterState::Speaking;
                    self.speech_buffer.clear();
                    self.speech_buffer.extend_from_slice(samples);
                    self.silence_counter = 0;
                    tracing::trace!("speech started");
                }
                false
            }
            SegmenterState::Speaking => {
                self.speech_buffer.extend_from_slice(samples);

                if is_speech {
                    self.silence_counter = 0;
                } else {
                    self.silence_counter += samples.len();
                }

                let voiced = self.speech_buffer.len().saturating_sub(self.silence_counter);
                if self.silence_counter > SILENCE_SAMPLES && voiced > MIN_SPEECH_SAMPLES {
                    tracing::debug!(samples = self.speech_buffer.len(), "utterance complete");
                    return true;
                }

                // A short blip followed by long silence was noise
                if self.silence_counter > SILENCE_SAMPLES * 2 {
                    tracing::trace!("noise burst discarded");
                    self.reset();
                }

                false
            }
        }
    }

    /// Take the buffered speech and return to silence
    pub fn take_segment(&mut self) -> Vec<f32> {
        let segment = std::mem::take(&mut self.speech_buffer);
        self.reset();
        segment
    }

    /// Whether speech is in progress
    #[must_use]
    pub fn is_speaking(&self) -> bool {
        self.state == SegmenterState::Speaking
    }

    /// Current state
    #[must_use]
    pub const fn state(&self) -> SegmenterState {
        self.state
    }

    /// Discard any buffered audio
    pub fn reset(&mut self) {
        self.state = SegmenterState::Silent;
        self.speech_buffer.clear();
        self.silence_counter = 0;
    }
}

impl Default for SpeechSegmenter {
    fn default() -> Self {
        Self::new(DEFAULT_ENERGY_THRESHOLD)
    }
}
