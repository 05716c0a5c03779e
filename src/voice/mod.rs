//! Voice input and output
//!
//! Microphone capture, speech segmentation, Whisper transcription, TTS
//! synthesis, and playback, exposed to the rest of the crate through the
//! [`Listener`] and [`Speaker`] traits.

mod capture;
mod listener;
mod playback;
mod segmenter;
mod speaker;
mod stt;
mod tts;

pub use capture::{AudioCapture, SAMPLE_RATE, rms, samples_to_wav};
pub use listener::{Capture, ConsoleListener, Listener, MicListener};
pub use playback::{AudioPlayback, decode_mp3};
pub use segmenter::{DEFAULT_ENERGY_THRESHOLD, SegmenterState, SpeechSegmenter};
pub use speaker::{ConsoleSpeaker, Speaker, VoiceSpeaker};
pub use stt::SpeechToText;
pub use tts::TextToSpeech;
