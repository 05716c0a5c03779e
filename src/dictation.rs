//! Dictation mode: accumulate utterances until the stop phrase
//!
//! ```text
//! Idle ──start──▶ Listening ──text──▶ Accumulating ──▶ Listening
//!                    │  ▲
//!                    │  └── no speech / service error
//!                    └── stop phrase / device lost / bound ──▶ Stopped
//! ```
//!
//! Without bounds the only exits are the stop phrase and a lost capture
//! device. Callers that need a worst case pass [`DictationLimits`] or cancel
//! the session's [`CancellationToken`].

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::voice::{Capture, Listener};

/// Phrase that ends dictation (matched case-insensitively)
pub const STOP_PHRASE: &str = "stop dictation";

/// Phase of a dictation session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DictationPhase {
    Idle,
    Listening,
    Accumulating,
    Stopped,
}

/// Why a session stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// The stop phrase was heard
    StopPhrase,
    /// The capture device became unavailable
    DeviceLost(String),
    /// The session's cancellation token fired
    Cancelled,
    /// `max_duration` or `max_utterances` was reached
    LimitReached,
}

/// Optional bounds on a session (all `None` by default)
#[derive(Debug, Clone, Copy, Default)]
pub struct DictationLimits {
    pub max_duration: Option<Duration>,
    pub max_utterances: Option<usize>,
}

/// Accumulated text and phase of one session
#[derive(Debug)]
pub struct DictationState {
    accumulated: Vec<String>,
    active: bool,
    phase: DictationPhase,
    stop_transitions: usize,
    reason: Option<StopReason>,
}

impl DictationState {
    /// A fresh, idle state
    #[must_use]
    pub const fn new() -> Self {
        Self {
            accumulated: Vec::new(),
            active: false,
            phase: DictationPhase::Idle,
            stop_transitions: 0,
            reason: None,
        }
    }

    /// Begin listening
    pub fn start(&mut self) {
        if self.phase == DictationPhase::Idle {
            self.phase = DictationPhase::Listening;
            self.active = true;
        }
    }

    /// Apply one capture result
    ///
    /// Returns the stop reason if this capture ended the session.
    pub fn on_capture(&mut self, capture: Capture) -> Option<StopReason> {
        if !self.active {
            return self.reason.clone();
        }

        match capture {
            Capture::Utterance(text) if text.to_lowercase().contains(STOP_PHRASE) => {
                tracing::info!("dictation stopped");
                self.stop(StopReason::StopPhrase);
            }
            Capture::Utterance(text) => {
                self.phase = DictationPhase::Accumulating;
                tracing::debug!(text = %text, "dictated");
                self.accumulated.push(text);
                self.phase = DictationPhase::Listening;
            }
            Capture::NoSpeech => {
                tracing::info!("no speech recognized, still listening");
            }
            Capture::ServiceError(e) => {
                tracing::warn!(error = %e, "transcription failed, still listening");
            }
            Capture::DeviceUnavailable(e) => {
                tracing::error!(error = %e, "capture device unavailable, ending dictation");
                self.stop(StopReason::DeviceLost(e));
            }
        }

        self.reason.clone()
    }

    /// Transition to `Stopped`; later calls are no-ops
    pub fn stop(&mut self, reason: StopReason) {
        if self.active {
            self.active = false;
            self.phase = DictationPhase::Stopped;
            self.stop_transitions += 1;
            self.reason = Some(reason);
        }
    }

    /// Accumulated text, one line per utterance
    #[must_use]
    pub fn text(&self) -> String {
        self.accumulated
            .iter()
            .map(|line| format!("{line}\n"))
            .collect()
    }

    /// Number of utterances accumulated
    #[must_use]
    pub fn utterances(&self) -> usize {
        self.accumulated.len()
    }

    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active
    }

    #[must_use]
    pub const fn phase(&self) -> DictationPhase {
        self.phase
    }

    /// Times the state entered `Stopped` (0 or 1)
    #[must_use]
    pub const fn stop_transitions(&self) -> usize {
        self.stop_transitions
    }
}

impl Default for DictationState {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of a finished dictation session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dictation {
    pub text: String,
    pub reason: StopReason,
    pub utterances: usize,
    pub stop_transitions: usize,
}

/// Runs dictation sessions against a [`Listener`]
#[derive(Debug, Clone)]
pub struct DictationSession {
    capture_timeout: Duration,
    phrase_limit: Duration,
    limits: DictationLimits,
    cancel: CancellationToken,
}

impl DictationSession {
    /// Create a session runner with per-capture time limits
    #[must_use]
    pub fn new(capture_timeout: Duration, phrase_limit: Duration) -> Self {
        Self {
            capture_timeout,
            phrase_limit,
            limits: DictationLimits::default(),
            cancel: CancellationToken::new(),
        }
    }

    /// Bound sessions by duration and/or utterance count
    #[must_use]
    pub const fn with_limits(mut self, limits: DictationLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Use an externally owned cancellation token
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that stops a running session when cancelled
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Listen until the stop phrase, device loss, cancellation, or a limit
    pub async fn run(&self, listener: &mut dyn Listener) -> Dictation {
        let mut state = DictationState::new();
        state.start();

        let deadline = self.limits.max_duration.map(|d| Instant::now() + d);
        tracing::info!("dictation mode: speak now, say '{STOP_PHRASE}' to end");

        while state.is_active() {
            if self
                .limits
                .max_utterances
                .is_some_and(|max| state.utterances() >= max)
            {
                state.stop(StopReason::LimitReached);
                break;
            }

            let capture = tokio::select! {
                biased;
                () = self.cancel.cancelled() => {
                    state.stop(StopReason::Cancelled);
                    break;
                }
                () = wait_until(deadline) => {
                    state.stop(StopReason::LimitReached);
                    break;
                }
                capture = listener.capture_utterance(self.capture_timeout, self.phrase_limit) => capture,
            };

            state.on_capture(capture);
        }

        let reason = state.reason.clone().unwrap_or(StopReason::Cancelled);
        tracing::info!(
            utterances = state.utterances(),
            reason = ?reason,
            "dictation finished"
        );

        Dictation {
            text: state.text(),
            reason,
            utterances: state.utterances(),
            stop_transitions: state.stop_transitions(),
        }
    }
}

/// Sleep until `deadline`, or forever if there is none
async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utterance(text: &str) -> Capture {
        Capture::Utterance(text.to_string())
    }

    #[test]
    fn test_starts_idle() {
        let state = DictationState::new();
        assert_eq!(state.phase(), DictationPhase::Idle);
        assert!(!state.is_active());
    }

    #[test]
    fn test_accumulates_until_stop_phrase() {
        let mut state = DictationState::new();
        state.start();

        assert_eq!(state.on_capture(utterance("hello")), None);
        assert_eq!(state.phase(), DictationPhase::Listening);
        assert_eq!(state.on_capture(utterance("world")), None);
        assert_eq!(
            state.on_capture(utterance("stop dictation")),
            Some(StopReason::StopPhrase)
        );

        assert_eq!(state.text(), "hello\nworld\n");
        assert_eq!(state.phase(), DictationPhase::Stopped);
        assert_eq!(state.stop_transitions(), 1);
    }

    #[test]
    fn test_stop_phrase_case_insensitive_and_embedded() {
        let mut state = DictationState::new();
        state.start();

        let reason = state.on_capture(utterance("OK, Stop Dictation please"));

        assert_eq!(reason, Some(StopReason::StopPhrase));
        assert_eq!(state.text(), "");
    }

    #[test]
    fn test_recoverable_failures_do_not_append() {
        let mut state = DictationState::new();
        state.start();

        state.on_capture(utterance("hello"));
        assert_eq!(state.on_capture(Capture::NoSpeech), None);
        assert_eq!(
            state.on_capture(Capture::ServiceError("503".to_string())),
            None
        );

        assert!(state.is_active());
        assert_eq!(state.text(), "hello\n");
    }

    #[test]
    fn test_device_loss_keeps_buffer() {
        let mut state = DictationState::new();
        state.start();

        state.on_capture(utterance("partial"));
        let reason = state.on_capture(Capture::DeviceUnavailable("unplugged".to_string()));

        assert_eq!(reason, Some(StopReason::DeviceLost("unplugged".to_string())));
        assert_eq!(state.text(), "partial\n");
    }

    #[test]
    fn test_captures_after_stop_are_ignored() {
        let mut state = DictationState::new();
        state.start();
        state.on_capture(utterance("stop dictation"));

        state.on_capture(utterance("late"));
        state.stop(StopReason::Cancelled);

        assert_eq!(state.text(), "");
        assert_eq!(state.stop_transitions(), 1);
    }
}
