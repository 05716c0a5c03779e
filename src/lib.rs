//! techbot - voice assistant for Linux commands and development
//!
//! This library provides the core of the assistant:
//! - Utterance routing with persistent response memoization
//! - Dictation and code-writing sessions
//! - Command execution and generative responses
//! - Voice capture, transcription, synthesis, and playback
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                     Daemon                          │
//! │        Listener ─▶ Router ─▶ Speaker                │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                     Router                          │
//! │  Cache │ Dictation │ Code Session │ Executor │ LLM  │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                 Collaborators                       │
//! │  SQLite │ cpal + Whisper │ TTS │ sh │ enigo │ OpenAI│
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod cache;
pub mod code_session;
pub mod config;
pub mod daemon;
pub mod db;
pub mod dictation;
pub mod editor;
pub mod error;
pub mod executor;
pub mod responder;
pub mod router;
pub mod voice;

pub use cache::{MemoryEntry, MemoryStore, ResponseCache};
pub use config::Config;
pub use daemon::Daemon;
pub use db::{DbConn, DbPool, MemoryRepo};
pub use dictation::{Dictation, DictationLimits, DictationSession, StopReason};
pub use error::{Error, Result};
pub use executor::{CommandExecutor, CommandOutput, CommandRunner, Reply};
pub use responder::{GenerativeResponder, Generator};
pub use router::{Collaborators, RouteDecision, RouteKind, Router, RouterSettings};
