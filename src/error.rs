//! Error types for techbot

use thiserror::Error;

/// Result type alias for techbot operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in techbot
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Audio device error
    #[error("audio error: {0}")]
    Audio(String),

    /// Speech-to-text error
    #[error("STT error: {0}")]
    Stt(String),

    /// Text-to-speech error
    #[error("TTS error: {0}")]
    Tts(String),

    /// Generative backend error
    #[error("generation error: {0}")]
    Generation(String),

    /// Host command could not be started or waited on
    #[error("command error: {0}")]
    Command(String),

    /// Editor automation error
    #[error("editor error: {0}")]
    Editor(String),

    /// Operator prompt error (code session Q&A)
    #[error("prompt error: {0}")]
    Prompt(String),

    /// Database error
    #[error("database error: {0}")]
    Database(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    /// `SQLite` error
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}
