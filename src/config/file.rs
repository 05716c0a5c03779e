//! TOML configuration file loading
//!
//! Supports `~/.config/techbot/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::Result;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct TechbotConfigFile {
    #[serde(default)]
    pub llm: LlmFileConfig,

    #[serde(default)]
    pub voice: VoiceFileConfig,

    #[serde(default)]
    pub commands: CommandsFileConfig,

    #[serde(default)]
    pub editor: EditorFileConfig,

    #[serde(default)]
    pub dictation: DictationFileConfig,

    #[serde(default)]
    pub cache: CacheFileConfig,

    /// API keys for external services
    #[serde(default)]
    pub api_keys: ApiKeysFileConfig,
}

/// Generative backend configuration
#[derive(Debug, Default, Deserialize)]
pub struct LlmFileConfig {
    /// Model identifier (e.g. "gpt-4")
    pub model: Option<String>,

    /// `OpenAI`-compatible API base URL
    pub base_url: Option<String>,

    pub system_prompt: Option<String>,

    pub max_tokens: Option<u32>,

    /// Per-request timeout; unset means unbounded
    pub timeout_secs: Option<u64>,
}

/// Voice processing configuration
#[derive(Debug, Default, Deserialize)]
pub struct VoiceFileConfig {
    /// Enable voice input/output
    pub enabled: Option<bool>,

    /// STT model (e.g. "whisper-1")
    pub stt_model: Option<String>,

    /// TTS model (e.g. "tts-1")
    pub tts_model: Option<String>,

    /// TTS voice identifier (e.g. "alloy")
    pub tts_voice: Option<String>,

    /// TTS speed multiplier
    pub tts_speed: Option<f64>,

    /// Seconds to wait for speech to begin
    pub capture_timeout_secs: Option<u64>,

    /// Longest phrase recorded per capture, in seconds
    pub phrase_limit_secs: Option<u64>,

    /// RMS level treated as speech
    pub energy_threshold: Option<f32>,
}

/// Command execution configuration
#[derive(Debug, Default, Deserialize)]
pub struct CommandsFileConfig {
    /// Install command with a `{package}` placeholder
    pub install_template: Option<String>,

    pub timeout_secs: Option<u64>,
}

/// Editor delivery configuration
#[derive(Debug, Default, Deserialize)]
pub struct EditorFileConfig {
    pub launch_command: Option<String>,

    /// Wait after launch before typing
    pub settle_delay_ms: Option<u64>,
}

/// Dictation bounds
#[derive(Debug, Default, Deserialize)]
pub struct DictationFileConfig {
    pub max_duration_secs: Option<u64>,
    pub max_utterances: Option<usize>,
    pub deliver_to_editor: Option<bool>,
}

/// Response cache configuration
#[derive(Debug, Default, Deserialize)]
pub struct CacheFileConfig {
    /// Cache failed command and generation responses
    pub memoize_errors: Option<bool>,

    pub db_path: Option<String>,
}

/// API keys configuration
#[derive(Debug, Default, Deserialize)]
pub struct ApiKeysFileConfig {
    pub openai: Option<String>,
}

/// Load the TOML config file from the standard path
///
/// Returns `TechbotConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> TechbotConfigFile {
    let Some(path) = config_file_path() else {
        return TechbotConfigFile::default();
    };

    match load_from(&path) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to load config file, using defaults"
            );
            TechbotConfigFile::default()
        }
    }
}

/// Load a TOML config file from `path`
///
/// A missing file yields the defaults.
///
/// # Errors
///
/// Returns error if the file cannot be read or is not valid TOML
pub fn load_from(path: &Path) -> Result<TechbotConfigFile> {
    if !path.exists() {
        return Ok(TechbotConfigFile::default());
    }

    let content = std::fs::read_to_string(path)?;
    let config = toml::from_str(&content)?;
    tracing::info!(path = %path.display(), "loaded config file");
    Ok(config)
}

/// Return the config file path: `~/.config/techbot/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("techbot").join("config.toml"))
}
