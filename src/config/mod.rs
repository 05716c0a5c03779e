//! Configuration management for techbot

pub mod file;

use std::path::PathBuf;
use std::time::Duration;

use crate::dictation::DictationLimits;
use crate::editor::{DEFAULT_LAUNCH_COMMAND, DEFAULT_SETTLE_DELAY};
use crate::executor::DEFAULT_INSTALL_TEMPLATE;
use crate::responder::{DEFAULT_MAX_TOKENS, DEFAULT_SYSTEM_PROMPT};
use crate::router::RouterSettings;
use crate::voice::DEFAULT_ENERGY_THRESHOLD;
use crate::{Error, Result};

use self::file::TechbotConfigFile;

/// Default chat model
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// Default `OpenAI`-compatible API base URL
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// techbot configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Response cache database file
    pub db_path: PathBuf,

    pub llm: LlmConfig,

    pub voice: VoiceConfig,

    pub commands: CommandsConfig,

    pub editor: EditorConfig,

    pub dictation: DictationConfig,

    /// Cache failed command and generation responses
    pub memoize_errors: bool,

    pub api_keys: ApiKeys,
}

/// Generative backend configuration
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub model: String,
    pub base_url: String,
    pub system_prompt: String,
    pub max_tokens: u32,
    pub timeout: Option<Duration>,
}

/// Voice processing configuration
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    /// Enable voice input/output
    pub enabled: bool,

    /// STT model (e.g. "whisper-1")
    pub stt_model: String,

    /// TTS model (e.g. "tts-1")
    pub tts_model: String,

    /// TTS voice identifier
    pub tts_voice: String,

    /// TTS speed multiplier (0.25 to 4.0)
    pub tts_speed: f64,

    pub capture_timeout: Duration,

    pub phrase_limit: Duration,

    pub energy_threshold: f32,
}

/// Command execution configuration
#[derive(Debug, Clone)]
pub struct CommandsConfig {
    pub install_template: String,
    pub timeout: Option<Duration>,
}

/// Editor delivery configuration
#[derive(Debug, Clone)]
pub struct EditorConfig {
    pub launch_command: String,
    pub settle_delay: Duration,
}

/// Dictation configuration
#[derive(Debug, Clone, Default)]
pub struct DictationConfig {
    pub limits: DictationLimits,
    pub deliver_to_editor: bool,
}

/// API keys
#[derive(Debug, Clone, Default)]
pub struct ApiKeys {
    pub openai: Option<String>,
}

impl Config {
    /// Load configuration from environment and config file
    ///
    /// # Errors
    ///
    /// Returns error if configuration is invalid
    pub fn load() -> Result<Self> {
        Self::load_with_options(false)
    }

    /// Load configuration with explicit options
    ///
    /// # Errors
    ///
    /// Returns error if configuration is invalid
    pub fn load_with_options(disable_voice: bool) -> Result<Self> {
        // env > toml > default
        let fc = file::load_config_file();
        let data_dir = directories::BaseDirs::new()
            .map_or_else(|| PathBuf::from("."), |d| d.data_dir().join("techbot"));

        let config = Self::resolve(fc, |key| std::env::var(key).ok(), data_dir, disable_voice)?;

        if disable_voice {
            tracing::info!("voice explicitly disabled via --disable-voice");
        }

        Ok(config)
    }

    /// Merge a config file and an environment lookup over defaults
    ///
    /// # Errors
    ///
    /// Returns error if an environment value cannot be parsed
    pub fn resolve(
        fc: TechbotConfigFile,
        env: impl Fn(&str) -> Option<String>,
        data_dir: PathBuf,
        disable_voice: bool,
    ) -> Result<Self> {
        let api_keys = ApiKeys {
            openai: env("OPENAI_API_KEY")
                .or(fc.api_keys.openai)
                .filter(|k| !k.is_empty()),
        };

        let llm = LlmConfig {
            model: env("TECHBOT_LLM_MODEL")
                .or(fc.llm.model)
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            base_url: env("TECHBOT_LLM_BASE_URL")
                .or(fc.llm.base_url)
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            system_prompt: fc
                .llm
                .system_prompt
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
            max_tokens: fc.llm.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            timeout: fc.llm.timeout_secs.map(Duration::from_secs),
        };

        let voice = VoiceConfig {
            enabled: !disable_voice && fc.voice.enabled.unwrap_or(true),
            stt_model: env("TECHBOT_STT_MODEL")
                .or(fc.voice.stt_model)
                .unwrap_or_else(|| "whisper-1".to_string()),
            tts_model: env("TECHBOT_TTS_MODEL")
                .or(fc.voice.tts_model)
                .unwrap_or_else(|| "tts-1".to_string()),
            tts_voice: fc.voice.tts_voice.unwrap_or_else(|| "alloy".to_string()),
            tts_speed: fc.voice.tts_speed.unwrap_or(1.0),
            capture_timeout: Duration::from_secs(fc.voice.capture_timeout_secs.unwrap_or(5)),
            phrase_limit: Duration::from_secs(fc.voice.phrase_limit_secs.unwrap_or(10)),
            energy_threshold: fc
                .voice
                .energy_threshold
                .unwrap_or(DEFAULT_ENERGY_THRESHOLD),
        };

        let commands = CommandsConfig {
            install_template: env("TECHBOT_INSTALL_TEMPLATE")
                .or(fc.commands.install_template)
                .unwrap_or_else(|| DEFAULT_INSTALL_TEMPLATE.to_string()),
            timeout: fc.commands.timeout_secs.map(Duration::from_secs),
        };

        let editor = EditorConfig {
            launch_command: env("TECHBOT_EDITOR_COMMAND")
                .or(fc.editor.launch_command)
                .unwrap_or_else(|| DEFAULT_LAUNCH_COMMAND.to_string()),
            settle_delay: fc
                .editor
                .settle_delay_ms
                .map_or(DEFAULT_SETTLE_DELAY, Duration::from_millis),
        };

        let dictation = DictationConfig {
            limits: DictationLimits {
                max_duration: fc.dictation.max_duration_secs.map(Duration::from_secs),
                max_utterances: fc.dictation.max_utterances,
            },
            deliver_to_editor: fc.dictation.deliver_to_editor.unwrap_or(false),
        };

        let memoize_errors = match env("TECHBOT_MEMOIZE_ERRORS") {
            Some(v) => parse_bool(&v).ok_or_else(|| {
                Error::Config(format!("TECHBOT_MEMOIZE_ERRORS must be true or false, got {v:?}"))
            })?,
            None => fc.cache.memoize_errors.unwrap_or(true),
        };

        let db_path = env("TECHBOT_DB_PATH")
            .or(fc.cache.db_path)
            .map_or_else(|| data_dir.join("techbot.db"), PathBuf::from);

        Ok(Self {
            db_path,
            llm,
            voice,
            commands,
            editor,
            dictation,
            memoize_errors,
            api_keys,
        })
    }

    /// The `OpenAI` API key
    ///
    /// # Errors
    ///
    /// Returns error if no key is configured
    pub fn openai_key(&self) -> Result<&str> {
        self.api_keys.openai.as_deref().ok_or_else(|| {
            Error::Config(
                "OPENAI_API_KEY not set (or api_keys.openai in config.toml)".to_string(),
            )
        })
    }

    /// Router tunables derived from this configuration
    #[must_use]
    pub fn router_settings(&self) -> RouterSettings {
        RouterSettings {
            install_template: self.commands.install_template.clone(),
            memoize_errors: self.memoize_errors,
            capture_timeout: self.voice.capture_timeout,
            phrase_limit: self.voice.phrase_limit,
            dictation_limits: self.dictation.limits,
            deliver_dictation: self.dictation.deliver_to_editor,
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn resolve_with(fc: TechbotConfigFile, vars: &[(&str, &str)]) -> Result<Config> {
        let env: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Config::resolve(
            fc,
            |key| env.get(key).cloned(),
            PathBuf::from("/tmp/techbot"),
            false,
        )
    }

    #[test]
    fn test_defaults() {
        let config = resolve_with(TechbotConfigFile::default(), &[]).unwrap();

        assert_eq!(config.llm.model, DEFAULT_MODEL);
        assert_eq!(config.llm.max_tokens, 300);
        assert!(config.llm.timeout.is_none());
        assert_eq!(config.commands.install_template, "sudo apt-get install -y {package}");
        assert_eq!(config.voice.capture_timeout, Duration::from_secs(5));
        assert_eq!(config.voice.phrase_limit, Duration::from_secs(10));
        assert!(config.memoize_errors);
        assert!(!config.dictation.deliver_to_editor);
        assert!(config.dictation.limits.max_utterances.is_none());
        assert_eq!(config.db_path, PathBuf::from("/tmp/techbot/techbot.db"));
        assert!(config.openai_key().is_err());
    }

    #[test]
    fn test_env_overrides_file() {
        let mut fc = TechbotConfigFile::default();
        fc.llm.model = Some("from-file".to_string());
        fc.commands.install_template = Some("dnf install -y {package}".to_string());

        let config = resolve_with(
            fc,
            &[
                ("TECHBOT_LLM_MODEL", "from-env"),
                ("OPENAI_API_KEY", "sk-test"),
                ("TECHBOT_MEMOIZE_ERRORS", "false"),
            ],
        )
        .unwrap();

        assert_eq!(config.llm.model, "from-env");
        assert_eq!(config.commands.install_template, "dnf install -y {package}");
        assert_eq!(config.openai_key().unwrap(), "sk-test");
        assert!(!config.memoize_errors);
        assert!(!config.router_settings().memoize_errors);
    }

    #[test]
    fn test_invalid_bool_rejected() {
        let err = resolve_with(
            TechbotConfigFile::default(),
            &[("TECHBOT_MEMOIZE_ERRORS", "sometimes")],
        )
        .unwrap_err();

        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_empty_key_treated_as_missing() {
        let config = resolve_with(TechbotConfigFile::default(), &[("OPENAI_API_KEY", "")]).unwrap();
        assert!(config.api_keys.openai.is_none());
    }
}
