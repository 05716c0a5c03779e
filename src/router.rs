//! Utterance routing
//!
//! Every utterance is checked against the response cache first, then against
//! an ordered keyword table. The first matching rule wins:
//!
//! | Order | Trigger           | Handler                 | Cached |
//! |-------|-------------------|-------------------------|--------|
//! | 1     | cache hit         | stored response         | no     |
//! | 2     | `start dictation` | dictation session       | no     |
//! | 3     | `write code`      | code session            | no     |
//! | 4     | `install`         | package install command | yes    |
//! | 5     | `run`             | shell command           | yes    |
//! | 6     | anything else     | generative responder    | yes    |
//!
//! Triggers match case-insensitively anywhere in the utterance, so
//! "install the runtime" is an install, never a run.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::Result;
use crate::cache::ResponseCache;
use crate::code_session::{CodeSession, Prompter};
use crate::dictation::{Dictation, DictationLimits, DictationSession};
use crate::editor::{self, Editor};
use crate::executor::{CommandExecutor, DEFAULT_INSTALL_TEMPLATE, Reply, install_command};
use crate::responder::GenerativeResponder;
use crate::voice::{Capture, Listener};

/// Acknowledgement returned after a dictation session
pub const DICTATION_ACK: &str = "Dictation mode started.";

/// Acknowledgement returned after a code session
pub const CODE_SESSION_ACK: &str = "Code writing mode started.";

/// Prefix stored and returned for `run` output
pub const RUN_OUTPUT_PREFIX: &str = "Command output:\n";

/// Handler an utterance is routed to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteKind {
    CacheHit,
    StartDictation,
    StartCodeSession,
    Install,
    RunCommand,
    Generate,
}

impl fmt::Display for RouteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::CacheHit => "cache-hit",
            Self::StartDictation => "start-dictation",
            Self::StartCodeSession => "start-code-session",
            Self::Install => "install",
            Self::RunCommand => "run-command",
            Self::Generate => "generate",
        };
        f.write_str(name)
    }
}

/// Keyword rules, checked in order after the cache
const RULES: [(&str, RouteKind); 4] = [
    ("start dictation", RouteKind::StartDictation),
    ("write code", RouteKind::StartCodeSession),
    ("install", RouteKind::Install),
    ("run", RouteKind::RunCommand),
];

/// Classification of one utterance
///
/// `payload` is the cached response for [`RouteKind::CacheHit`], the package
/// text for [`RouteKind::Install`], the stripped command for
/// [`RouteKind::RunCommand`], and the utterance otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteDecision {
    pub kind: RouteKind,
    pub payload: String,
}

/// Tunables for routing and the handlers it drives
#[derive(Debug, Clone)]
pub struct RouterSettings {
    /// Install command with a `{package}` placeholder
    pub install_template: String,
    /// Cache error-kind responses as well as successes
    pub memoize_errors: bool,
    /// How long each capture waits for speech to begin
    pub capture_timeout: Duration,
    /// Longest single phrase recorded per capture
    pub phrase_limit: Duration,
    pub dictation_limits: DictationLimits,
    /// Type finished dictation into the editor
    pub deliver_dictation: bool,
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self {
            install_template: DEFAULT_INSTALL_TEMPLATE.to_string(),
            memoize_errors: true,
            capture_timeout: Duration::from_secs(5),
            phrase_limit: Duration::from_secs(10),
            dictation_limits: DictationLimits::default(),
            deliver_dictation: false,
        }
    }
}

/// Handlers the router dispatches to
pub struct Collaborators {
    pub listener: Box<dyn Listener>,
    pub prompter: Box<dyn Prompter>,
    pub executor: CommandExecutor,
    pub responder: GenerativeResponder,
    pub editor: Arc<dyn Editor>,
}

/// Routes utterances to handlers and memoizes their responses
pub struct Router {
    cache: ResponseCache,
    listener: Box<dyn Listener>,
    prompter: Box<dyn Prompter>,
    executor: CommandExecutor,
    responder: GenerativeResponder,
    editor: Arc<dyn Editor>,
    settings: RouterSettings,
    cancel: CancellationToken,
    last_dictation: Option<Dictation>,
}

impl Router {
    /// Create a router
    #[must_use]
    pub fn new(cache: ResponseCache, collaborators: Collaborators, settings: RouterSettings) -> Self {
        Self {
            cache,
            listener: collaborators.listener,
            prompter: collaborators.prompter,
            executor: collaborators.executor,
            responder: collaborators.responder,
            editor: collaborators.editor,
            settings,
            cancel: CancellationToken::new(),
            last_dictation: None,
        }
    }

    /// Stop running dictation sessions when `cancel` fires
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Classify `utterance` without running any handler
    ///
    /// # Errors
    ///
    /// Returns error if the cache cannot be read
    pub fn classify(&self, utterance: &str) -> Result<RouteDecision> {
        classify_with(&self.cache, utterance)
    }

    /// Route `utterance` to exactly one handler and return its response
    ///
    /// Install, run, and generate responses are stored in the cache before
    /// returning.
    ///
    /// # Errors
    ///
    /// Returns error only if the cache cannot be read or written
    pub async fn handle(&mut self, utterance: &str) -> Result<String> {
        let decision = self.classify(utterance)?;
        tracing::info!(kind = %decision.kind, "routed utterance");

        match decision.kind {
            RouteKind::CacheHit => Ok(decision.payload),
            RouteKind::StartDictation => {
                self.dictate().await;
                Ok(DICTATION_ACK.to_string())
            }
            RouteKind::StartCodeSession => {
                self.write_code().await;
                Ok(CODE_SESSION_ACK.to_string())
            }
            RouteKind::Install => {
                let command = install_command(&self.settings.install_template, &decision.payload);
                let reply = self.executor.execute(&command).await;
                self.remember(utterance, reply)
            }
            RouteKind::RunCommand => {
                let reply = self.executor.execute(&decision.payload).await;
                let reply = Reply {
                    text: format!("{RUN_OUTPUT_PREFIX}{}", reply.text),
                    failed: reply.failed,
                };
                self.remember(utterance, reply)
            }
            RouteKind::Generate => {
                let reply = self.responder.generate(utterance).await;
                self.remember(utterance, reply)
            }
        }
    }

    /// Capture one utterance with the configured time limits
    pub async fn listen(&mut self) -> Capture {
        self.listener
            .capture_utterance(self.settings.capture_timeout, self.settings.phrase_limit)
            .await
    }

    /// True once the listener can produce no more input
    #[must_use]
    pub fn listener_exhausted(&self) -> bool {
        self.listener.exhausted()
    }

    /// Outcome of the most recent dictation session
    #[must_use]
    pub const fn last_dictation(&self) -> Option<&Dictation> {
        self.last_dictation.as_ref()
    }

    #[must_use]
    pub const fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    async fn dictate(&mut self) {
        let session = DictationSession::new(self.settings.capture_timeout, self.settings.phrase_limit)
            .with_limits(self.settings.dictation_limits)
            .with_cancellation(self.cancel.clone());
        let dictation = session.run(self.listener.as_mut()).await;

        if self.settings.deliver_dictation && !dictation.text.is_empty() {
            editor::deliver_logged(&self.editor, &dictation.text).await;
        }
        self.last_dictation = Some(dictation);
    }

    async fn write_code(&self) {
        let session = CodeSession::new(self.prompter.as_ref(), &self.responder, &self.editor);
        if let Err(e) = session.run().await {
            tracing::warn!(error = %e, "code session aborted");
        }
    }

    /// Store the reply per the memoization policy and return its text
    fn remember(&self, utterance: &str, reply: Reply) -> Result<String> {
        if reply.failed && !self.settings.memoize_errors {
            tracing::debug!("error response not cached");
        } else {
            self.cache.store(utterance, &reply.text)?;
        }
        Ok(reply.text)
    }
}

/// Classify `utterance` against `cache` and the keyword table
///
/// # Errors
///
/// Returns error if the cache cannot be read
pub fn classify_with(cache: &ResponseCache, utterance: &str) -> Result<RouteDecision> {
    if let Some(response) = cache.lookup(utterance)? {
        return Ok(RouteDecision {
            kind: RouteKind::CacheHit,
            payload: response,
        });
    }

    let lowered = utterance.to_ascii_lowercase();
    let kind = RULES
        .iter()
        .find(|(trigger, _)| lowered.contains(trigger))
        .map_or(RouteKind::Generate, |(_, kind)| *kind);

    let payload = match kind {
        RouteKind::Install => package_text(utterance),
        RouteKind::RunCommand => run_command_text(utterance),
        _ => utterance.to_string(),
    };

    Ok(RouteDecision { kind, payload })
}

/// Text after the last "install", trimmed
fn package_text(utterance: &str) -> String {
    utterance
        .to_ascii_lowercase()
        .rfind("install")
        .map_or_else(String::new, |pos| {
            utterance[pos + "install".len()..].trim().to_string()
        })
}

/// Lowercased utterance with every "run" removed, trimmed
fn run_command_text(utterance: &str) -> String {
    utterance.to_lowercase().replace("run", "").trim().to_string()
}
