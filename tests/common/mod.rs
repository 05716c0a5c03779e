//! Shared test utilities

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use techbot::code_session::Prompter;
use techbot::editor::Editor;
use techbot::voice::{Capture, Listener, Speaker};
use techbot::{
    Collaborators, CommandExecutor, CommandOutput, CommandRunner, DbPool, Error,
    GenerativeResponder, Generator, MemoryEntry, MemoryRepo, MemoryStore, ResponseCache, Result,
    Router, RouterSettings, db,
};

/// Set up an in-memory test database
#[must_use]
pub fn setup_test_db() -> DbPool {
    db::init_memory().expect("failed to init test db")
}

/// Response cache over a fresh in-memory database
#[must_use]
pub fn setup_cache() -> ResponseCache {
    ResponseCache::new(Arc::new(MemoryRepo::new(setup_test_db())))
}

/// Store that reads as empty and rejects every write
pub struct ReadOnlyStore;

impl MemoryStore for ReadOnlyStore {
    fn append(&self, _query: &str, _response: &str) -> Result<MemoryEntry> {
        Err(Error::Database("attempt to write a readonly database".to_string()))
    }

    fn find_first_containing(&self, _substring: &str) -> Result<Option<MemoryEntry>> {
        Ok(None)
    }

    fn count(&self) -> Result<usize> {
        Ok(0)
    }

    fn recent(&self, _limit: usize) -> Result<Vec<MemoryEntry>> {
        Ok(Vec::new())
    }
}

/// Shared record of calls made to a fake
#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn push(&self, call: impl Into<String>) {
        self.0.lock().unwrap().push(call.into());
    }

    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.0.lock().unwrap().len()
    }
}

/// Listener that replays a fixed script, then reports the device gone
pub struct ScriptedListener {
    script: VecDeque<Capture>,
    log: CallLog,
}

impl ScriptedListener {
    #[must_use]
    pub fn new(script: Vec<Capture>, log: CallLog) -> Self {
        Self {
            script: script.into(),
            log,
        }
    }
}

#[async_trait(?Send)]
impl Listener for ScriptedListener {
    async fn capture_utterance(&mut self, _timeout: Duration, _phrase_limit: Duration) -> Capture {
        let capture = self
            .script
            .pop_front()
            .unwrap_or_else(|| Capture::DeviceUnavailable("script exhausted".to_string()));
        self.log.push(format!("{capture:?}"));
        capture
    }

    fn exhausted(&self) -> bool {
        self.script.is_empty()
    }
}

/// Utterance capture helper
#[must_use]
pub fn said(text: &str) -> Capture {
    Capture::Utterance(text.to_string())
}

/// Runner that records commands and returns a fixed output
pub struct FakeRunner {
    output: CommandOutput,
    log: CallLog,
}

#[async_trait]
impl CommandRunner for FakeRunner {
    async fn run(&self, command: &str) -> Result<CommandOutput> {
        self.log.push(command);
        Ok(self.output.clone())
    }
}

/// Successful command output
#[must_use]
pub fn stdout(text: &str) -> CommandOutput {
    CommandOutput {
        exit_code: 0,
        stdout: text.to_string(),
        stderr: String::new(),
    }
}

/// Failed command output
#[must_use]
pub fn stderr(text: &str) -> CommandOutput {
    CommandOutput {
        exit_code: 1,
        stdout: String::new(),
        stderr: text.to_string(),
    }
}

/// Generator that records prompts and returns a fixed result
pub struct FakeGenerator {
    result: std::result::Result<String, String>,
    log: CallLog,
}

#[async_trait]
impl Generator for FakeGenerator {
    async fn complete(&self, _system_prompt: &str, user_prompt: &str, _max_tokens: u32) -> Result<String> {
        self.log.push(user_prompt);
        self.result.clone().map_err(Error::Generation)
    }
}

/// Prompter that answers from a queue
pub struct FakePrompter {
    answers: Mutex<VecDeque<String>>,
    log: CallLog,
}

#[async_trait]
impl Prompter for FakePrompter {
    async fn ask(&self, question: &str) -> Result<String> {
        self.log.push(question);
        self.answers
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| Error::Prompt("no answer".to_string()))
    }
}

/// Editor that records delivered text
pub struct FakeEditor {
    log: CallLog,
}

#[async_trait]
impl Editor for FakeEditor {
    async fn deliver_text(&self, text: &str) -> Result<()> {
        self.log.push(text);
        Ok(())
    }
}

/// Speaker that records spoken text
pub struct RecordingSpeaker {
    pub log: CallLog,
}

#[async_trait(?Send)]
impl Speaker for RecordingSpeaker {
    async fn speak(&mut self, text: &str) -> Result<()> {
        self.log.push(text);
        Ok(())
    }
}

/// Call logs of every fake behind a [`TestRouter`]
#[derive(Clone, Default)]
pub struct Calls {
    pub captures: CallLog,
    pub commands: CallLog,
    pub generations: CallLog,
    pub questions: CallLog,
    pub delivered: CallLog,
}

/// What the fakes return
pub struct Scenario {
    pub script: Vec<Capture>,
    pub command: CommandOutput,
    pub generation: std::result::Result<String, String>,
    pub answers: Vec<&'static str>,
    pub settings: RouterSettings,
    /// Back the router with [`ReadOnlyStore`] instead of a database
    pub read_only_cache: bool,
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            script: Vec::new(),
            command: stdout("ok"),
            generation: Ok("generated".to_string()),
            answers: vec!["todo app", "Rust", "a database"],
            settings: RouterSettings::default(),
            read_only_cache: false,
        }
    }
}

/// A router wired to fakes, with its cache and call logs
pub struct TestRouter {
    pub router: Router,
    pub cache: ResponseCache,
    pub calls: Calls,
}

/// Build a router over fakes behaving as `scenario` describes
#[must_use]
pub fn test_router(scenario: Scenario) -> TestRouter {
    let calls = Calls::default();
    let cache = if scenario.read_only_cache {
        ResponseCache::new(Arc::new(ReadOnlyStore))
    } else {
        setup_cache()
    };

    let runner = FakeRunner {
        output: scenario.command,
        log: calls.commands.clone(),
    };
    let generator = FakeGenerator {
        result: scenario.generation,
        log: calls.generations.clone(),
    };
    let prompter = FakePrompter {
        answers: Mutex::new(scenario.answers.iter().map(ToString::to_string).collect()),
        log: calls.questions.clone(),
    };
    let editor = FakeEditor {
        log: calls.delivered.clone(),
    };

    let collaborators = Collaborators {
        listener: Box::new(ScriptedListener::new(scenario.script, calls.captures.clone())),
        prompter: Box::new(prompter),
        executor: CommandExecutor::new(Arc::new(runner)),
        responder: GenerativeResponder::new(Arc::new(generator)),
        editor: Arc::new(editor),
    };

    TestRouter {
        router: Router::new(cache.clone(), collaborators, scenario.settings),
        cache,
        calls,
    }
}
