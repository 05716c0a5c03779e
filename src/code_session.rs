//! Code-writing session
//!
//! Asks three fixed questions, turns the answers into a generation prompt,
//! and hands the generated code to the editor.

use std::sync::Arc;

use async_trait::async_trait;
use dialoguer::Input;

use crate::editor::{self, Editor};
use crate::executor::Reply;
use crate::responder::GenerativeResponder;
use crate::{Error, Result};

/// Questions asked in order; answers fill the instruction template
pub const QUESTIONS: [&str; 3] = [
    "What kind of application are you building?",
    "Which programming language would you like to use?",
    "Do you need any specific features (e.g., database, user authentication)?",
];

/// Answers to [`QUESTIONS`], by index
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodeSessionAnswers(pub [String; 3]);

impl CodeSessionAnswers {
    /// Application kind
    #[must_use]
    pub fn kind(&self) -> &str {
        &self.0[0]
    }

    /// Programming language
    #[must_use]
    pub fn language(&self) -> &str {
        &self.0[1]
    }

    /// Requested features
    #[must_use]
    pub fn features(&self) -> &str {
        &self.0[2]
    }

    /// The generation prompt built from the answers
    #[must_use]
    pub fn instruction(&self) -> String {
        format!(
            "You are a highly skilled developer. Create a {} in {} that includes {}.",
            self.kind(),
            self.language(),
            self.features()
        )
    }
}

/// Collects a free-text answer from the operator
#[async_trait]
pub trait Prompter: Send + Sync {
    /// Ask `question` and return the answer as typed
    ///
    /// # Errors
    ///
    /// Returns error if the operator's input cannot be read
    async fn ask(&self, question: &str) -> Result<String>;
}

/// Prompts on the controlling terminal
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalPrompter;

#[async_trait]
impl Prompter for TerminalPrompter {
    async fn ask(&self, question: &str) -> Result<String> {
        let question = question.to_string();
        tokio::task::spawn_blocking(move || {
            Input::<String>::new()
                .with_prompt(question)
                .allow_empty(true)
                .interact_text()
                .map_err(|e| Error::Prompt(e.to_string()))
        })
        .await
        .map_err(|e| Error::Prompt(format!("prompt task failed: {e}")))?
    }
}

/// One code-generation request
pub struct CodeSession<'a> {
    prompter: &'a dyn Prompter,
    responder: &'a GenerativeResponder,
    editor: &'a Arc<dyn Editor>,
}

impl<'a> CodeSession<'a> {
    #[must_use]
    pub fn new(
        prompter: &'a dyn Prompter,
        responder: &'a GenerativeResponder,
        editor: &'a Arc<dyn Editor>,
    ) -> Self {
        Self {
            prompter,
            responder,
            editor,
        }
    }

    /// Ask every question in order
    ///
    /// # Errors
    ///
    /// Returns error if any answer cannot be read
    pub async fn collect_answers(&self) -> Result<CodeSessionAnswers> {
        let mut answers = CodeSessionAnswers::default();
        for (slot, question) in answers.0.iter_mut().zip(QUESTIONS) {
            *slot = self.prompter.ask(question).await?;
        }
        Ok(answers)
    }

    /// Collect answers, generate, and deliver the result to the editor
    ///
    /// Generation failures are delivered as their error text. Editor
    /// failures are logged.
    ///
    /// # Errors
    ///
    /// Returns error if the answers cannot be read
    pub async fn run(&self) -> Result<Reply> {
        tracing::info!("code writing mode");
        let answers = self.collect_answers().await?;
        let instruction = answers.instruction();
        tracing::debug!(instruction = %instruction, "requesting code");

        let reply = self.responder.generate(&instruction).await;
        editor::deliver_logged(self.editor, &reply.text).await;
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instruction_template() {
        let answers = CodeSessionAnswers([
            "todo app".to_string(),
            "Rust".to_string(),
            "a database".to_string(),
        ]);

        assert_eq!(
            answers.instruction(),
            "You are a highly skilled developer. Create a todo app in Rust that includes a database."
        );
    }

    #[test]
    fn test_empty_answers_keep_template_shape() {
        assert_eq!(
            CodeSessionAnswers::default().instruction(),
            "You are a highly skilled developer. Create a  in  that includes ."
        );
    }
}
