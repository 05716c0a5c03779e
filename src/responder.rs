//! Generative responder: prompt in, text out, failures rendered as text

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::executor::Reply;
use crate::{Error, Result};

/// Default system prompt for generated answers
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a highly intelligent system that assists with Linux commands and development. Output only code or commands without explanations, commentary, or any additional text.";

/// Default cap on generated tokens
pub const DEFAULT_MAX_TOKENS: u32 = 300;

/// External text-generation capability
#[async_trait]
pub trait Generator: Send + Sync {
    /// Generate a completion for `user_prompt`
    ///
    /// # Errors
    ///
    /// Returns error on transport, auth, or quota failure
    async fn complete(&self, system_prompt: &str, user_prompt: &str, max_tokens: u32)
    -> Result<String>;
}

#[derive(serde::Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    max_tokens: u32,
}

#[derive(serde::Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(serde::Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(serde::Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(serde::Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

/// Chat-completions client for `OpenAI` and compatible servers
pub struct OpenAiGenerator {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiGenerator {
    /// Create a new generator
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new(api_key: String, model: String, base_url: String) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config(
                "OpenAI API key required for generation".to_string(),
            ));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl Generator for OpenAiGenerator {
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        max_tokens: u32,
    ) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: user_prompt,
                },
            ],
            max_tokens,
        };

        tracing::debug!(model = %self.model, prompt_len = user_prompt.len(), "requesting completion");

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            tracing::error!(status = %status, body = %body, "completion API error");
            return Err(Error::Generation(format!(
                "API error {status}: {}",
                api_error_message(&body)
            )));
        }

        parse_completion(&body)
    }
}

/// Extract the first choice's text from a chat-completions body
fn parse_completion(body: &str) -> Result<String> {
    let result: ChatResponse = serde_json::from_str(body)?;
    result
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| Error::Generation("response contained no choices".to_string()))
}

/// Message from an `{"error": {"message": ..}}` body, or the raw body
fn api_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(ToString::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

/// Forwards prompts to a [`Generator`] and never fails
#[derive(Clone)]
pub struct GenerativeResponder {
    generator: Arc<dyn Generator>,
    system_prompt: String,
    max_tokens: u32,
    timeout: Option<Duration>,
}

impl GenerativeResponder {
    /// Create a responder with the default system prompt and token limit
    #[must_use]
    pub fn new(generator: Arc<dyn Generator>) -> Self {
        Self {
            generator,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout: None,
        }
    }

    /// Override the system prompt
    #[must_use]
    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = system_prompt.into();
        self
    }

    /// Override the token limit
    #[must_use]
    pub const fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Bound each call by `timeout` (`None` means unbounded)
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Generate text for `prompt`
    ///
    /// Any backend failure becomes a readable error string with
    /// `failed` set.
    pub async fn generate(&self, prompt: &str) -> Reply {
        let call = self
            .generator
            .complete(&self.system_prompt, prompt, self.max_tokens);

        let result = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, call).await.unwrap_or_else(|_| {
                Err(Error::Generation(format!(
                    "timed out after {}ms",
                    limit.as_millis()
                )))
            }),
            None => call.await,
        };

        match result {
            Ok(text) => {
                tracing::debug!(response_len = text.len(), "generation complete");
                Reply::ok(text)
            }
            Err(e) => {
                tracing::warn!(error = %e, "generation failed");
                Reply::failure(format!("Failed to get response from model: {e}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct RecordingGenerator {
        calls: Mutex<Vec<(String, String, u32)>>,
    }

    #[async_trait]
    impl Generator for RecordingGenerator {
        async fn complete(
            &self,
            system_prompt: &str,
            user_prompt: &str,
            max_tokens: u32,
        ) -> Result<String> {
            self.calls.lock().unwrap().push((
                system_prompt.to_string(),
                user_prompt.to_string(),
                max_tokens,
            ));
            Ok(format!("echo {user_prompt}"))
        }
    }

    struct DownGenerator;

    #[async_trait]
    impl Generator for DownGenerator {
        async fn complete(&self, _: &str, _: &str, _: u32) -> Result<String> {
            Err(Error::Generation("quota exceeded".to_string()))
        }
    }

    #[tokio::test]
    async fn test_generate_passes_prompt_and_limits() {
        let generator = Arc::new(RecordingGenerator::default());
        let responder = GenerativeResponder::new(generator.clone())
            .with_system_prompt("be brief")
            .with_max_tokens(42);

        let reply = responder.generate("list files").await;

        assert_eq!(reply, Reply::ok("echo list files"));
        let calls = generator.calls.lock().unwrap();
        assert_eq!(
            calls.as_slice(),
            &[("be brief".to_string(), "list files".to_string(), 42)]
        );
    }

    #[tokio::test]
    async fn test_default_limits() {
        let generator = Arc::new(RecordingGenerator::default());
        let responder = GenerativeResponder::new(generator.clone());

        responder.generate("hi").await;

        let calls = generator.calls.lock().unwrap();
        assert_eq!(calls[0].0, DEFAULT_SYSTEM_PROMPT);
        assert_eq!(calls[0].2, 300);
    }

    #[tokio::test]
    async fn test_failure_becomes_text() {
        let responder = GenerativeResponder::new(Arc::new(DownGenerator));

        let reply = responder.generate("explain recursion").await;

        assert!(reply.failed);
        assert_eq!(
            reply.text,
            "Failed to get response from model: generation error: quota exceeded"
        );
    }

    #[test]
    fn test_parse_completion_takes_first_choice() {
        let body = r#"{"choices":[{"message":{"content":"ls -la"}},{"message":{"content":"dir"}}]}"#;
        assert_eq!(parse_completion(body).unwrap(), "ls -la");
    }

    #[test]
    fn test_parse_completion_without_choices() {
        let result = parse_completion(r#"{"choices":[]}"#);
        assert!(matches!(result, Err(Error::Generation(_))));
    }

    #[test]
    fn test_parse_completion_malformed_body() {
        let result = parse_completion("<html>bad gateway</html>");
        assert!(matches!(result, Err(Error::Serialization(_))));
    }

    #[test]
    fn test_api_error_message() {
        let body = r#"{"error":{"message":"You exceeded your current quota","type":"insufficient_quota"}}"#;
        assert_eq!(api_error_message(body), "You exceeded your current quota");
        assert_eq!(api_error_message(" upstream down \n"), "upstream down");
    }

    #[test]
    fn test_openai_requires_key() {
        let result = OpenAiGenerator::new(
            String::new(),
            "gpt-4o".to_string(),
            "https://api.openai.com/v1".to_string(),
        );
        assert!(result.is_err());
    }
}
