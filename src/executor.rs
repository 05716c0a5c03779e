//! Command executor: runs host commands and renders their outcome as text
//!
//! Commands are run through the shell exactly as spoken. Nothing is
//! sandboxed.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::{Error, Result};

/// Default template for package installation
pub const DEFAULT_INSTALL_TEMPLATE: &str = "sudo apt-get install -y {package}";

/// Captured result of a finished command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Whether the command exited with status zero
    #[must_use]
    pub const fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// A handler's textual outcome
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    /// The text describes a failure rather than a result
    pub failed: bool,
}

impl Reply {
    /// A successful reply
    #[must_use]
    pub fn ok(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            failed: false,
        }
    }

    /// An error-kind reply
    #[must_use]
    pub fn failure(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            failed: true,
        }
    }
}

/// Runs a command string on the host
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `command` to completion and capture its output
    ///
    /// # Errors
    ///
    /// Returns error if the process cannot be spawned or waited on
    async fn run(&self, command: &str) -> Result<CommandOutput>;
}

/// Runs commands through `sh -c`
#[derive(Debug, Default, Clone)]
pub struct ShellRunner;

#[async_trait]
impl CommandRunner for ShellRunner {
    async fn run(&self, command: &str) -> Result<CommandOutput> {
        let output = tokio::process::Command::new("sh")
            .arg("-c")
            .arg(command)
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| Error::Command(format!("failed to spawn `{command}`: {e}")))?;

        Ok(CommandOutput {
            // Killed by signal has no code
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

/// Executes commands and maps every outcome to response text
#[derive(Clone)]
pub struct CommandExecutor {
    runner: Arc<dyn CommandRunner>,
    timeout: Option<Duration>,
}

impl CommandExecutor {
    /// Create an executor with no time limit
    #[must_use]
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            timeout: None,
        }
    }

    /// Bound every command by `timeout` (`None` means unbounded)
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run `command` and render the outcome
    ///
    /// Exit status zero yields stdout; non-zero yields `"Error: " + stderr`;
    /// a spawn failure or timeout yields `"Failed to run the command: ..."`.
    pub async fn execute(&self, command: &str) -> Reply {
        tracing::info!(command, "running command");

        let result = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.runner.run(command))
                .await
                .unwrap_or_else(|_| {
                    Err(Error::Command(format!(
                        "timed out after {}ms",
                        limit.as_millis()
                    )))
                }),
            None => self.runner.run(command).await,
        };

        match result {
            Ok(output) if output.success() => {
                tracing::debug!(command, stdout_len = output.stdout.len(), "command succeeded");
                Reply::ok(output.stdout)
            }
            Ok(output) => {
                tracing::warn!(command, exit_code = output.exit_code, "command failed");
                Reply::failure(format!("Error: {}", output.stderr))
            }
            Err(e) => {
                tracing::error!(command, error = %e, "command could not run");
                Reply::failure(format!("Failed to run the command: {e}"))
            }
        }
    }
}

/// Build an install command by substituting `package` into `template`
///
/// A template without a `{package}` placeholder gets the package appended.
#[must_use]
pub fn install_command(template: &str, package: &str) -> String {
    if template.contains("{package}") {
        template.replace("{package}", package)
    } else {
        format!("{} {package}", template.trim_end())
    }
}
