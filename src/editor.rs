//! Editor delivery: open the editor and paste generated text into it

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use arboard::Clipboard;
use enigo::{Direction, Enigo, Key, Keyboard, Settings};

use crate::executor::CommandExecutor;
use crate::{Error, Result};

/// Default command that opens the editor
pub const DEFAULT_LAUNCH_COMMAND: &str = "code";

/// Default wait between launching the editor and pasting
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(3);

/// Receives generated text
#[async_trait]
pub trait Editor: Send + Sync {
    /// Focus the editor, insert `text`, and confirm
    ///
    /// # Errors
    ///
    /// Returns error if the editor cannot be reached or pasted into
    async fn deliver_text(&self, text: &str) -> Result<()>;
}

/// Launches a desktop editor and pastes into it through the clipboard
pub struct DesktopEditor {
    executor: CommandExecutor,
    launch_command: String,
    settle_delay: Duration,
}

impl DesktopEditor {
    /// Create a desktop editor
    #[must_use]
    pub fn new(
        executor: CommandExecutor,
        launch_command: impl Into<String>,
        settle_delay: Duration,
    ) -> Self {
        Self {
            executor,
            launch_command: launch_command.into(),
            settle_delay,
        }
    }

    /// Launch the editor detached, then wait for it to take focus
    ///
    /// Output is discarded so the shell does not hold the capture pipes open.
    async fn focus(&self) -> Result<()> {
        let command = format!("{} >/dev/null 2>&1 &", self.launch_command.trim());
        let reply = self.executor.execute(&command).await;
        if reply.failed {
            return Err(Error::Editor(reply.text));
        }
        tokio::time::sleep(self.settle_delay).await;
        Ok(())
    }
}

#[async_trait]
impl Editor for DesktopEditor {
    async fn deliver_text(&self, text: &str) -> Result<()> {
        self.focus().await?;

        let text = text.to_string();
        let len = text.len();
        tokio::task::spawn_blocking(move || paste_and_confirm(&text))
            .await
            .map_err(|e| Error::Editor(format!("paste task failed: {e}")))??;

        tracing::debug!(chars = len, "text delivered to editor");
        Ok(())
    }
}

/// Keystrokes that paste the clipboard and confirm
const PASTE_AND_CONFIRM: [(Key, Direction); 4] = [
    (Key::Control, Direction::Press),
    (Key::Unicode('v'), Direction::Click),
    (Key::Control, Direction::Release),
    (Key::Return, Direction::Click),
];

/// Let the editor read the selection before the clipboard owner drops
const CLIPBOARD_HOLD: Duration = Duration::from_millis(200);

fn paste_and_confirm(text: &str) -> Result<()> {
    let mut clipboard =
        Clipboard::new().map_err(|e| Error::Editor(format!("failed to open clipboard: {e}")))?;
    clipboard
        .set_text(text)
        .map_err(|e| Error::Editor(format!("failed to copy text: {e}")))?;

    let mut enigo = Enigo::new(&Settings::default())
        .map_err(|e| Error::Editor(format!("failed to init keyboard: {e}")))?;
    for (key, direction) in PASTE_AND_CONFIRM {
        enigo
            .key(key, direction)
            .map_err(|e| Error::Editor(format!("failed to press {key:?}: {e}")))?;
    }

    // X11 clipboards are served by the owning process
    std::thread::sleep(CLIPBOARD_HOLD);
    drop(clipboard);
    Ok(())
}

/// Deliver text and log failure instead of returning it
pub async fn deliver_logged(editor: &Arc<dyn Editor>, text: &str) {
    if let Err(e) = editor.deliver_text(text).await {
        tracing::warn!(error = %e, "editor delivery failed");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::executor::{CommandOutput, CommandRunner};

    struct RecordingRunner {
        commands: Mutex<Vec<String>>,
        exit_code: i32,
    }

    #[async_trait]
    impl CommandRunner for RecordingRunner {
        async fn run(&self, command: &str) -> Result<CommandOutput> {
            self.commands.lock().unwrap().push(command.to_string());
            Ok(CommandOutput {
                exit_code: self.exit_code,
                stdout: String::new(),
                stderr: "editor not installed".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn test_focus_launches_detached() {
        let runner = Arc::new(RecordingRunner {
            commands: Mutex::new(Vec::new()),
            exit_code: 0,
        });
        let editor = DesktopEditor::new(
            CommandExecutor::new(runner.clone()),
            "code ",
            Duration::ZERO,
        );

        editor.focus().await.unwrap();

        assert_eq!(*runner.commands.lock().unwrap(), vec!["code >/dev/null 2>&1 &".to_string()]);
    }

    #[tokio::test]
    async fn test_focus_failure_is_editor_error() {
        let runner = Arc::new(RecordingRunner {
            commands: Mutex::new(Vec::new()),
            exit_code: 127,
        });
        let editor = DesktopEditor::new(CommandExecutor::new(runner), "code", Duration::ZERO);

        let err = editor.focus().await.unwrap_err();

        assert!(matches!(err, Error::Editor(msg) if msg == "Error: editor not installed"));
    }

    #[test]
    fn test_paste_chord_releases_control_before_confirm() {
        assert_eq!(
            PASTE_AND_CONFIRM,
            [
                (Key::Control, Direction::Press),
                (Key::Unicode('v'), Direction::Click),
                (Key::Control, Direction::Release),
                (Key::Return, Direction::Click),
            ]
        );
    }
}
