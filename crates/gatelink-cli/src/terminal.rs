// ABOUTME: Terminal implementations of the panel host traits
// ABOUTME: Prints UiEvents to stdout and asks confirmations with dialoguer

use crate::render;
use async_trait::async_trait;
use colored::Colorize;
use gatelink_core::{ChatMessage, ConnectionState};
use gatelink_panel::{ActiveDocument, DocumentEdit, EditorHost, ToolOutcome, UiEvent, Webview};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::warn;

/// Prints panel events. Tracks what was already printed so transcript
/// snapshots only show new messages.
#[derive(Default)]
pub struct TerminalView {
    printed: Mutex<Vec<ChatMessage>>,
}

impl TerminalView {
    fn print_transcript(&self, messages: &[ChatMessage]) {
        let mut printed = self.printed.lock().unwrap_or_else(|e| e.into_inner());
        let is_prefix = printed.len() <= messages.len()
            && printed
                .iter()
                .zip(messages)
                .all(|(a, b)| a.same_content(b));

        let start = if is_prefix {
            printed.len()
        } else {
            println!("{}", "── transcript ──".dimmed());
            0
        };
        for message in &messages[start..] {
            print!("{}", render::message(message));
        }
        *printed = messages.to_vec();
    }

    fn print_message(&self, message: &ChatMessage) {
        print!("{}", render::message(message));
        self.printed
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(message.clone());
    }
}

impl Webview for TerminalView {
    fn post(&self, event: UiEvent) {
        match event {
            UiEvent::Transcript { messages } => self.print_transcript(&messages),
            UiEvent::Message { message } => self.print_message(&message),
            UiEvent::Sending { active } => {
                if active {
                    println!("{}", "sending...".dimmed());
                }
            }
            UiEvent::Connection { state } => println!("{}", connection_line(state)),
            UiEvent::Error { message } => println!("{} {}", "error:".red().bold(), message),
            UiEvent::ToolRequest {
                id,
                tool,
                arguments,
            } => {
                let args = serde_json::to_string_pretty(&arguments)
                    .unwrap_or_else(|_| format!("{arguments:?}"));
                println!("{} {}", "Tool approval required:".yellow().bold(), tool.bold());
                println!("{args}");
                println!(
                    "  {} /approve {id}   /deny {id}",
                    "reply with".dimmed()
                );
            }
            UiEvent::ToolResolved { id, outcome } => match outcome {
                ToolOutcome::Completed { result } => {
                    println!("{} tool {id}", "completed".green().bold());
                    match result {
                        serde_json::Value::String(text) => println!("{text}"),
                        other => println!("{other}"),
                    }
                }
                ToolOutcome::Failed { error } => {
                    println!("{} tool {id}: {error}", "failed".red().bold())
                }
                ToolOutcome::Rejected => println!("{} tool {id}", "rejected".yellow()),
            },
            UiEvent::QueuedQuery { text } => println!("{} {}", "»".dimmed(), text.dimmed()),
            UiEvent::CommandResult {
                command,
                output,
                error,
            } => {
                println!("{} {}", "$".dimmed(), command.bold());
                if let Some(output) = output {
                    print!("{}", output.stdout);
                    if !output.stderr.is_empty() {
                        print!("{}", output.stderr.red());
                    }
                }
                if let Some(error) = error {
                    println!("{} {}", "error:".red().bold(), error);
                }
            }
            UiEvent::EditApplied { path } => println!("{} {}", "applied edit to".green(), path),
        }
    }

    fn reveal(&self) {}
}

pub fn connection_line(state: ConnectionState) -> String {
    match state {
        ConnectionState::Connected => format!("{} {}", "●".green(), state),
        ConnectionState::Disconnected => format!("{} {}", "●".red(), state),
        ConnectionState::Unconfigured => format!("{} {}", "○".yellow(), state),
    }
}

/// Host whose "active document" is a file named on the command line.
pub struct TerminalHost {
    file: Option<PathBuf>,
}

impl TerminalHost {
    pub fn new(file: Option<PathBuf>) -> Self {
        Self { file }
    }
}

#[async_trait]
impl EditorHost for TerminalHost {
    fn create_webview(&self) -> Arc<dyn Webview> {
        Arc::new(TerminalView::default())
    }

    fn active_document(&self) -> Option<ActiveDocument> {
        let file = self.file.as_ref()?;
        match std::fs::read_to_string(file) {
            Ok(text) => Some(ActiveDocument {
                path: file.display().to_string(),
                text,
            }),
            Err(e) => {
                warn!(file = %file.display(), error = %e, "Active file unreadable");
                None
            }
        }
    }

    async fn apply_edit(&self, path: &str, edit: DocumentEdit) -> Result<(), String> {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| format!("{path}: {e}"))?;
        if text.get(edit.range.clone()).is_none() {
            return Err(format!("{path} changed since the edit was planned"));
        }
        tokio::fs::write(path, edit.apply_to(&text))
            .await
            .map_err(|e| format!("{path}: {e}"))
    }

    fn show_error(&self, message: &str) {
        eprintln!("{} {}", "error:".red().bold(), message);
    }

    async fn confirm(&self, prompt: &str) -> bool {
        let prompt = prompt.to_string();
        let answer = tokio::task::spawn_blocking(move || {
            dialoguer::Confirm::new()
                .with_prompt(prompt)
                .default(false)
                .interact()
        })
        .await;

        match answer {
            Ok(Ok(allowed)) => allowed,
            Ok(Err(e)) => {
                warn!(error = %e, "Confirmation prompt failed, denying");
                false
            }
            Err(e) => {
                warn!(error = %e, "Confirmation task failed, denying");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_active_document_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "fn main() {{}}").unwrap();

        let host = TerminalHost::new(Some(file.path().to_path_buf()));
        let doc = host.active_document().unwrap();
        assert_eq!(doc.text, "fn main() {}");

        assert!(TerminalHost::new(None).active_document().is_none());
    }

    #[tokio::test]
    async fn test_apply_edit_rewrites_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lib.rs");
        std::fs::write(&path, "let a = 1;\n").unwrap();

        let host = TerminalHost::new(Some(path.clone()));
        let doc = host.active_document().unwrap();
        let edit = gatelink_panel::presentation::plan_edit(&doc.text, "1", "2").unwrap();
        host.apply_edit(&doc.path, edit).await.unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "let a = 2;\n");
    }

    #[test]
    fn test_transcript_prefix_tracking() {
        let view = TerminalView::default();
        let first = vec![ChatMessage::user("a")];
        view.post(UiEvent::Transcript {
            messages: first.clone(),
        });
        let mut second = first;
        second.push(ChatMessage::assistant("b"));
        view.post(UiEvent::Transcript { messages: second });
        assert_eq!(view.printed.lock().unwrap().len(), 2);
    }
}
