// ABOUTME: Messages exchanged between the panel controller and its webview
// ABOUTME: UiCommand flows in from the view, UiEvent flows out to it

use crate::registry::ToolOutcome;
use gatelink_core::{ChatMessage, CommandOutput, ConnectionState};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Commands sent by the view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum UiCommand {
    Send {
        text: String,
    },
    #[serde(rename_all = "camelCase")]
    ApplyEdit {
        old_text: String,
        new_text: String,
    },
    CheckConnection,
    ApproveTool {
        id: String,
        approved: bool,
    },
    RunCommand {
        command: String,
        #[serde(default)]
        cwd: Option<String>,
    },
}

/// Events posted to the view.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum UiEvent {
    /// Full transcript replacement
    Transcript { messages: Vec<ChatMessage> },
    /// One message appended to the transcript
    Message { message: ChatMessage },
    Sending { active: bool },
    Connection { state: ConnectionState },
    Error { message: String },
    ToolRequest {
        id: String,
        tool: String,
        arguments: Map<String, Value>,
    },
    ToolResolved { id: String, outcome: ToolOutcome },
    QueuedQuery { text: String },
    CommandResult {
        command: String,
        output: Option<CommandOutput>,
        error: Option<String>,
    },
    EditApplied { path: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_command_wire_format() {
        let cmd: UiCommand = serde_json::from_value(json!({
            "type": "applyEdit",
            "oldText": "a",
            "newText": "b"
        }))
        .unwrap();
        assert_eq!(
            cmd,
            UiCommand::ApplyEdit {
                old_text: "a".into(),
                new_text: "b".into()
            }
        );

        let cmd: UiCommand =
            serde_json::from_value(json!({"type": "runCommand", "command": "ls"})).unwrap();
        assert_eq!(
            cmd,
            UiCommand::RunCommand {
                command: "ls".into(),
                cwd: None
            }
        );

        let cmd: UiCommand = serde_json::from_value(json!({"type": "checkConnection"})).unwrap();
        assert_eq!(cmd, UiCommand::CheckConnection);
    }

    #[test]
    fn test_unknown_command_is_rejected() {
        let result = serde_json::from_value::<UiCommand>(json!({"type": "format"}));
        assert!(result.is_err());
    }

    #[test]
    fn test_event_wire_format() {
        let event = UiEvent::Connection {
            state: ConnectionState::Connected,
        };
        assert_eq!(
            serde_json::to_value(event).unwrap(),
            json!({"type": "connection", "state": "connected"})
        );
        assert_eq!(
            serde_json::to_value(UiEvent::Sending { active: true }).unwrap(),
            json!({"type": "sending", "active": true})
        );
    }
}
