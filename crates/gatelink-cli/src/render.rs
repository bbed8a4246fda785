// ABOUTME: Terminal rendering of transcript messages
// ABOUTME: Colored role labels and boxed code blocks

use colored::Colorize;
use gatelink_core::{ChatMessage, Role};
use gatelink_panel::presentation::{self, Segment};

/// Format one message for the terminal, ending with a newline.
pub fn message(message: &ChatMessage) -> String {
    let label = presentation::role_label(message.role);
    let label = match message.role {
        Role::User => label.blue().bold(),
        Role::Assistant => label.green().bold(),
        Role::System => label.yellow().bold(),
    };

    let mut out = format!("{label}\n");
    for segment in presentation::segments(&message.content) {
        match segment {
            Segment::Text { text } => {
                out.push_str(text.trim_matches('\n'));
                out.push('\n');
            }
            Segment::Code { block } => {
                let language = block.language.as_deref().unwrap_or("code");
                out.push_str(&format!("  {}\n", format!("┌─ {language}").dimmed()));
                for line in block.code.lines() {
                    out.push_str(&format!("  {} {}\n", "│".dimmed(), line.cyan()));
                }
                out.push_str(&format!("  {}\n", "└─".dimmed()));
            }
        }
    }
    out
}

/// Code offered by the most recent assistant message that has one.
pub fn last_apply_code(messages: &[ChatMessage]) -> Option<String> {
    presentation::render(messages)
        .into_iter()
        .rev()
        .find_map(|rendered| rendered.apply_code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_boxes_code() {
        colored::control::set_override(false);
        let text = message(&ChatMessage::assistant("Try:\n```rust\nlet x = 1;\n```"));
        assert_eq!(text, "Agent\nTry:\n  ┌─ rust\n  │ let x = 1;\n  └─\n");
    }

    #[test]
    fn test_last_apply_code_skips_user_messages() {
        let messages = vec![
            ChatMessage::assistant("```\nold\n```"),
            ChatMessage::assistant("```\nnew\n```"),
            ChatMessage::user("```\nmine\n```"),
        ];
        assert_eq!(last_apply_code(&messages).as_deref(), Some("new"));
        assert_eq!(last_apply_code(&[]), None);
    }
}
