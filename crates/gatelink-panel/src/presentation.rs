// ABOUTME: Transcript rendering helpers: fenced code detection and Apply-Edit planning
// ABOUTME: Pure functions over message text, shared by every host

use gatelink_core::{ChatMessage, Role};
use serde::Serialize;
use std::ops::Range;
use thiserror::Error;

const FENCE: &str = "```";

/// A fenced code region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CodeBlock {
    pub language: Option<String>,
    pub code: String,
}

/// Piece of a message as rendered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Segment {
    Text { text: String },
    Code { block: CodeBlock },
}

/// A transcript entry ready for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedMessage {
    pub role: Role,
    pub label: &'static str,
    pub segments: Vec<Segment>,
    /// Code offered by the Apply-Edit action, when the message shows it
    pub apply_code: Option<String>,
}

/// A single replacement of a byte range in a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentEdit {
    pub range: Range<usize>,
    pub new_text: String,
}

impl DocumentEdit {
    /// The document text after this edit.
    pub fn apply_to(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len() + self.new_text.len());
        out.push_str(&text[..self.range.start]);
        out.push_str(&self.new_text);
        out.push_str(&text[self.range.end..]);
        out
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EditError {
    #[error("No active editor")]
    NoActiveDocument,

    #[error("Could not find the text to replace in the active document")]
    NotFound,

    #[error("Edit was rejected: {0}")]
    Rejected(String),
}

/// First complete fenced region in `text`. An unterminated opener counts as absent.
pub fn extract_code_block(text: &str) -> Option<CodeBlock> {
    let (_, body, _) = split_first_fence(text)?;
    Some(parse_fence_body(body))
}

/// Split `text` into prose and code segments.
pub fn segments(text: &str) -> Vec<Segment> {
    let mut out = Vec::new();
    let mut rest = text;

    while let Some((before, body, after)) = split_first_fence(rest) {
        if !before.trim().is_empty() {
            out.push(Segment::Text {
                text: before.to_string(),
            });
        }
        out.push(Segment::Code {
            block: parse_fence_body(body),
        });
        rest = after;
    }

    if !rest.trim().is_empty() {
        out.push(Segment::Text {
            text: rest.to_string(),
        });
    }
    out
}

/// Only assistant messages with a complete fence offer Apply-Edit.
pub fn shows_apply_action(message: &ChatMessage) -> bool {
    message.role == Role::Assistant && split_first_fence(&message.content).is_some()
}

pub fn role_label(role: Role) -> &'static str {
    match role {
        Role::User => "You",
        Role::Assistant => "Agent",
        Role::System => "System",
    }
}

pub fn render(messages: &[ChatMessage]) -> Vec<RenderedMessage> {
    messages
        .iter()
        .map(|message| RenderedMessage {
            role: message.role,
            label: role_label(message.role),
            segments: segments(&message.content),
            apply_code: shows_apply_action(message)
                .then(|| extract_code_block(&message.content))
                .flatten()
                .map(|block| block.code),
        })
        .collect()
}

/// Plan replacing the first exact match of `old_text` in `document`.
pub fn plan_edit(document: &str, old_text: &str, new_text: &str) -> Result<DocumentEdit, EditError> {
    if old_text.is_empty() {
        return Err(EditError::NotFound);
    }
    let start = document.find(old_text).ok_or(EditError::NotFound)?;
    Ok(DocumentEdit {
        range: start..start + old_text.len(),
        new_text: new_text.to_string(),
    })
}

/// `(before, body, after)` around the first complete fence pair.
fn split_first_fence(text: &str) -> Option<(&str, &str, &str)> {
    let open = text.find(FENCE)?;
    let body_start = open + FENCE.len();
    let close = body_start + text[body_start..].find(FENCE)?;
    Some((
        &text[..open],
        &text[body_start..close],
        &text[close + FENCE.len()..],
    ))
}

fn parse_fence_body(body: &str) -> CodeBlock {
    let (language, code) = match body.split_once('\n') {
        Some((first, rest)) if is_language_tag(first) => {
            let tag = first.trim();
            ((!tag.is_empty()).then(|| tag.to_string()), rest)
        }
        _ => (None, body),
    };
    CodeBlock {
        language,
        code: code.strip_suffix('\n').unwrap_or(code).to_string(),
    }
}

fn is_language_tag(line: &str) -> bool {
    line.trim()
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '+' | '#' | '-' | '_' | '.'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_strips_language_tag() {
        let block = extract_code_block("Try this:\n```rust\nfn main() {}\n```\nthanks").unwrap();
        assert_eq!(block.language.as_deref(), Some("rust"));
        assert_eq!(block.code, "fn main() {}");
    }

    #[test]
    fn test_extract_without_language() {
        let block = extract_code_block("```\nlet x = 1;\n```").unwrap();
        assert_eq!(block.language, None);
        assert_eq!(block.code, "let x = 1;");
    }

    #[test]
    fn test_extract_first_block_only() {
        let block = extract_code_block("```a\none\n```\n```b\ntwo\n```").unwrap();
        assert_eq!(block.code, "one");
    }

    #[test]
    fn test_unterminated_fence_is_absent() {
        assert_eq!(extract_code_block("```rust\nfn half("), None);
        assert_eq!(
            segments("see ```rust\nfn half("),
            vec![Segment::Text {
                text: "see ```rust\nfn half(".into()
            }]
        );
    }

    #[test]
    fn test_first_line_with_spaces_is_code() {
        let block = extract_code_block("```\nlet a = 1;\n```").unwrap();
        assert_eq!(block.code, "let a = 1;");
        let block = extract_code_block("```let a = 1;\nlet b = 2;\n```").unwrap();
        assert_eq!(block.language, None);
        assert_eq!(block.code, "let a = 1;\nlet b = 2;");
    }

    #[test]
    fn test_segments_mix() {
        let parts = segments("before\n```sh\nls\n```\nafter");
        assert_eq!(parts.len(), 3);
        assert!(matches!(&parts[1], Segment::Code { block } if block.code == "ls"));
        assert!(matches!(&parts[2], Segment::Text { text } if text == "\nafter"));
    }

    #[test]
    fn test_apply_action_only_for_assistant() {
        let text = "```\nx\n```";
        assert!(shows_apply_action(&ChatMessage::assistant(text)));
        assert!(!shows_apply_action(&ChatMessage::user(text)));
        assert!(!shows_apply_action(&ChatMessage::assistant("no code here")));
        assert!(!shows_apply_action(&ChatMessage::assistant("```\nopen")));
    }

    #[test]
    fn test_render_sets_apply_code() {
        let rendered = render(&[
            ChatMessage::user("fix it"),
            ChatMessage::assistant("Here:\n```js\nconst a = 1;\n```"),
        ]);
        assert_eq!(rendered[0].label, "You");
        assert_eq!(rendered[0].apply_code, None);
        assert_eq!(rendered[1].apply_code.as_deref(), Some("const a = 1;"));
    }

    #[test]
    fn test_plan_edit_first_match() {
        let doc = "a = 1\nb = 2\na = 1\n";
        let edit = plan_edit(doc, "a = 1", "a = 10").unwrap();
        assert_eq!(edit.range, 0..5);
        assert_eq!(edit.apply_to(doc), "a = 10\nb = 2\na = 1\n");
    }

    #[test]
    fn test_plan_edit_not_found() {
        assert_eq!(plan_edit("abc", "xyz", "q"), Err(EditError::NotFound));
        assert_eq!(plan_edit("abc", "", "q"), Err(EditError::NotFound));
    }
}
