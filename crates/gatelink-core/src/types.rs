// ABOUTME: Core data types shared by the transport and the panel
// ABOUTME: Role, ChatMessage, and parsing of remote history entries

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Role in a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    fn parse(role: &str) -> Option<Self> {
        match role {
            "user" => Some(Role::User),
            "assistant" => Some(Role::Assistant),
            "system" => Some(Role::System),
            _ => None,
        }
    }
}

/// A message in the transcript. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    /// Display text; structured content is flattened at parse time
    pub content: String,
    /// RFC 3339 timestamp
    pub timestamp: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: now_timestamp(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Same author and same text, ignoring timestamps.
    pub fn same_content(&self, other: &ChatMessage) -> bool {
        self.role == other.role && self.content == other.content
    }

    /// Parse one entry of a `sessions_history` response.
    ///
    /// Returns `None` for entries with an unknown role or no displayable text
    /// (e.g. a turn that only carried thinking or tool calls).
    pub fn from_history_entry(entry: &Value) -> Option<Self> {
        let role = Role::parse(entry.get("role")?.as_str()?)?;
        let content = flatten_content(entry.get("content")?)?;
        if content.is_empty() {
            return None;
        }

        let timestamp = entry
            .get("timestamp")
            .and_then(parse_timestamp)
            .unwrap_or_else(now_timestamp);

        Some(Self {
            role,
            content,
            timestamp,
        })
    }
}

/// A typed content block as sent by the gateway.
#[derive(Debug, Clone, Deserialize)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: Option<String>,
}

/// Flatten a string or array of content blocks into display text.
///
/// Only `text` blocks contribute, in order, joined by a blank line.
pub fn flatten_content(content: &Value) -> Option<String> {
    match content {
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => {
            let texts: Vec<String> = items
                .iter()
                .filter_map(|item| serde_json::from_value::<ContentBlock>(item.clone()).ok())
                .filter(|block| block.kind == "text")
                .filter_map(|block| block.text)
                .collect();
            Some(texts.join("\n\n"))
        }
        _ => None,
    }
}

fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_timestamp(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc).to_rfc3339_opts(SecondsFormat::Millis, true)),
        Value::Number(n) => n
            .as_i64()
            .and_then(DateTime::from_timestamp_millis)
            .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true)),
        _ => None,
    }
}
