// ABOUTME: Seams between the panel controller and whatever hosts it
// ABOUTME: An editor extension, a terminal, or a test fake implements these traits

use crate::presentation::DocumentEdit;
use crate::protocol::UiEvent;
use async_trait::async_trait;
use std::sync::Arc;

/// The rendered side of a panel.
pub trait Webview: Send + Sync {
    fn post(&self, event: UiEvent);

    /// Bring an already open panel to the front.
    fn reveal(&self);
}

/// The document the user is editing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveDocument {
    pub path: String,
    pub text: String,
}

#[async_trait]
pub trait EditorHost: Send + Sync {
    fn create_webview(&self) -> Arc<dyn Webview>;

    fn active_document(&self) -> Option<ActiveDocument>;

    /// Apply one edit to the document at `path` atomically.
    async fn apply_edit(&self, path: &str, edit: DocumentEdit) -> Result<(), String>;

    /// Notification outside the panel, used when no panel is open.
    fn show_error(&self, message: &str);

    /// Ask the user a yes/no question.
    async fn confirm(&self, prompt: &str) -> bool;
}
