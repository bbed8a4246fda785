// ABOUTME: Library root for gatelink-panel
// ABOUTME: Panel controller, host traits, view protocol, and transcript presentation

pub mod context;
pub mod controller;
pub mod host;
pub mod presentation;
pub mod protocol;
mod queue;
pub mod registry;

pub use context::AppContext;
pub use controller::{Lifecycle, PanelController, DEFAULT_POLL_INTERVAL};
pub use host::{ActiveDocument, EditorHost, Webview};
pub use presentation::{CodeBlock, DocumentEdit, EditError, RenderedMessage, Segment};
pub use protocol::{UiCommand, UiEvent};
pub use registry::{PendingToolRequest, PendingTools, ToolOutcome};
