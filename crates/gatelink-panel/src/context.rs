// ABOUTME: Application context owning the client, executor, and panel for one host
// ABOUTME: Editor commands and settings changes go through here

use crate::controller::PanelController;
use crate::host::EditorHost;
use gatelink_core::{ConnectionConfig, GatewayClient, GatewayError, Settings, ToolExecutor};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub struct AppContext {
    client: Arc<GatewayClient>,
    executor: Arc<ToolExecutor>,
    panel: PanelController,
    host: Arc<dyn EditorHost>,
}

impl AppContext {
    /// Build the client (and its send strategy), executor, and panel.
    pub fn new(
        settings: &Settings,
        host: Arc<dyn EditorHost>,
        workspace: Option<PathBuf>,
    ) -> Result<Self, GatewayError> {
        let client = Arc::new(GatewayClient::from_settings(settings)?);
        let executor = Arc::new(ToolExecutor::new(workspace));
        let panel = PanelController::new(
            client.clone(),
            executor.clone(),
            host.clone(),
            Duration::from_secs(settings.panel.poll_interval_secs),
        );

        info!(
            configured = client.is_configured(),
            workspace = ?executor.root(),
            "Gatelink context ready"
        );

        Ok(Self {
            client,
            executor,
            panel,
            host,
        })
    }

    pub fn client(&self) -> &Arc<GatewayClient> {
        &self.client
    }

    pub fn executor(&self) -> &Arc<ToolExecutor> {
        &self.executor
    }

    pub fn panel(&self) -> &PanelController {
        &self.panel
    }

    /// Re-resolve the connection config. The send strategy keeps the kind it
    /// was built with.
    pub fn settings_changed(&self, settings: &Settings) {
        self.client.reload(ConnectionConfig::resolve(settings));
    }

    pub async fn open_panel(&self) {
        self.panel.show().await;
    }

    /// Ask a question from outside the panel. Queued until the panel is open.
    pub async fn ask(&self, query: impl Into<String>) {
        self.panel.submit_query(query.into()).await;
        self.panel.show().await;
    }

    pub async fn ask_about_selection(&self, selection: &str, file: &str) {
        if selection.trim().is_empty() {
            warn!("Ask about selection with nothing selected");
            self.host.show_error("Select some code first");
            return;
        }
        self.ask(selection_query(selection, file)).await;
    }

    pub async fn check_connection(&self) -> Result<(), GatewayError> {
        self.panel.check_connection().await
    }

    pub fn deactivate(&self) {
        self.panel.dispose();
    }
}

pub fn selection_query(selection: &str, file: &str) -> String {
    format!("Explain this code from {file}:\n```\n{selection}\n```")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selection_query_format() {
        assert_eq!(
            selection_query("let x = 1;", "src/main.rs"),
            "Explain this code from src/main.rs:\n```\nlet x = 1;\n```"
        );
    }
}
