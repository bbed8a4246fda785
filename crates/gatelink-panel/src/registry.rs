// ABOUTME: Pending tool requests awaiting user approval
// ABOUTME: Each request is keyed by a uuid and resolved exactly once through a oneshot

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use tokio::sync::oneshot;
use tracing::debug;

/// How a tool request ended.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum ToolOutcome {
    Completed { result: Value },
    Failed { error: String },
    Rejected,
}

/// A tool call the gateway asked us to run, waiting on the user.
#[derive(Debug)]
pub struct PendingToolRequest {
    pub id: String,
    pub tool_name: String,
    pub arguments: Map<String, Value>,
    responder: oneshot::Sender<ToolOutcome>,
}

impl PendingToolRequest {
    /// Consumes the request; a requester that already went away is ignored.
    pub fn resolve(self, outcome: ToolOutcome) {
        if self.responder.send(outcome).is_err() {
            debug!(id = %self.id, tool = %self.tool_name, "Tool requester dropped before resolution");
        }
    }
}

/// Requests keyed by id. Owned by the panel controller.
#[derive(Debug, Default)]
pub struct PendingTools {
    requests: HashMap<String, PendingToolRequest>,
}

impl PendingTools {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a request under a fresh id.
    pub fn register(
        &mut self,
        tool_name: &str,
        arguments: Map<String, Value>,
    ) -> (String, oneshot::Receiver<ToolOutcome>) {
        let id = uuid::Uuid::new_v4().to_string();
        let (tx, rx) = oneshot::channel();
        self.requests.insert(
            id.clone(),
            PendingToolRequest {
                id: id.clone(),
                tool_name: tool_name.to_string(),
                arguments,
                responder: tx,
            },
        );
        (id, rx)
    }

    /// Remove a request so it can be resolved. A second `take` for the same id
    /// returns `None`.
    pub fn take(&mut self, id: &str) -> Option<PendingToolRequest> {
        self.requests.remove(id)
    }

    pub fn ids(&self) -> Vec<String> {
        self.requests.keys().cloned().collect()
    }

    /// Drop every request; their receivers observe cancellation.
    pub fn clear(&mut self) {
        if !self.requests.is_empty() {
            debug!(count = self.requests.len(), "Dropping pending tool requests");
        }
        self.requests.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_resolves_exactly_once() {
        let mut pending = PendingTools::new();
        let (id, rx) = pending.register("read_file", Map::new());
        assert_eq!(pending.ids(), vec![id.clone()]);

        pending
            .take(&id)
            .unwrap()
            .resolve(ToolOutcome::Completed { result: json!("ok") });
        assert!(pending.take(&id).is_none());
        assert!(pending.ids().is_empty());
        assert_eq!(
            rx.await.unwrap(),
            ToolOutcome::Completed { result: json!("ok") }
        );
    }

    #[tokio::test]
    async fn test_clear_cancels_receivers() {
        let mut pending = PendingTools::new();
        let (_, rx) = pending.register("run_command", Map::new());
        pending.clear();
        assert!(rx.await.is_err());
    }

    #[test]
    fn test_resolve_after_receiver_dropped_is_ignored() {
        let mut pending = PendingTools::new();
        let (id, rx) = pending.register("list_files", Map::new());
        drop(rx);
        pending.take(&id).unwrap().resolve(ToolOutcome::Failed {
            error: "too late".into(),
        });
    }

    #[test]
    fn test_ids_are_unique() {
        let mut pending = PendingTools::new();
        let (a, _ra) = pending.register("read_file", Map::new());
        let (b, _rb) = pending.register("read_file", Map::new());
        assert_ne!(a, b);
        assert_eq!(pending.ids().len(), 2);
    }

    #[test]
    fn test_outcome_wire_shape() {
        assert_eq!(
            serde_json::to_value(ToolOutcome::Rejected).unwrap(),
            json!({"status": "rejected"})
        );
        assert_eq!(
            serde_json::to_value(ToolOutcome::Failed { error: "x".into() }).unwrap(),
            json!({"status": "failed", "error": "x"})
        );
    }
}
