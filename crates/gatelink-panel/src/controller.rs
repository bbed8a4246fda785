// ABOUTME: Session panel controller: lifecycle, transcript, polling, and command routing
// ABOUTME: All mutable state sits behind one mutex that is never held across an await

use crate::host::{EditorHost, Webview};
use crate::presentation::{plan_edit, EditError};
use crate::protocol::{UiCommand, UiEvent};
use crate::queue::QueryQueue;
use crate::registry::{PendingTools, ToolOutcome};
use gatelink_core::{
    ChatMessage, ClientEvent, CommandOutput, GatewayClient, GatewayError, LocalTool, Outbound,
    Subscription, ToolError, ToolExecutor,
};
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Observable lifecycle of the panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Closed,
    Open,
    Disposed,
}

struct OpenPanel {
    generation: u64,
    webview: Arc<dyn Webview>,
    subscription: Subscription,
    poll_task: Option<JoinHandle<()>>,
}

enum PanelState {
    Closed,
    Open(OpenPanel),
    Disposed,
}

/// One transcript line. Optimistic sends carry a local id until a history
/// snapshot replaces them.
struct Entry {
    message: ChatMessage,
    local_id: Option<u64>,
}

impl Entry {
    fn remote(message: ChatMessage) -> Self {
        Self {
            message,
            local_id: None,
        }
    }
}

struct Inner {
    state: PanelState,
    /// Bumped on every open; stale async results compare against it
    generation: u64,
    transcript: Vec<Entry>,
    next_local_id: u64,
    queue: QueryQueue,
    pending: PendingTools,
}

struct Shared {
    client: Arc<GatewayClient>,
    executor: Arc<ToolExecutor>,
    host: Arc<dyn EditorHost>,
    poll_interval: Duration,
    inner: Mutex<Inner>,
}

/// Controller for the single chat panel. Cheap to clone.
#[derive(Clone)]
pub struct PanelController {
    shared: Arc<Shared>,
}

impl PanelController {
    pub fn new(
        client: Arc<GatewayClient>,
        executor: Arc<ToolExecutor>,
        host: Arc<dyn EditorHost>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                client,
                executor,
                host,
                poll_interval: poll_interval.max(MIN_POLL_INTERVAL),
                inner: Mutex::new(Inner {
                    state: PanelState::Closed,
                    generation: 0,
                    transcript: Vec::new(),
                    next_local_id: 0,
                    queue: QueryQueue::default(),
                    pending: PendingTools::new(),
                }),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.shared.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn lifecycle(&self) -> Lifecycle {
        match self.lock().state {
            PanelState::Closed => Lifecycle::Closed,
            PanelState::Open(_) => Lifecycle::Open,
            PanelState::Disposed => Lifecycle::Disposed,
        }
    }

    pub fn is_open(&self) -> bool {
        self.lifecycle() == Lifecycle::Open
    }

    pub fn transcript(&self) -> Vec<ChatMessage> {
        self.lock()
            .transcript
            .iter()
            .map(|entry| entry.message.clone())
            .collect()
    }

    pub fn pending_tool_ids(&self) -> Vec<String> {
        self.lock().pending.ids()
    }

    pub fn queued_queries(&self) -> usize {
        self.lock().queue.len()
    }

    fn current_webview(&self) -> Option<Arc<dyn Webview>> {
        match &self.lock().state {
            PanelState::Open(open) => Some(open.webview.clone()),
            _ => None,
        }
    }

    fn webview_for(&self, generation: u64) -> Option<Arc<dyn Webview>> {
        open_webview(&self.lock(), generation)
    }

    fn post(&self, event: UiEvent) {
        if let Some(webview) = self.current_webview() {
            webview.post(event);
        }
    }

    /// Error banner in the panel, or a host notification when it is closed.
    fn report_error(&self, message: String) {
        match self.current_webview() {
            Some(webview) => webview.post(UiEvent::Error { message }),
            None => self.shared.host.show_error(&message),
        }
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Open the panel, or reveal it when already open.
    pub async fn show(&self) {
        let Some((generation, webview)) = self.open_or_reveal() else {
            return;
        };
        info!(generation, "Panel opened");

        webview.post(UiEvent::Transcript {
            messages: self.transcript(),
        });
        let _ = self.check_connection().await;

        let task = self.spawn_poll(generation);
        match &mut self.lock().state {
            PanelState::Open(open) if open.generation == generation => {
                open.poll_task = Some(task)
            }
            _ => task.abort(),
        }

        self.flush_queue(generation).await;
    }

    fn open_or_reveal(&self) -> Option<(u64, Arc<dyn Webview>)> {
        let mut inner = self.lock();
        if let PanelState::Open(open) = &inner.state {
            let webview = open.webview.clone();
            drop(inner);
            webview.reveal();
            return None;
        }

        inner.generation += 1;
        let generation = inner.generation;
        let webview = self.shared.host.create_webview();
        let subscription = self.subscribe_client(generation);
        inner.state = PanelState::Open(OpenPanel {
            generation,
            webview: webview.clone(),
            subscription,
            poll_task: None,
        });
        Some((generation, webview))
    }

    /// Close the panel: stop polling, drop subscriptions and pending tool
    /// requests. Does nothing unless the panel is open.
    pub fn dispose(&self) {
        let previous = {
            let mut inner = self.lock();
            if !matches!(inner.state, PanelState::Open(_)) {
                return;
            }
            inner.pending.clear();
            inner.transcript.clear();
            std::mem::replace(&mut inner.state, PanelState::Disposed)
        };

        if let PanelState::Open(mut open) = previous {
            if let Some(task) = open.poll_task.take() {
                task.abort();
            }
            open.subscription.unsubscribe();
            info!(generation = open.generation, "Panel disposed");
        }
    }

    fn subscribe_client(&self, generation: u64) -> Subscription {
        let weak = Arc::downgrade(&self.shared);
        self.shared.client.subscribe(move |event| {
            if let Some(shared) = weak.upgrade() {
                PanelController { shared }.on_client_event(generation, event);
            }
        })
    }

    fn on_client_event(&self, generation: u64, event: &ClientEvent) {
        match event {
            ClientEvent::Message(message) => {
                let webview = {
                    let mut inner = self.lock();
                    let Some(webview) = open_webview(&inner, generation) else {
                        return;
                    };
                    if inner
                        .transcript
                        .last()
                        .is_some_and(|last| last.message.same_content(message))
                    {
                        debug!("Echo already in transcript");
                        return;
                    }
                    inner.transcript.push(Entry::remote(message.clone()));
                    webview
                };
                webview.post(UiEvent::Message {
                    message: message.clone(),
                });
            }
            ClientEvent::Connection(state) => {
                if let Some(webview) = self.webview_for(generation) {
                    webview.post(UiEvent::Connection { state: *state });
                }
            }
        }
    }

    // ========================================================================
    // Polling
    // ========================================================================

    fn spawn_poll(&self, generation: u64) -> JoinHandle<()> {
        let weak = Arc::downgrade(&self.shared);
        let period = self.shared.poll_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(shared) = weak.upgrade() else {
                    break;
                };
                let controller = PanelController { shared };
                if !controller.poll_once(generation).await {
                    break;
                }
            }
            debug!(generation, "Poll task finished");
        })
    }

    /// Fetch one history snapshot. Returns false once the panel generation
    /// that started polling is gone.
    async fn poll_once(&self, generation: u64) -> bool {
        let history = self.shared.client.fetch_history().await;

        let webview = {
            let mut inner = self.lock();
            let Some(webview) = open_webview(&inner, generation) else {
                return false;
            };
            if history.is_empty() {
                return true;
            }
            let changed = !same_transcript(&inner.transcript, &history);
            inner.transcript = history.iter().cloned().map(Entry::remote).collect();
            if !changed {
                return true;
            }
            webview
        };

        debug!(messages = history.len(), "Transcript replaced from history");
        webview.post(UiEvent::Transcript { messages: history });
        true
    }

    // ========================================================================
    // Commands from the view
    // ========================================================================

    pub async fn handle(&self, command: UiCommand) {
        match command {
            UiCommand::Send { text } => {
                let _ = self.send(&text).await;
            }
            UiCommand::ApplyEdit { old_text, new_text } => {
                let _ = self.apply_edit(&old_text, &new_text).await;
            }
            UiCommand::CheckConnection => {
                let _ = self.check_connection().await;
            }
            UiCommand::ApproveTool { id, approved } => {
                self.approve_tool(&id, approved).await;
            }
            UiCommand::RunCommand { command, cwd } => {
                let _ = self.run_command(&command, cwd.as_deref()).await;
            }
        }
    }

    /// Send typed text. Errors are reported to the view once and returned.
    pub async fn send(&self, text: &str) -> Result<(), GatewayError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(());
        }

        let local = ChatMessage::user(text);
        let local_id = {
            let mut inner = self.lock();
            inner.next_local_id += 1;
            let id = inner.next_local_id;
            inner.transcript.push(Entry {
                message: local.clone(),
                local_id: Some(id),
            });
            id
        };
        self.post(UiEvent::Message {
            message: local.clone(),
        });

        let appendix = self.resolve_mentions(text).await;
        let file_context = self.shared.host.active_document().map(|doc| doc.path);
        let outbound = Outbound::new(text)
            .with_file_context(file_context)
            .with_appendix(appendix);

        self.post(UiEvent::Sending { active: true });
        let result = self.shared.client.send_message(&outbound).await;
        self.post(UiEvent::Sending { active: false });

        if let Err(e) = &result {
            self.retract(local_id);
            self.report_error(e.to_string());
        }
        result
    }

    /// Remove an optimistic message whose delivery failed. Nothing to do
    /// when a history snapshot already replaced it.
    fn retract(&self, local_id: u64) {
        let transcript = {
            let mut inner = self.lock();
            let Some(index) = inner
                .transcript
                .iter()
                .position(|entry| entry.local_id == Some(local_id))
            else {
                debug!(local_id, "Optimistic message already replaced");
                return;
            };
            inner.transcript.remove(index);
            inner
                .transcript
                .iter()
                .map(|entry| entry.message.clone())
                .collect()
        };
        self.post(UiEvent::Transcript {
            messages: transcript,
        });
    }

    /// Contents of `@path` mentions inside the workspace, as an appendix.
    async fn resolve_mentions(&self, text: &str) -> Option<String> {
        let mut appendix = String::new();
        for path in mentions(text) {
            match self.shared.executor.read_file(&path).await {
                Ok(content) => {
                    appendix.push_str(&format!("\n\n--- {path} ---\n```\n{content}\n```"));
                }
                Err(e) => debug!(path = %path, error = %e, "Skipping unresolved mention"),
            }
        }
        (!appendix.is_empty()).then_some(appendix)
    }

    pub async fn apply_edit(&self, old_text: &str, new_text: &str) -> Result<(), EditError> {
        let result = self.try_apply_edit(old_text, new_text).await;
        if let Err(e) = &result {
            warn!(error = %e, "Apply edit failed");
            self.report_error(e.to_string());
        }
        result
    }

    async fn try_apply_edit(&self, old_text: &str, new_text: &str) -> Result<(), EditError> {
        let document = self
            .shared
            .host
            .active_document()
            .ok_or(EditError::NoActiveDocument)?;
        let edit = plan_edit(&document.text, old_text, new_text)?;
        self.shared
            .host
            .apply_edit(&document.path, edit)
            .await
            .map_err(EditError::Rejected)?;

        info!(path = %document.path, "Edit applied");
        self.post(UiEvent::EditApplied {
            path: document.path,
        });
        Ok(())
    }

    /// Probe the gateway. The state change reaches the view through the
    /// client subscription; failures also raise the error banner.
    pub async fn check_connection(&self) -> Result<(), GatewayError> {
        let result = self.shared.client.test_connection().await;
        if let Err(e) = &result {
            self.report_error(e.to_string());
        }
        result
    }

    // ========================================================================
    // Tools
    // ========================================================================

    /// Ask the user to approve a gateway-initiated tool call. With no open
    /// panel the request is rejected immediately.
    pub fn request_tool(
        &self,
        tool_name: &str,
        arguments: Map<String, Value>,
    ) -> oneshot::Receiver<ToolOutcome> {
        let mut inner = self.lock();
        let webview = match &inner.state {
            PanelState::Open(open) => Some(open.webview.clone()),
            _ => None,
        };
        let Some(webview) = webview else {
            drop(inner);
            warn!(tool = %tool_name, "Tool request with no open panel, rejecting");
            let (tx, rx) = oneshot::channel();
            let _ = tx.send(ToolOutcome::Rejected);
            return rx;
        };

        let (id, rx) = inner.pending.register(tool_name, arguments.clone());
        drop(inner);

        info!(id = %id, tool = %tool_name, "Tool approval requested");
        webview.post(UiEvent::ToolRequest {
            id,
            tool: tool_name.to_string(),
            arguments,
        });
        rx
    }

    /// Resolve a pending tool request. Unknown or already resolved ids are
    /// ignored and return `None`.
    pub async fn approve_tool(&self, id: &str, approved: bool) -> Option<ToolOutcome> {
        let request = self.lock().pending.take(id);
        let Some(request) = request else {
            debug!(id = %id, "No pending tool request");
            return None;
        };

        let outcome = if approved {
            info!(id = %id, tool = %request.tool_name, "Tool approved");
            self.run_tool(&request.tool_name, &request.arguments).await
        } else {
            info!(id = %id, tool = %request.tool_name, "Tool rejected");
            ToolOutcome::Rejected
        };

        request.resolve(outcome.clone());
        self.post(UiEvent::ToolResolved {
            id: id.to_string(),
            outcome: outcome.clone(),
        });
        Some(outcome)
    }

    async fn run_tool(&self, name: &str, arguments: &Map<String, Value>) -> ToolOutcome {
        let tool = match LocalTool::from_request(name, arguments) {
            Ok(tool) => tool,
            Err(e) => return ToolOutcome::Failed { error: e.to_string() },
        };
        match self.shared.executor.execute(tool).await {
            Ok(result) => ToolOutcome::Completed { result },
            Err(e) => ToolOutcome::Failed { error: e.to_string() },
        }
    }

    /// Run a shell command after the user confirms it.
    pub async fn run_command(
        &self,
        command: &str,
        cwd: Option<&str>,
    ) -> Result<CommandOutput, ToolError> {
        let root = self
            .shared
            .executor
            .root()
            .map(|r| r.display().to_string())
            .unwrap_or_else(|| "(no workspace)".to_string());
        let prompt = format!(
            "Allow running `{command}` in `{}` under {root}?",
            cwd.unwrap_or(".")
        );

        let result = if self.shared.host.confirm(&prompt).await {
            self.shared.executor.run_command(command, cwd).await
        } else {
            info!(command = %command, "Command denied by user");
            Err(ToolError::Denied(command.to_string()))
        };

        let (output, error) = match &result {
            Ok(output) => (Some(output.clone()), None),
            Err(e) => (None, Some(e.to_string())),
        };
        self.post(UiEvent::CommandResult {
            command: command.to_string(),
            output,
            error,
        });
        result
    }

    // ========================================================================
    // Queued queries
    // ========================================================================

    /// Deliver a query now if the panel is open, otherwise hold it until the
    /// next `show()`.
    pub async fn submit_query(&self, query: String) {
        if self.is_open() {
            self.post(UiEvent::QueuedQuery {
                text: query.clone(),
            });
            let _ = self.send(&query).await;
        } else {
            debug!("Queueing query until the panel opens");
            self.lock().queue.push(query);
        }
    }

    async fn flush_queue(&self, generation: u64) {
        loop {
            let next = {
                let mut inner = self.lock();
                if open_webview(&inner, generation).is_none() {
                    return;
                }
                inner.queue.pop()
            };
            let Some(query) = next else {
                break;
            };
            self.post(UiEvent::QueuedQuery {
                text: query.clone(),
            });
            let _ = self.send(&query).await;
        }
    }
}

fn open_webview(inner: &Inner, generation: u64) -> Option<Arc<dyn Webview>> {
    match &inner.state {
        PanelState::Open(open) if open.generation == generation => Some(open.webview.clone()),
        _ => None,
    }
}

fn same_transcript(entries: &[Entry], messages: &[ChatMessage]) -> bool {
    entries.len() == messages.len()
        && entries
            .iter()
            .zip(messages)
            .all(|(entry, message)| entry.message.same_content(message))
}

fn mention_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?:^|\s)@([\w./-]+)").expect("mention pattern is valid"))
}

/// Distinct `@path` tokens in order of appearance.
pub fn mentions(text: &str) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    for captures in mention_pattern().captures_iter(text) {
        let token = captures[1].trim_end_matches('.');
        if !token.is_empty() && !found.iter().any(|t| t == token) {
            found.push(token.to_string());
        }
    }
    found
}
