// ABOUTME: Gateway client combining the invoke path, send strategy, and connection state
// ABOUTME: Every operation returns a value; failures downgrade state instead of throwing

use crate::config::{ConnectionConfig, ConnectionState};
use crate::error::GatewayError;
use crate::invoke::{is_unreachable_message, Invoker, DEFAULT_INVOKE_TIMEOUT_SECS};
use crate::observer::{Observers, Subscription};
use crate::send::{CliSend, CliSendConfig, InvokeSend, SendStrategy};
use crate::settings::{SendStrategyKind, Settings};
use crate::types::ChatMessage;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use tracing::{debug, info, warn};

/// Number of history entries requested per poll.
pub const HISTORY_LIMIT: u32 = 50;

/// Events published to client observers.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// A locally sent message, echoed once delivery succeeded
    Message(ChatMessage),
    /// Connection state changed (or was re-probed)
    Connection(ConnectionState),
}

/// An outbound message: what the user typed plus anything appended for the agent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Outbound {
    /// Text as typed; this is what the local echo shows
    pub text: String,
    /// File the user is working on, sent as a `[Working on file: X]` marker
    pub file_context: Option<String>,
    /// Extra context appended after the text (e.g. referenced file contents)
    pub appendix: Option<String>,
}

impl Outbound {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn with_file_context(mut self, file: Option<String>) -> Self {
        self.file_context = file;
        self
    }

    pub fn with_appendix(mut self, appendix: Option<String>) -> Self {
        self.appendix = appendix.filter(|a| !a.is_empty());
        self
    }

    /// Text as delivered to the gateway.
    pub fn wire_text(&self) -> String {
        let mut wire = String::new();
        if let Some(file) = &self.file_context {
            wire.push_str(&format!("[Working on file: {file}]\n\n"));
        }
        wire.push_str(&self.text);
        if let Some(appendix) = &self.appendix {
            wire.push_str(appendix);
        }
        wire
    }
}

/// Client for one gateway session.
pub struct GatewayClient {
    invoker: Invoker,
    sender: Arc<dyn SendStrategy>,
    config: RwLock<Arc<ConnectionConfig>>,
    reachable: AtomicBool,
    observers: Observers<ClientEvent>,
}

impl GatewayClient {
    pub fn new(config: ConnectionConfig, invoker: Invoker, sender: Arc<dyn SendStrategy>) -> Self {
        Self {
            invoker,
            sender,
            config: RwLock::new(Arc::new(config)),
            reachable: AtomicBool::new(false),
            observers: Observers::new(),
        }
    }

    /// Build a client and its send strategy from a settings store.
    pub fn from_settings(settings: &Settings) -> Result<Self, GatewayError> {
        let invoker = Invoker::new(DEFAULT_INVOKE_TIMEOUT_SECS)?;
        let sender: Arc<dyn SendStrategy> = match settings.send.strategy {
            SendStrategyKind::Invoke => Arc::new(InvokeSend::new(
                Invoker::new(settings.send.timeout_secs)?,
                settings.send.reply_timeout_secs,
            )),
            SendStrategyKind::Cli => Arc::new(CliSend::new(CliSendConfig {
                binary: settings.send.cli_binary.clone(),
                timeout_secs: settings.send.timeout_secs,
            })),
        };
        info!(strategy = sender.name(), "Send strategy selected");

        Ok(Self::new(ConnectionConfig::resolve(settings), invoker, sender))
    }

    /// Current config snapshot.
    pub fn config(&self) -> Arc<ConnectionConfig> {
        self.config
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Replace the config wholesale and forget the last probe result.
    pub fn reload(&self, config: ConnectionConfig) {
        info!(
            gateway = %config.gateway_url,
            session_key = %config.session_key,
            configured = config.is_configured(),
            "Gateway config reloaded"
        );
        *self.config.write().unwrap_or_else(|e| e.into_inner()) = Arc::new(config);
        self.reachable.store(false, Ordering::SeqCst);
        self.observers
            .emit(&ClientEvent::Connection(self.state()));
    }

    pub fn is_configured(&self) -> bool {
        self.config().is_configured()
    }

    pub fn state(&self) -> ConnectionState {
        ConnectionState::derive(&self.config(), self.reachable.load(Ordering::SeqCst))
    }

    pub fn send_strategy(&self) -> &'static str {
        self.sender.name()
    }

    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&ClientEvent) + Send + Sync + 'static,
    {
        self.observers.subscribe(callback)
    }

    /// Record a probe result, notifying observers when the state changes or
    /// when `always_emit` is set.
    fn set_reachable(&self, ok: bool, always_emit: bool) {
        let previous = self.reachable.swap(ok, Ordering::SeqCst);
        if previous != ok || always_emit {
            self.observers
                .emit(&ClientEvent::Connection(self.state()));
        }
    }

    /// Invoke a gateway tool with the current config.
    pub async fn invoke(&self, tool: &str, args: Value) -> Result<Value, GatewayError> {
        let config = self.config();
        let result = self.invoker.invoke(&config, tool, args).await;
        match &result {
            Ok(_) => self.set_reachable(true, false),
            Err(GatewayError::Remote(_)) => {}
            Err(_) => self.set_reachable(false, false),
        }
        result
    }

    /// Probe the gateway with a one-item `sessions_list`.
    pub async fn test_connection(&self) -> Result<(), GatewayError> {
        let config = self.config();
        let result = self
            .invoker
            .invoke(&config, "sessions_list", json!({"limit": 1}))
            .await
            .map(|_| ())
            .map_err(|e| friendly_probe_error(&config, e));

        match &result {
            Ok(()) => info!(gateway = %config.gateway_url, "Gateway connection ok"),
            Err(e) => warn!(gateway = %config.gateway_url, error = %e, "Gateway connection failed"),
        }
        self.set_reachable(result.is_ok(), true);
        result
    }

    /// Deliver a message through the configured send strategy.
    ///
    /// On success the typed text is echoed to observers as a user message.
    pub async fn send_message(&self, outbound: &Outbound) -> Result<(), GatewayError> {
        let config = self.config();
        let wire = outbound.wire_text();

        debug!(
            strategy = self.sender.name(),
            text_len = outbound.text.len(),
            wire_len = wire.len(),
            "Sending message"
        );

        match self.sender.deliver(&config, &wire).await {
            Ok(()) => {
                self.observers
                    .emit(&ClientEvent::Message(ChatMessage::user(outbound.text.clone())));
                self.set_reachable(true, false);
                Ok(())
            }
            Err(e) => {
                warn!(strategy = self.sender.name(), error = %e, "Send failed");
                self.set_reachable(false, true);
                Err(e)
            }
        }
    }

    /// Fetch the latest history snapshot. Never fails: any problem yields an
    /// empty list so polling stays silent.
    pub async fn fetch_history(&self) -> Vec<ChatMessage> {
        let config = self.config();
        if !config.is_configured() {
            return Vec::new();
        }

        let args = json!({
            "sessionKey": config.session_key,
            "limit": HISTORY_LIMIT,
            "includeTools": false,
        });

        match self.invoke("sessions_history", args).await {
            Ok(result) => parse_history(&result),
            Err(e) => {
                debug!(error = %e, "History fetch failed");
                Vec::new()
            }
        }
    }
}

/// Messages from a `sessions_history` result, which is either
/// `{messages: [...]}` or the array itself.
pub fn parse_history(result: &Value) -> Vec<ChatMessage> {
    let entries = result
        .get("messages")
        .and_then(Value::as_array)
        .or_else(|| result.as_array());

    match entries {
        Some(entries) => entries
            .iter()
            .filter_map(ChatMessage::from_history_entry)
            .collect(),
        None => {
            debug!("History result had no message list");
            Vec::new()
        }
    }
}

fn friendly_probe_error(config: &ConnectionConfig, err: GatewayError) -> GatewayError {
    match err {
        GatewayError::Timeout(_) => GatewayError::Unreachable {
            url: config.gateway_url.clone(),
        },
        GatewayError::Network(ref message) if is_unreachable_message(message) => {
            GatewayError::Unreachable {
                url: config.gateway_url.clone(),
            }
        }
        other => other,
    }
}
