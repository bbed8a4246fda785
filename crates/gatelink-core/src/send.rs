// ABOUTME: Pluggable delivery strategies for outbound chat messages
// ABOUTME: InvokeSend uses sessions_send; CliSend spawns the agent CLI with a hard timeout

use crate::config::ConnectionConfig;
use crate::error::GatewayError;
use crate::invoke::Invoker;
use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;
use tokio::process::Command as ProcessCommand;
use tracing::{debug, warn};

/// A delivery path for outbound messages. Implementations make exactly one
/// attempt and report failure as a value.
#[async_trait]
pub trait SendStrategy: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    async fn deliver(&self, config: &ConnectionConfig, message: &str) -> Result<(), GatewayError>;
}

/// Deliver through the invoke endpoint as a `sessions_send` tool call.
pub struct InvokeSend {
    invoker: Invoker,
    reply_timeout_secs: u64,
}

impl InvokeSend {
    pub fn new(invoker: Invoker, reply_timeout_secs: u64) -> Self {
        Self {
            invoker,
            reply_timeout_secs,
        }
    }
}

#[async_trait]
impl SendStrategy for InvokeSend {
    fn name(&self) -> &'static str {
        "invoke"
    }

    async fn deliver(&self, config: &ConnectionConfig, message: &str) -> Result<(), GatewayError> {
        let args = json!({
            "sessionKey": config.session_key,
            "message": message,
            "timeoutSeconds": self.reply_timeout_secs,
        });
        self.invoker
            .invoke(config, "sessions_send", args)
            .await
            .map(|_| ())
    }
}

/// Configuration for the CLI delivery path.
#[derive(Debug, Clone)]
pub struct CliSendConfig {
    /// Agent CLI binary
    pub binary: String,
    /// Hard wall-clock limit for one delivery
    pub timeout_secs: u64,
}

/// Deliver by shelling out to the agent command-line interface:
/// `<binary> agent --session-id <key> --message <text>`.
pub struct CliSend {
    config: CliSendConfig,
}

impl CliSend {
    pub fn new(config: CliSendConfig) -> Self {
        Self { config }
    }

    fn args(session_key: &str, message: &str) -> Vec<String> {
        vec![
            "agent".to_string(),
            "--session-id".to_string(),
            session_key.to_string(),
            "--message".to_string(),
            message.to_string(),
        ]
    }
}

#[async_trait]
impl SendStrategy for CliSend {
    fn name(&self) -> &'static str {
        "cli"
    }

    async fn deliver(&self, config: &ConnectionConfig, message: &str) -> Result<(), GatewayError> {
        if !config.is_configured() {
            return Err(GatewayError::NotConfigured);
        }

        let mut cmd = ProcessCommand::new(&self.config.binary);
        cmd.args(Self::args(&config.session_key, message))
            .env("GATEWAY_URL", &config.gateway_url)
            .env("GATEWAY_TOKEN", &config.token)
            .stdin(std::process::Stdio::null())
            .kill_on_drop(true);

        debug!(
            binary = %self.config.binary,
            session_key = %config.session_key,
            message_len = message.len(),
            "Delivering message through agent CLI"
        );

        // kill_on_drop reaps the child when the timeout drops this future
        let timeout = Duration::from_secs(self.config.timeout_secs);
        let output = match tokio::time::timeout(timeout, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(GatewayError::Spawn(e.to_string())),
            Err(_) => {
                warn!(
                    timeout_secs = self.config.timeout_secs,
                    "Agent CLI timed out; process killed"
                );
                return Err(GatewayError::Timeout(self.config.timeout_secs));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(GatewayError::Process {
                code: output.status.code(),
                stderr,
            });
        }

        Ok(())
    }
}
