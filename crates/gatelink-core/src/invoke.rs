// ABOUTME: HTTP client for the gateway's tools/invoke endpoint
// ABOUTME: Single-attempt POST with bearer auth; maps failures to GatewayError values

use crate::config::ConnectionConfig;
use crate::envelope::unwrap_response;
use crate::error::GatewayError;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Default per-request timeout for invoke calls.
pub const DEFAULT_INVOKE_TIMEOUT_SECS: u64 = 30;

/// Substrings that identify "could not reach the gateway" failures.
const UNREACHABLE_MARKERS: &[&str] = &[
    "dns error",
    "failed to lookup",
    "name or service not known",
    "nodename nor servname",
    "enotfound",
    "connection refused",
    "econnrefused",
    "timed out",
    "etimedout",
];

/// Request body for `POST /tools/invoke`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvokeRequest<'a> {
    pub tool: &'a str,
    pub args: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_key: Option<&'a str>,
}

/// Thin wrapper around a reqwest client that speaks the invoke protocol.
#[derive(Clone)]
pub struct Invoker {
    client: Client,
    timeout_secs: u64,
}

impl Invoker {
    pub fn new(timeout_secs: u64) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| GatewayError::Network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            timeout_secs,
        })
    }

    /// Invoke a gateway tool once. Never retries; the caller decides.
    ///
    /// The session key rides top-level in the body. Callers that need it
    /// inside `args` (e.g. `sessions_history`) put it there themselves; both
    /// forms reach the gateway unchanged.
    pub async fn invoke(
        &self,
        config: &ConnectionConfig,
        tool: &str,
        args: Value,
    ) -> Result<Value, GatewayError> {
        if !config.is_configured() {
            return Err(GatewayError::NotConfigured);
        }

        let body = InvokeRequest {
            tool,
            args,
            session_key: Some(config.session_key.as_str()),
        };

        let endpoint = config.invoke_endpoint().map_err(|e| {
            GatewayError::Network(format!("Invalid gateway URL {}: {e}", config.gateway_url))
        })?;

        debug!(tool = %tool, url = %endpoint, "Invoking gateway tool");

        let response = self
            .client
            .post(endpoint)
            .bearer_auth(&config.token)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.classify_send_error(config, &e))?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| self.classify_send_error(config, &e))?;

        let result = unwrap_response(status, &text);
        if let Err(e) = &result {
            debug!(tool = %tool, status, error = %e, "Gateway tool failed");
        }
        result
    }

    fn classify_send_error(&self, config: &ConnectionConfig, err: &reqwest::Error) -> GatewayError {
        if err.is_timeout() {
            return GatewayError::Timeout(self.timeout_secs);
        }
        if err.is_connect() || is_unreachable_message(&error_chain(err)) {
            return GatewayError::Unreachable {
                url: config.gateway_url.clone(),
            };
        }
        GatewayError::Network(err.to_string())
    }
}

/// True when an error message looks like a name-resolution, refused, or timeout failure.
pub fn is_unreachable_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    UNREACHABLE_MARKERS.iter().any(|m| lower.contains(m))
}

/// Flatten an error and its sources into one string.
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(inner) = source {
        message.push_str(": ");
        message.push_str(&inner.to_string());
        source = inner.source();
    }
    message
}
