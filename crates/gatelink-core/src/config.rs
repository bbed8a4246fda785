// ABOUTME: Connection config resolved from the three named gateway settings
// ABOUTME: Normalizes base URLs and legacy session key aliases into canonical form

use std::collections::HashMap;

/// Setting key for the gateway base URL.
pub const KEY_GATEWAY_URL: &str = "gateway.url";
/// Setting key for the gateway bearer token.
pub const KEY_GATEWAY_TOKEN: &str = "gateway.token";
/// Setting key for the session key.
pub const KEY_SESSION_KEY: &str = "gateway.sessionKey";

/// Session key used when none is configured.
pub const DEFAULT_SESSION_KEY: &str = "agent:main:main";

const DEFAULT_NAMESPACE: &str = "agent";
const DEFAULT_AGENT: &str = "main";

/// Read-only view of wherever the host stores its settings.
pub trait SettingsSource {
    fn get(&self, key: &str) -> Option<String>;
}

impl SettingsSource for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        HashMap::get(self, key).cloned()
    }
}

impl SettingsSource for HashMap<&str, &str> {
    fn get(&self, key: &str) -> Option<String> {
        HashMap::get(self, key).map(|v| v.to_string())
    }
}

/// Gateway connection settings. Built wholesale from a [`SettingsSource`];
/// never patched field by field.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Base URL without a trailing slash (e.g., "http://localhost:18789")
    pub gateway_url: String,
    /// Bearer token for the invoke endpoint
    pub token: String,
    /// Canonical `namespace:agent:session` key
    pub session_key: String,
}

impl std::fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("gateway_url", &self.gateway_url)
            .field(
                "token",
                &if self.token.is_empty() {
                    ""
                } else {
                    "[REDACTED]"
                },
            )
            .field("session_key", &self.session_key)
            .finish()
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self::new("", "", "")
    }
}

impl ConnectionConfig {
    /// Build a config from raw values, applying the same normalization as [`resolve`](Self::resolve).
    pub fn new(gateway_url: &str, token: &str, session_key: &str) -> Self {
        Self {
            gateway_url: normalize_base_url(gateway_url),
            token: token.trim().to_string(),
            session_key: normalize_session_key(session_key),
        }
    }

    /// Read the three named settings. Missing values are not an error; they
    /// simply leave the config unconfigured.
    pub fn resolve(source: &dyn SettingsSource) -> Self {
        let url = source.get(KEY_GATEWAY_URL).unwrap_or_default();
        let token = source.get(KEY_GATEWAY_TOKEN).unwrap_or_default();
        let session = source.get(KEY_SESSION_KEY).unwrap_or_default();
        Self::new(&url, &token, &session)
    }

    /// True when both the URL and token are present.
    pub fn is_configured(&self) -> bool {
        !self.gateway_url.is_empty() && !self.token.is_empty()
    }

    /// Full URL of the invoke endpoint.
    pub fn invoke_url(&self) -> String {
        format!("{}/tools/invoke", self.gateway_url)
    }

    /// Parsed invoke endpoint. Fails when the base URL is not absolute.
    pub fn invoke_endpoint(&self) -> Result<url::Url, url::ParseError> {
        url::Url::parse(&self.invoke_url())
    }
}

/// Strip whitespace and trailing slashes from a base URL.
pub fn normalize_base_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

/// Canonicalize a session key to `namespace:agent:session`.
///
/// `"main:main"` becomes `"agent:main:main"`, a bare `"work"` becomes
/// `"agent:main:work"`, and keys with three or more parts pass through.
pub fn normalize_session_key(key: &str) -> String {
    let key = key.trim();
    if key.is_empty() {
        return DEFAULT_SESSION_KEY.to_string();
    }

    match key.split(':').count() {
        1 => format!("{DEFAULT_NAMESPACE}:{DEFAULT_AGENT}:{key}"),
        2 => format!("{DEFAULT_NAMESPACE}:{key}"),
        _ => key.to_string(),
    }
}

/// Connection state derived from config completeness and the last probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Unconfigured,
    Disconnected,
    Connected,
}

impl ConnectionState {
    pub fn derive(config: &ConnectionConfig, last_probe_ok: bool) -> Self {
        if !config.is_configured() {
            ConnectionState::Unconfigured
        } else if last_probe_ok {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ConnectionState::Unconfigured => "not configured",
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connected => "connected",
        };
        f.write_str(label)
    }
}
