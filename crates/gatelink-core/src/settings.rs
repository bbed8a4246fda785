// ABOUTME: TOML-backed settings store for hosts without their own configuration system
// ABOUTME: Supports environment variable expansion and exposes the named gateway settings

use crate::config::{SettingsSource, KEY_GATEWAY_TOKEN, KEY_GATEWAY_URL, KEY_SESSION_KEY};
use crate::error::SettingsError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Setting key selecting the send strategy (`invoke` or `cli`).
pub const KEY_SEND_STRATEGY: &str = "send.strategy";
/// Setting key for the poll interval in seconds.
pub const KEY_POLL_INTERVAL: &str = "panel.pollIntervalSecs";

/// Top-level settings file.
///
/// Default location: `<config_dir>/gatelink/config.toml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub gateway: GatewaySettings,
    #[serde(default)]
    pub send: SendSettings,
    #[serde(default)]
    pub panel: PanelSettings,
}

/// The three named gateway settings.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct GatewaySettings {
    /// Base URL (e.g., "http://localhost:18789")
    #[serde(default)]
    pub url: String,
    /// Bearer token for the invoke endpoint
    #[serde(default)]
    pub token: String,
    /// Session key; legacy "agent:session" form is accepted
    #[serde(default, alias = "sessionKey")]
    pub session_key: String,
}

impl std::fmt::Debug for GatewaySettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewaySettings")
            .field("url", &self.url)
            .field("token", &"[REDACTED]")
            .field("session_key", &self.session_key)
            .finish()
    }
}

/// Which delivery path carries outbound messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SendStrategyKind {
    /// `sessions_send` through the invoke endpoint.
    #[default]
    Invoke,
    /// Shell out to the agent command-line interface.
    Cli,
}

impl std::str::FromStr for SendStrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "invoke" => Ok(SendStrategyKind::Invoke),
            "cli" => Ok(SendStrategyKind::Cli),
            other => Err(format!("unknown send strategy '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendSettings {
    #[serde(default)]
    pub strategy: SendStrategyKind,
    /// Agent CLI binary for the `cli` strategy
    #[serde(default = "default_cli_binary")]
    pub cli_binary: String,
    /// Hard wall-clock limit for a single delivery
    #[serde(default = "default_send_timeout")]
    pub timeout_secs: u64,
    /// Passed to `sessions_send` as `timeoutSeconds`; 0 means fire-and-forget
    #[serde(default)]
    pub reply_timeout_secs: u64,
}

impl Default for SendSettings {
    fn default() -> Self {
        Self {
            strategy: SendStrategyKind::default(),
            cli_binary: default_cli_binary(),
            timeout_secs: default_send_timeout(),
            reply_timeout_secs: 0,
        }
    }
}

fn default_cli_binary() -> String {
    "openclaw".to_string()
}

fn default_send_timeout() -> u64 {
    120
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PanelSettings {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

impl Default for PanelSettings {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
        }
    }
}

fn default_poll_interval() -> u64 {
    3
}

impl Settings {
    /// Default settings path: `<config_dir>/gatelink/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("gatelink").join("config.toml"))
    }

    /// Load settings from the given path or the default location.
    ///
    /// A missing file at the default location yields default (unconfigured)
    /// settings; an explicitly named file must exist.
    pub fn load(path: Option<&Path>) -> Result<Self, SettingsError> {
        let (path, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (Self::default_path().ok_or(SettingsError::NoConfigDir)?, false),
        };

        if !explicit && !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&path).map_err(|source| SettingsError::Read {
            path: path.clone(),
            source,
        })?;
        Self::parse(&contents)
    }

    /// Parse settings text, expanding `${VAR}` references from the environment.
    pub fn parse(contents: &str) -> Result<Self, SettingsError> {
        let contents = shellexpand::env_with_context_no_errors(contents, |var: &str| {
            match std::env::var(var) {
                Ok(val) => Some(val),
                Err(_) => {
                    warn!(
                        variable = %var,
                        "Environment variable not defined, using empty string"
                    );
                    Some(String::new())
                }
            }
        });

        Ok(toml::from_str(&contents)?)
    }

    /// Apply command-line or environment overrides on top of the file.
    pub fn with_overrides(
        mut self,
        url: Option<String>,
        token: Option<String>,
        session_key: Option<String>,
    ) -> Self {
        if let Some(url) = url {
            self.gateway.url = url;
        }
        if let Some(token) = token {
            self.gateway.token = token;
        }
        if let Some(session_key) = session_key {
            self.gateway.session_key = session_key;
        }
        self
    }
}

impl SettingsSource for Settings {
    fn get(&self, key: &str) -> Option<String> {
        let value = match key {
            KEY_GATEWAY_URL => self.gateway.url.clone(),
            KEY_GATEWAY_TOKEN => self.gateway.token.clone(),
            KEY_SESSION_KEY => self.gateway.session_key.clone(),
            KEY_SEND_STRATEGY => match self.send.strategy {
                SendStrategyKind::Invoke => "invoke".to_string(),
                SendStrategyKind::Cli => "cli".to_string(),
            },
            KEY_POLL_INTERVAL => self.panel.poll_interval_secs.to_string(),
            _ => return None,
        };
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConnectionConfig;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.send.strategy, SendStrategyKind::Invoke);
        assert_eq!(settings.send.timeout_secs, 120);
        assert_eq!(settings.panel.poll_interval_secs, 3);
        assert!(!ConnectionConfig::resolve(&settings).is_configured());
    }

    #[test]
    fn test_parse_full() {
        let settings = Settings::parse(
            r#"
[gateway]
url = "http://localhost:18789/"
token = "t"
sessionKey = "main:main"

[send]
strategy = "cli"
cli_binary = "/usr/local/bin/agent"
timeout_secs = 45

[panel]
poll_interval_secs = 5
"#,
        )
        .unwrap();

        assert_eq!(settings.send.strategy, SendStrategyKind::Cli);
        assert_eq!(settings.send.cli_binary, "/usr/local/bin/agent");
        assert_eq!(settings.send.timeout_secs, 45);
        assert_eq!(settings.panel.poll_interval_secs, 5);

        let config = ConnectionConfig::resolve(&settings);
        assert_eq!(config.gateway_url, "http://localhost:18789");
        assert_eq!(config.session_key, "agent:main:main");
    }

    #[test]
    fn test_env_expansion() {
        std::env::set_var("GATELINK_TEST_TOKEN_EXPANSION", "from-env");
        let settings = Settings::parse(
            r#"
[gateway]
url = "http://h"
token = "${GATELINK_TEST_TOKEN_EXPANSION}"
"#,
        )
        .unwrap();
        assert_eq!(settings.gateway.token, "from-env");
    }

    #[test]
    fn test_undefined_env_var_becomes_empty() {
        let settings = Settings::parse(
            r#"
[gateway]
url = "http://h"
token = "${GATELINK_TEST_DEFINITELY_UNSET_VAR}"
"#,
        )
        .unwrap();
        assert!(settings.gateway.token.is_empty());
    }

    #[test]
    fn test_load_explicit_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"[gateway]\nurl = \"http://x\"\ntoken = \"y\"\n")
            .unwrap();
        let settings = Settings::load(Some(file.path())).unwrap();
        assert_eq!(settings.gateway.url, "http://x");
    }

    #[test]
    fn test_load_missing_explicit_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = Settings::load(Some(&dir.path().join("nope.toml")));
        assert!(matches!(result, Err(SettingsError::Read { .. })));
    }

    #[test]
    fn test_overrides_win() {
        let settings = Settings::default().with_overrides(
            Some("http://cli".into()),
            Some("tok".into()),
            None,
        );
        assert_eq!(settings.gateway.url, "http://cli");
        assert_eq!(settings.gateway.token, "tok");
        assert!(settings.gateway.session_key.is_empty());
    }

    #[test]
    fn test_strategy_from_str() {
        assert_eq!("CLI".parse::<SendStrategyKind>(), Ok(SendStrategyKind::Cli));
        assert!("carrier-pigeon".parse::<SendStrategyKind>().is_err());
    }
}
