// ABOUTME: Error types for gatelink-core
// ABOUTME: GatewayError for transport failures, ToolError for workspace tool execution

use std::path::PathBuf;
use thiserror::Error;

/// Errors returned by the gateway transport. None of these are ever thrown
/// past the client; every operation hands them back as a value.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayError {
    #[error("Gateway is not configured: set the gateway URL and token")]
    NotConfigured,

    #[error("Gateway unreachable at {url}. Is the gateway running?")]
    Unreachable { url: String },

    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response (HTTP {status}): {message}")]
    Protocol { status: u16, message: String },

    #[error("{0}")]
    Remote(String),

    #[error("Failed to start agent CLI: {0}")]
    Spawn(String),

    #[error("Agent CLI exited with {code:?}: {stderr}")]
    Process { code: Option<i32>, stderr: String },
}

impl GatewayError {
    /// True for failures where the gateway could not be reached at all.
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            GatewayError::Unreachable { .. } | GatewayError::Timeout(_) | GatewayError::Network(_)
        )
    }
}

/// Errors from the local tool executor.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("No workspace folder is open")]
    NoWorkspace,

    #[error("Path outside workspace: {0}")]
    OutsideWorkspace(String),

    #[error("Not found: {0}")]
    NotFound(PathBuf),

    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Command timed out after {0} seconds")]
    Timeout(u64),

    #[error("Command exited with {code:?}: {stderr}")]
    CommandFailed {
        code: Option<i32>,
        stdout: String,
        stderr: String,
    },

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid arguments for {tool}: {message}")]
    InvalidArguments { tool: String, message: String },

    #[error("User denied: {0}")]
    Denied(String),
}

impl ToolError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            ToolError::NotFound(path)
        } else {
            ToolError::Io { path, source }
        }
    }
}

/// Errors while loading the settings file.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Could not determine config path")]
    NoConfigDir,

    #[error("Failed to read settings from {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse settings: {0}")]
    Parse(#[from] toml::de::Error),
}
