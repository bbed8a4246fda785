// ABOUTME: Library root for gatelink-core
// ABOUTME: Exports config, transport, send strategies, tool executor, and shared types

pub mod client;
pub mod config;
pub mod envelope;
pub mod error;
pub mod executor;
pub mod invoke;
pub mod observer;
pub mod send;
pub mod settings;
pub mod types;

pub use client::{ClientEvent, GatewayClient, Outbound};
pub use config::{ConnectionConfig, ConnectionState, SettingsSource};
pub use envelope::{unwrap_response, Payload};
pub use error::{GatewayError, SettingsError, ToolError};
pub use executor::{CommandOutput, LocalTool, ToolExecutor};
pub use invoke::Invoker;
pub use observer::{Observers, Subscription};
pub use send::{CliSend, CliSendConfig, InvokeSend, SendStrategy};
pub use settings::{SendStrategyKind, Settings};
pub use types::{ChatMessage, Role};
