// ABOUTME: gatelink CLI entry point
// ABOUTME: Dispatches check, history, send, and the interactive chat panel

mod chat;
mod render;
mod terminal;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use gatelink_core::{GatewayClient, Outbound, Settings};
use gatelink_panel::AppContext;
use std::path::PathBuf;
use std::sync::Arc;

use crate::terminal::{connection_line, TerminalHost};

#[derive(Parser)]
#[command(name = "gatelink")]
#[command(about = "Talk to an agent gateway session from the terminal")]
#[command(version)]
struct Cli {
    /// Settings file (defaults to ~/.config/gatelink/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Gateway base URL
    #[arg(long, env = "GATELINK_URL", global = true)]
    url: Option<String>,

    /// Bearer token for the gateway
    #[arg(long, env = "GATELINK_TOKEN", global = true, hide_env_values = true)]
    token: Option<String>,

    /// Session key (a bare name becomes agent:main:<name>)
    #[arg(long, env = "GATELINK_SESSION", global = true)]
    session: Option<String>,

    /// Workspace root for file tools and commands (defaults to the current directory)
    #[arg(long, global = true)]
    workspace: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Test the gateway connection
    Check,

    /// Print the session transcript
    History {
        /// Show at most this many recent messages
        #[arg(long, short = 'n', default_value_t = 20)]
        limit: usize,
    },

    /// Send one message to the session
    Send {
        message: String,

        /// File the message is about
        #[arg(long)]
        file: Option<String>,
    },

    /// Open the interactive chat panel
    Chat {
        /// File treated as the active document (target of /apply)
        #[arg(long)]
        file: Option<PathBuf>,

        /// Query to send once the panel opens (repeatable)
        #[arg(long = "ask")]
        ask: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // The chat panel owns stdout, so its logs go to a file.
    match cli.command {
        Commands::Chat { .. } => gatelink_log::init_file("chat"),
        _ => gatelink_log::init(),
    }

    let settings = Settings::load(cli.config.as_deref())
        .context("Failed to load settings")?
        .with_overrides(cli.url, cli.token, cli.session);

    match cli.command {
        Commands::Check => check(&settings).await,
        Commands::History { limit } => history(&settings, limit).await,
        Commands::Send { message, file } => send(&settings, message, file).await,
        Commands::Chat { file, ask } => {
            let workspace = match cli.workspace {
                Some(dir) => dir,
                None => std::env::current_dir().context("Failed to read current directory")?,
            };
            let host = Arc::new(TerminalHost::new(file));
            let ctx = AppContext::new(&settings, host, Some(workspace))
                .context("Failed to start chat")?;
            chat::run(ctx, ask).await
        }
    }
}

async fn check(settings: &Settings) -> Result<()> {
    let client = GatewayClient::from_settings(settings)?;
    let config = client.config();
    let result = client.test_connection().await;
    println!("{}", connection_line(client.state()));

    match result {
        Ok(()) => {
            println!("  {}: {}", "Gateway".dimmed(), config.gateway_url);
            println!("  {}: {}", "Session".dimmed(), config.session_key);
            println!("  {}: {}", "Send via".dimmed(), client.send_strategy());
            Ok(())
        }
        Err(e) => {
            eprintln!("{} {}", "error:".red().bold(), e);
            std::process::exit(1);
        }
    }
}

async fn history(settings: &Settings, limit: usize) -> Result<()> {
    let client = GatewayClient::from_settings(settings)?;
    client
        .test_connection()
        .await
        .context("Cannot reach the gateway")?;

    let messages = client.fetch_history().await;
    if messages.is_empty() {
        println!("{}", "No messages yet.".dimmed());
        return Ok(());
    }

    let start = messages.len().saturating_sub(limit);
    for message in &messages[start..] {
        println!("{}", render::message(message));
    }
    Ok(())
}

async fn send(settings: &Settings, message: String, file: Option<String>) -> Result<()> {
    let client = GatewayClient::from_settings(settings)?;
    let outbound = Outbound::new(message).with_file_context(file);
    client
        .send_message(&outbound)
        .await
        .context("Failed to send message")?;

    println!(
        "{} sent to {}",
        "✓".green().bold(),
        client.config().session_key
    );
    Ok(())
}
