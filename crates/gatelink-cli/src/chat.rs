// ABOUTME: Interactive terminal panel driven by stdin lines
// ABOUTME: Maps slash commands and plain text onto panel UiCommands

use crate::render;
use anyhow::Result;
use colored::Colorize;
use gatelink_panel::{AppContext, UiCommand};
use serde_json::{Map, Value};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};

const HELP: &str = "\
  <text>                 send a message (use @path to attach workspace files)
  /apply <old text>      replace <old text> in --file with the last code block
  /tool <name> [json]    request a local tool call (read_file, list_files, run_command, write_file)
  /approve <id>          approve a pending tool request
  /deny <id>             reject a pending tool request
  /run <command>         run a shell command in the workspace
  /check                 test the gateway connection
  /quit                  leave";

/// One parsed line of input.
#[derive(Debug, PartialEq)]
enum Input {
    Empty,
    Quit,
    Help,
    Command(UiCommand),
    Apply(String),
    Tool {
        name: String,
        arguments: Map<String, Value>,
    },
    Invalid(String),
}

fn parse_input(line: &str) -> Input {
    let line = line.trim();
    if line.is_empty() {
        return Input::Empty;
    }
    if !line.starts_with('/') {
        return Input::Command(UiCommand::Send {
            text: line.to_string(),
        });
    }

    let (command, rest) = match line.split_once(char::is_whitespace) {
        Some((command, rest)) => (command, rest.trim()),
        None => (line, ""),
    };
    let required = |usage: &str| -> Result<String, Input> {
        if rest.is_empty() {
            Err(Input::Invalid(format!("usage: {usage}")))
        } else {
            Ok(rest.to_string())
        }
    };

    let parsed = match command {
        "/quit" | "/exit" => Ok(Input::Quit),
        "/help" => Ok(Input::Help),
        "/check" => Ok(Input::Command(UiCommand::CheckConnection)),
        "/approve" | "/deny" => required(&format!("{command} <id>")).map(|id| {
            Input::Command(UiCommand::ApproveTool {
                id,
                approved: command == "/approve",
            })
        }),
        "/run" => required("/run <command>").map(|command| {
            Input::Command(UiCommand::RunCommand { command, cwd: None })
        }),
        "/apply" => required("/apply <old text>").map(Input::Apply),
        "/tool" => required("/tool <name> [json]").and_then(|spec| parse_tool(&spec)),
        other => Err(Input::Invalid(format!("unknown command {other}, try /help"))),
    };
    parsed.unwrap_or_else(|invalid| invalid)
}

fn parse_tool(spec: &str) -> Result<Input, Input> {
    let (name, json) = match spec.split_once(char::is_whitespace) {
        Some((name, json)) => (name, json.trim()),
        None => (spec, ""),
    };
    let arguments = if json.is_empty() {
        Map::new()
    } else {
        match serde_json::from_str::<Value>(json) {
            Ok(Value::Object(map)) => map,
            Ok(_) => return Err(Input::Invalid("tool arguments must be a JSON object".into())),
            Err(e) => return Err(Input::Invalid(format!("invalid tool arguments: {e}"))),
        }
    };
    Ok(Input::Tool {
        name: name.to_string(),
        arguments,
    })
}

/// Run the interactive panel until `/quit`, Ctrl-C, or end of input.
pub async fn run(ctx: AppContext, asks: Vec<String>) -> Result<()> {
    for query in asks {
        ctx.panel().submit_query(query).await;
    }
    ctx.open_panel().await;
    println!("{}", "Type /help for commands.".dimmed());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            break;
        };

        match parse_input(&line) {
            Input::Empty => {}
            Input::Quit => break,
            Input::Help => println!("{HELP}"),
            Input::Command(command) => ctx.panel().handle(command).await,
            Input::Apply(old_text) => match render::last_apply_code(&ctx.panel().transcript()) {
                Some(new_text) => {
                    ctx.panel()
                        .handle(UiCommand::ApplyEdit { old_text, new_text })
                        .await
                }
                None => println!("{}", "No code block to apply yet.".yellow()),
            },
            Input::Tool { name, arguments } => {
                let outcome = ctx.panel().request_tool(&name, arguments);
                tokio::spawn(async move {
                    match outcome.await {
                        Ok(outcome) => debug!(tool = %name, ?outcome, "Tool request resolved"),
                        Err(_) => debug!(tool = %name, "Tool request dropped"),
                    }
                });
            }
            Input::Invalid(message) => println!("{} {}", "error:".red().bold(), message),
        }
    }

    info!("Chat session ended");
    ctx.deactivate();
    Ok(())
}
