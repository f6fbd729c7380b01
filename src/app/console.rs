// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

//! Line-oriented control console: one command per stdin line.

use crate::services::session::Session;
use crate::services::sink::LogCategory;
use clap::{Parser, Subcommand};
use std::future::Future;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(no_binary_name = true, disable_help_flag = true)]
struct ConsoleLine {
    #[command(subcommand)]
    command: ConsoleCommand,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    /// Start a strategy loop: `start <id> <count>`
    Start { id: String, count: String },
    /// Ask a strategy to stop at its next checkpoint
    Stop { id: String },
    /// Stop every running strategy
    StopAll,
    /// Show queued transactions
    Queue,
    /// Reload wallet balances
    Refresh,
    /// Show which strategies run and which side they hold
    Status,
    /// Stop everything and exit
    #[command(alias = "exit")]
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleAction {
    Continue,
    Quit,
}

/// Parse one input line. Blank lines yield `Ok(None)`.
pub fn parse_command(line: &str) -> Result<Option<ConsoleCommand>, String> {
    let words: Vec<&str> = line.split_whitespace().collect();
    if words.is_empty() {
        return Ok(None);
    }
    ConsoleLine::try_parse_from(words)
        .map(|parsed| Some(parsed.command))
        .map_err(|e| e.to_string().lines().next().unwrap_or("invalid command").to_string())
}

pub async fn dispatch(session: &Arc<Session>, command: ConsoleCommand) -> ConsoleAction {
    tracing::debug!(target: "session", ?command, "Console command");
    match command {
        ConsoleCommand::Start { id, count } => {
            // Rejections are already reported to the sink.
            let _ = session.start_strategy(&id, &count);
        }
        ConsoleCommand::Stop { id } => {
            let _ = session.stop_strategy(&id);
        }
        ConsoleCommand::StopAll => {
            session.stop_all();
        }
        ConsoleCommand::Queue => {
            let entries = session.queue_snapshot();
            if entries.is_empty() {
                tracing::info!(target: "tx_queue", "No transactions in queue");
            }
            for entry in entries {
                tracing::info!(
                    target: "tx_queue",
                    "[{}] {} ({}) at {}",
                    entry.id,
                    entry.description,
                    entry.status,
                    entry.submitted_at.format("%H:%M:%S")
                );
            }
        }
        ConsoleCommand::Refresh => {
            if let Err(e) = session.refresh_wallet().await {
                tracing::error!(target: "wallet", error = %e, "Wallet refresh failed");
            }
        }
        ConsoleCommand::Status => {
            for status in session.strategy_status() {
                tracing::info!(
                    target: "strategy",
                    strategy = %status.id,
                    running = status.running,
                    holding = %status.phase,
                    "Strategy status"
                );
            }
        }
        ConsoleCommand::Quit => return ConsoleAction::Quit,
    }
    ConsoleAction::Continue
}

/// Report an unparseable line without leaving the console.
pub fn report_invalid(session: &Session, line: &str, reason: &str) {
    tracing::debug!(target: "session", line, "Unrecognised console input");
    session.sink().on_log_event(
        &format!("Unknown command `{}`: {reason}", line.trim()),
        LogCategory::Warning,
    );
}

/// Called once stdin is closed. Running loops keep going until they finish
/// on their own or `interrupt` resolves; only the caller's shutdown stops them.
pub async fn wait_detached<F>(session: &Session, interrupt: F)
where
    F: Future<Output = ()>,
{
    session.sink().on_log_event(
        "Console input closed; waiting for running strategies to finish.",
        LogCategory::System,
    );
    tokio::select! {
        _ = session.wait_idle() => {
            tracing::info!(target: "session", "All strategies finished");
        }
        _ = interrupt => {
            tracing::info!(target: "session", "Interrupt received");
        }
    }
}
