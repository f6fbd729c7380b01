// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use clap::Parser;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use weth_cycler::app::config::GlobalSettings;
use weth_cycler::app::console::{self, ConsoleAction};
use weth_cycler::app::logging::setup_logging;
use weth_cycler::domain::error::AppError;
use weth_cycler::infrastructure::network::chain::AlloyChainClient;
use weth_cycler::infrastructure::network::provider::ConnectionFactory;
use weth_cycler::services::session::Session;
use weth_cycler::services::sink::TracingSink;

#[derive(Parser, Debug)]
#[command(author, version, about = "weth cycler")]
struct Cli {
    /// Path to config file (default: config.{toml,yaml,...})
    #[arg(long)]
    config: Option<String>,

    /// Log level or full filter directive (overrides the config `debug` flag)
    #[arg(long)]
    log_level: Option<String>,

    /// Emit JSON logs
    #[arg(long, default_value_t = false)]
    json_logs: bool,

    /// Start a strategy right away, e.g. `--start gaspump=5` (repeatable)
    #[arg(long = "start", value_parser = parse_start_request)]
    start: Vec<(String, String)>,
}

fn parse_start_request(raw: &str) -> Result<(String, String), String> {
    let (id, count) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected <id>=<count>, got `{raw}`"))?;
    let id = id.trim().to_ascii_lowercase();
    if id.is_empty() {
        return Err(format!("missing strategy id in `{raw}`"));
    }
    Ok((id, count.trim().to_string()))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), AppError> {
    let cli = Cli::parse();

    let settings = GlobalSettings::load_with_path(cli.config.as_deref())?;
    let level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| (if settings.debug { "debug" } else { "info" }).to_string());
    setup_logging(&level, cli.json_logs || settings.log_json)?;

    let signer = ConnectionFactory::signer(&settings.wallet_key)?;
    let address = signer.address();
    let provider = ConnectionFactory::http(&settings.rpc_url, signer)?;
    let chain = Arc::new(AlloyChainClient::new(
        provider,
        address,
        settings.weth_address,
        settings.receipt_poll_interval(),
    ));
    tracing::info!(
        target: "session",
        network = %settings.network_name,
        address = %address,
        weth = %settings.weth_address,
        "Connected"
    );

    let session = Arc::new(Session::new(
        chain,
        Arc::new(TracingSink),
        settings.cycle_settings(),
        &settings.strategies,
    ));
    if let Err(e) = session.refresh_wallet().await {
        tracing::warn!(target: "wallet", error = %e, "Initial balance read failed");
    }

    for (id, count) in &cli.start {
        let _ = session.start_strategy(id, count);
    }

    tracing::info!(
        target: "session",
        "Commands: start <id> <count> | stop <id> | stop-all | queue | refresh | status | quit"
    );
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut input_closed = false;
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!(target: "session", "Interrupt received");
                break;
            }
        };
        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => {
                input_closed = true;
                break;
            }
            Err(e) => {
                tracing::error!(target: "session", error = %e, "Reading stdin failed");
                input_closed = true;
                break;
            }
        };
        match console::parse_command(&line) {
            Ok(None) => {}
            Ok(Some(command)) => {
                if console::dispatch(&session, command).await == ConsoleAction::Quit {
                    break;
                }
            }
            Err(reason) => console::report_invalid(&session, &line, &reason),
        }
    }

    if input_closed {
        console::wait_detached(&session, async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await;
    }

    session.shutdown().await;
    Ok(())
}
