// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@on1.no>

//! Outbound status surface. A presentation layer implements [`StatusSink`] to
//! receive log lines, queue snapshots and wallet balances; [`TracingSink`]
//! renders them through `tracing` for headless runs.

use crate::common::parsing::short_address;
use crate::services::execution::tx_queue::QueuedTxStatus;
use alloy::primitives::utils::format_ether;
use alloy::primitives::{Address, U256};
use chrono::{DateTime, Local};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "strategy")]
pub enum LogCategory {
    System,
    Strategy(String),
    Success,
    Warning,
    Error,
}

impl fmt::Display for LogCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogCategory::System => write!(f, "system"),
            LogCategory::Strategy(name) => write!(f, "{}", name),
            LogCategory::Success => write!(f, "success"),
            LogCategory::Warning => write!(f, "warning"),
            LogCategory::Error => write!(f, "error"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct QueueEntrySnapshot {
    pub id: u64,
    pub description: String,
    pub status: QueuedTxStatus,
    pub submitted_at: DateTime<Local>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct WalletSnapshot {
    pub address: Address,
    pub network: String,
    pub native_balance: U256,
    pub token_balance: U256,
}

impl WalletSnapshot {
    /// Balances in whole units, four decimals.
    pub fn summary(&self) -> String {
        format!(
            "{} | ETH {} | WETH {} | {}",
            short_address(&self.address),
            four_decimals(self.native_balance),
            four_decimals(self.token_balance),
            self.network
        )
    }
}

fn four_decimals(wei: U256) -> String {
    let full = format_ether(wei);
    match full.split_once('.') {
        Some((int, frac)) => {
            let mut frac: String = frac.chars().take(4).collect();
            while frac.len() < 4 {
                frac.push('0');
            }
            format!("{int}.{frac}")
        }
        None => format!("{full}.0000"),
    }
}

pub trait StatusSink: Send + Sync {
    fn on_log_event(&self, text: &str, category: LogCategory);

    fn on_queue_snapshot(&self, entries: &[QueueEntrySnapshot]);

    fn on_wallet_snapshot(&self, wallet: &WalletSnapshot);
}

pub type SharedSink = Arc<dyn StatusSink>;

#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;

impl StatusSink for TracingSink {
    fn on_log_event(&self, text: &str, category: LogCategory) {
        match category {
            LogCategory::Error => tracing::error!(target: "sink", category = %category, "{}", text),
            LogCategory::Warning => tracing::warn!(target: "sink", category = %category, "{}", text),
            _ => tracing::info!(target: "sink", category = %category, "{}", text),
        }
    }

    fn on_queue_snapshot(&self, entries: &[QueueEntrySnapshot]) {
        if entries.is_empty() {
            tracing::debug!(target: "sink", "Transaction queue is empty");
            return;
        }
        for entry in entries {
            tracing::debug!(
                target: "sink",
                id = entry.id,
                status = %entry.status,
                submitted_at = %entry.submitted_at.format("%H:%M:%S"),
                "{}",
                entry.description
            );
        }
    }

    fn on_wallet_snapshot(&self, wallet: &WalletSnapshot) {
        tracing::info!(target: "wallet", "{}", wallet.summary());
    }
}
