// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@on1.no>

use crate::common::error::AppError;
use crate::network::chain::ChainClient;
use crate::services::sink::{StatusSink, WalletSnapshot};

/// Read both balances of the managed account and push them to the sink.
pub async fn refresh_wallet(
    chain: &dyn ChainClient,
    sink: &dyn StatusSink,
    network: &str,
) -> Result<WalletSnapshot, AppError> {
    let native_balance = chain.native_balance().await?;
    let token_balance = chain.token_balance(chain.wrapped_token()).await?;
    let snapshot = WalletSnapshot {
        address: chain.address(),
        network: network.to_string(),
        native_balance,
        token_balance,
    };
    tracing::debug!(
        target: "wallet",
        address = %snapshot.address,
        native = %snapshot.native_balance,
        token = %snapshot.token_balance,
        "Wallet balances refreshed"
    );
    sink.on_wallet_snapshot(&snapshot);
    Ok(snapshot)
}
