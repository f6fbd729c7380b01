// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use crate::common::error::AppError;
use crate::network::chain::SharedChainClient;
use tokio::sync::Mutex;

/// Next nonce for the managed account.
///
/// Lazily seeded from the pending transaction count and afterwards only moved
/// forward by the transaction queue's worker.
pub struct NonceSequencer {
    chain: SharedChainClient,
    next: Mutex<Option<u64>>,
}

impl NonceSequencer {
    pub fn new(chain: SharedChainClient) -> Self {
        Self {
            chain,
            next: Mutex::new(None),
        }
    }

    pub async fn current(&self) -> Option<u64> {
        *self.next.lock().await
    }

    /// Fetches the pending count at most once; the lock is held across the
    /// fetch so concurrent first callers observe the same seed.
    pub async fn initialize_if_needed(&self) -> Result<u64, AppError> {
        let mut guard = self.next.lock().await;
        if let Some(nonce) = *guard {
            return Ok(nonce);
        }

        let on_chain_nonce = self.chain.pending_nonce().await?;
        *guard = Some(on_chain_nonce);
        tracing::info!(
            target: "nonce",
            address = %self.chain.address(),
            nonce = on_chain_nonce,
            "Initial nonce loaded from pending count"
        );
        Ok(on_chain_nonce)
    }

    pub async fn advance(&self) -> Option<u64> {
        let mut guard = self.next.lock().await;
        if let Some(nonce) = guard.as_mut() {
            *nonce += 1;
        }
        *guard
    }

    /// Extra step past a nonce that something else already consumed.
    pub async fn skip_one(&self) -> Option<u64> {
        let next = self.advance().await;
        if let Some(nonce) = next {
            tracing::warn!(target: "nonce", nonce, "Nonce already used; skipped ahead");
        }
        next
    }
}
