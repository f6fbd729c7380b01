// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use crate::common::error::{AppError, is_nonce_collision_message};
use crate::infrastructure::data::abi::IWETH;
use crate::network::provider::HttpProvider;
use alloy::primitives::{Address, B256, TxKind, U256};
use alloy::providers::Provider;
use alloy::rpc::types::eth::{TransactionInput, TransactionRequest};
use alloy_sol_types::SolCall;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Wrapped-token contract methods the cycler submits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WrappedCall {
    Deposit,
    Withdraw { amount: U256 },
    Approve { spender: Address, amount: U256 },
}

impl WrappedCall {
    pub fn calldata(&self) -> Vec<u8> {
        match *self {
            WrappedCall::Deposit => IWETH::depositCall {}.abi_encode(),
            WrappedCall::Withdraw { amount } => IWETH::withdrawCall { wad: amount }.abi_encode(),
            WrappedCall::Approve { spender, amount } => IWETH::approveCall {
                guy: spender,
                wad: amount,
            }
            .abi_encode(),
        }
    }

    pub fn method(&self) -> &'static str {
        match self {
            WrappedCall::Deposit => "deposit",
            WrappedCall::Withdraw { .. } => "withdraw",
            WrappedCall::Approve { .. } => "approve",
        }
    }
}

impl fmt::Display for WrappedCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.method())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TxOptions {
    pub value: U256,
    pub gas_limit: u64,
    pub nonce: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReceiptSummary {
    pub hash: B256,
    pub block_number: Option<u64>,
    pub gas_used: u64,
}

/// Everything the cycler needs from the chain for its single managed account.
#[async_trait]
pub trait ChainClient: Send + Sync {
    fn address(&self) -> Address;

    fn wrapped_token(&self) -> Address;

    async fn pending_nonce(&self) -> Result<u64, AppError>;

    async fn native_balance(&self) -> Result<U256, AppError>;

    async fn token_balance(&self, token: Address) -> Result<U256, AppError>;

    async fn allowance(&self, token: Address, spender: Address) -> Result<U256, AppError>;

    /// Broadcast a call to the wrapped-token contract and return its hash.
    async fn send_call(&self, call: WrappedCall, opts: TxOptions) -> Result<B256, AppError>;

    /// Resolves once the transaction is mined. Never times out.
    async fn wait_for_confirmation(&self, hash: B256) -> Result<ReceiptSummary, AppError>;
}

pub type SharedChainClient = Arc<dyn ChainClient>;

/// Map a broadcast failure into the error taxonomy, keeping nonce collisions typed.
pub fn classify_send_error(err: impl fmt::Display) -> AppError {
    let msg = err.to_string();
    if is_nonce_collision_message(&msg) {
        AppError::NonceConflict(msg)
    } else {
        AppError::Rpc(msg)
    }
}

pub struct AlloyChainClient {
    provider: HttpProvider,
    address: Address,
    weth: Address,
    receipt_poll: Duration,
}

impl AlloyChainClient {
    pub fn new(
        provider: HttpProvider,
        address: Address,
        weth: Address,
        receipt_poll: Duration,
    ) -> Self {
        Self {
            provider,
            address,
            weth,
            receipt_poll,
        }
    }
}

#[async_trait]
impl ChainClient for AlloyChainClient {
    fn address(&self) -> Address {
        self.address
    }

    fn wrapped_token(&self) -> Address {
        self.weth
    }

    async fn pending_nonce(&self) -> Result<u64, AppError> {
        self.provider
            .get_transaction_count(self.address)
            .pending()
            .await
            .map_err(|e| AppError::Connection(format!("Failed to fetch nonce: {}", e)))
    }

    async fn native_balance(&self) -> Result<U256, AppError> {
        self.provider
            .get_balance(self.address)
            .await
            .map_err(|e| AppError::Rpc(format!("Balance query failed: {}", e)))
    }

    async fn token_balance(&self, token: Address) -> Result<U256, AppError> {
        IWETH::new(token, self.provider.clone())
            .balanceOf(self.address)
            .call()
            .await
            .map_err(|e| AppError::Rpc(format!("Token balance query failed: {}", e)))
    }

    async fn allowance(&self, token: Address, spender: Address) -> Result<U256, AppError> {
        IWETH::new(token, self.provider.clone())
            .allowance(self.address, spender)
            .call()
            .await
            .map_err(|e| AppError::Rpc(format!("Allowance check failed: {}", e)))
    }

    async fn send_call(&self, call: WrappedCall, opts: TxOptions) -> Result<B256, AppError> {
        let request = TransactionRequest {
            from: Some(self.address),
            to: Some(TxKind::Call(self.weth)),
            gas: Some(opts.gas_limit),
            value: Some(opts.value),
            input: TransactionInput::new(call.calldata().into()),
            nonce: Some(opts.nonce),
            ..Default::default()
        };

        let pending = self
            .provider
            .send_transaction(request)
            .await
            .map_err(classify_send_error)?;
        let hash = *pending.tx_hash();
        tracing::debug!(
            target: "chain",
            method = call.method(),
            nonce = opts.nonce,
            hash = %hash,
            "Transaction broadcast"
        );
        Ok(hash)
    }

    async fn wait_for_confirmation(&self, hash: B256) -> Result<ReceiptSummary, AppError> {
        loop {
            match self.provider.get_transaction_receipt(hash).await {
                Ok(Some(rcpt)) => {
                    if !rcpt.status() {
                        return Err(AppError::Transaction {
                            hash: format!("{:#x}", hash),
                            reason: "reverted on-chain".into(),
                        });
                    }
                    return Ok(ReceiptSummary {
                        hash,
                        block_number: rcpt.block_number,
                        gas_used: rcpt.gas_used,
                    });
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::debug!(target: "chain", hash = %hash, error = %e, "Receipt poll failed");
                }
            }
            tokio::time::sleep(self.receipt_poll).await;
        }
    }
}
