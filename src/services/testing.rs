// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

//! In-memory chain and sink used by unit tests.

use crate::common::error::AppError;
use crate::network::chain::{ChainClient, ReceiptSummary, TxOptions, WrappedCall, classify_send_error};
use crate::services::sink::{LogCategory, QueueEntrySnapshot, StatusSink, WalletSnapshot};
use alloy::primitives::{Address, B256, U256};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

pub const ACCOUNT: Address = Address::repeat_byte(0xaa);
pub const WETH: Address = Address::repeat_byte(0xee);

#[derive(Default)]
pub struct FakeChain {
    pending: AtomicU64,
    nonce_fetches: AtomicUsize,
    failing_nonce_fetches: AtomicUsize,
    allowance: Mutex<U256>,
    grant_on_approve: AtomicBool,
    always_fail: Mutex<HashSet<&'static str>>,
    fail_once: Mutex<HashMap<&'static str, Vec<String>>>,
    send_latency: Mutex<Option<Duration>>,
    sent: Mutex<Vec<(WrappedCall, TxOptions)>>,
    balance_reads: AtomicUsize,
    hashes: AtomicU64,
}

impl FakeChain {
    pub fn with_pending(pending: u64) -> Self {
        let chain = Self::default();
        chain.pending.store(pending, Ordering::SeqCst);
        chain.grant_on_approve.store(true, Ordering::SeqCst);
        chain
    }

    pub fn fail_nonce_fetches(&self, count: usize) {
        self.failing_nonce_fetches.store(count, Ordering::SeqCst);
    }

    pub fn nonce_fetch_count(&self) -> usize {
        self.nonce_fetches.load(Ordering::SeqCst)
    }

    pub fn set_allowance(&self, allowance: U256) {
        *self.allowance.lock().unwrap() = allowance;
    }

    /// Approvals confirm but never change the allowance read back.
    pub fn ignore_approvals(&self) {
        self.grant_on_approve.store(false, Ordering::SeqCst);
    }

    pub fn always_fail(&self, method: &'static str) {
        self.always_fail.lock().unwrap().insert(method);
    }

    pub fn fail_next(&self, method: &'static str, message: &str) {
        self.fail_once
            .lock()
            .unwrap()
            .entry(method)
            .or_default()
            .push(message.to_string());
    }

    pub fn set_send_latency(&self, latency: Duration) {
        *self.send_latency.lock().unwrap() = Some(latency);
    }

    pub fn sent(&self) -> Vec<(WrappedCall, TxOptions)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_methods(&self) -> Vec<&'static str> {
        self.sent().iter().map(|(c, _)| c.method()).collect()
    }

    pub fn sent_nonces(&self) -> Vec<u64> {
        self.sent().iter().map(|(_, o)| o.nonce).collect()
    }

    pub fn balance_reads(&self) -> usize {
        self.balance_reads.load(Ordering::SeqCst)
    }

    fn scripted_failure(&self, method: &'static str) -> Option<String> {
        if self.always_fail.lock().unwrap().contains(method) {
            return Some(format!("{method} execution reverted"));
        }
        let mut once = self.fail_once.lock().unwrap();
        let queue = once.get_mut(method)?;
        if queue.is_empty() {
            None
        } else {
            Some(queue.remove(0))
        }
    }
}

#[async_trait]
impl ChainClient for FakeChain {
    fn address(&self) -> Address {
        ACCOUNT
    }

    fn wrapped_token(&self) -> Address {
        WETH
    }

    async fn pending_nonce(&self) -> Result<u64, AppError> {
        self.nonce_fetches.fetch_add(1, Ordering::SeqCst);
        let failing = self.failing_nonce_fetches.load(Ordering::SeqCst);
        if failing > 0 {
            self.failing_nonce_fetches.store(failing - 1, Ordering::SeqCst);
            return Err(AppError::Connection("pending count unavailable".into()));
        }
        Ok(self.pending.load(Ordering::SeqCst))
    }

    async fn native_balance(&self) -> Result<U256, AppError> {
        self.balance_reads.fetch_add(1, Ordering::SeqCst);
        Ok(U256::from(1_000_000_000_000_000_000u64))
    }

    async fn token_balance(&self, _token: Address) -> Result<U256, AppError> {
        Ok(U256::from(500_000_000_000_000u64))
    }

    async fn allowance(&self, _token: Address, _spender: Address) -> Result<U256, AppError> {
        Ok(*self.allowance.lock().unwrap())
    }

    async fn send_call(&self, call: WrappedCall, opts: TxOptions) -> Result<B256, AppError> {
        let latency = *self.send_latency.lock().unwrap();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        self.sent.lock().unwrap().push((call, opts));
        if let Some(message) = self.scripted_failure(call.method()) {
            return Err(classify_send_error(message));
        }
        if let WrappedCall::Approve { amount, .. } = call
            && self.grant_on_approve.load(Ordering::SeqCst)
        {
            *self.allowance.lock().unwrap() = amount;
        }
        let n = self.hashes.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(B256::left_padding_from(&n.to_be_bytes()))
    }

    async fn wait_for_confirmation(&self, hash: B256) -> Result<ReceiptSummary, AppError> {
        tokio::task::yield_now().await;
        Ok(ReceiptSummary {
            hash,
            block_number: Some(1),
            gas_used: 30_000,
        })
    }
}

/// Keeps every sink call for assertions.
#[derive(Default)]
pub struct RecordingSink {
    pub logs: Mutex<Vec<(String, LogCategory)>>,
    pub snapshots: Mutex<Vec<Vec<QueueEntrySnapshot>>>,
    pub wallets: Mutex<Vec<WalletSnapshot>>,
}

impl RecordingSink {
    pub fn lines(&self) -> Vec<String> {
        self.logs.lock().unwrap().iter().map(|(t, _)| t.clone()).collect()
    }

    pub fn count_in(&self, category: &LogCategory) -> usize {
        self.logs
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, c)| c == category)
            .count()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines().iter().any(|l| l.contains(needle))
    }

    pub fn count_containing(&self, needle: &str) -> usize {
        self.lines().iter().filter(|l| l.contains(needle)).count()
    }
}

impl StatusSink for RecordingSink {
    fn on_log_event(&self, text: &str, category: LogCategory) {
        self.logs.lock().unwrap().push((text.to_string(), category));
    }

    fn on_queue_snapshot(&self, entries: &[QueueEntrySnapshot]) {
        self.snapshots.lock().unwrap().push(entries.to_vec());
    }

    fn on_wallet_snapshot(&self, wallet: &WalletSnapshot) {
        self.wallets.lock().unwrap().push(wallet.clone());
    }
}
