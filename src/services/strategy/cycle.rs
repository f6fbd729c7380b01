// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use crate::common::delay::{WaitOutcome, describe_delay, random_delay, wait_with_cancel};
use crate::common::error::AppError;
use crate::common::parsing::short_hash;
use crate::domain::constants::{
    DEFAULT_CYCLE_DELAY_MAX_SECS, DEFAULT_CYCLE_DELAY_MIN_SECS, DEFAULT_GAS_LIMIT,
    DEFAULT_NETWORK_NAME, DEFAULT_SWAP_AMOUNT_MAX_ETH, DEFAULT_SWAP_AMOUNT_MIN_ETH,
    SWAP_AMOUNT_DECIMALS,
};
use crate::network::chain::{SharedChainClient, TxOptions, WrappedCall};
use crate::services::execution::tx_queue::TransactionQueue;
use crate::services::sink::{LogCategory, SharedSink};
use crate::services::wallet::refresh_wallet;
use alloy::primitives::U256;
use alloy::primitives::utils::parse_ether;
use rand::Rng;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Which side of the native/wrapped pair the account currently holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Eth,
    Wrapped,
}

impl Phase {
    pub fn flipped(self) -> Self {
        match self {
            Phase::Eth => Phase::Wrapped,
            Phase::Wrapped => Phase::Eth,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Eth => write!(f, "ETH"),
            Phase::Wrapped => write!(f, "WETH"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct CycleSettings {
    pub network_name: String,
    pub gas_limit: u64,
    pub amount_min_eth: f64,
    pub amount_max_eth: f64,
    pub delay_min: Duration,
    pub delay_max: Duration,
}

impl Default for CycleSettings {
    fn default() -> Self {
        Self {
            network_name: DEFAULT_NETWORK_NAME.to_string(),
            gas_limit: DEFAULT_GAS_LIMIT,
            amount_min_eth: DEFAULT_SWAP_AMOUNT_MIN_ETH,
            amount_max_eth: DEFAULT_SWAP_AMOUNT_MAX_ETH,
            delay_min: Duration::from_secs(DEFAULT_CYCLE_DELAY_MIN_SECS),
            delay_max: Duration::from_secs(DEFAULT_CYCLE_DELAY_MAX_SECS),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum CycleExit {
    Completed,
    /// `at_cycle` is the first repetition that did not run.
    Cancelled { at_cycle: u32 },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    /// Repetitions whose transaction confirmed and flipped the phase.
    pub completed_cycles: u32,
    pub attempted_cycles: u32,
    pub final_phase: Phase,
    pub exit: CycleExit,
}

/// Collaborators shared by every strategy of a session.
pub struct CycleContext {
    pub chain: SharedChainClient,
    pub queue: Arc<TransactionQueue>,
    pub sink: SharedSink,
    pub settings: CycleSettings,
}

/// Uniform amount in `[min, max]` ether, rounded to the display precision
/// before conversion to wei. Returns the rounded text alongside the value.
pub fn random_swap_amount(min_eth: f64, max_eth: f64) -> Result<(String, U256), AppError> {
    let raw = if max_eth > min_eth {
        rand::thread_rng().gen_range(min_eth..=max_eth)
    } else {
        min_eth
    };
    let text = format!("{raw:.prec$}", prec = SWAP_AMOUNT_DECIMALS);
    let wei = parse_ether(&text).map_err(|e| AppError::Validation {
        field: "swap_amount".into(),
        message: format!("{text}: {e}"),
    })?;
    Ok((text, wei))
}

/// Drives the wrap/unwrap loop for one strategy.
///
/// Every chain effect goes through the shared [`TransactionQueue`]; the phase
/// only flips after the corresponding transaction confirmed, so a failed or
/// cancelled repetition leaves it where it was.
pub struct SwapCycleController {
    strategy: String,
    ctx: Arc<CycleContext>,
    cancel: CancellationToken,
    phase: watch::Sender<Phase>,
}

impl SwapCycleController {
    pub fn new(
        strategy: impl Into<String>,
        ctx: Arc<CycleContext>,
        cancel: CancellationToken,
        phase: watch::Sender<Phase>,
    ) -> Self {
        Self {
            strategy: strategy.into(),
            ctx,
            cancel,
            phase,
        }
    }

    fn log(&self, text: String) {
        self.ctx
            .sink
            .on_log_event(&text, LogCategory::Strategy(self.strategy.clone()));
    }

    pub async fn run(self, repetitions: u32) -> CycleReport {
        let name = self.strategy.clone();
        let mut phase = Phase::Eth;
        self.phase.send_replace(phase);

        let mut completed_cycles = 0u32;
        let mut attempted_cycles = 0u32;
        let mut exit = CycleExit::Completed;

        tracing::info!(target: "strategy", strategy = %name, repetitions, "Swap loop started");
        self.log(format!("{name}: starting {repetitions} cycle(s)."));

        for cycle in 1..=repetitions {
            if self.cancel.is_cancelled() {
                self.log(format!("{name}: stopped at cycle {cycle}."));
                exit = CycleExit::Cancelled { at_cycle: cycle };
                break;
            }
            attempted_cycles += 1;

            let committed = match random_swap_amount(
                self.ctx.settings.amount_min_eth,
                self.ctx.settings.amount_max_eth,
            ) {
                Ok((shown, amount)) => match phase {
                    Phase::Eth => self.wrap(cycle, &shown, amount).await,
                    Phase::Wrapped => self.unwrap(cycle, &shown, amount).await,
                },
                Err(e) => {
                    self.ctx.sink.on_log_event(
                        &format!("{name}: could not pick an amount: {e}"),
                        LogCategory::Error,
                    );
                    false
                }
            };

            if committed {
                phase = phase.flipped();
                self.phase.send_replace(phase);
                completed_cycles += 1;
                tracing::debug!(target: "strategy", strategy = %name, cycle, %phase, "Phase committed");
            }

            if cycle < repetitions {
                let delay = random_delay(self.ctx.settings.delay_min, self.ctx.settings.delay_max);
                self.log(format!(
                    "{name}: cycle {cycle} finished. Waiting {}.",
                    describe_delay(delay)
                ));
                if wait_with_cancel(delay, &self.cancel).await == WaitOutcome::Cancelled {
                    self.log(format!("{name}: stopped during the wait."));
                    exit = CycleExit::Cancelled { at_cycle: cycle + 1 };
                    break;
                }
            }
        }

        self.log(format!("{name}: swap loop finished."));
        tracing::info!(
            target: "strategy",
            strategy = %name,
            completed_cycles,
            attempted_cycles,
            final_phase = %phase,
            "Swap loop finished"
        );

        CycleReport {
            completed_cycles,
            attempted_cycles,
            final_phase: phase,
            exit,
        }
    }

    fn description(&self, cycle: u32, what: &str) -> String {
        format!("{} {what} - cycle {cycle}", self.strategy)
    }

    /// Submit `call` through the queue and wait for its confirmation.
    async fn submit(&self, description: String, call: WrappedCall, value: U256) -> bool {
        let chain = self.ctx.chain.clone();
        let sink = self.ctx.sink.clone();
        let gas_limit = self.ctx.settings.gas_limit;
        let name = self.strategy.clone();

        self.ctx
            .queue
            .enqueue(description, move |nonce| async move {
                let hash = chain
                    .send_call(
                        call,
                        TxOptions {
                            value,
                            gas_limit,
                            nonce,
                        },
                    )
                    .await?;
                sink.on_log_event(
                    &format!("{name}: {call} sent. Hash: {}", short_hash(&hash)),
                    LogCategory::Strategy(name.clone()),
                );
                let receipt = chain.wait_for_confirmation(hash).await?;
                sink.on_log_event(
                    &format!("{name}: {call} confirmed. Hash: {}", short_hash(&receipt.hash)),
                    LogCategory::Success,
                );
                Ok(())
            })
            .await
            .is_some()
    }

    async fn wrap(&self, cycle: u32, shown: &str, amount: U256) -> bool {
        self.log(format!("{}: swapping {shown} ETH -> WETH.", self.strategy));
        self.submit(self.description(cycle, "swap"), WrappedCall::Deposit, amount)
            .await
    }

    async fn unwrap(&self, cycle: u32, shown: &str, amount: U256) -> bool {
        let name = &self.strategy;
        self.log(format!("{name}: swapping {shown} WETH -> ETH."));

        let weth = self.ctx.chain.wrapped_token();
        match self.ctx.chain.allowance(weth, weth).await {
            Ok(current) if current >= amount => {}
            Ok(_) => {
                self.log(format!("{name}: withdraw needs approval first."));
                let approve = WrappedCall::Approve {
                    spender: weth,
                    amount: U256::MAX,
                };
                if !self
                    .submit(self.description(cycle, "approve"), approve, U256::ZERO)
                    .await
                {
                    return false;
                }
                self.ctx
                    .sink
                    .on_log_event(&format!("{name}: approval confirmed."), LogCategory::Success);
            }
            Err(e) => {
                self.ctx.sink.on_log_event(
                    &format!("{name}: allowance check failed: {e}"),
                    LogCategory::Error,
                );
                return false;
            }
        }

        let withdrawn = self
            .submit(
                self.description(cycle, "swap"),
                WrappedCall::Withdraw { amount },
                U256::ZERO,
            )
            .await;
        if withdrawn
            && let Err(e) = refresh_wallet(
                self.ctx.chain.as_ref(),
                self.ctx.sink.as_ref(),
                &self.ctx.settings.network_name,
            )
            .await
        {
            tracing::warn!(target: "wallet", strategy = %name, error = %e, "Wallet refresh failed");
        }
        withdrawn
    }
}
