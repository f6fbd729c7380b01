// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@on1.no>

//! Process-wide state for one managed account: the nonce sequencer, the
//! transaction queue and the per-strategy run slots, plus the control
//! operations a presentation layer calls.

use crate::common::error::AppError;
use crate::common::parsing::parse_repetition_count;
use crate::network::chain::SharedChainClient;
use crate::network::nonce::NonceSequencer;
use crate::services::execution::tx_queue::TransactionQueue;
use crate::services::sink::{LogCategory, QueueEntrySnapshot, SharedSink, WalletSnapshot};
use crate::services::strategy::{CycleContext, CycleReport, CycleSettings, Phase, SwapCycleController};
use crate::services::wallet;
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

struct StrategySlot {
    running: bool,
    cancel: CancellationToken,
    phase: watch::Receiver<Phase>,
    /// Closed once the loop task has returned and cleared `running`.
    alive: watch::Receiver<()>,
}

impl StrategySlot {
    fn idle() -> Self {
        let (_, phase) = watch::channel(Phase::Eth);
        let (_, alive) = watch::channel(());
        Self {
            running: false,
            cancel: CancellationToken::new(),
            phase,
            alive,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StrategyStatus {
    pub id: String,
    pub running: bool,
    pub phase: Phase,
}

pub struct Session {
    ctx: Arc<CycleContext>,
    sequencer: Arc<NonceSequencer>,
    order: Vec<String>,
    slots: Arc<DashMap<String, StrategySlot>>,
}

impl Session {
    /// Starts the queue worker, so it must be called inside a Tokio runtime.
    pub fn new(
        chain: SharedChainClient,
        sink: SharedSink,
        settings: CycleSettings,
        strategies: &[String],
    ) -> Self {
        let sequencer = Arc::new(NonceSequencer::new(chain.clone()));
        let queue = Arc::new(TransactionQueue::start(sequencer.clone(), sink.clone()));
        let slots = Arc::new(DashMap::new());
        let mut order = Vec::with_capacity(strategies.len());
        for id in strategies {
            if slots.insert(id.clone(), StrategySlot::idle()).is_none() {
                order.push(id.clone());
            }
        }
        tracing::info!(target: "session", strategies = ?order, address = %chain.address(), "Session ready");

        Self {
            ctx: Arc::new(CycleContext {
                chain,
                queue,
                sink,
                settings,
            }),
            sequencer,
            order,
            slots,
        }
    }

    fn warn(&self, text: String) {
        self.ctx.sink.on_log_event(&text, LogCategory::Warning);
    }

    fn unknown(&self, id: &str) -> AppError {
        self.warn(format!("Unknown strategy '{id}'. Known: {}.", self.order.join(", ")));
        AppError::UnknownStrategy(id.to_string())
    }

    pub fn sink(&self) -> &SharedSink {
        &self.ctx.sink
    }

    pub fn queue(&self) -> &TransactionQueue {
        &self.ctx.queue
    }

    pub async fn current_nonce(&self) -> Option<u64> {
        self.sequencer.current().await
    }

    /// Launch the swap loop for `id` with a repetition count typed by the user.
    ///
    /// Rejects unknown ids, a strategy that is already running, and counts
    /// that are not a positive integer, each with one warning line and no
    /// state change.
    pub fn start_strategy(
        &self,
        id: &str,
        repetitions: &str,
    ) -> Result<JoinHandle<CycleReport>, AppError> {
        let Some(mut slot) = self.slots.get_mut(id) else {
            return Err(self.unknown(id));
        };
        if slot.running {
            drop(slot);
            self.warn(format!("{id}: already running."));
            return Err(AppError::AlreadyRunning(id.to_string()));
        }
        let count = match parse_repetition_count(repetitions) {
            Ok(count) => count,
            Err(e) => {
                drop(slot);
                self.warn(format!("{id}: repetition count must be a positive number ({e})."));
                return Err(e);
            }
        };

        let cancel = CancellationToken::new();
        let (phase_tx, phase_rx) = watch::channel(Phase::Eth);
        let (alive_tx, alive_rx) = watch::channel(());
        slot.running = true;
        slot.cancel = cancel.clone();
        slot.phase = phase_rx;
        slot.alive = alive_rx;
        drop(slot);

        tracing::info!(target: "session", strategy = id, repetitions = count, "Starting strategy");
        let controller = SwapCycleController::new(id, self.ctx.clone(), cancel, phase_tx);
        let slots = self.slots.clone();
        let id = id.to_string();
        Ok(tokio::spawn(async move {
            let report = controller.run(count).await;
            if let Some(mut slot) = slots.get_mut(&id) {
                slot.running = false;
            }
            drop(alive_tx);
            tracing::info!(target: "session", strategy = %id, ?report, "Strategy stopped");
            report
        }))
    }

    /// Request a cooperative stop. Returns whether a loop was running.
    pub fn stop_strategy(&self, id: &str) -> Result<bool, AppError> {
        let Some(slot) = self.slots.get(id) else {
            return Err(self.unknown(id));
        };
        let running = slot.running;
        if running {
            slot.cancel.cancel();
        }
        drop(slot);

        if running {
            self.ctx.sink.on_log_event(
                &format!("{id}: stop requested; ends after the current transaction."),
                LogCategory::Strategy(id.to_string()),
            );
        } else {
            self.ctx.sink.on_log_event(
                &format!("{id}: no transaction running."),
                LogCategory::Strategy(id.to_string()),
            );
        }
        Ok(running)
    }

    /// Stop every running strategy; returns how many were signalled.
    pub fn stop_all(&self) -> usize {
        let mut stopped = 0;
        for slot in self.slots.iter() {
            if slot.running {
                slot.cancel.cancel();
                stopped += 1;
            }
        }
        if stopped > 0 {
            let noun = if stopped == 1 { "strategy" } else { "strategies" };
            self.ctx.sink.on_log_event(
                &format!("Stopping {stopped} running {noun}."),
                LogCategory::System,
            );
        }
        stopped
    }

    pub async fn refresh_wallet(&self) -> Result<WalletSnapshot, AppError> {
        wallet::refresh_wallet(
            self.ctx.chain.as_ref(),
            self.ctx.sink.as_ref(),
            &self.ctx.settings.network_name,
        )
        .await
    }

    pub fn queue_snapshot(&self) -> Vec<QueueEntrySnapshot> {
        let entries = self.ctx.queue.snapshot();
        self.ctx.sink.on_queue_snapshot(&entries);
        entries
    }

    pub fn strategy_status(&self) -> Vec<StrategyStatus> {
        self.order
            .iter()
            .filter_map(|id| {
                self.slots.get(id).map(|slot| StrategyStatus {
                    id: id.clone(),
                    running: slot.running,
                    phase: *slot.phase.borrow(),
                })
            })
            .collect()
    }

    /// Resolves once no strategy loop is alive.
    pub async fn wait_idle(&self) {
        let watchers: Vec<watch::Receiver<()>> =
            self.slots.iter().map(|slot| slot.alive.clone()).collect();
        for mut alive in watchers {
            while alive.changed().await.is_ok() {}
        }
    }

    /// Stop all loops, wait for them, then let the queue finish its
    /// in-flight transaction and exit.
    pub async fn shutdown(&self) {
        self.stop_all();
        self.wait_idle().await;
        self.ctx.queue.shutdown().await;
        tracing::info!(target: "session", "Session shut down");
    }
}
