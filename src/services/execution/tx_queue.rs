// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use crate::common::error::AppError;
use crate::network::nonce::NonceSequencer;
use crate::services::sink::{LogCategory, QueueEntrySnapshot, SharedSink};
use chrono::{DateTime, Local};
use dashmap::DashMap;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll};
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueuedTxStatus {
    Queued,
    Processing,
    Completed,
    Error,
}

impl fmt::Display for QueuedTxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueuedTxStatus::Queued => write!(f, "queued"),
            QueuedTxStatus::Processing => write!(f, "processing"),
            QueuedTxStatus::Completed => write!(f, "completed"),
            QueuedTxStatus::Error => write!(f, "error"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct QueuedTransaction {
    pub id: u64,
    pub description: String,
    pub submitted_at: DateTime<Local>,
    pub status: QueuedTxStatus,
}

impl From<&QueuedTransaction> for QueueEntrySnapshot {
    fn from(tx: &QueuedTransaction) -> Self {
        Self {
            id: tx.id,
            description: tx.description.clone(),
            status: tx.status,
            submitted_at: tx.submitted_at,
        }
    }
}

type Deliver = Box<dyn FnOnce() + Send>;
type JobFuture = Pin<Box<dyn Future<Output = Result<Deliver, AppError>> + Send>>;
type JobFn = Box<dyn FnOnce(u64) -> JobFuture + Send>;

struct Job {
    id: u64,
    run: JobFn,
}

/// Completion handle returned by [`TransactionQueue::enqueue`].
///
/// Resolves to `Some(result)` when the task succeeded and `None` when it
/// failed, was abandoned at shutdown, or never reached the worker.
pub struct QueueHandle<T> {
    id: u64,
    rx: oneshot::Receiver<T>,
}

impl<T> QueueHandle<T> {
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl<T> Future for QueueHandle<T> {
    type Output = Option<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx).poll(cx).map(Result::ok)
    }
}

struct QueueState {
    entries: DashMap<u64, QueuedTransaction>,
    sequencer: Arc<NonceSequencer>,
    sink: SharedSink,
}

impl QueueState {
    fn log(&self, text: String) {
        self.sink.on_log_event(&text, LogCategory::System);
    }

    fn log_error(&self, text: String) {
        self.sink.on_log_event(&text, LogCategory::Error);
    }

    fn snapshot(&self) -> Vec<QueueEntrySnapshot> {
        let mut entries: Vec<QueueEntrySnapshot> = self
            .entries
            .iter()
            .map(|r| QueueEntrySnapshot::from(r.value()))
            .collect();
        entries.sort_by_key(|e| e.id);
        entries
    }

    fn publish(&self) {
        self.sink.on_queue_snapshot(&self.snapshot());
    }

    fn set_status(&self, id: u64, status: QueuedTxStatus) {
        if let Some(mut tx) = self.entries.get_mut(&id) {
            tx.status = status;
        }
        tracing::debug!(target: "tx_queue", id, %status, "Queue entry updated");
        self.publish();
    }

    fn finish(&self, id: u64) {
        self.entries.remove(&id);
        self.publish();
    }

    async fn process(&self, job: Job) {
        let Job { id, run } = job;

        let nonce = match self.sequencer.initialize_if_needed().await {
            Ok(nonce) => nonce,
            Err(e) => {
                self.set_status(id, QueuedTxStatus::Error);
                self.log_error(format!("Transaction [{id}] failed: could not load nonce: {e}"));
                self.finish(id);
                return;
            }
        };

        self.set_status(id, QueuedTxStatus::Processing);
        self.log(format!("Transaction [{id}] processing with nonce {nonce}."));

        let outcome = AssertUnwindSafe(run(nonce))
            .catch_unwind()
            .await
            .unwrap_or_else(|_| {
                Err(AppError::Initialization(format!("task for transaction [{id}] panicked")))
            });

        match outcome {
            Ok(deliver) => {
                self.sequencer.advance().await;
                self.set_status(id, QueuedTxStatus::Completed);
                self.log(format!("Transaction [{id}] completed."));
                deliver();
            }
            Err(e) => {
                self.set_status(id, QueuedTxStatus::Error);
                self.log_error(format!("Transaction [{id}] failed: {e}"));
                self.sequencer.advance().await;
                if e.is_nonce_collision()
                    && let Some(next) = self.sequencer.skip_one().await
                {
                    self.log(format!("Nonce was already used; next nonce is {next}."));
                }
            }
        }

        self.finish(id);
    }
}

/// Single-consumer pipeline that runs nonce-bearing tasks one at a time in
/// submission order.
pub struct TransactionQueue {
    state: Arc<QueueState>,
    next_id: AtomicU64,
    sender: mpsc::UnboundedSender<Job>,
    shutdown: CancellationToken,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl TransactionQueue {
    /// Spawns the worker on the current runtime.
    pub fn start(sequencer: Arc<NonceSequencer>, sink: SharedSink) -> Self {
        let state = Arc::new(QueueState {
            entries: DashMap::new(),
            sequencer,
            sink,
        });
        let (sender, receiver) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();
        let worker = tokio::spawn(run_worker(state.clone(), receiver, shutdown.clone()));

        Self {
            state,
            next_id: AtomicU64::new(0),
            sender,
            shutdown,
            worker: Mutex::new(Some(worker)),
        }
    }

    pub fn enqueue<T, F, Fut>(&self, description: impl Into<String>, task: F) -> QueueHandle<T>
    where
        T: Send + 'static,
        F: FnOnce(u64) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, AppError>> + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let description = description.into();
        let (tx, rx) = oneshot::channel();

        if self.shutdown.is_cancelled() {
            self.state.sink.on_log_event(
                &format!("Transaction queue is shut down; dropped: {description}"),
                LogCategory::Warning,
            );
            return QueueHandle { id, rx };
        }

        self.state.entries.insert(
            id,
            QueuedTransaction {
                id,
                description: description.clone(),
                submitted_at: Local::now(),
                status: QueuedTxStatus::Queued,
            },
        );
        tracing::debug!(target: "tx_queue", id, %description, "Queued");
        self.state
            .log(format!("Transaction [{id}] added to queue: {description}"));
        self.state.publish();

        let run: JobFn = Box::new(move |nonce| -> JobFuture {
            Box::pin(async move {
                let value = task(nonce).await?;
                let deliver: Deliver = Box::new(move || {
                    let _ = tx.send(value);
                });
                Ok(deliver)
            })
        });

        if self.sender.send(Job { id, run }).is_err() {
            self.state
                .log(format!("Transaction [{id}] dropped: queue worker has stopped."));
            self.state.finish(id);
        }

        QueueHandle { id, rx }
    }

    pub fn snapshot(&self) -> Vec<QueueEntrySnapshot> {
        self.state.snapshot()
    }

    pub fn len(&self) -> usize {
        self.state.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.entries.is_empty()
    }

    /// Stop accepting work and wait for the in-flight task, if any, to finish.
    /// Tasks still waiting in line are abandoned and their handles resolve to `None`.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let worker = self.worker.lock().await.take();
        if let Some(worker) = worker
            && let Err(e) = worker.await
        {
            tracing::error!(target: "tx_queue", error = %e, "Queue worker ended abnormally");
        }
    }
}

async fn run_worker(
    state: Arc<QueueState>,
    mut receiver: mpsc::UnboundedReceiver<Job>,
    shutdown: CancellationToken,
) {
    tracing::info!(target: "tx_queue", "Transaction queue worker started");
    loop {
        let job = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            job = receiver.recv() => match job {
                Some(job) => job,
                None => break,
            },
        };
        state.process(job).await;
    }

    receiver.close();
    let mut abandoned = 0usize;
    while let Ok(job) = receiver.try_recv() {
        state.entries.remove(&job.id);
        abandoned += 1;
    }
    if abandoned > 0 {
        state.log(format!("{abandoned} queued transaction(s) abandoned at shutdown."));
        state.publish();
    }
    tracing::info!(target: "tx_queue", abandoned, "Transaction queue worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::{FakeChain, RecordingSink};
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn queue_with(chain: Arc<FakeChain>) -> (TransactionQueue, Arc<RecordingSink>, Arc<NonceSequencer>) {
        let sink = Arc::new(RecordingSink::default());
        let sequencer = Arc::new(NonceSequencer::new(chain));
        let queue = TransactionQueue::start(sequencer.clone(), sink.clone());
        (queue, sink, sequencer)
    }

    #[tokio::test]
    async fn runs_tasks_in_order_one_at_a_time() {
        let (queue, _sink, _) = queue_with(Arc::new(FakeChain::with_pending(10)));
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));

        let mut handles = Vec::new();
        for i in 0..6u64 {
            let (active, peak, order) = (active.clone(), peak.clone(), order.clone());
            handles.push(queue.enqueue(format!("task {i}"), move |nonce| async move {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                order.lock().unwrap().push((i, nonce));
                active.fetch_sub(1, Ordering::SeqCst);
                Ok(nonce)
            }));
        }

        let mut nonces = Vec::new();
        for h in handles {
            nonces.push(h.await.expect("task succeeded"));
        }

        assert_eq!(nonces, vec![10, 11, 12, 13, 14, 15]);
        assert_eq!(peak.load(Ordering::SeqCst), 1);
        let seen: Vec<u64> = order.lock().unwrap().iter().map(|(i, _)| *i).collect();
        assert_eq!(seen, vec![0, 1, 2, 3, 4, 5]);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn producers_on_other_tasks_are_serialized_too() {
        let (queue, _sink, _) = queue_with(Arc::new(FakeChain::with_pending(0)));
        let queue = Arc::new(queue);
        let active = Arc::new(AtomicUsize::new(0));

        let mut producers = Vec::new();
        for p in 0..4 {
            let queue = queue.clone();
            let active = active.clone();
            producers.push(tokio::spawn(async move {
                let mut got = Vec::new();
                for k in 0..3 {
                    let active = active.clone();
                    let nonce = queue
                        .enqueue(format!("producer {p} item {k}"), move |nonce| async move {
                            assert_eq!(active.fetch_add(1, Ordering::SeqCst), 0);
                            tokio::task::yield_now().await;
                            active.fetch_sub(1, Ordering::SeqCst);
                            Ok(nonce)
                        })
                        .await
                        .unwrap();
                    got.push(nonce);
                }
                got
            }));
        }

        let mut all = Vec::new();
        for p in producers {
            all.extend(p.await.unwrap());
        }
        all.sort_unstable();
        assert_eq!(all, (0..12).collect::<Vec<u64>>());
    }

    #[tokio::test]
    async fn failure_resolves_none_and_does_not_block_followers() {
        let (queue, sink, sequencer) = queue_with(Arc::new(FakeChain::with_pending(3)));

        let first = queue.enqueue("ok", |nonce| async move { Ok(nonce) });
        let second = queue.enqueue("boom", |_nonce| async move {
            Err::<u64, _>(AppError::Rpc("execution reverted".into()))
        });
        let third = queue.enqueue("ok again", |nonce| async move { Ok(nonce) });

        assert_eq!(first.await, Some(3));
        assert_eq!(second.await, None);
        assert_eq!(third.await, Some(5));
        assert_eq!(sequencer.current().await, Some(6));
        assert!(sink.contains("Transaction [2] failed: RPC call failed: execution reverted"));

        let snaps = sink.snapshots.lock().unwrap().clone();
        let mut failed: Vec<QueuedTxStatus> = snaps
            .iter()
            .filter_map(|s| s.iter().find(|e| e.id == 2).map(|e| e.status))
            .collect();
        failed.dedup();
        assert_eq!(
            failed,
            vec![
                QueuedTxStatus::Queued,
                QueuedTxStatus::Processing,
                QueuedTxStatus::Error
            ]
        );
        assert!(snaps.last().unwrap().is_empty());
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn nonce_collision_skips_an_extra_nonce() {
        let (queue, sink, _) = queue_with(Arc::new(FakeChain::with_pending(20)));

        let clash = queue.enqueue("clash", |_nonce| async move {
            Err::<(), _>(AppError::Rpc("Nonce has already been used".into()))
        });
        let next = queue.enqueue("after clash", |nonce| async move { Ok(nonce) });

        assert_eq!(clash.await, None);
        assert_eq!(next.await, Some(22));
        assert!(sink.contains("next nonce is 22"));
    }

    #[tokio::test]
    async fn nonce_load_failure_fails_only_that_task() {
        let chain = Arc::new(FakeChain::with_pending(7));
        chain.fail_nonce_fetches(1);
        let (queue, sink, sequencer) = queue_with(chain.clone());

        let first = queue.enqueue("no nonce yet", |nonce| async move { Ok(nonce) });
        assert_eq!(first.await, None);
        assert_eq!(sequencer.current().await, None);
        assert!(sink.contains("could not load nonce"));

        let second = queue.enqueue("retry", |nonce| async move { Ok(nonce) });
        assert_eq!(second.await, Some(7));
        assert_eq!(chain.nonce_fetch_count(), 2);
    }

    #[tokio::test]
    async fn panicking_task_is_contained() {
        let (queue, _sink, _) = queue_with(Arc::new(FakeChain::with_pending(0)));

        let bad = queue.enqueue("panics", |_nonce| async move {
            if true {
                panic!("task blew up");
            }
            Ok(())
        });
        let good = queue.enqueue("fine", |nonce| async move { Ok(nonce) });

        assert_eq!(bad.await, None);
        assert_eq!(good.await, Some(1));
    }

    #[tokio::test]
    async fn snapshots_track_lifecycle_and_entries_are_removed() {
        let (queue, sink, _) = queue_with(Arc::new(FakeChain::with_pending(0)));
        let handle = queue.enqueue("watch me", |nonce| async move { Ok(nonce) });
        assert_eq!(handle.id(), 1);
        handle.await.unwrap();

        let snaps = sink.snapshots.lock().unwrap().clone();
        let statuses: Vec<QueuedTxStatus> = snaps
            .iter()
            .filter_map(|s| s.first().map(|e| e.status))
            .collect();
        assert_eq!(
            statuses,
            vec![
                QueuedTxStatus::Queued,
                QueuedTxStatus::Processing,
                QueuedTxStatus::Completed
            ]
        );
        assert!(snaps.last().unwrap().is_empty());
        assert_eq!(queue.len(), 0);
    }

    #[tokio::test]
    async fn shutdown_finishes_in_flight_and_abandons_the_rest() {
        let (queue, sink, _) = queue_with(Arc::new(FakeChain::with_pending(0)));
        let (release_tx, release_rx) = oneshot::channel::<()>();
        let (started_tx, started_rx) = oneshot::channel::<()>();

        let in_flight = queue.enqueue("slow", move |nonce| async move {
            let _ = started_tx.send(());
            let _ = release_rx.await;
            Ok(nonce)
        });
        let waiting = queue.enqueue("never runs", |nonce| async move { Ok(nonce) });

        started_rx.await.unwrap();
        let shutdown = queue.shutdown();
        tokio::pin!(shutdown);
        tokio::select! {
            _ = &mut shutdown => panic!("shutdown must wait for the in-flight task"),
            _ = tokio::time::sleep(Duration::from_millis(20)) => {}
        }
        release_tx.send(()).unwrap();
        shutdown.await;

        assert_eq!(in_flight.await, Some(0));
        assert_eq!(waiting.await, None);
        assert!(queue.is_empty());
        assert!(sink.contains("abandoned at shutdown"));

        let late = queue.enqueue("late", |nonce| async move { Ok(nonce) });
        assert_eq!(late.await, None);
    }
}
