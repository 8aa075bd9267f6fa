//! Stage I: wires backfill, the live feed, and the three long-running
//! loops together, with cooperative shutdown.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::StreamExt;
use memo_interfaces::{Dependencies, KeyRole, LedgerClientError, LedgerEvent, OrderBy};
use memo_primitives::{
    CHECK_INTERVAL, ENDPOINT_ROTATION_THRESHOLD, RECONNECT_BACKOFF_CAP, RECONNECT_BACKOFF_INITIAL,
};
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::processor::ResponseProcessor;
use crate::reviewer::{RoutingRequest, TransactionReviewer};
use crate::router::{route_loop, ResponseQueueRouter};
use memo_config::Config;

/// Errors during orchestrator startup (the historical backfill is the only
/// part of startup that can fail outright; the long-running loops handle
/// their own errors internally).
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("historical backfill failed: {0}")]
    Ledger(#[from] LedgerClientError),
    #[error("repository error during startup: {0}")]
    Repository(#[from] memo_interfaces::RepositoryError),
}

/// A running orchestrator: holds the shutdown sender and every spawned
/// task's handle, so `stop` can broadcast the shutdown event and then
/// await-with-exceptions over the whole fleet.
pub struct OrchestratorHandle {
    shutdown_tx: broadcast::Sender<()>,
    tasks: Vec<JoinHandle<()>>,
}

impl OrchestratorHandle {
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(());
        for task in self.tasks {
            if let Err(err) = task.await {
                tracing::error!(%err, "orchestrator task panicked during shutdown");
            }
        }
    }
}

/// Immutable startup configuration for one orchestrator instance.
pub struct Orchestrator {
    dependencies: Dependencies,
    config: Config,
    secret_role: KeyRole,
    local_addresses: Vec<String>,
}

impl Orchestrator {
    pub fn new(dependencies: Dependencies, config: Config, secret_role: KeyRole, local_addresses: Vec<String>) -> Self {
        Self { dependencies, config, secret_role, local_addresses }
    }

    /// Run the startup sequence and spawn the long-running loops:
    /// historical sync, prime the review queue, then launch
    /// `review_loop`, `route_loop`, and one `consumer` task per response
    /// queue.
    pub async fn run(self) -> Result<OrchestratorHandle, OrchestratorError> {
        for account in &self.config.accounts {
            let history = self.dependencies.ledger_client.history(account).await?;
            let inserted = self.dependencies.repository.batch_insert_transactions(&history).await?;
            tracing::info!(account, inserted, "historical backfill complete");
        }

        let unprocessed = self
            .dependencies
            .repository
            .get_unprocessed_transactions(OrderBy::TimestampAsc, None, false)
            .await?;
        tracing::info!(count = unprocessed.len(), "priming review queue");

        let shutdown_tx = broadcast::channel::<()>(1).0;
        let (review_tx, review_rx) = mpsc::unbounded_channel();
        let (routing_tx, routing_rx) = mpsc::unbounded_channel();
        let (confirmation_tx, confirmation_rx) = mpsc::unbounded_channel();

        let mut reviewer =
            TransactionReviewer::new(self.dependencies.clone(), self.secret_role.clone(), self.local_addresses.clone());

        let sync_remaining = Arc::new(AtomicUsize::new(unprocessed.len()));
        if unprocessed.is_empty() {
            // Nothing to backfill: sync mode is meant to end once the review
            // queue first drains, and there is no drain event to wait for here.
            reviewer.set_sync_mode(false);
        }
        for tx in unprocessed {
            let _ = review_tx.send(tx);
        }

        let mut tasks = Vec::new();

        let (router, queues) =
            ResponseQueueRouter::new(self.dependencies.clone(), self.config.retry.retry_delay, self.config.retry.max_retry_count);

        for (pattern, queue_rx) in queues {
            let label = pattern_label(&pattern);
            let processor = ResponseProcessor::new(
                label,
                self.dependencies.clone(),
                self.secret_role.clone(),
                self.config.retry.idle_log_interval,
            );
            let confirm_tx = confirmation_tx.clone();
            let shutdown_rx = shutdown_tx.subscribe();
            tasks.push(tokio::spawn(async move { processor.run(queue_rx, confirm_tx, shutdown_rx).await }));
        }

        tasks.push(tokio::spawn(route_loop(
            router,
            routing_rx,
            confirmation_rx,
            review_tx.clone(),
            shutdown_tx.subscribe(),
        )));

        tasks.push(tokio::spawn(review_loop(
            reviewer,
            self.dependencies.repository.clone(),
            review_rx,
            routing_tx,
            shutdown_tx.subscribe(),
            self.config.assembler.stale_group_timeout,
            sync_remaining,
        )));

        tasks.push(tokio::spawn(subscribe_loop(
            self.dependencies.ledger_client.clone(),
            self.config.accounts.clone(),
            review_tx,
            shutdown_tx.subscribe(),
            self.config.retry.ledger_timeout,
        )));

        Ok(OrchestratorHandle { shutdown_tx, tasks })
    }
}

fn pattern_label(pattern: &memo_primitives::MemoPattern) -> String {
    pattern
        .memo_type
        .as_ref()
        .map(|p| p.source().to_string())
        .or_else(|| pattern.memo_format.as_ref().map(|p| p.source().to_string()))
        .unwrap_or_else(|| "unlabeled".to_string())
}

/// Drives the review queue: dequeues, runs each transaction through the
/// reviewer, persists the outcome, and forwards unanswered requests to
/// the router. Also runs the staleness sweep on a fixed tick and flips
/// the reviewer out of sync mode once the primed backlog is drained.
async fn review_loop(
    mut reviewer: TransactionReviewer,
    repository: Arc<dyn memo_interfaces::TransactionRepository>,
    mut review_rx: mpsc::UnboundedReceiver<memo_primitives::MemoTx>,
    routing_tx: mpsc::UnboundedSender<RoutingRequest>,
    mut shutdown: broadcast::Receiver<()>,
    stale_timeout: Duration,
    sync_remaining: Arc<AtomicUsize>,
) {
    let mut stale_ticker = tokio::time::interval(CHECK_INTERVAL);
    loop {
        tokio::select! {
            biased;
            _ = shutdown.recv() => {
                tracing::info!("review_loop shutting down");
                break;
            }
            _ = stale_ticker.tick() => {
                for group_id in reviewer.sweep_stale(Utc::now(), stale_timeout) {
                    tracing::warn!(group_id, "dropped stale group");
                }
            }
            Some(tx) = review_rx.recv() => {
                let was_sync = reviewer.is_sync_mode();
                if let Some(outcome) = reviewer.review(tx).await {
                    if let Err(err) = repository.store_reviewing_result(&outcome.result).await {
                        tracing::error!(%err, "failed to persist reviewing result");
                    }
                    if let Some(routing) = outcome.routing {
                        if routing_tx.send(routing).is_err() {
                            tracing::warn!("routing queue receiver dropped");
                        }
                    }
                }
                if was_sync && sync_remaining.fetch_sub(1, Ordering::SeqCst) <= 1 {
                    reviewer.set_sync_mode(false);
                    tracing::info!("sync mode complete, staleness sweeping enabled");
                }
            }
        }
    }
}

/// Forwards live ledger events into the review queue, watching for a
/// stalled subscription and reconnecting with exponential backoff.
/// Endpoint rotation across `config.ledger_endpoints`
/// is the concrete `LedgerClient` implementation's responsibility — the
/// trait's `subscribe` takes no endpoint parameter, so this loop only
/// retries the single injected client.
async fn subscribe_loop(
    ledger_client: Arc<dyn memo_interfaces::LedgerClient>,
    accounts: Vec<String>,
    review_tx: mpsc::UnboundedSender<memo_primitives::MemoTx>,
    mut shutdown: broadcast::Receiver<()>,
    ledger_timeout: Duration,
) {
    let mut consecutive_failures: u32 = 0;
    loop {
        let stream = match ledger_client.subscribe(&accounts).await {
            Ok(stream) => {
                consecutive_failures = 0;
                stream
            }
            Err(err) => {
                consecutive_failures += 1;
                tracing::error!(%err, consecutive_failures, "ledger subscription failed");
                if consecutive_failures % ENDPOINT_ROTATION_THRESHOLD == 0 {
                    tracing::warn!("repeated subscribe failures, expecting the ledger client to rotate endpoints internally");
                }
                let backoff = reconnect_backoff(consecutive_failures);
                tokio::select! {
                    _ = shutdown.recv() => return,
                    _ = tokio::time::sleep(backoff) => continue,
                }
            }
        };
        let mut stream = stream;

        loop {
            tokio::select! {
                biased;
                _ = shutdown.recv() => return,
                next = tokio::time::timeout(ledger_timeout, stream.next()) => {
                    match next {
                        Ok(Some(LedgerEvent::Transaction(tx))) => {
                            if review_tx.send(tx).is_err() {
                                tracing::warn!("review queue receiver dropped");
                                return;
                            }
                        }
                        Ok(Some(LedgerEvent::LedgerClosed)) => {}
                        Ok(None) => {
                            tracing::warn!("ledger subscription stream ended, reconnecting");
                            break;
                        }
                        Err(_elapsed) => {
                            tracing::error!("no ledgerClosed event within timeout, reconnecting");
                            break;
                        }
                    }
                }
            }
        }
    }
}

fn reconnect_backoff(consecutive_failures: u32) -> Duration {
    let factor = 2u32.saturating_pow(consecutive_failures.saturating_sub(1));
    (RECONNECT_BACKOFF_INITIAL * factor).min(RECONNECT_BACKOFF_CAP)
}
