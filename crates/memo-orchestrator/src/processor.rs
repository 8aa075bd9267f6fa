//! Stage H: one consumer per response-pattern queue, generating and
//! submitting responses.

use std::time::Duration;

use chrono::Utc;
use memo_interfaces::{Dependencies, KeyRole};
use tokio::sync::{broadcast, mpsc};

use crate::reviewer::RoutingRequest;

const DEQUEUE_TIMEOUT: Duration = Duration::from_secs(1);

/// Generates and submits the response for every request landing on one
/// response-pattern queue.
pub struct ResponseProcessor {
    label: String,
    dependencies: Dependencies,
    secret_role: KeyRole,
    idle_log_interval: chrono::Duration,
}

impl ResponseProcessor {
    pub fn new(label: impl Into<String>, dependencies: Dependencies, secret_role: KeyRole, idle_log_interval: Duration) -> Self {
        Self {
            label: label.into(),
            dependencies,
            secret_role,
            idle_log_interval: chrono::Duration::from_std(idle_log_interval).unwrap_or(chrono::Duration::hours(1)),
        }
    }

    /// Dequeue with a 1 s timeout, processing one request at a time in
    /// FIFO order, one queue per response pattern.
    pub async fn run(
        &self,
        mut queue_rx: mpsc::UnboundedReceiver<RoutingRequest>,
        confirmation_tx: mpsc::UnboundedSender<String>,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        let mut last_idle_log: Option<chrono::DateTime<Utc>> = None;
        loop {
            tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    tracing::info!(queue = %self.label, "response processor shutting down");
                    break;
                }
                dequeued = tokio::time::timeout(DEQUEUE_TIMEOUT, queue_rx.recv()) => {
                    match dequeued {
                        Ok(Some(request)) => self.process(request, &confirmation_tx).await,
                        Ok(None) => {
                            tracing::info!(queue = %self.label, "response queue closed");
                            break;
                        }
                        Err(_timeout) => self.log_idle(&mut last_idle_log),
                    }
                }
            }
        }
    }

    fn log_idle(&self, last_idle_log: &mut Option<chrono::DateTime<Utc>>) {
        let now = Utc::now();
        let should_log = match last_idle_log {
            None => true,
            Some(last) => now.signed_duration_since(last) >= self.idle_log_interval,
        };
        if should_log {
            tracing::debug!(queue = %self.label, "no requests pending");
            *last_idle_log = Some(now);
        }
    }

    async fn process(&self, request: RoutingRequest, confirmation_tx: &mpsc::UnboundedSender<String>) {
        let RoutingRequest { tx, rule } = request;

        let Some(evaluation) = rule.evaluate_request(&tx).await else {
            tracing::warn!(rule = rule.name(), hash = %tx.hash, "rule declined to evaluate its own matched request");
            return;
        };

        let Some(params) = rule.construct_response(&tx, &evaluation).await else {
            tracing::warn!(rule = rule.name(), hash = %tx.hash, "rule produced no response parameters");
            return;
        };

        let memos = match memo_codec::encode(&params, self.dependencies.key_store.as_ref(), &self.secret_role, Utc::now()).await {
            Ok(memos) => memos,
            Err(err) => {
                tracing::error!(rule = rule.name(), hash = %tx.hash, %err, "failed to encode response");
                return;
            }
        };

        let submission = self
            .dependencies
            .ledger_client
            .submit(&params.source, memos, &params.destination, params.amount)
            .await;

        match submission {
            Ok(memo_interfaces::SubmitOutcome::Success) => {
                if confirmation_tx.send(tx.hash.clone()).is_err() {
                    tracing::warn!(hash = %tx.hash, "router confirmation channel closed");
                }
            }
            Ok(memo_interfaces::SubmitOutcome::Failure) => {
                tracing::warn!(rule = rule.name(), hash = %tx.hash, "ledger rejected response submission");
            }
            Err(err) => {
                tracing::error!(rule = rule.name(), hash = %tx.hash, %err, "response submission failed");
            }
        }
    }
}
