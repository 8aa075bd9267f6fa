//! Stage G: maps reviewed requests onto per-pattern response queues and
//! drives the re-review retry loop.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use memo_interfaces::Dependencies;
use memo_primitives::{MemoPattern, MemoTx, PendingResponse};
use tokio::sync::{broadcast, mpsc};

use crate::reviewer::RoutingRequest;

/// One dedicated FIFO queue per `Response`-typed pattern in the rule graph,
/// allocated once at construction.
///
/// `MemoPattern` derives `PartialEq` but not `Hash`/`Eq`, so queues are
/// looked up by a linear scan over a small `Vec` rather than a map —
/// proportional to the handful of response patterns a rule graph
/// typically declares.
struct PatternQueue {
    pattern: MemoPattern,
    sender: mpsc::UnboundedSender<RoutingRequest>,
}

/// Owns `pending_responses`/`pending_rereviews` and the per-pattern queue
/// table, exclusively owned by the router task.
pub struct ResponseQueueRouter {
    queues: Vec<PatternQueue>,
    pending_responses: HashMap<String, MemoTx>,
    pending_rereviews: HashMap<String, PendingResponse>,
    dependencies: Dependencies,
    retry_delay: chrono::Duration,
    max_retry_count: u32,
}

impl ResponseQueueRouter {
    pub fn new(dependencies: Dependencies, retry_delay: Duration, max_retry_count: u32) -> (Self, Vec<(MemoPattern, mpsc::UnboundedReceiver<RoutingRequest>)>) {
        let mut queues = Vec::new();
        let mut receivers = Vec::new();
        for rule in dependencies.rules.response_rules() {
            let (tx, rx) = mpsc::unbounded_channel();
            let pattern = rule.pattern().clone();
            queues.push(PatternQueue { pattern: pattern.clone(), sender: tx });
            receivers.push((pattern, rx));
        }
        let retry_delay = chrono::Duration::from_std(retry_delay).unwrap_or(chrono::Duration::seconds(5));
        let router = Self {
            queues,
            pending_responses: HashMap::new(),
            pending_rereviews: HashMap::new(),
            dependencies,
            retry_delay,
            max_retry_count,
        };
        (router, receivers)
    }

    /// Route a request to the response queue for its rule's first declared
    /// response pattern. Logs and drops the
    /// request if the rule declares no response pattern or none of the
    /// constructed queues match it — a misconfigured rule graph, not a
    /// transient failure.
    pub fn route(&mut self, request: RoutingRequest) {
        let Some(target) = request.rule.response_patterns().first() else {
            tracing::warn!(rule = request.rule.name(), "request rule declares no response pattern");
            return;
        };
        let Some(queue) = self.queues.iter().find(|q| &q.pattern == target) else {
            tracing::warn!(rule = request.rule.name(), "no response queue matches the rule's response pattern");
            return;
        };
        self.pending_responses.insert(request.tx.hash.clone(), request.tx.clone());
        if queue.sender.send(request).is_err() {
            tracing::warn!("response queue receiver dropped, request lost");
        }
    }

    /// Move a confirmed submission from `pending_responses` into
    /// `pending_rereviews`.
    pub fn confirm_response_sent(&mut self, hash: &str, now: DateTime<Utc>) {
        let Some(tx) = self.pending_responses.remove(hash) else {
            tracing::warn!(hash, "confirm_response_sent for an unknown pending response");
            return;
        };
        self.pending_rereviews.insert(hash.to_string(), PendingResponse::new(tx, now, self.retry_delay));
    }

    /// Poll every due re-review record against the repository's joined
    /// view. Returns the transactions that should be re-enqueued onto the
    /// review queue, pushed back for another pass through the reviewer.
    pub async fn poll_rereviews(&mut self, now: DateTime<Utc>) -> Vec<MemoTx> {
        let due: Vec<String> =
            self.pending_rereviews.iter().filter(|(_, p)| p.is_due(now)).map(|(h, _)| h.clone()).collect();

        let mut ready = Vec::new();
        for hash in due {
            match self.dependencies.repository.get_decoded_memo_w_processing(&hash).await {
                Ok(Some((tx, _result))) => {
                    self.pending_rereviews.remove(&hash);
                    ready.push(tx);
                }
                Ok(None) => self.retry_or_drop(&hash, now),
                Err(err) => {
                    tracing::error!(hash, %err, "re-review poll failed");
                    self.retry_or_drop(&hash, now);
                }
            }
        }
        ready
    }

    fn retry_or_drop(&mut self, hash: &str, now: DateTime<Utc>) {
        let Some(pending) = self.pending_rereviews.get_mut(hash) else { return };
        pending.backoff(now, self.retry_delay);
        if pending.exhausted(self.max_retry_count) {
            tracing::warn!(hash, retries = pending.retry_count, "dropping exhausted re-review record");
            self.pending_rereviews.remove(hash);
        }
    }

    pub fn pending_response_count(&self) -> usize {
        self.pending_responses.len()
    }

    pub fn pending_rereview_count(&self) -> usize {
        self.pending_rereviews.len()
    }
}

/// Drives [`ResponseQueueRouter`] from its three event sources: new
/// routing requests, submission confirmations, and the once-per-second
/// re-review tick.
pub async fn route_loop(
    mut router: ResponseQueueRouter,
    mut routing_rx: mpsc::UnboundedReceiver<RoutingRequest>,
    mut confirmation_rx: mpsc::UnboundedReceiver<String>,
    review_tx: mpsc::UnboundedSender<MemoTx>,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(memo_primitives::REREVIEW_TICK_INTERVAL);
    loop {
        tokio::select! {
            biased;
            _ = shutdown.recv() => {
                tracing::info!("route_loop shutting down");
                break;
            }
            Some(request) = routing_rx.recv() => {
                router.route(request);
            }
            Some(hash) = confirmation_rx.recv() => {
                router.confirm_response_sent(&hash, Utc::now());
            }
            _ = ticker.tick() => {
                for tx in router.poll_rereviews(Utc::now()).await {
                    if review_tx.send(tx).is_err() {
                        tracing::warn!("review queue receiver dropped, cannot re-enqueue");
                        break;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use futures::stream::BoxStream;
    use memo_interfaces::{
        KeyRole, KeyStore, KeyStoreError, LedgerClient, LedgerClientError, LedgerEvent, OrderBy,
        PublicKeyHex, QueryRow, RepositoryError, ResponseQuery, Rule, RuleGraph, SharedSecretBytes,
        SubmitOutcome, TransactionRepository,
    };
    use memo_primitives::{EncodedMemo, InteractionType, Pattern, ReviewingResult};
    use rust_decimal::Decimal;
    use std::sync::{Arc, Mutex};

    struct NullKeyStore;
    #[async_trait]
    impl KeyStore for NullKeyStore {
        async fn get_shared_secret(&self, _: &PublicKeyHex, _: &KeyRole) -> Result<SharedSecretBytes, KeyStoreError> {
            Ok(vec![])
        }
        async fn get_handshake_for_address(&self, _: &str, _: &str) -> Result<(Option<PublicKeyHex>, Option<PublicKeyHex>), KeyStoreError> {
            Ok((None, None))
        }
    }

    struct NullLedgerClient;
    #[async_trait]
    impl LedgerClient for NullLedgerClient {
        async fn subscribe(&self, _: &[String]) -> Result<BoxStream<'static, LedgerEvent>, LedgerClientError> {
            unimplemented!()
        }
        async fn submit(&self, _: &str, _: Vec<EncodedMemo>, _: &str, _: Option<Decimal>) -> Result<SubmitOutcome, LedgerClientError> {
            unimplemented!()
        }
        async fn history(&self, _: &str) -> Result<Vec<MemoTx>, LedgerClientError> {
            Ok(vec![])
        }
    }

    #[derive(Default)]
    struct FakeRepository {
        joined: Mutex<HashMap<String, (MemoTx, ReviewingResult)>>,
    }

    #[async_trait]
    impl TransactionRepository for FakeRepository {
        async fn insert_transaction(&self, _: &MemoTx) -> Result<(), RepositoryError> {
            Ok(())
        }
        async fn batch_insert_transactions(&self, _: &[MemoTx]) -> Result<usize, RepositoryError> {
            Ok(0)
        }
        async fn get_decoded_transaction(&self, _: &str) -> Result<Option<MemoTx>, RepositoryError> {
            Ok(None)
        }
        async fn get_decoded_memo_w_processing(&self, hash: &str) -> Result<Option<(MemoTx, ReviewingResult)>, RepositoryError> {
            Ok(self.joined.lock().unwrap().get(hash).cloned())
        }
        async fn get_unprocessed_transactions(&self, _: OrderBy, _: Option<usize>, _: bool) -> Result<Vec<MemoTx>, RepositoryError> {
            Ok(vec![])
        }
        async fn store_reviewing_result(&self, _: &ReviewingResult) -> Result<(), RepositoryError> {
            Ok(())
        }
        async fn execute_query(&self, _: &ResponseQuery) -> Result<Vec<QueryRow>, RepositoryError> {
            Ok(vec![])
        }
    }

    struct PingRule {
        response_pattern: MemoPattern,
    }

    #[async_trait]
    impl Rule for PingRule {
        fn name(&self) -> &str {
            "ping"
        }
        fn pattern(&self) -> &MemoPattern {
            unimplemented!("not consulted by the router")
        }
        fn transaction_type(&self) -> InteractionType {
            InteractionType::Request
        }
        fn response_patterns(&self) -> &[MemoPattern] {
            std::slice::from_ref(&self.response_pattern)
        }
        async fn validate(&self, _tx: &MemoTx) -> bool {
            true
        }
    }

    struct PongRule {
        pattern: MemoPattern,
    }

    #[async_trait]
    impl Rule for PongRule {
        fn name(&self) -> &str {
            "pong"
        }
        fn pattern(&self) -> &MemoPattern {
            &self.pattern
        }
        fn transaction_type(&self) -> InteractionType {
            InteractionType::Response
        }
        async fn validate(&self, _tx: &MemoTx) -> bool {
            true
        }
    }

    fn pong_pattern() -> MemoPattern {
        MemoPattern { memo_type: Some(Pattern::Literal("PONG".to_string())), memo_format: None, memo_data: None }
    }

    fn tx(hash: &str) -> MemoTx {
        MemoTx::new(hash, "rA", "rB", Decimal::ZERO, Decimal::ZERO, "PING", "v1.-.-.-", "ping", Utc::now(), "tesSUCCESS")
            .unwrap()
    }

    fn router_with_rules() -> (ResponseQueueRouter, Vec<(MemoPattern, mpsc::UnboundedReceiver<RoutingRequest>)>, Arc<FakeRepository>) {
        let mut rules = RuleGraph::new();
        rules.push(Arc::new(PongRule { pattern: pong_pattern() }));
        let repository = Arc::new(FakeRepository::default());
        let dependencies = Dependencies::new(Arc::new(NullLedgerClient), Arc::new(NullKeyStore), repository.clone(), rules);
        let (router, receivers) = ResponseQueueRouter::new(dependencies, Duration::from_secs(5), 10);
        (router, receivers, repository)
    }

    #[test]
    fn route_delivers_to_the_matching_response_queue() {
        let (mut router, mut receivers, _repo) = router_with_rules();
        let rule = Arc::new(PingRule { response_pattern: pong_pattern() });
        router.route(RoutingRequest { tx: tx("H1"), rule });
        assert_eq!(router.pending_response_count(), 1);
        let (_, rx) = &mut receivers[0];
        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn route_drops_when_no_response_pattern_matches() {
        let (mut router, _receivers, _repo) = router_with_rules();
        let unmatched = MemoPattern { memo_type: Some(Pattern::Literal("NOTHING".to_string())), memo_format: None, memo_data: None };
        let rule = Arc::new(PingRule { response_pattern: unmatched });
        router.route(RoutingRequest { tx: tx("H1"), rule });
        assert_eq!(router.pending_response_count(), 0);
    }

    #[tokio::test]
    async fn confirmed_response_moves_to_rereview_and_polls_until_found() {
        let (mut router, _receivers, repo) = router_with_rules();
        let rule = Arc::new(PingRule { response_pattern: pong_pattern() });
        router.route(RoutingRequest { tx: tx("H1"), rule });

        let now = Utc::now();
        router.confirm_response_sent("H1", now);
        assert_eq!(router.pending_response_count(), 0);
        assert_eq!(router.pending_rereview_count(), 1);

        let not_yet = router.poll_rereviews(now).await;
        assert!(not_yet.is_empty());
        assert_eq!(router.pending_rereview_count(), 1);

        repo.joined.lock().unwrap().insert(
            "H1".to_string(),
            (tx("H1"), ReviewingResult::satisfied(tx("H1"), "ping", "RESP_HASH")),
        );
        let due_at = now + chrono::Duration::seconds(6);
        let ready = router.poll_rereviews(due_at).await;
        assert_eq!(ready.len(), 1);
        assert_eq!(router.pending_rereview_count(), 0);
    }

    #[tokio::test]
    async fn rereview_is_dropped_after_max_retries() {
        let (mut router, _receivers, _repo) = router_with_rules();
        let rule = Arc::new(PingRule { response_pattern: pong_pattern() });
        router.route(RoutingRequest { tx: tx("H1"), rule });
        router.confirm_response_sent("H1", Utc::now());

        let mut now = Utc::now();
        for _ in 0..12 {
            now += chrono::Duration::hours(1);
            router.poll_rereviews(now).await;
        }
        assert_eq!(router.pending_rereview_count(), 0);
    }
}
