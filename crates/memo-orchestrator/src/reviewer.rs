//! Stage F: reviews individual transactions and fragments, assembling
//! groups and matching rules.

use std::sync::Arc;

use memo_assembler::{classify, AssemblerOutcome, Disposition, GroupTable};
use memo_codec::{decode, decode_legacy, parse_legacy, DecodeOutcome};
use memo_interfaces::{Dependencies, Rule};
use memo_primitives::{CompressionTag, EncryptionTag, InteractionType, MemoGroup, MemoTx, ReviewingResult};

/// A reviewed transaction paired with the request rule it matched, handed
/// off to the router when a `Request` pattern has no response on record
/// yet.
///
/// The router's per-pattern queues are keyed by the *response* pattern
/// but generating that response needs the *request* rule's
/// `evaluate_request`/`construct_response` hooks — so the matched rule
/// travels with the transaction rather than being re-resolved downstream.
#[derive(Clone)]
pub struct RoutingRequest {
    pub tx: MemoTx,
    pub rule: Arc<dyn Rule>,
}

/// Everything produced by reviewing one incoming transaction.
pub struct ReviewOutcome {
    pub result: ReviewingResult,
    pub routing: Option<RoutingRequest>,
}

impl ReviewOutcome {
    fn terminal(result: ReviewingResult) -> Self {
        Self { result, routing: None }
    }
}

/// Owns the group-assembly table and drives pattern matching for every
/// transaction the pipeline observes.
pub struct TransactionReviewer {
    groups: GroupTable,
    dependencies: Dependencies,
    secret_role: memo_interfaces::KeyRole,
    local_addresses: Vec<String>,
}

impl TransactionReviewer {
    pub fn new(
        dependencies: Dependencies,
        secret_role: memo_interfaces::KeyRole,
        local_addresses: Vec<String>,
    ) -> Self {
        Self { groups: GroupTable::new(), dependencies, secret_role, local_addresses }
    }

    pub fn set_sync_mode(&mut self, sync_mode: bool) {
        self.groups.set_sync_mode(sync_mode);
    }

    pub fn is_sync_mode(&self) -> bool {
        self.groups.is_sync_mode()
    }

    pub fn sweep_stale(
        &mut self,
        now: chrono::DateTime<chrono::Utc>,
        timeout: std::time::Duration,
    ) -> Vec<String> {
        self.groups.sweep_stale(now, timeout)
    }

    /// Review one transaction. Returns `None` when the transaction was
    /// absorbed into a still-pending standardized group, with nothing yet
    /// to report.
    pub async fn review(&mut self, tx: MemoTx) -> Option<ReviewOutcome> {
        if !tx.is_success() {
            return Some(ReviewOutcome::terminal(ReviewingResult::terminal_with_note(
                tx,
                None,
                "dropped: non-success transaction",
            )));
        }

        match classify(&tx) {
            Disposition::InvalidStructure => Some(ReviewOutcome::terminal(
                ReviewingResult::terminal_with_note(
                    tx.clone(),
                    None,
                    format!("malformed memo format: {}", tx.memo_format),
                ),
            )),
            Disposition::DirectMatch => Some(self.run_pattern_match(tx).await),
            Disposition::NeedsGrouping => self.handle_standard(tx).await,
            Disposition::NeedsLegacyGrouping => self.handle_legacy(tx).await,
        }
    }

    async fn handle_standard(&mut self, tx: MemoTx) -> Option<ReviewOutcome> {
        match self.groups.observe_standard(tx.clone()) {
            AssemblerOutcome::Dropped => Some(ReviewOutcome::terminal(
                ReviewingResult::terminal_with_note(tx, None, "dropped: non-success transaction"),
            )),
            AssemblerOutcome::Rejected => Some(ReviewOutcome::terminal(
                ReviewingResult::terminal_with_note(
                    tx,
                    None,
                    "fragment inconsistent with its group, rejected",
                ),
            )),
            AssemblerOutcome::Pending { .. } => None,
            AssemblerOutcome::Ready { group_id } => Some(self.finish_standard_group(group_id).await),
        }
    }

    async fn finish_standard_group(&mut self, group_id: String) -> ReviewOutcome {
        let group = self.groups.take(&group_id).expect("table just reported this group Ready");
        let payload = reassemble(&group, |tx| tx.memo_data.as_bytes().to_vec());
        let canonical = group.ordered_fragments().next().cloned().expect("a Ready group has >=1 fragment");

        let structure = group.structure();
        let compressed = structure.compression == CompressionTag::Brotli;
        let encrypted = structure.encryption == EncryptionTag::Ecdh;

        let outcome = self.decode_group(&payload, compressed, encrypted, &canonical).await;
        match outcome {
            DecodeOutcome::CompressionIncomplete => ReviewOutcome::terminal(
                ReviewingResult::terminal_with_note(
                    canonical,
                    None,
                    "decode failed for a structurally complete group",
                ),
            ),
            DecodeOutcome::Decoded(text) | DecodeOutcome::Undecrypted(text) => {
                self.run_pattern_match(MemoTx { memo_data: text, ..canonical }).await
            }
        }
    }

    async fn handle_legacy(&mut self, tx: MemoTx) -> Option<ReviewOutcome> {
        match self.groups.observe_legacy(tx.clone()) {
            AssemblerOutcome::Dropped => Some(ReviewOutcome::terminal(
                ReviewingResult::terminal_with_note(tx, None, "dropped: non-success transaction"),
            )),
            AssemblerOutcome::Rejected => Some(ReviewOutcome::terminal(
                ReviewingResult::terminal_with_note(
                    tx,
                    None,
                    "legacy fragment missing a chunk index, rejected",
                ),
            )),
            AssemblerOutcome::Ready { .. } => {
                unreachable!("legacy groups never self-report ready")
            }
            AssemblerOutcome::Pending { group_id } => self.try_decode_legacy(group_id, tx).await,
        }
    }

    /// Legacy groups carry no declared total, so readiness can only be
    /// discovered by attempting a decode after every new fragment. On
    /// failure the group stays pending and the triggering fragment is
    /// marked processed with a note.
    ///
    /// Unlike the standardized path, compression/encryption are never
    /// read off `group.structure()` here — only the lead fragment ever
    /// carries `COMPRESSED__`, and `WHISPER__` only appears once the
    /// reassembled payload is decompressed, so both are detected by
    /// `decode_legacy` itself against the joined bytes.
    async fn try_decode_legacy(&mut self, group_id: String, triggering: MemoTx) -> Option<ReviewOutcome> {
        let group = self.groups.peek(&group_id).expect("just inserted by observe_legacy").clone();
        let canonical = group.ordered_fragments().next().cloned().expect("just-seeded group has >=1 fragment");
        let payload = reassemble(&group, |tx| parse_legacy(&tx.memo_data).payload.into_bytes());

        let outcome = decode_legacy(
            &payload,
            &canonical.account,
            &canonical.destination,
            self.dependencies.key_store.as_ref(),
            &self.secret_role,
            &self.local_addresses,
        )
        .await;
        match outcome {
            DecodeOutcome::CompressionIncomplete => Some(ReviewOutcome::terminal(
                ReviewingResult::terminal_with_note(
                    triggering,
                    None,
                    "legacy group incomplete, awaiting more fragments",
                ),
            )),
            DecodeOutcome::Decoded(text) | DecodeOutcome::Undecrypted(text) => {
                self.groups.take(&group_id);
                Some(self.run_pattern_match(MemoTx { memo_data: text, ..canonical }).await)
            }
        }
    }

    async fn decode_group(
        &self,
        payload: &[u8],
        compressed: bool,
        encrypted: bool,
        canonical: &MemoTx,
    ) -> DecodeOutcome {
        decode(
            payload,
            compressed,
            encrypted,
            &canonical.account,
            &canonical.destination,
            self.dependencies.key_store.as_ref(),
            &self.secret_role,
            &self.local_addresses,
        )
        .await
    }

    async fn run_pattern_match(&self, tx: MemoTx) -> ReviewOutcome {
        let Some(rule) = self.dependencies.rules.find_match(&tx) else {
            return ReviewOutcome::terminal(ReviewingResult::unmatched(tx));
        };

        if !rule.validate(&tx).await {
            return ReviewOutcome::terminal(ReviewingResult::terminal_with_note(
                tx,
                Some(rule.name().to_string()),
                "rule validation failed",
            ));
        }

        match rule.transaction_type() {
            InteractionType::Standalone | InteractionType::Response => {
                ReviewOutcome::terminal(ReviewingResult::matched_terminal(tx, rule.name()))
            }
            InteractionType::Request => self.resolve_request(tx, rule).await,
        }
    }

    async fn resolve_request(&self, tx: MemoTx, rule: Arc<dyn Rule>) -> ReviewOutcome {
        let Some(query) = rule.find_response_query(&tx).await else {
            return ReviewOutcome {
                result: ReviewingResult::needs_response(tx.clone(), rule.name()),
                routing: Some(RoutingRequest { tx, rule }),
            };
        };

        match self.dependencies.repository.execute_query(&query).await {
            Ok(rows) if !rows.is_empty() => {
                let hash = extract_hash(&rows[0]);
                ReviewOutcome::terminal(ReviewingResult::satisfied(tx, rule.name(), hash))
            }
            Ok(_) => ReviewOutcome {
                result: ReviewingResult::needs_response(tx.clone(), rule.name()),
                routing: Some(RoutingRequest { tx, rule }),
            },
            Err(err) => {
                tracing::error!(rule = rule.name(), %err, "response query failed");
                ReviewOutcome::terminal(ReviewingResult::terminal_with_note(
                    tx,
                    Some(rule.name().to_string()),
                    format!("response query failed: {err}"),
                ))
            }
        }
    }
}

/// Concatenate a group's fragments, in chunk order, through `extract`
/// (which strips any legacy framing tags before the bytes are joined).
fn reassemble(group: &MemoGroup, extract: impl Fn(&MemoTx) -> Vec<u8>) -> Vec<u8> {
    group.ordered_fragments().flat_map(extract).collect()
}

fn extract_hash(row: &memo_interfaces::QueryRow) -> String {
    row.get("hash").and_then(|v| v.as_str()).unwrap_or_default().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use futures::stream::BoxStream;
    use memo_interfaces::{
        KeyRole, KeyStore, KeyStoreError, LedgerClient, LedgerClientError, LedgerEvent, OrderBy,
        PublicKeyHex, QueryRow, RepositoryError, ResponseQuery, RuleGraph, SharedSecretBytes,
        SubmitOutcome, TransactionRepository,
    };
    use memo_primitives::{EncodedMemo, MemoConstructionParameters, MemoPattern, Pattern};
    use rust_decimal::Decimal;
    use serde_json::Value;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct NullKeyStore;

    #[async_trait]
    impl KeyStore for NullKeyStore {
        async fn get_shared_secret(
            &self,
            _received_key: &PublicKeyHex,
            _secret_role: &KeyRole,
        ) -> Result<SharedSecretBytes, KeyStoreError> {
            Ok(vec![])
        }

        async fn get_handshake_for_address(
            &self,
            _a: &str,
            _b: &str,
        ) -> Result<(Option<PublicKeyHex>, Option<PublicKeyHex>), KeyStoreError> {
            Ok((None, None))
        }
    }

    /// A key store with a registered handshake and a fixed shared secret,
    /// for exercising the ECDH-decrypt leg of legacy decode.
    struct FakeKeyStore {
        handshakes: Mutex<HashMap<(String, String), (Option<PublicKeyHex>, Option<PublicKeyHex>)>>,
        secret: SharedSecretBytes,
    }

    #[async_trait]
    impl KeyStore for FakeKeyStore {
        async fn get_shared_secret(
            &self,
            _received_key: &PublicKeyHex,
            _secret_role: &KeyRole,
        ) -> Result<SharedSecretBytes, KeyStoreError> {
            Ok(self.secret.clone())
        }

        async fn get_handshake_for_address(
            &self,
            a: &str,
            b: &str,
        ) -> Result<(Option<PublicKeyHex>, Option<PublicKeyHex>), KeyStoreError> {
            Ok(self
                .handshakes
                .lock()
                .unwrap()
                .get(&(a.to_string(), b.to_string()))
                .cloned()
                .unwrap_or((None, None)))
        }
    }

    struct NullLedgerClient;

    #[async_trait]
    impl LedgerClient for NullLedgerClient {
        async fn subscribe(
            &self,
            _accounts: &[String],
        ) -> Result<BoxStream<'static, LedgerEvent>, LedgerClientError> {
            unimplemented!("not exercised by reviewer tests")
        }

        async fn submit(
            &self,
            _wallet: &str,
            _memos: Vec<EncodedMemo>,
            _destination: &str,
            _amount: Option<Decimal>,
        ) -> Result<SubmitOutcome, LedgerClientError> {
            unimplemented!("not exercised by reviewer tests")
        }

        async fn history(&self, _account: &str) -> Result<Vec<MemoTx>, LedgerClientError> {
            Ok(vec![])
        }
    }

    #[derive(Default)]
    struct FakeRepository {
        rows: Mutex<Vec<QueryRow>>,
    }

    #[async_trait]
    impl TransactionRepository for FakeRepository {
        async fn insert_transaction(&self, _tx: &MemoTx) -> Result<(), RepositoryError> {
            Ok(())
        }

        async fn batch_insert_transactions(&self, _txs: &[MemoTx]) -> Result<usize, RepositoryError> {
            Ok(0)
        }

        async fn get_decoded_transaction(&self, _hash: &str) -> Result<Option<MemoTx>, RepositoryError> {
            Ok(None)
        }

        async fn get_decoded_memo_w_processing(
            &self,
            _hash: &str,
        ) -> Result<Option<(MemoTx, ReviewingResult)>, RepositoryError> {
            Ok(None)
        }

        async fn get_unprocessed_transactions(
            &self,
            _order: OrderBy,
            _limit: Option<usize>,
            _include_processed: bool,
        ) -> Result<Vec<MemoTx>, RepositoryError> {
            Ok(vec![])
        }

        async fn store_reviewing_result(&self, _result: &ReviewingResult) -> Result<(), RepositoryError> {
            Ok(())
        }

        async fn execute_query(&self, _query: &ResponseQuery) -> Result<Vec<QueryRow>, RepositoryError> {
            Ok(self.rows.lock().unwrap().clone())
        }
    }

    struct PingRule;

    #[async_trait]
    impl Rule for PingRule {
        fn name(&self) -> &str {
            "ping"
        }

        fn pattern(&self) -> &MemoPattern {
            static PATTERN: std::sync::OnceLock<MemoPattern> = std::sync::OnceLock::new();
            PATTERN.get_or_init(|| MemoPattern {
                memo_type: Some(Pattern::Literal("PING".to_string())),
                memo_format: None,
                memo_data: None,
            })
        }

        fn transaction_type(&self) -> InteractionType {
            InteractionType::Request
        }

        async fn validate(&self, _tx: &MemoTx) -> bool {
            true
        }
    }

    fn tx(hash: &str, memo_type: &str, memo_format: &str, memo_data: &str) -> MemoTx {
        MemoTx::new(
            hash,
            "rA",
            "rB",
            Decimal::ZERO,
            Decimal::ZERO,
            memo_type,
            memo_format,
            memo_data,
            Utc::now(),
            "tesSUCCESS",
        )
        .unwrap()
    }

    fn reviewer_with(repository: FakeRepository, rules: RuleGraph) -> TransactionReviewer {
        let dependencies = Dependencies::new(
            Arc::new(NullLedgerClient),
            Arc::new(NullKeyStore),
            Arc::new(repository),
            rules,
        );
        TransactionReviewer::new(dependencies, KeyRole::new("primary"), vec!["rB".to_string()])
    }

    fn reviewer_with_keystore(
        repository: FakeRepository,
        rules: RuleGraph,
        key_store: Arc<dyn KeyStore>,
    ) -> TransactionReviewer {
        let dependencies =
            Dependencies::new(Arc::new(NullLedgerClient), key_store, Arc::new(repository), rules);
        TransactionReviewer::new(dependencies, KeyRole::new("primary"), vec!["rB".to_string()])
    }

    #[tokio::test]
    async fn invalid_standardized_format_is_terminal_with_note() {
        let mut reviewer = reviewer_with(FakeRepository::default(), RuleGraph::new());
        let outcome = reviewer.review(tx("H1", "G1", "v2.-.-.-", "hello")).await.unwrap();
        assert!(outcome.result.processed);
        assert!(outcome.result.notes.is_some());
        assert!(outcome.routing.is_none());
    }

    #[tokio::test]
    async fn unmatched_single_fragment_is_terminal() {
        let mut reviewer = reviewer_with(FakeRepository::default(), RuleGraph::new());
        let outcome = reviewer.review(tx("H1", "G1", "v1.-.-.-", "hello")).await.unwrap();
        assert!(outcome.result.processed);
        assert!(outcome.result.rule_name.is_none());
    }

    #[tokio::test]
    async fn multi_fragment_group_waits_for_completion() {
        let mut reviewer = reviewer_with(FakeRepository::default(), RuleGraph::new());
        let first = reviewer.review(tx("H1", "PING", "v1.-.-.c1/2", "he")).await;
        assert!(first.is_none());
        let second = reviewer.review(tx("H2", "PING", "v1.-.-.c2/2", "llo")).await;
        assert!(second.is_some());
    }

    #[tokio::test]
    async fn unanswered_request_is_routed() {
        let mut rules = RuleGraph::new();
        rules.push(Arc::new(PingRule));
        let mut reviewer = reviewer_with(FakeRepository::default(), rules);
        let outcome = reviewer.review(tx("H1", "PING", "v1.-.-.-", "ping")).await.unwrap();
        assert!(!outcome.result.processed);
        assert!(outcome.result.needs_rereview);
        assert!(outcome.routing.is_some());
    }

    #[tokio::test]
    async fn request_already_answered_is_satisfied() {
        let mut rules = RuleGraph::new();
        rules.push(Arc::new(PingRule));
        let mut row = serde_json::Map::new();
        row.insert("hash".to_string(), Value::String("RESPONSE_HASH".to_string()));
        let repository = FakeRepository { rows: Mutex::new(vec![row]) };
        let mut reviewer = reviewer_with(repository, rules);
        let outcome = reviewer.review(tx("H1", "PING", "v1.-.-.-", "ping")).await.unwrap();
        assert!(outcome.result.processed);
        assert_eq!(outcome.result.response_tx_hash.as_deref(), Some("RESPONSE_HASH"));
        assert!(outcome.routing.is_none());
    }

    #[tokio::test]
    async fn uncompressed_legacy_fragment_decodes_on_first_attempt() {
        let mut reviewer = reviewer_with(FakeRepository::default(), RuleGraph::new());
        let outcome = reviewer.review(tx("H1", "G1", "legacy", "chunk_1__hello")).await.unwrap();
        assert!(outcome.result.processed);
        assert_eq!(outcome.result.tx.memo_data, "hello");
    }

    #[tokio::test]
    async fn compressed_legacy_fragment_stays_pending_until_complete() {
        let mut reviewer = reviewer_with(FakeRepository::default(), RuleGraph::new());
        let outcome = reviewer
            .review(tx("H1", "G1", "legacy", "chunk_1__COMPRESSED__not-valid-brotli"))
            .await
            .unwrap();
        assert!(outcome.result.processed);
        assert!(outcome.result.notes.unwrap().contains("incomplete"));
    }

    /// Three legacy fragments — lead chunk tagged `COMPRESSED__`, the
    /// rest bare — whose joined base64 decompresses to a `WHISPER__`-
    /// tagged ciphertext. The group must survive assembly past the lead
    /// chunk's one-off compression tag and come out the other side as
    /// the original plaintext.
    #[tokio::test]
    async fn legacy_chunked_compressed_then_whisper_encrypted_round_trips() {
        let mut handshakes = HashMap::new();
        handshakes.insert(
            ("rA".to_string(), "rB".to_string()),
            (Some("pub-a".to_string()), Some("pub-b".to_string())),
        );
        handshakes.insert(
            ("rB".to_string(), "rA".to_string()),
            (Some("pub-b".to_string()), Some("pub-a".to_string())),
        );
        let store = Arc::new(FakeKeyStore {
            handshakes: Mutex::new(handshakes),
            secret: b"shared-secret-bytes".to_vec(),
        });

        let ciphertext_params = MemoConstructionParameters {
            source: "rA".into(),
            destination: "rB".into(),
            memo_type: Some("G1".into()),
            payload: "expected plaintext".into(),
            amount: None,
            should_encrypt: true,
            should_compress: false,
        };
        let encrypted = memo_codec::encode(&ciphertext_params, store.as_ref(), &KeyRole::new("primary"), Utc::now())
            .await
            .unwrap()
            .remove(0);
        let ciphertext = hex::decode(&encrypted.memo_data).unwrap();

        let mut whisper_blob = b"WHISPER__".to_vec();
        whisper_blob.extend_from_slice(&ciphertext);
        let tagged = format!("COMPRESSED__{}", memo_codec::compress(&whisper_blob));

        let third = tagged.len() / 3;
        let (chunk_a, rest) = tagged.split_at(third);
        let (chunk_b, chunk_c) = rest.split_at(third);

        let mut reviewer = reviewer_with_keystore(FakeRepository::default(), RuleGraph::new(), store);
        assert!(reviewer.review(tx("H1", "G1", "legacy", &format!("chunk_1__{chunk_a}"))).await.is_none());
        assert!(reviewer.review(tx("H2", "G1", "legacy", &format!("chunk_2__{chunk_b}"))).await.is_none());
        let outcome = reviewer
            .review(tx("H3", "G1", "legacy", &format!("chunk_3__{chunk_c}")))
            .await
            .unwrap();

        assert!(outcome.result.processed);
        assert_eq!(outcome.result.tx.memo_data, "expected plaintext");
    }
}
