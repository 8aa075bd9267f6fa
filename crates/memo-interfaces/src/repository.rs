use async_trait::async_trait;
use memo_primitives::{MemoTx, ReviewingResult};
use serde_json::Value;
use thiserror::Error;

/// Ordering requested from [`TransactionRepository::get_unprocessed_transactions`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderBy {
    /// Ascending by ledger timestamp (used during historical backfill,
    /// per spec.md §5's ordering guarantee).
    TimestampAsc,
    /// Descending by ledger timestamp.
    TimestampDesc,
}

/// A SQL fragment plus bound parameters, produced by a `Request` rule and
/// executed against the repository to check whether a response already
/// exists (spec.md §4.F step 3).
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseQuery {
    /// The SQL fragment (a `WHERE`-clause style predicate or full query,
    /// defined by the rule author).
    pub sql: String,
    /// Bound parameters, keyed by name.
    pub params: Value,
}

/// One row returned by [`TransactionRepository::execute_query`].
pub type QueryRow = serde_json::Map<String, Value>;

/// Errors surfaced by the repository contract.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// The underlying store rejected the query or connection.
    #[error("repository error: {0}")]
    Backend(String),
}

/// External contract for the persistent transaction repository, consumed
/// (not implemented) by this workspace, per spec.md §6.
#[async_trait]
pub trait TransactionRepository: Send + Sync {
    /// Insert a single raw transaction.
    async fn insert_transaction(&self, tx: &MemoTx) -> Result<(), RepositoryError>;

    /// Batch-insert transactions, returning the number actually inserted
    /// (used by historical backfill).
    async fn batch_insert_transactions(&self, txs: &[MemoTx]) -> Result<usize, RepositoryError>;

    /// Look up a transaction with its memo fields already decoded.
    async fn get_decoded_transaction(&self, hash: &str) -> Result<Option<MemoTx>, RepositoryError>;

    /// Look up a transaction joined with its processing/reviewing result —
    /// the view the re-review poll consults.
    async fn get_decoded_memo_w_processing(
        &self,
        hash: &str,
    ) -> Result<Option<(MemoTx, ReviewingResult)>, RepositoryError>;

    /// Pull transactions that have not yet been marked `processed`.
    async fn get_unprocessed_transactions(
        &self,
        order: OrderBy,
        limit: Option<usize>,
        include_processed: bool,
    ) -> Result<Vec<MemoTx>, RepositoryError>;

    /// Persist the outcome of reviewing a transaction.
    async fn store_reviewing_result(&self, result: &ReviewingResult) -> Result<(), RepositoryError>;

    /// Execute a rule-supplied query, used to check whether a request has
    /// already been answered.
    async fn execute_query(&self, query: &ResponseQuery) -> Result<Vec<QueryRow>, RepositoryError>;
}
