use async_trait::async_trait;
use futures::stream::BoxStream;
use memo_primitives::{EncodedMemo, MemoTx};
use rust_decimal::Decimal;
use thiserror::Error;

/// A message observed on the ledger subscription, per spec.md §6: "yielding
/// an async iterable of messages with a `type` field in {`ledgerClosed`,
/// `transaction`}".
#[derive(Debug, Clone)]
pub enum LedgerEvent {
    /// A ledger has closed; used by the watchdog to detect a stalled feed.
    LedgerClosed,
    /// A memo-bearing transaction.
    Transaction(MemoTx),
}

/// Outcome of a `submit` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The ledger accepted the submission.
    Success,
    /// The ledger rejected the submission.
    Failure,
}

/// Errors surfaced by the ledger client contract.
#[derive(Debug, Error)]
pub enum LedgerClientError {
    /// No `ledgerClosed` event within the configured timeout.
    #[error("ledger subscription timed out waiting for a ledgerClosed event")]
    Timeout,
    /// Transport-level failure talking to the ledger.
    #[error("ledger transport error: {0}")]
    Transport(String),
}

/// External contract for the ledger client, consumed (not implemented) by
/// this workspace, per spec.md §6.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Subscribe to ledger-closed and transaction events for the given
    /// accounts.
    async fn subscribe(
        &self,
        accounts: &[String],
    ) -> Result<BoxStream<'static, LedgerEvent>, LedgerClientError>;

    /// Submit one or more memo fragments as a transaction from `wallet` to
    /// `destination`, optionally carrying `amount`.
    async fn submit(
        &self,
        wallet: &str,
        memos: Vec<EncodedMemo>,
        destination: &str,
        amount: Option<Decimal>,
    ) -> Result<SubmitOutcome, LedgerClientError>;

    /// Pull the finite transaction history for `account` (used for
    /// historical backfill).
    async fn history(&self, account: &str) -> Result<Vec<MemoTx>, LedgerClientError>;
}
