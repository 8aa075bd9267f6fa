use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error returned when constructing a [`MemoTx`] from raw ledger data that
/// violates the invariants in spec.md §3.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MemoTxError {
    /// One of `memo_type`, `memo_format`, or `memo_data` was missing.
    #[error("memo transaction is missing required field `{0}`")]
    MissingMemoField(&'static str),
}

/// One ledger memo-bearing transaction, decoded at ingest (hex-at-rest is
/// decoded to text before this value is constructed).
///
/// Corresponds to spec.md §3 `MemoTx`. Immutable once constructed; cheaply
/// `Clone`d across queues (value semantics, per spec.md §3's ownership
/// note).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoTx {
    /// Opaque ledger transaction hash.
    pub hash: String,
    /// Source account.
    pub account: String,
    /// Destination account.
    pub destination: String,
    /// Token amount carried by the transaction, fixed-point, defaults to
    /// zero.
    pub amount: Decimal,
    /// Network fee paid for the transaction.
    pub fee: Decimal,
    /// `memo_type` field (group id).
    pub memo_type: String,
    /// `memo_format` field (self-describing header, see
    /// [`crate::MemoStructure`]).
    pub memo_format: String,
    /// `memo_data` field (decoded UTF-8 text, not hex).
    pub memo_data: String,
    /// Wall-clock timestamp of the transaction, timezone-aware.
    pub timestamp: DateTime<Utc>,
    /// Ledger result code, e.g. `"tesSUCCESS"`.
    pub result: String,
    /// Ledger index the transaction was included in, when known. Lets the
    /// repository order transactions without re-deriving order from the
    /// hash.
    pub ledger_index: Option<u64>,
    /// Sender's account sequence number, when known.
    pub account_sequence: Option<u32>,
}

impl MemoTx {
    /// Construct a new `MemoTx`, enforcing the non-null memo-field
    /// invariant from spec.md §3.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        hash: impl Into<String>,
        account: impl Into<String>,
        destination: impl Into<String>,
        amount: Decimal,
        fee: Decimal,
        memo_type: impl Into<String>,
        memo_format: impl Into<String>,
        memo_data: impl Into<String>,
        timestamp: DateTime<Utc>,
        result: impl Into<String>,
    ) -> Result<Self, MemoTxError> {
        let memo_type = memo_type.into();
        let memo_format = memo_format.into();
        let memo_data = memo_data.into();

        if memo_type.is_empty() {
            return Err(MemoTxError::MissingMemoField("memo_type"));
        }
        if memo_format.is_empty() {
            return Err(MemoTxError::MissingMemoField("memo_format"));
        }

        Ok(Self {
            hash: hash.into(),
            account: account.into(),
            destination: destination.into(),
            amount,
            fee,
            memo_type,
            memo_format,
            memo_data,
            timestamp,
            result: result.into(),
            ledger_index: None,
            account_sequence: None,
        })
    }

    /// True if the ledger reports this transaction as successful.
    pub fn is_success(&self) -> bool {
        self.result == "tesSUCCESS"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Result<MemoTx, MemoTxError> {
        MemoTx::new(
            "HASH",
            "rSource",
            "rDest",
            Decimal::ZERO,
            Decimal::ZERO,
            "G1",
            "v1.-.-.c1/1",
            "hello",
            Utc::now(),
            "tesSUCCESS",
        )
    }

    #[test]
    fn rejects_missing_memo_type() {
        let err = MemoTx::new(
            "HASH",
            "rSource",
            "rDest",
            Decimal::ZERO,
            Decimal::ZERO,
            "",
            "v1.-.-.c1/1",
            "hello",
            Utc::now(),
            "tesSUCCESS",
        )
        .unwrap_err();
        assert_eq!(err, MemoTxError::MissingMemoField("memo_type"));
    }

    #[test]
    fn success_flag_matches_result_code() {
        let tx = sample().unwrap();
        assert!(tx.is_success());
    }
}
