use crate::MemoTx;

/// The outcome of reviewing a single transaction against the pattern/rule
/// graph.
///
/// Corresponds to spec.md §4.F "Output". Produced by the reviewer,
/// consumed by the router and the repository (`store_reviewing_result`).
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewingResult {
    /// The transaction reviewed (the synthetic, decoded transaction for a
    /// group; the original transaction for a direct match).
    pub tx: MemoTx,
    /// Whether this transaction's processing has reached a terminal state.
    pub processed: bool,
    /// Name of the rule that matched, if any.
    pub rule_name: Option<String>,
    /// Hash of the response transaction, once one has been found.
    pub response_tx_hash: Option<String>,
    /// Free-form explanatory note (e.g. why validation failed, or why
    /// decoding could not proceed).
    pub notes: Option<String>,
    /// Whether this transaction should be routed for a response and
    /// revisited later.
    pub needs_rereview: bool,
}

impl ReviewingResult {
    /// A terminal result with no matching rule.
    pub fn unmatched(tx: MemoTx) -> Self {
        Self {
            tx,
            processed: true,
            rule_name: None,
            response_tx_hash: None,
            notes: None,
            needs_rereview: false,
        }
    }

    /// A terminal result carrying an explanatory note (invalid format,
    /// failed validation, processing error).
    pub fn terminal_with_note(tx: MemoTx, rule_name: Option<String>, note: impl Into<String>) -> Self {
        Self {
            tx,
            processed: true,
            rule_name,
            response_tx_hash: None,
            notes: Some(note.into()),
            needs_rereview: false,
        }
    }

    /// A terminal result for a matched `Standalone` or `Response` pattern:
    /// no further action is expected.
    pub fn matched_terminal(tx: MemoTx, rule_name: impl Into<String>) -> Self {
        Self {
            tx,
            processed: true,
            rule_name: Some(rule_name.into()),
            response_tx_hash: None,
            notes: None,
            needs_rereview: false,
        }
    }

    /// A request that found its response already on-ledger.
    pub fn satisfied(tx: MemoTx, rule_name: impl Into<String>, response_tx_hash: impl Into<String>) -> Self {
        Self {
            tx,
            processed: true,
            rule_name: Some(rule_name.into()),
            response_tx_hash: Some(response_tx_hash.into()),
            notes: None,
            needs_rereview: false,
        }
    }

    /// A request with no response yet, that must be routed and later
    /// revisited.
    pub fn needs_response(tx: MemoTx, rule_name: impl Into<String>) -> Self {
        Self {
            tx,
            processed: false,
            rule_name: Some(rule_name.into()),
            response_tx_hash: None,
            notes: None,
            needs_rereview: true,
        }
    }
}
