use chrono::{DateTime, Utc};

use crate::MemoTx;

/// A request whose response is being generated or awaiting on-ledger
/// confirmation.
///
/// Corresponds to spec.md §3 `PendingResponse`. Exclusively owned and
/// mutated by the router task (spec.md §5); this crate only defines the
/// shape.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingResponse {
    /// The original request transaction.
    pub tx: MemoTx,
    /// Number of re-review retries attempted so far.
    pub retry_count: u32,
    /// Earliest time the next re-review poll should run.
    pub next_retry: DateTime<Utc>,
}

impl PendingResponse {
    /// Create a fresh pending-response record with zero retries, the next
    /// retry scheduled `retry_delay` from `now`.
    pub fn new(tx: MemoTx, now: DateTime<Utc>, retry_delay: chrono::Duration) -> Self {
        Self { tx, retry_count: 0, next_retry: now + retry_delay }
    }

    /// Record a failed poll, doubling the backoff from `base_delay`.
    pub fn backoff(&mut self, now: DateTime<Utc>, base_delay: chrono::Duration) {
        self.retry_count += 1;
        let factor = 2i64.saturating_pow(self.retry_count);
        self.next_retry = now + base_delay * factor.min(i32::MAX as i64) as i32;
    }

    /// Whether this record has exhausted its retry budget.
    pub fn exhausted(&self, max_retries: u32) -> bool {
        self.retry_count >= max_retries
    }

    /// Whether this record is due for its next poll.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        now >= self.next_retry
    }
}
