//! Process-wide constants shared by every stage of the memo pipeline.
//!
//! These are the fixed wire-format and scheduling constants the pipeline
//! runs on. Operator-tunable values (stale timeout, retry delay, etc.)
//! are exposed here as defaults and are overridable through
//! `memo-config`.

use std::time::Duration;

/// Current memo format version tag, emitted as `v<MEMO_VERSION>` in every
/// format string produced by this workspace.
pub const MEMO_VERSION: &str = "1";

/// Maximum serialized byte size of a single ledger memo envelope
/// (`memo_type` + `memo_format` + `memo_data`, all hex-encoded).
pub const MAX_CHUNK_SIZE: usize = 1000;

/// Fixed structural overhead (JSON braces, field names) added by the
/// ledger client when a memo triple is wrapped into a transaction memo.
pub const XRP_MEMO_STRUCTURAL_OVERHEAD: usize = 12;

/// Worst-case chunk label reserved by the chunker before computing the
/// data budget, per spec.md §4.B (`chunk_999__`, 11 ASCII characters).
pub const CHUNK_LABEL_RESERVATION: &str = "chunk_999__";

/// A group with no new fragment within this window (outside sync mode) is
/// considered abandoned.
pub const STALE_GROUP_TIMEOUT: Duration = Duration::from_secs(600);

/// Initial delay before the first re-review retry after a response is
/// confirmed sent.
pub const RETRY_DELAY: Duration = Duration::from_secs(5);

/// Number of re-review retries attempted before a pending record is
/// dropped.
pub const MAX_RETRY_COUNT: u32 = 10;

/// Minimum spacing between consecutive "still idle" log lines emitted by a
/// response processor waiting on an empty queue.
pub const IDLE_LOG_INTERVAL: Duration = Duration::from_secs(3600);

/// Maximum time allowed between `ledgerClosed` events before the
/// subscription is considered stalled.
pub const LEDGER_TIMEOUT: Duration = Duration::from_secs(30);

/// Watchdog polling interval used to detect a stalled ledger subscription.
pub const CHECK_INTERVAL: Duration = Duration::from_secs(4);

/// Background re-review sweep interval (the router "wakes once per
/// second", per spec.md §4.G).
pub const REREVIEW_TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Upper bound on the reconnect backoff applied to ledger subscription
/// failures.
pub const RECONNECT_BACKOFF_CAP: Duration = Duration::from_secs(30);

/// Initial reconnect backoff applied after the first subscription failure.
pub const RECONNECT_BACKOFF_INITIAL: Duration = Duration::from_secs(1);

/// Number of consecutive reconnect failures before rotating to the next
/// configured ledger endpoint.
pub const ENDPOINT_ROTATION_THRESHOLD: u32 = 5;
