use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};

use memo_codec::{parse_format, parse_legacy};
use memo_primitives::{ChunkInfo, CompressionTag, EncryptionTag, InsertOutcome, MemoGroup, MemoStructure, MemoTx};

/// Outcome of feeding one fragment to the group table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssemblerOutcome {
    /// The transaction was not a successful ledger result and was
    /// dropped, per spec.md §4.E rule 1.
    Dropped,
    /// The fragment's structure was inconsistent with its group, or it
    /// claimed legacy chunking without a parseable chunk index, and was
    /// rejected.
    Rejected,
    /// The fragment was added (or replaced a later duplicate); the group
    /// is not yet complete.
    Pending { group_id: String },
    /// The group's observed chunk indices now cover the full range.
    Ready { group_id: String },
}

/// Owns the `group_id -> MemoGroup` table and the staleness clock, per
/// spec.md §4.E. Exclusively owned by the reviewer task (no lock needed,
/// per spec.md §5).
#[derive(Debug, Default)]
pub struct GroupTable {
    groups: HashMap<String, MemoGroup>,
    /// While `true`, [`GroupTable::sweep_stale`] is a no-op — historical
    /// backfill may deliver fragments out of temporal order (spec.md
    /// §4.E "Staleness").
    sync_mode: bool,
}

impl GroupTable {
    /// A table starting in sync mode, matching the orchestrator's startup
    /// sequence (historical backfill runs before live streaming).
    pub fn new() -> Self {
        Self { groups: HashMap::new(), sync_mode: true }
    }

    pub fn set_sync_mode(&mut self, sync_mode: bool) {
        self.sync_mode = sync_mode;
    }

    pub fn is_sync_mode(&self) -> bool {
        self.sync_mode
    }

    /// Feed a fragment carrying standardized chunking metadata, per
    /// spec.md §4.E steps 1-5.
    pub fn observe_standard(&mut self, tx: MemoTx) -> AssemblerOutcome {
        if !tx.is_success() {
            return AssemblerOutcome::Dropped;
        }
        let group_id = tx.memo_type.clone();
        let structure = parse_format(&tx.memo_format).with_group_id(group_id.clone());

        match self.groups.get_mut(&group_id) {
            None => {
                let ready = structure.total_chunks() == 1;
                let group =
                    MemoGroup::seed(tx, structure).expect("tx.is_success() already checked");
                self.groups.insert(group_id.clone(), group);
                if ready {
                    AssemblerOutcome::Ready { group_id }
                } else {
                    AssemblerOutcome::Pending { group_id }
                }
            }
            Some(group) => match group.insert(tx, &structure) {
                InsertOutcome::Inconsistent => AssemblerOutcome::Rejected,
                _ if group.is_ready() => AssemblerOutcome::Ready { group_id },
                _ => AssemblerOutcome::Pending { group_id },
            },
        }
    }

    /// Feed a fragment carrying a legacy `chunk_N__` tag.
    ///
    /// Legacy frames carry no declared total, so this table never reports
    /// `Ready` for a legacy group; the caller attempts a decode after
    /// every `Pending` outcome and calls [`GroupTable::take`] once that
    /// decode succeeds (spec.md §4.F "attempt to process
    /// opportunistically").
    ///
    /// Unlike standardized chunking, a legacy fragment's own text says
    /// nothing reliable about the group's compression/encryption: only
    /// the lead chunk carries `COMPRESSED__`, and `WHISPER__` never
    /// appears at the raw-fragment level at all (it lives inside the
    /// decompressed payload). So every legacy structure here carries a
    /// fixed, untagged compression/encryption pair — consistency checks
    /// key only on the chunk count, and the real tags are recovered from
    /// the reassembled payload once decoding is attempted.
    pub fn observe_legacy(&mut self, tx: MemoTx) -> AssemblerOutcome {
        if !tx.is_success() {
            return AssemblerOutcome::Dropped;
        }
        let legacy = parse_legacy(&tx.memo_data);
        let Some(index) = legacy.chunk_index else {
            return AssemblerOutcome::Rejected;
        };
        let group_id = tx.memo_type.clone();
        let structure = MemoStructure {
            version: None,
            encryption: EncryptionTag::None,
            compression: CompressionTag::None,
            chunk: Some(ChunkInfo { index, total: u32::MAX }),
            is_valid_format: false,
            group_id: Some(group_id.clone()),
            raw_format: tx.memo_format.clone(),
        };

        match self.groups.get_mut(&group_id) {
            None => {
                let group =
                    MemoGroup::seed(tx, structure).expect("tx.is_success() already checked");
                self.groups.insert(group_id.clone(), group);
            }
            Some(group) => {
                if group.insert(tx, &structure) == InsertOutcome::Inconsistent {
                    return AssemblerOutcome::Rejected;
                }
            }
        }
        AssemblerOutcome::Pending { group_id }
    }

    /// Remove and return a group (once the caller has decided it is ready
    /// or should be abandoned).
    pub fn take(&mut self, group_id: &str) -> Option<MemoGroup> {
        self.groups.remove(group_id)
    }

    /// Inspect a group without removing it.
    pub fn peek(&self, group_id: &str) -> Option<&MemoGroup> {
        self.groups.get(group_id)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Drop groups whose newest fragment is older than `timeout` relative
    /// to `now`. A no-op in sync mode. Returns the dropped group ids.
    pub fn sweep_stale(&mut self, now: DateTime<Utc>, timeout: Duration) -> Vec<String> {
        if self.sync_mode {
            return Vec::new();
        }
        let timeout = chrono::Duration::from_std(timeout).unwrap_or(chrono::Duration::MAX);
        let stale_ids: Vec<String> = self
            .groups
            .iter()
            .filter(|(_, group)| {
                group.newest_timestamp().is_some_and(|t| now.signed_duration_since(t) > timeout)
            })
            .map(|(id, _)| id.clone())
            .collect();
        for id in &stale_ids {
            self.groups.remove(id);
            tracing::debug!(group_id = %id, "dropping stale group");
        }
        stale_ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn tx(hash: &str, group_id: &str, format: &str, data: &str, minute: i64) -> MemoTx {
        MemoTx::new(
            hash,
            "rA",
            "rB",
            Decimal::ZERO,
            Decimal::ZERO,
            group_id,
            format,
            data,
            Utc::now() + chrono::Duration::minutes(minute),
            "tesSUCCESS",
        )
        .unwrap()
    }

    #[test]
    fn single_fragment_group_is_ready_immediately() {
        let mut table = GroupTable::new();
        let outcome = table.observe_standard(tx("H1", "G1", "v1.-.-.-", "hello", 0));
        assert_eq!(outcome, AssemblerOutcome::Ready { group_id: "G1".to_string() });
    }

    #[test]
    fn multi_fragment_group_becomes_ready_once_complete() {
        let mut table = GroupTable::new();
        let first = table.observe_standard(tx("H1", "G1", "v1.-.-.c1/2", "aaa", 0));
        assert_eq!(first, AssemblerOutcome::Pending { group_id: "G1".to_string() });
        let second = table.observe_standard(tx("H2", "G1", "v1.-.-.c2/2", "bbb", 1));
        assert_eq!(second, AssemblerOutcome::Ready { group_id: "G1".to_string() });
    }

    #[test]
    fn inconsistent_fragment_is_rejected() {
        let mut table = GroupTable::new();
        table.observe_standard(tx("H1", "G1", "v1.-.-.c1/2", "aaa", 0));
        let rejected = table.observe_standard(tx("H2", "G1", "v1.e.-.c2/2", "bbb", 1));
        assert_eq!(rejected, AssemblerOutcome::Rejected);
    }

    #[test]
    fn legacy_group_tolerates_compression_tag_only_on_lead_chunk() {
        let mut table = GroupTable::new();
        let a = table.observe_legacy(tx("H1", "G1", "legacy", "chunk_1__COMPRESSED__aaa", 0));
        let b = table.observe_legacy(tx("H2", "G1", "legacy", "chunk_2__bbb", 1));
        let c = table.observe_legacy(tx("H3", "G1", "legacy", "chunk_3__ccc", 2));
        assert_eq!(a, AssemblerOutcome::Pending { group_id: "G1".to_string() });
        assert_eq!(b, AssemblerOutcome::Pending { group_id: "G1".to_string() });
        assert_eq!(c, AssemblerOutcome::Pending { group_id: "G1".to_string() });
        assert_eq!(table.peek("G1").unwrap().len(), 3);
    }

    #[test]
    fn legacy_fragments_never_self_report_ready() {
        let mut table = GroupTable::new();
        let a = table.observe_legacy(tx("H1", "G1", "legacy", "chunk_1__aaa", 0));
        let b = table.observe_legacy(tx("H2", "G1", "legacy", "chunk_2__bbb", 1));
        assert_eq!(a, AssemblerOutcome::Pending { group_id: "G1".to_string() });
        assert_eq!(b, AssemblerOutcome::Pending { group_id: "G1".to_string() });
        assert_eq!(table.peek("G1").unwrap().len(), 2);
    }

    #[test]
    fn stale_group_dropped_outside_sync_mode() {
        let mut table = GroupTable::new();
        table.set_sync_mode(false);
        table.observe_standard(tx("H1", "G1", "v1.-.-.c1/2", "aaa", 0));
        let now = Utc::now() + chrono::Duration::minutes(20);
        let dropped = table.sweep_stale(now, Duration::from_secs(600));
        assert_eq!(dropped, vec!["G1".to_string()]);
        assert!(table.peek("G1").is_none());
    }

    #[test]
    fn sync_mode_suppresses_staleness_sweep() {
        let mut table = GroupTable::new();
        table.observe_standard(tx("H1", "G1", "v1.-.-.c1/2", "aaa", 0));
        let now = Utc::now() + chrono::Duration::minutes(20);
        let dropped = table.sweep_stale(now, Duration::from_secs(600));
        assert!(dropped.is_empty());
        assert!(table.peek("G1").is_some());
    }
}
