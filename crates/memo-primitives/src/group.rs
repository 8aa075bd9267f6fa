use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::{MemoStructure, MemoTx};

/// Outcome of attempting to add a fragment to a [`MemoGroup`], per spec.md
/// §4.E's per-fragment decision table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The fragment filled a new chunk index.
    Added,
    /// The fragment duplicated an existing chunk index but was earlier, so
    /// it replaced the incumbent.
    ReplacedEarlier,
    /// The fragment duplicated an existing chunk index but was not earlier
    /// (same or later timestamp), so it was discarded.
    KeptExisting,
    /// The fragment's structure was inconsistent with the group (different
    /// encryption tag, compression tag, or total-chunks) and was rejected.
    Inconsistent,
}

/// A collection of memo fragments that share one `group_id`, reassembled
/// into a single logical message.
///
/// Corresponds to spec.md §3 `MemoGroup`. Enforces its own invariants
/// (shared `group_id`, consistent structure, at-most-one fragment per chunk
/// index with earlier-timestamp-wins on duplicates, only successful
/// transactions admitted) on every insert; the group *table* — staleness
/// tracking and sync-mode gating across many groups — is owned by
/// `memo-assembler`.
#[derive(Debug, Clone)]
pub struct MemoGroup {
    group_id: String,
    fragments: BTreeMap<u32, MemoTx>,
    structure: MemoStructure,
}

impl MemoGroup {
    /// Create a new group seeded by its first fragment.
    ///
    /// `structure` must already be bound to `first.memo_type` via
    /// [`MemoStructure::with_group_id`]. Returns `None` if `first` is not a
    /// successful transaction (spec.md §4.E rule 1).
    pub fn seed(first: MemoTx, structure: MemoStructure) -> Option<Self> {
        if !first.is_success() {
            return None;
        }
        let group_id = first.memo_type.clone();
        let index = structure.chunk_index();
        let mut fragments = BTreeMap::new();
        fragments.insert(index, first);
        Some(Self { group_id, fragments, structure })
    }

    /// The group's id (`memo_type`, shared by every member).
    pub fn group_id(&self) -> &str {
        &self.group_id
    }

    /// The structure shared by every member of this group.
    pub fn structure(&self) -> &MemoStructure {
        &self.structure
    }

    /// Attempt to add a fragment, enforcing the invariants described on
    /// [`MemoGroup`].
    pub fn insert(&mut self, tx: MemoTx, structure: &MemoStructure) -> InsertOutcome {
        if !tx.is_success() {
            return InsertOutcome::Inconsistent;
        }
        if !self.structure.is_consistent_with(structure) {
            return InsertOutcome::Inconsistent;
        }

        let index = structure.chunk_index();
        match self.fragments.get(&index) {
            None => {
                self.fragments.insert(index, tx);
                InsertOutcome::Added
            }
            Some(existing) => {
                if tx.timestamp < existing.timestamp {
                    self.fragments.insert(index, tx);
                    InsertOutcome::ReplacedEarlier
                } else {
                    InsertOutcome::KeptExisting
                }
            }
        }
    }

    /// Chunk indices currently observed.
    pub fn chunk_indices(&self) -> impl Iterator<Item = u32> + '_ {
        self.fragments.keys().copied()
    }

    /// Number of fragments currently held.
    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    /// Whether the group holds no fragments (never true for a group
    /// produced by [`MemoGroup::seed`], but useful after draining).
    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// A group is ready once its observed chunk indices cover `1..=total`,
    /// per spec.md §4.E "Readiness".
    pub fn is_ready(&self) -> bool {
        let total = self.structure.total_chunks();
        (1..=total).all(|i| self.fragments.contains_key(&i))
    }

    /// Fragments in ascending chunk-index order, the order reassembly
    /// concatenates in (spec.md §5 ordering guarantee).
    pub fn ordered_fragments(&self) -> impl Iterator<Item = &MemoTx> {
        self.fragments.values()
    }

    /// Timestamp of the most recently-observed fragment, used by the
    /// assembler's staleness clock.
    pub fn newest_timestamp(&self) -> Option<DateTime<Utc>> {
        self.fragments.values().map(|tx| tx.timestamp).max()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ChunkInfo, CompressionTag, EncryptionTag};
    use rust_decimal::Decimal;

    fn structure(index: u32, total: u32) -> MemoStructure {
        MemoStructure {
            version: Some("1".to_string()),
            encryption: EncryptionTag::None,
            compression: CompressionTag::None,
            chunk: Some(ChunkInfo { index, total }),
            is_valid_format: true,
            group_id: Some("G1".to_string()),
            raw_format: format!("v1.-.-.c{index}/{total}"),
        }
    }

    fn tx_at(index: u32, minute: i64) -> MemoTx {
        MemoTx::new(
            format!("HASH{index}"),
            "rSource",
            "rDest",
            Decimal::ZERO,
            Decimal::ZERO,
            "G1",
            format!("v1.-.-.c{index}/3"),
            format!("chunk{index}"),
            Utc::now() + chrono::Duration::minutes(minute),
            "tesSUCCESS",
        )
        .unwrap()
    }

    #[test]
    fn duplicate_chunk_keeps_earlier_timestamp() {
        let mut group = MemoGroup::seed(tx_at(1, 10), structure(1, 3)).unwrap();
        assert_eq!(group.insert(tx_at(2, 11), &structure(2, 3)), InsertOutcome::Added);
        assert_eq!(group.insert(tx_at(1, 12), &structure(1, 3)), InsertOutcome::KeptExisting);

        assert_eq!(group.len(), 2);
        let survivor = group.ordered_fragments().next().unwrap();
        assert_eq!(survivor.timestamp, tx_at(1, 10).timestamp);
    }

    #[test]
    fn earlier_duplicate_replaces_existing() {
        let mut group = MemoGroup::seed(tx_at(1, 10), structure(1, 3)).unwrap();
        assert_eq!(group.insert(tx_at(1, 5), &structure(1, 3)), InsertOutcome::ReplacedEarlier);
        let survivor = group.ordered_fragments().next().unwrap();
        assert_eq!(survivor.timestamp, tx_at(1, 5).timestamp);
    }

    #[test]
    fn readiness_requires_full_coverage() {
        let mut group = MemoGroup::seed(tx_at(1, 0), structure(1, 2)).unwrap();
        assert!(!group.is_ready());
        group.insert(tx_at(2, 1), &structure(2, 2));
        assert!(group.is_ready());
    }

    #[test]
    fn inconsistent_structure_rejected() {
        let mut group = MemoGroup::seed(tx_at(1, 0), structure(1, 2)).unwrap();
        let mut bad = structure(2, 2);
        bad.compression = CompressionTag::Brotli;
        assert_eq!(group.insert(tx_at(2, 1), &bad), InsertOutcome::Inconsistent);
    }
}
