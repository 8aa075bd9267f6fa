//! Shared data model for the ledger memo pipeline.
//!
//! Types here are pure data plus the invariants spec.md §3 assigns to each
//! type directly (e.g. [`MemoGroup`]'s duplicate-resolution rule). Behavior
//! that spans multiple types — format-string parsing, encode/decode,
//! assembly across a table of groups, review/routing — lives in the
//! downstream `memo-codec`, `memo-assembler`, and `memo-orchestrator`
//! crates.

mod constants;
mod construction;
mod encoded;
mod group;
mod pattern;
mod pending;
mod review;
mod structure;
mod tx;

pub use constants::*;
pub use construction::{generate_group_id, MemoConstructionParameters};
pub use encoded::EncodedMemo;
pub use group::{InsertOutcome, MemoGroup};
pub use pattern::{InteractionType, MemoPattern, Pattern};
pub use pending::PendingResponse;
pub use review::ReviewingResult;
pub use structure::{ChunkInfo, CompressionTag, EncryptionTag, MemoStructure};
pub use tx::{MemoTx, MemoTxError};
