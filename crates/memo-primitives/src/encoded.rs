use serde::{Deserialize, Serialize};

/// One wire-ready memo fragment: the three memo fields, hex-encoded.
///
/// This is the memo codec's output unit (spec.md §4.D encode step 4) and
/// the ledger client's submit input — distinct from [`crate::MemoTx`],
/// which additionally carries transaction metadata (hash, participants,
/// timestamp) assigned once the fragment lands on the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedMemo {
    /// Hex-encoded `memo_type` (group id).
    pub memo_type: String,
    /// Hex-encoded `memo_format`.
    pub memo_format: String,
    /// Hex-encoded `memo_data`.
    pub memo_data: String,
}

impl EncodedMemo {
    /// Hex-encode a plaintext memo triple.
    pub fn from_plaintext(memo_type: &str, memo_format: &str, memo_data: &str) -> Self {
        Self::from_parts(memo_type, memo_format, memo_data.as_bytes())
    }

    /// Hex-encode a memo triple whose `memo_data` is raw bytes, not
    /// necessarily valid UTF-8 (an encrypted or compressed fragment).
    pub fn from_parts(memo_type: &str, memo_format: &str, memo_data: &[u8]) -> Self {
        Self {
            memo_type: hex::encode(memo_type),
            memo_format: hex::encode(memo_format),
            memo_data: hex::encode(memo_data),
        }
    }
}
