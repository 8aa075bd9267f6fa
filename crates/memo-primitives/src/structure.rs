use serde::{Deserialize, Serialize};

/// Encryption tag carried by a format string's `<enc>` token (spec.md
/// §4.C).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EncryptionTag {
    /// `-` — payload is not encrypted.
    None,
    /// `e` — payload is ECDH-encrypted.
    Ecdh,
}

/// Compression tag carried by a format string's `<comp>` token (spec.md
/// §4.C).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompressionTag {
    /// `-` — payload is not compressed.
    None,
    /// `b` — payload is Brotli-compressed.
    Brotli,
}

/// 1-based chunk position within a group, parsed from a `c<index>/<total>`
/// token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkInfo {
    /// 1-based index of this fragment.
    pub index: u32,
    /// Total number of fragments in the group.
    pub total: u32,
}

/// Parsed view of a transaction's `memo_format` field.
///
/// Corresponds to spec.md §3 `MemoStructure`. Construction (parsing) lives
/// in `memo-codec`'s format module; this crate only holds the shape so that
/// the assembler and orchestrator can depend on it without depending on the
/// codec's parsing logic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoStructure {
    /// Version tag, e.g. `"1"`, present only when `is_valid_format`.
    pub version: Option<String>,
    /// Encryption tag.
    pub encryption: EncryptionTag,
    /// Compression tag.
    pub compression: CompressionTag,
    /// Chunk position, `None` for a single-fragment message.
    pub chunk: Option<ChunkInfo>,
    /// Whether the format string parsed as a well-formed standardized
    /// header.
    pub is_valid_format: bool,
    /// Group id, copied from the owning transaction's `memo_type`. `None`
    /// until bound to a transaction.
    pub group_id: Option<String>,
    /// The raw format string this structure was parsed from, kept for
    /// diagnostics in `InvalidFormat` notes.
    pub raw_format: String,
}

impl MemoStructure {
    /// An empty, invalid structure — used when the format string does not
    /// parse.
    pub fn invalid(raw_format: impl Into<String>) -> Self {
        Self {
            version: None,
            encryption: EncryptionTag::None,
            compression: CompressionTag::None,
            chunk: None,
            is_valid_format: false,
            group_id: None,
            raw_format: raw_format.into(),
        }
    }

    /// Total number of fragments this structure declares, 1 for an
    /// unchunked (single-fragment) message.
    pub fn total_chunks(&self) -> u32 {
        self.chunk.map_or(1, |c| c.total)
    }

    /// 1-based chunk index, 1 for an unchunked message.
    pub fn chunk_index(&self) -> u32 {
        self.chunk.map_or(1, |c| c.index)
    }

    /// Whether this structure's chunking/encryption/compression tags are
    /// consistent with `other`'s, per spec.md §4.E rule 4 (same encryption
    /// tag, same compression tag, same total-chunks).
    pub fn is_consistent_with(&self, other: &MemoStructure) -> bool {
        self.encryption == other.encryption
            && self.compression == other.compression
            && self.total_chunks() == other.total_chunks()
    }

    /// Bind this structure to a transaction's group id (`memo_type`).
    pub fn with_group_id(mut self, group_id: impl Into<String>) -> Self {
        self.group_id = Some(group_id.into());
        self
    }
}
