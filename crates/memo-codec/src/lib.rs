//! The bidirectional memo codec: encrypt/compress/chunk a plaintext payload
//! into wire-ready fragments and the reverse, per spec.md §4.

mod chunker;
mod codec;
mod compression;
mod crypto;
mod format;
mod legacy;

pub use chunker::{data_budget, split, ChunkerError};
pub use codec::{decode, decode_legacy, encode, CodecError, DecodeOutcome};
pub use compression::{compress, decompress, CompressionError};
pub use format::{emit as emit_format, parse as parse_format};
pub use legacy::{parse as parse_legacy, LegacyFrame};
