use thiserror::Error;

use memo_primitives::CHUNK_LABEL_RESERVATION;

/// Errors from the size calculator / chunker.
#[derive(Debug, Error)]
pub enum ChunkerError {
    /// The fixed overhead of format string, group id, and structural
    /// padding already consumes the whole per-fragment envelope, leaving
    /// no room for any payload bytes.
    #[error(
        "no data budget remains: max_size={max_size} overhead={overhead} \
         (format={format_len} type={type_len} structural={structural} chunk_label={chunk_label})"
    )]
    NoBudget { max_size: usize, overhead: usize, format_len: usize, type_len: usize, structural: usize, chunk_label: usize },
}

/// Number of hex characters needed to encode a byte string of length `len`.
fn hex_len(len: usize) -> usize {
    len * 2
}

/// Compute the raw-byte budget available to a single fragment's `memo_data`,
/// per spec.md §4.B.
///
/// `format_len` and `type_len` are the byte lengths of the (plaintext, not
/// yet hex-encoded) `memo_format` and `memo_type` fields that will
/// accompany each fragment.
pub fn data_budget(
    max_size: usize,
    format_len: usize,
    type_len: usize,
    structural_overhead: usize,
) -> Result<usize, ChunkerError> {
    let chunk_label = hex_len(CHUNK_LABEL_RESERVATION.len());
    let overhead = hex_len(format_len) + hex_len(type_len) + structural_overhead + chunk_label;
    let hex_budget = (max_size as isize) - (overhead as isize);
    if hex_budget <= 0 {
        return Err(ChunkerError::NoBudget {
            max_size,
            overhead,
            format_len,
            type_len,
            structural: structural_overhead,
            chunk_label,
        });
    }
    // the data field is itself hex-encoded at the wire boundary, so the raw
    // byte budget is half the remaining hex budget.
    Ok(hex_budget as usize / 2)
}

/// Split `payload` into equal-sized byte prefixes sized to `budget`, the
/// last fragment absorbing the remainder.
///
/// The split is on raw UTF-8 bytes, not codepoints; a fragment boundary may
/// land inside a multi-byte sequence. This is intentional: reassembly
/// concatenates fragments before decoding, which recovers valid UTF-8.
pub fn split(payload: &[u8], budget: usize) -> Vec<&[u8]> {
    if payload.is_empty() {
        return vec![&payload[0..0]];
    }
    payload.chunks(budget).collect()
}
