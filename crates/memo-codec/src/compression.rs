use std::io::{Cursor, Read, Write};

use thiserror::Error;

/// Errors from the Brotli+Base64 compression codec.
#[derive(Debug, Error)]
pub enum CompressionError {
    /// Base64 decode failed even after the lenient retry ladder.
    #[error("base64 decode failed after lenient retries")]
    Base64Decode,
    /// Brotli decompression failed on an otherwise valid base64 payload.
    #[error("brotli decompression failed")]
    BrotliDecode,
}

const BASE64: base64::engine::GeneralPurpose = base64::engine::general_purpose::STANDARD;

/// Compress `input` with Brotli (default quality) and Base64-encode the
/// result, per spec.md §4.A.
pub fn compress(input: &[u8]) -> String {
    use base64::Engine;
    let mut encoder = brotli::CompressorWriter::new(Vec::new(), 4096, 11, 22);
    encoder.write_all(input).expect("writing to an in-memory buffer cannot fail");
    let compressed = encoder.into_inner();
    BASE64.encode(compressed)
}

/// Decode a Base64+Brotli payload, retrying leniently if the strict decode
/// fails.
///
/// Historical fragments may have been hex-truncated at transport
/// boundaries, stripping trailing `=` padding or interleaving stray
/// characters; the retry ladder strips everything outside the Base64
/// alphabet, then tries appending 0-3 padding characters before giving up.
pub fn decompress(input: &str) -> Result<Vec<u8>, CompressionError> {
    if let Ok(bytes) = try_decode(input) {
        return Ok(bytes);
    }

    let stripped: String =
        input.chars().filter(|c| c.is_ascii_alphanumeric() || *c == '+' || *c == '/').collect();

    for padding in 0..=3 {
        let mut candidate = stripped.clone();
        candidate.extend(std::iter::repeat('=').take(padding));
        if let Ok(bytes) = try_decode(&candidate) {
            return Ok(bytes);
        }
    }

    Err(CompressionError::Base64Decode)
}

fn try_decode(candidate: &str) -> Result<Vec<u8>, CompressionError> {
    use base64::Engine;
    let decoded = BASE64.decode(candidate).map_err(|_| CompressionError::Base64Decode)?;
    let mut decoder = brotli::Decompressor::new(Cursor::new(decoded), 4096);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out).map_err(|_| CompressionError::BrotliDecode)?;
    Ok(out)
}
