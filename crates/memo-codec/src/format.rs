use memo_primitives::{ChunkInfo, CompressionTag, EncryptionTag, MemoStructure, MEMO_VERSION};
use regex::Regex;

use once_cell::sync::Lazy;

static CHUNK_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^c(\d+)/(\d+)$").unwrap());

/// Parse a `memo_format` string into a [`MemoStructure`], per spec.md §4.C.
///
/// The canonical grammar is `v<VER>.<enc>.<comp>.<chunking>`, split from the
/// right into exactly four dot-separated tokens. Any deviation — wrong
/// version, unrecognized tag, malformed chunk token, wrong token count —
/// yields [`MemoStructure::invalid`].
pub fn parse(raw: &str) -> MemoStructure {
    let tokens: Vec<&str> = raw.rsplitn(4, '.').collect();
    if tokens.len() != 4 {
        tracing::debug!(format = raw, "memo format string has wrong token count");
        return MemoStructure::invalid(raw);
    }
    // rsplitn yields tokens in reverse order: [chunking, comp, enc, version]
    let (chunking, comp, enc, version) = (tokens[0], tokens[1], tokens[2], tokens[3]);

    let Some(version_digits) = version.strip_prefix('v') else {
        return MemoStructure::invalid(raw);
    };
    if version_digits != MEMO_VERSION {
        return MemoStructure::invalid(raw);
    }

    let encryption = match enc {
        "-" => EncryptionTag::None,
        "e" => EncryptionTag::Ecdh,
        _ => return MemoStructure::invalid(raw),
    };

    let compression = match comp {
        "-" => CompressionTag::None,
        "b" => CompressionTag::Brotli,
        _ => return MemoStructure::invalid(raw),
    };

    let chunk = match chunking {
        "-" => None,
        other => match CHUNK_TOKEN.captures(other) {
            Some(caps) => {
                let index: u32 = match caps[1].parse() {
                    Ok(v) => v,
                    Err(_) => return MemoStructure::invalid(raw),
                };
                let total: u32 = match caps[2].parse() {
                    Ok(v) => v,
                    Err(_) => return MemoStructure::invalid(raw),
                };
                if index == 0 || index > total {
                    return MemoStructure::invalid(raw);
                }
                Some(ChunkInfo { index, total })
            }
            None => return MemoStructure::invalid(raw),
        },
    };

    MemoStructure {
        version: Some(version_digits.to_string()),
        encryption,
        compression,
        chunk,
        is_valid_format: true,
        group_id: None,
        raw_format: raw.to_string(),
    }
}

/// Emit the canonical format string for a single fragment within a group of
/// `total` fragments at 1-based `index`.
pub fn emit(encryption: EncryptionTag, compression: CompressionTag, index: u32, total: u32) -> String {
    let enc = match encryption {
        EncryptionTag::None => "-",
        EncryptionTag::Ecdh => "e",
    };
    let comp = match compression {
        CompressionTag::None => "-",
        CompressionTag::Brotli => "b",
    };
    let chunking = if total <= 1 { "-".to_string() } else { format!("c{index}/{total}") };
    format!("v{MEMO_VERSION}.{enc}.{comp}.{chunking}")
}
