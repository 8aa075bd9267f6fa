use once_cell::sync::Lazy;
use regex::Regex;

static CHUNK_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^chunk_(\d+)__").unwrap());

/// Marks a compressed payload, stripped from the front of a *reassembled*
/// group payload, not from an individual fragment.
pub(crate) const COMPRESSED_PREFIX: &str = "COMPRESSED__";
/// Marks an encrypted payload, stripped from the front of the
/// *decompressed* bytes, not from the raw wire payload.
pub(crate) const WHISPER_PREFIX: &str = "WHISPER__";

/// A legacy (prefix-tagged) memo frame.
///
/// Only the `chunk_N__` routing tag is a per-fragment concern: it tells
/// the assembler where this fragment sits in its group. `COMPRESSED__`
/// and `WHISPER__` are carried by the group as a whole (the former in
/// front of the joined chunk bodies, the latter inside the decompressed
/// result) and so are recognized later, against the reassembled payload,
/// not here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyFrame {
    /// 1-based chunk index, if a `chunk_N__` tag was present.
    pub chunk_index: Option<u32>,
    /// The remaining payload after the chunk tag is stripped.
    pub payload: String,
}

/// Strip a leading `chunk_N__` tag from a legacy `memo_data` value.
pub fn parse(raw: &str) -> LegacyFrame {
    let mut rest = raw;

    let chunk_index = CHUNK_PREFIX.captures(rest).and_then(|caps| {
        let matched_len = caps.get(0).unwrap().len();
        let index = caps[1].parse::<u32>().ok();
        rest = &rest[matched_len..];
        index
    });

    LegacyFrame { chunk_index, payload: rest.to_string() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_chunk_tag_leaving_other_prefixes_intact() {
        let frame = parse("chunk_2__COMPRESSED__WHISPER__deadbeef");
        assert_eq!(frame.chunk_index, Some(2));
        assert_eq!(frame.payload, "COMPRESSED__WHISPER__deadbeef");
    }

    #[test]
    fn tolerates_missing_chunk_tag_content() {
        let frame = parse("chunk_1__plainpayload");
        assert_eq!(frame.chunk_index, Some(1));
        assert_eq!(frame.payload, "plainpayload");
    }

    #[test]
    fn no_tag_returns_input_unchanged() {
        let frame = parse("already plain");
        assert_eq!(frame.chunk_index, None);
        assert_eq!(frame.payload, "already plain");
    }
}
