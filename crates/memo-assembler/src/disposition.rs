use memo_codec::{parse_format, parse_legacy};
use memo_primitives::MemoTx;

/// A transaction's structural disposition, per spec.md §4.F.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Single fragment, fully self-describing or legacy unchunked — run
    /// pattern matching directly.
    DirectMatch,
    /// Standardized chunking metadata present; feed to the group
    /// assembler and process only when complete.
    NeedsGrouping,
    /// No version marker but a legacy chunk tag is present; feed to the
    /// assembler and attempt to process opportunistically.
    NeedsLegacyGrouping,
    /// The format string declares a standardized header but fails to
    /// parse for reasons other than simply being absent — emit a
    /// processed, no-rule result.
    InvalidStructure,
}

/// Classify `tx`'s memo fields into a structural disposition.
///
/// `is_valid_format` handles the unambiguous cases directly. For the
/// remainder, spec.md's disposition table does not give a crisp rule for
/// distinguishing "malformed attempt at our format" (`InvalidStructure`)
/// from "plain or legacy content" (`DirectMatch`/`NeedsLegacyGrouping`).
/// This resolves that gap: a `memo_format` that *looks like* an attempt at
/// the versioned grammar (`v` followed by a digit) but fails to parse is
/// `InvalidStructure`; anything else falls through to the legacy tag
/// check on `memo_data`.
pub fn classify(tx: &MemoTx) -> Disposition {
    let structure = parse_format(&tx.memo_format);
    if structure.is_valid_format {
        return if structure.chunk.is_none() { Disposition::DirectMatch } else { Disposition::NeedsGrouping };
    }

    if looks_like_versioned_attempt(&tx.memo_format) {
        return Disposition::InvalidStructure;
    }

    let legacy = parse_legacy(&tx.memo_data);
    if legacy.chunk_index.is_some() {
        Disposition::NeedsLegacyGrouping
    } else {
        Disposition::DirectMatch
    }
}

fn looks_like_versioned_attempt(raw: &str) -> bool {
    raw.as_bytes().first().is_some_and(|b| *b == b'v')
        && raw.as_bytes().get(1).is_some_and(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal::Decimal;

    fn tx(memo_type: &str, memo_format: &str, memo_data: &str) -> MemoTx {
        MemoTx::new(
            "H", "rA", "rB", Decimal::ZERO, Decimal::ZERO, memo_type, memo_format, memo_data,
            Utc::now(), "tesSUCCESS",
        )
        .unwrap()
    }

    #[test]
    fn single_fragment_standardized_is_direct_match() {
        assert_eq!(classify(&tx("G1", "v1.-.-.-", "hello")), Disposition::DirectMatch);
    }

    #[test]
    fn chunked_standardized_needs_grouping() {
        assert_eq!(classify(&tx("G1", "v1.-.-.c1/3", "hello")), Disposition::NeedsGrouping);
    }

    #[test]
    fn legacy_chunk_tag_needs_legacy_grouping() {
        assert_eq!(classify(&tx("G1", "legacy", "chunk_1__payload")), Disposition::NeedsLegacyGrouping);
    }

    #[test]
    fn plain_content_is_direct_match() {
        assert_eq!(classify(&tx("G1", "plain", "just some text")), Disposition::DirectMatch);
    }

    #[test]
    fn malformed_versioned_attempt_is_invalid_structure() {
        assert_eq!(classify(&tx("G1", "v2.-.-.-", "hello")), Disposition::InvalidStructure);
        assert_eq!(classify(&tx("G1", "v1.x.-.-", "hello")), Disposition::InvalidStructure);
    }
}
