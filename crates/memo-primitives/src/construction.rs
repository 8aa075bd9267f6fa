use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Input to the memo encoder.
///
/// Corresponds to spec.md §3 `MemoConstructionParameters` (unifying the
/// `MemoConstructionParameters`/`ResponseParameters` naming split noted in
/// spec.md §9 Open Questions — this is the one type). `should_chunk` is
/// deliberately absent: chunking is always applied as required by size,
/// per spec.md §3.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoConstructionParameters {
    /// Source address.
    pub source: String,
    /// Destination address.
    pub destination: String,
    /// Group id (`memo_type`). Auto-generated if `None`.
    pub memo_type: Option<String>,
    /// Plaintext payload to encode.
    pub payload: String,
    /// Optional token amount to attach to the submitted transaction.
    pub amount: Option<Decimal>,
    /// Whether the payload should be ECDH-encrypted.
    pub should_encrypt: bool,
    /// Whether the payload should be Brotli-compressed.
    pub should_compress: bool,
}

impl MemoConstructionParameters {
    /// Resolve `memo_type`, generating one per spec.md §6 if absent:
    /// `YYYY-MM-DD_HH:MM__<AA><DD>` where `AA` is two uppercase letters and
    /// `DD` is two digits, all uniformly sampled.
    pub fn resolve_memo_type(&self, now: chrono::DateTime<chrono::Utc>) -> String {
        match &self.memo_type {
            Some(id) => id.clone(),
            None => generate_group_id(now, &mut rand::thread_rng()),
        }
    }
}

/// Generate a group id in the format described in spec.md §6, using the
/// supplied RNG (factored out for deterministic tests).
pub fn generate_group_id(now: chrono::DateTime<chrono::Utc>, rng: &mut impl Rng) -> String {
    let letters: String = (0..2).map(|_| rng.gen_range(b'A'..=b'Z') as char).collect();
    let digits: String = (0..2).map(|_| rng.gen_range(b'0'..=b'9') as char).collect();
    format!("{}__{}{}", now.format("%Y-%m-%d_%H:%M"), letters, digits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn generated_group_id_matches_shape() {
        let now = chrono::Utc.with_ymd_and_hms(2026, 7, 29, 12, 5, 0).unwrap();
        let mut rng = rand::thread_rng();
        let id = generate_group_id(now, &mut rng);
        assert!(id.starts_with("2026-07-29_12:05__"));
        let suffix = &id["2026-07-29_12:05__".len()..];
        assert_eq!(suffix.len(), 4);
        assert!(suffix.chars().take(2).all(|c| c.is_ascii_uppercase()));
        assert!(suffix.chars().skip(2).all(|c| c.is_ascii_digit()));
    }
}
