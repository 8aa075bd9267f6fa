use chrono::{DateTime, Utc};
use memo_interfaces::{KeyRole, KeyStore};
use memo_primitives::{
    CompressionTag, EncodedMemo, EncryptionTag, MemoConstructionParameters, MAX_CHUNK_SIZE,
    XRP_MEMO_STRUCTURAL_OVERHEAD,
};
use thiserror::Error;

use crate::legacy::{COMPRESSED_PREFIX, WHISPER_PREFIX};
use crate::{chunker, compression, crypto, format};

/// Errors from the encode path (spec.md §4.D, §7).
#[derive(Debug, Error)]
pub enum CodecError {
    /// Encryption was requested but the ECDH handshake between source and
    /// destination has not occurred.
    #[error("encryption requested but handshake is incomplete")]
    HandshakeRequired,
    /// The fixed per-fragment overhead leaves no room for payload bytes.
    #[error(transparent)]
    NoBudget(#[from] chunker::ChunkerError),
    /// The key store rejected the lookup needed to derive a shared secret.
    #[error("key store error: {0}")]
    KeyStore(#[from] memo_interfaces::KeyStoreError),
}

/// Outcome of decoding a reassembled group payload.
///
/// Re-expresses the source's exceptions-as-control-flow (catching
/// `CompressionError` to detect legacy incompleteness) as a sum type, per
/// spec.md §9 DESIGN NOTES.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeOutcome {
    /// Fully decoded plaintext.
    Decoded(String),
    /// Decryption could not proceed because the handshake is not known;
    /// the still-encrypted payload is returned untouched, per spec.md §4.D
    /// step 5.
    Undecrypted(String),
    /// Brotli/Base64 decode failed. Ambiguous between "this fragment is
    /// truly malformed" and "the group is not yet fully assembled"; the
    /// caller (reviewer) resolves that ambiguity using its standardized-
    /// vs-legacy context.
    CompressionIncomplete,
}

/// Encode a plaintext payload into one or more wire-ready fragments,
/// following the fixed encrypt → compress → chunk → hex order (spec.md
/// §4.D).
pub async fn encode(
    params: &MemoConstructionParameters,
    key_store: &dyn KeyStore,
    secret_role: &KeyRole,
    now: DateTime<Utc>,
) -> Result<Vec<EncodedMemo>, CodecError> {
    let memo_type = params.resolve_memo_type(now);
    let mut working: Vec<u8> = params.payload.clone().into_bytes();

    let encryption = if params.should_encrypt {
        let (_, counterparty_key) =
            key_store.get_handshake_for_address(&params.source, &params.destination).await?;
        let counterparty_key = counterparty_key.ok_or(CodecError::HandshakeRequired)?;
        let secret = key_store.get_shared_secret(&counterparty_key, secret_role).await?;
        working = crypto::encrypt(&secret, &working);
        EncryptionTag::Ecdh
    } else {
        EncryptionTag::None
    };

    let compression = if params.should_compress {
        working = compression::compress(&working).into_bytes();
        CompressionTag::Brotli
    } else {
        CompressionTag::None
    };

    // The format string's length depends on how many digits the eventual
    // chunk index/total need, which in turn depends on the budget we're
    // computing. Size against a conservative worst case (matching the
    // `chunk_999__` reservation philosophy used for the legacy label) so
    // the final envelope never exceeds `MAX_CHUNK_SIZE` even though actual
    // fragment counts rarely need four digits.
    let worst_case_format = format::emit(encryption, compression, 9999, 9999);
    let budget =
        chunker::data_budget(MAX_CHUNK_SIZE, worst_case_format.len(), memo_type.len(), XRP_MEMO_STRUCTURAL_OVERHEAD)?;

    let fragments = chunker::split(&working, budget);
    let total = fragments.len() as u32;

    Ok(fragments
        .into_iter()
        .enumerate()
        .map(|(i, fragment)| {
            let index = i as u32 + 1;
            let memo_format = format::emit(encryption, compression, index, total);
            EncodedMemo::from_parts(&memo_type, &memo_format, fragment)
        })
        .collect())
}

/// Decode a reassembled (already concatenated) group payload, per spec.md
/// §4.D decode steps 3-5.
///
/// `tx_source`/`tx_destination` identify the transaction whose memo this
/// payload came from; `local_addresses` tells the codec which side of the
/// channel is "ours", per spec.md's destination-based channel rule.
pub async fn decode(
    payload: &[u8],
    compressed: bool,
    encrypted: bool,
    tx_source: &str,
    tx_destination: &str,
    key_store: &dyn KeyStore,
    secret_role: &KeyRole,
    local_addresses: &[String],
) -> DecodeOutcome {
    let mut working = payload.to_vec();

    if compressed {
        let Ok(text) = std::str::from_utf8(&working) else {
            return DecodeOutcome::CompressionIncomplete;
        };
        match compression::decompress(text) {
            Ok(decompressed) => working = decompressed,
            Err(err) => {
                tracing::debug!(%err, "decompression failed, treating as possibly-incomplete group");
                return DecodeOutcome::CompressionIncomplete;
            }
        }
    }

    if encrypted {
        return decrypt_and_finish(
            working,
            tx_source,
            tx_destination,
            key_store,
            secret_role,
            local_addresses,
        )
        .await;
    }

    DecodeOutcome::Decoded(String::from_utf8_lossy(&working).into_owned())
}

/// Decode a reassembled legacy group payload.
///
/// Legacy framing tags the group as a whole rather than each fragment:
/// `COMPRESSED__`, if present, sits in front of the joined chunk bodies;
/// `WHISPER__`, if present, only emerges after that blob is decompressed.
/// This mirrors the original `LegacyMemoProcessor` order — join, strip
/// `COMPRESSED__`, decompress, strip `WHISPER__`, decrypt — rather than
/// [`decode`]'s caller-supplied flags, which a legacy fragment cannot
/// reliably provide up front.
pub async fn decode_legacy(
    payload: &[u8],
    tx_source: &str,
    tx_destination: &str,
    key_store: &dyn KeyStore,
    secret_role: &KeyRole,
    local_addresses: &[String],
) -> DecodeOutcome {
    let mut working = payload.to_vec();

    let compressed_tail = std::str::from_utf8(&working)
        .ok()
        .and_then(|text| text.strip_prefix(COMPRESSED_PREFIX))
        .map(str::to_string);
    if let Some(stripped) = compressed_tail {
        match compression::decompress(&stripped) {
            Ok(decompressed) => working = decompressed,
            Err(err) => {
                tracing::debug!(%err, "legacy decompression failed, treating as possibly-incomplete group");
                return DecodeOutcome::CompressionIncomplete;
            }
        }
    }

    if let Some(stripped) = working.strip_prefix(WHISPER_PREFIX.as_bytes()) {
        return decrypt_and_finish(
            stripped.to_vec(),
            tx_source,
            tx_destination,
            key_store,
            secret_role,
            local_addresses,
        )
        .await;
    }

    DecodeOutcome::Decoded(String::from_utf8_lossy(&working).into_owned())
}

/// Resolve the ECDH handshake and decrypt `working` in place, folding
/// every failure mode into the matching [`DecodeOutcome`] variant.
async fn decrypt_and_finish(
    working: Vec<u8>,
    tx_source: &str,
    tx_destination: &str,
    key_store: &dyn KeyStore,
    secret_role: &KeyRole,
    local_addresses: &[String],
) -> DecodeOutcome {
    let (channel, counterparty) = resolve_channel(tx_source, tx_destination, local_addresses);
    let handshake = key_store.get_handshake_for_address(channel, counterparty).await;
    let counterparty_key = match handshake {
        Ok((_, Some(key))) => key,
        _ => return DecodeOutcome::Undecrypted(hex::encode(&working)),
    };
    let secret = match key_store.get_shared_secret(&counterparty_key, secret_role).await {
        Ok(secret) => secret,
        Err(_) => return DecodeOutcome::Undecrypted(hex::encode(&working)),
    };
    match crypto::decrypt(&secret, &working) {
        Ok(plaintext) => DecodeOutcome::Decoded(String::from_utf8_lossy(&plaintext).into_owned()),
        Err(_) => DecodeOutcome::Decoded(format!("[Decryption Failed] {}", hex::encode(&working))),
    }
}

/// Determine which address plays the "channel" (local) role and which
/// plays the counterparty, per spec.md §4.D step 5: the destination is the
/// channel if it is a known local address, otherwise the source is
/// (outbound messages).
fn resolve_channel<'t>(
    source: &'t str,
    destination: &'t str,
    local_addresses: &[String],
) -> (&'t str, &'t str) {
    if local_addresses.iter().any(|addr| addr == destination) {
        (destination, source)
    } else {
        (source, destination)
    }
}
