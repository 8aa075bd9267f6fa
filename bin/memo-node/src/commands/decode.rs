//! `memo-node decode`: reverse a reassembled fragment payload back to
//! plaintext without touching the ledger.
//!
//! Like `construct`, this never has a real key store wired in, so
//! `--encrypted` payloads can only round-trip as far as
//! `DecodeOutcome::Undecrypted` unless the operator also supplies a
//! counterparty key out of band — which this debug command does not
//! support.

use async_trait::async_trait;
use eyre::WrapErr;
use memo_interfaces::{KeyRole, KeyStore, KeyStoreError, PublicKeyHex, SharedSecretBytes};
use memo_codec::DecodeOutcome;

use crate::cli;

struct NullKeyStore;

#[async_trait]
impl KeyStore for NullKeyStore {
    async fn get_shared_secret(
        &self,
        _received_key: &PublicKeyHex,
        _secret_role: &KeyRole,
    ) -> Result<SharedSecretBytes, KeyStoreError> {
        Err(KeyStoreError::UnknownRole(KeyRole::new("debug")))
    }

    async fn get_handshake_for_address(
        &self,
        _a: &str,
        _b: &str,
    ) -> Result<(Option<PublicKeyHex>, Option<PublicKeyHex>), KeyStoreError> {
        Ok((None, None))
    }
}

pub async fn execute(args: cli::Command) -> eyre::Result<()> {
    let cli::Command::Decode { payload_hex, compressed, encrypted } = args else {
        unreachable!("dispatch guarantees Command::Decode");
    };

    let payload = hex::decode(&payload_hex).wrap_err("payload-hex is not valid hex")?;
    let key_store = NullKeyStore;
    let role = KeyRole::new("debug");

    let outcome = memo_codec::decode(&payload, compressed, encrypted, "debug-source", "debug-destination", &key_store, &role, &[])
        .await;

    match outcome {
        DecodeOutcome::Decoded(text) => println!("decoded: {text}"),
        DecodeOutcome::Undecrypted(hex) => println!("undecrypted (no handshake available): {hex}"),
        DecodeOutcome::CompressionIncomplete => {
            println!("compression incomplete: payload does not decompress on its own, it may be one fragment of a larger group")
        }
    }
    Ok(())
}
