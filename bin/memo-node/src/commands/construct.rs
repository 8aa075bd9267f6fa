//! `memo-node construct`: build the wire-ready fragments for a payload
//! without touching the ledger, for operators staging a transaction by
//! hand or debugging a chunking decision.

use async_trait::async_trait;
use chrono::Utc;
use eyre::WrapErr;
use memo_interfaces::{KeyRole, KeyStore, KeyStoreError, PublicKeyHex, SharedSecretBytes};
use memo_primitives::MemoConstructionParameters;

use crate::cli;

/// A key store with no registered handshakes, used for the debug
/// `construct`/`decode` commands which never have a real one wired in.
/// `--encrypt` against this store always fails with `HandshakeRequired`,
/// the same as it would for an un-onboarded counterparty in production.
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
    let cli::Command::Construct { source, destination, payload, memo_type, encrypt, compress } = args else {
        unreachable!("dispatch guarantees Command::Construct");
    };

    let params = MemoConstructionParameters {
        source,
        destination,
        memo_type,
        payload,
        amount: None,
        should_encrypt: encrypt,
        should_compress: compress,
    };

    let key_store = NullKeyStore;
    let role = KeyRole::new("debug");
    let memos = memo_codec::encode(&params, &key_store, &role, Utc::now())
        .await
        .wrap_err("failed to encode payload")?;

    println!("{} fragment(s):", memos.len());
    for (i, memo) in memos.iter().enumerate() {
        println!(
            "  [{}/{}] memo_type={} memo_format={} memo_data={}",
            i + 1,
            memos.len(),
            memo.memo_type,
            memo.memo_format,
            memo.memo_data,
        );
    }
    Ok(())
}
