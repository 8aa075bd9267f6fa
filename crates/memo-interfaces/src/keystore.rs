use async_trait::async_trait;
use thiserror::Error;

/// A role identifying which of a node's keys to use, e.g. a node's primary
/// channel key vs. a secondary operator key. Left as an opaque string so
/// that callers can define their own roles (spec.md keeps this
/// business-specific).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyRole(pub String);

impl KeyRole {
    /// Construct a role from any string-like value.
    pub fn new(role: impl Into<String>) -> Self {
        Self(role.into())
    }
}

/// Hex-encoded ECDH public key.
pub type PublicKeyHex = String;

/// Derived ECDH shared secret bytes.
pub type SharedSecretBytes = Vec<u8>;

/// Errors surfaced by the key store contract.
#[derive(Debug, Error)]
pub enum KeyStoreError {
    /// The supplied public key was not valid hex-encoded key material.
    #[error("invalid public key: {0}")]
    InvalidKey(String),
    /// No secret is registered for the requested role.
    #[error("no secret registered for role {0:?}")]
    UnknownRole(KeyRole),
}

/// External contract for the key-material store, consumed (not
/// implemented) by this workspace, per spec.md §6.
#[async_trait]
pub trait KeyStore: Send + Sync {
    /// Derive the ECDH shared secret between `received_key` and the local
    /// secret identified by `secret_role`.
    async fn get_shared_secret(
        &self,
        received_key: &PublicKeyHex,
        secret_role: &KeyRole,
    ) -> Result<SharedSecretBytes, KeyStoreError>;

    /// Look up the published ECDH public keys for both ends of a channel.
    /// Returns `(None, None)` when the handshake has not occurred.
    async fn get_handshake_for_address(
        &self,
        a: &str,
        b: &str,
    ) -> Result<(Option<PublicKeyHex>, Option<PublicKeyHex>), KeyStoreError>;
}
