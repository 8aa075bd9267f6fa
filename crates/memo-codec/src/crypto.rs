use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use rand::RngCore;
use thiserror::Error;

/// Errors from the ECDH + AES-256-GCM payload cipher.
#[derive(Debug, Error)]
pub enum CipherError {
    /// AES-GCM rejected the ciphertext (wrong key, truncated nonce, or
    /// tampered tag).
    #[error("decryption failed")]
    Decrypt,
    /// The ciphertext was shorter than the nonce prefix, so it cannot be a
    /// value this cipher produced.
    #[error("ciphertext too short to contain a nonce")]
    Truncated,
}

const NONCE_LEN: usize = 12;

/// Encrypt `plaintext` under the ECDH shared secret, prefixing the
/// randomly generated nonce to the ciphertext.
///
/// Grounded on the AES-256-GCM usage in the pack's action-ledger example:
/// a fresh random nonce per encryption, stored alongside the ciphertext
/// rather than derived.
pub fn encrypt(shared_secret: &[u8], plaintext: &[u8]) -> Vec<u8> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key_bytes(shared_secret).as_slice()));
    let mut nonce_bytes = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);
    let ciphertext =
        cipher.encrypt(nonce, plaintext).expect("AES-GCM encryption of an in-memory buffer cannot fail");
    let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&ciphertext);
    out
}

/// Decrypt a buffer produced by [`encrypt`].
pub fn decrypt(shared_secret: &[u8], sealed: &[u8]) -> Result<Vec<u8>, CipherError> {
    if sealed.len() < NONCE_LEN {
        return Err(CipherError::Truncated);
    }
    let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_LEN);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key_bytes(shared_secret).as_slice()));
    cipher.decrypt(Nonce::from_slice(nonce_bytes), ciphertext).map_err(|_| CipherError::Decrypt)
}

/// Derive a 32-byte AES key from a (possibly differently-sized) ECDH shared
/// secret via SHA-256, so the key store's secret representation is free to
/// change without this cipher's key size assumption breaking.
fn key_bytes(shared_secret: &[u8]) -> [u8; 32] {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(shared_secret);
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_under_matching_secret() {
        let secret = b"a shared secret derived via ecdh";
        let sealed = encrypt(secret, b"secret payload");
        assert_eq!(decrypt(secret, &sealed).unwrap(), b"secret payload");
    }

    #[test]
    fn wrong_secret_fails_to_decrypt() {
        let sealed = encrypt(b"secret a", b"secret payload");
        assert!(decrypt(b"secret b", &sealed).is_err());
    }

    #[test]
    fn truncated_ciphertext_is_rejected() {
        assert!(matches!(decrypt(b"key", &[1, 2, 3]), Err(CipherError::Truncated)));
    }
}
