//! AES-256-GCM cipher operations.
//!
//! All arca ciphertext uses one framing: a fresh random 12-byte nonce
//! followed by the AES-GCM ciphertext with its 16-byte authentication tag.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use rand::RngCore;

use crate::error::{CryptoError, CryptoResult};

/// Nonce length in bytes.
pub const NONCE_LEN: usize = 12;

/// GCM authentication tag length in bytes.
pub const TAG_LEN: usize = 16;

/// Generate cryptographically secure random bytes.
pub fn generate_random<const N: usize>() -> [u8; N] {
    let mut bytes = [0u8; N];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes
}

/// Generate a random 256-bit key.
pub fn generate_key_bytes() -> [u8; 32] {
    generate_random()
}

/// Generate a random nonce (12 bytes).
pub fn generate_nonce() -> [u8; NONCE_LEN] {
    generate_random()
}

/// Encrypt plaintext, returning `nonce || ciphertext || tag`.
///
/// Every call draws a fresh random nonce, so encrypting the same plaintext
/// twice yields different ciphertext.
pub fn seal(key: &[u8; 32], plaintext: &[u8]) -> CryptoResult<Vec<u8>> {
    let cipher =
        Aes256Gcm::new_from_slice(key).map_err(|e| CryptoError::Encryption(e.to_string()))?;

    let nonce_bytes = generate_nonce();
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|_| CryptoError::Encryption("AES-GCM encryption failed".into()))?;

    let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Decrypt a `nonce || ciphertext || tag` buffer produced by [`seal`].
///
/// Returns [`CryptoError::Authentication`] when the key is wrong or the
/// buffer was tampered with. Corrupted data is never returned silently.
pub fn open(key: &[u8; 32], blob: &[u8]) -> CryptoResult<Vec<u8>> {
    if blob.len() < NONCE_LEN + TAG_LEN {
        return Err(CryptoError::InvalidInput(format!(
            "ciphertext too short: {} bytes",
            blob.len()
        )));
    }

    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| CryptoError::Encryption(e.to_string()))?;

    let (nonce_bytes, ciphertext) = blob.split_at(NONCE_LEN);
    let nonce = Nonce::from_slice(nonce_bytes);

    cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| CryptoError::Authentication)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_nonce_is_random() {
        let nonce1 = generate_nonce();
        let nonce2 = generate_nonce();
        assert_eq!(nonce1.len(), NONCE_LEN);
        assert_ne!(nonce1, nonce2);
    }

    #[test]
    fn test_seal_open_roundtrip() {
        let key = [42u8; 32];
        let plaintext = b"Hello, World!";

        let blob = seal(&key, plaintext).unwrap();
        let decrypted = open(&key, &blob).unwrap();

        assert_eq!(plaintext.as_slice(), decrypted.as_slice());
    }

    #[test]
    fn test_seal_output_framing() {
        let key = [42u8; 32];
        let plaintext = b"Hello, World!";

        let blob = seal(&key, plaintext).unwrap();

        // nonce + ciphertext + tag
        assert_eq!(blob.len(), NONCE_LEN + plaintext.len() + TAG_LEN);
    }

    #[test]
    fn test_open_wrong_key() {
        let key1 = [42u8; 32];
        let key2 = [99u8; 32];

        let blob = seal(&key1, b"Secret data").unwrap();
        let result = open(&key2, &blob);

        assert!(matches!(result, Err(CryptoError::Authentication)));
    }

    #[test]
    fn test_open_tampered_ciphertext() {
        let key = [42u8; 32];
        let mut blob = seal(&key, b"Secret data").unwrap();

        let last = blob.len() - 1;
        blob[last] ^= 0xFF;

        let result = open(&key, &blob);
        assert!(matches!(result, Err(CryptoError::Authentication)));
    }

    #[test]
    fn test_open_tampered_nonce() {
        let key = [42u8; 32];
        let mut blob = seal(&key, b"Secret data").unwrap();

        blob[0] ^= 0xFF;

        let result = open(&key, &blob);
        assert!(matches!(result, Err(CryptoError::Authentication)));
    }

    #[test]
    fn test_open_truncated_blob() {
        let key = [42u8; 32];
        let result = open(&key, &[0u8; 10]);
        assert!(matches!(result, Err(CryptoError::InvalidInput(_))));
    }

    #[test]
    fn test_seal_empty_plaintext() {
        let key = [42u8; 32];
        let blob = seal(&key, b"").unwrap();
        let decrypted = open(&key, &blob).unwrap();
        assert!(decrypted.is_empty());
    }

    #[test]
    fn test_fresh_nonce_per_call() {
        let key = [42u8; 32];
        let blob1 = seal(&key, b"Same message").unwrap();
        let blob2 = seal(&key, b"Same message").unwrap();
        assert_ne!(blob1, blob2);
    }
}
