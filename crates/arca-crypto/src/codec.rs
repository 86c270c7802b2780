//! Vector codec: float32 packing plus authenticated encryption.
//!
//! Embeddings travel as dense little-endian float32 buffers with no
//! delimiters; round-trips are bit-exact for finite values. Ciphertext uses
//! the workspace-wide `nonce || ciphertext || tag` framing from
//! [`crate::cipher`].

use crate::cipher;
use crate::error::{CryptoError, CryptoResult};
use crate::vault::TenantKey;

/// Pack a float vector into little-endian bytes.
pub fn encode(vector: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(vector.len() * 4);
    for v in vector {
        out.extend_from_slice(&v.to_le_bytes());
    }
    out
}

/// Inverse of [`encode`].
pub fn decode(bytes: &[u8]) -> CryptoResult<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(CryptoError::InvalidInput(format!(
            "vector buffer length {} is not a multiple of 4",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

/// Encrypt a packed buffer under a tenant key. Fresh nonce per call.
pub fn encrypt(plaintext: &[u8], key: &TenantKey) -> CryptoResult<Vec<u8>> {
    cipher::seal(key.as_bytes(), plaintext)
}

/// Decrypt a buffer sealed by [`encrypt`].
///
/// Fails with [`CryptoError::Authentication`] when the key does not match
/// or the ciphertext was tampered with; this is how cross-tenant key misuse
/// is detected and rejected.
pub fn decrypt(ciphertext: &[u8], key: &TenantKey) -> CryptoResult<Vec<u8>> {
    cipher::open(key.as_bytes(), ciphertext)
}

/// Encode and encrypt a float vector in one step.
pub fn encrypt_vector(vector: &[f32], key: &TenantKey) -> CryptoResult<Vec<u8>> {
    encrypt(&encode(vector), key)
}

/// Decrypt and decode a float vector in one step.
pub fn decrypt_vector(ciphertext: &[u8], key: &TenantKey) -> CryptoResult<Vec<f32>> {
    decode(&decrypt(ciphertext, key)?)
}

/// Encrypt a batch of vectors under one already-unwrapped key.
///
/// The batch variants exist so a pipeline batch costs one KeyVault unwrap,
/// not one per vector.
pub fn encrypt_batch(vectors: &[Vec<f32>], key: &TenantKey) -> CryptoResult<Vec<Vec<u8>>> {
    vectors.iter().map(|v| encrypt_vector(v, key)).collect()
}

/// Decrypt a batch of ciphertexts under one already-unwrapped key.
pub fn decrypt_batch(ciphertexts: &[Vec<u8>], key: &TenantKey) -> CryptoResult<Vec<Vec<f32>>> {
    ciphertexts.iter().map(|c| decrypt_vector(c, key)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vault::fingerprint;

    fn test_key(seed: u8) -> TenantKey {
        let raw = [seed; 32];
        TenantKey::from_raw(fingerprint(&raw), raw)
    }

    #[test]
    fn test_encode_little_endian() {
        let bytes = encode(&[1.0]);
        assert_eq!(bytes, 1.0f32.to_le_bytes().to_vec());
    }

    #[test]
    fn test_encode_decode_roundtrip_bit_exact() {
        let vector = vec![
            0.0,
            -0.0,
            1.5,
            -3.25,
            f32::MIN,
            f32::MAX,
            f32::MIN_POSITIVE,
            std::f32::consts::PI,
        ];
        let decoded = decode(&encode(&vector)).unwrap();
        assert_eq!(vector.len(), decoded.len());
        for (a, b) in vector.iter().zip(decoded.iter()) {
            assert_eq!(a.to_bits(), b.to_bits());
        }
    }

    #[test]
    fn test_decode_rejects_ragged_buffer() {
        assert!(matches!(
            decode(&[0u8; 7]),
            Err(CryptoError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_decode_empty() {
        assert!(decode(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_encrypt_decrypt_vector_roundtrip() {
        let key = test_key(42);
        let vector = vec![0.1, 0.2, 0.3, -0.4];

        let ciphertext = encrypt_vector(&vector, &key).unwrap();
        let decrypted = decrypt_vector(&ciphertext, &key).unwrap();

        assert_eq!(vector, decrypted);
    }

    #[test]
    fn test_decrypt_equals_encode() {
        let key = test_key(42);
        let vector = vec![1.0, 2.0, 3.0];

        let ciphertext = encrypt(&encode(&vector), &key).unwrap();
        assert_eq!(decrypt(&ciphertext, &key).unwrap(), encode(&vector));
    }

    #[test]
    fn test_cross_key_decrypt_rejected() {
        let key_a = test_key(1);
        let key_b = test_key(2);

        let ciphertext = encrypt_vector(&[0.5, 0.6], &key_a).unwrap();
        let result = decrypt_vector(&ciphertext, &key_b);

        assert!(matches!(result, Err(CryptoError::Authentication)));
    }

    #[test]
    fn test_batch_roundtrip() {
        let key = test_key(9);
        let vectors = vec![vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]];

        let ciphertexts = encrypt_batch(&vectors, &key).unwrap();
        assert_eq!(ciphertexts.len(), 3);

        let decrypted = decrypt_batch(&ciphertexts, &key).unwrap();
        assert_eq!(decrypted, vectors);
    }

    #[test]
    fn test_batch_ciphertexts_are_distinct() {
        let key = test_key(9);
        let vectors = vec![vec![1.0, 2.0], vec![1.0, 2.0]];

        let ciphertexts = encrypt_batch(&vectors, &key).unwrap();
        // Identical plaintext, fresh nonce each.
        assert_ne!(ciphertexts[0], ciphertexts[1]);
    }
}
