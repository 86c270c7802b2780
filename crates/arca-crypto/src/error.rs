//! Error types for cryptographic operations.

use thiserror::Error;

/// Cryptographic operation errors.
#[derive(Error, Debug)]
pub enum CryptoError {
    /// Authentication failed - wrong key or tampered ciphertext.
    ///
    /// This is the sole signal by which cross-tenant key misuse is
    /// detected; it is never retried.
    #[error("Authentication failed - wrong key or tampered ciphertext")]
    Authentication,

    /// Encryption failed.
    #[error("Encryption failed: {0}")]
    Encryption(String),

    /// Master key is missing or malformed.
    #[error("Master key configuration error: {0}")]
    MasterKey(String),

    /// Key derivation failed.
    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),

    /// Ciphertext or vector buffer is structurally invalid.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for cryptographic operations.
pub type CryptoResult<T> = Result<T, CryptoError>;

impl From<CryptoError> for arca_core::Error {
    fn from(e: CryptoError) -> Self {
        match e {
            CryptoError::Authentication => arca_core::Error::Authentication,
            CryptoError::MasterKey(msg) => arca_core::Error::Config(msg),
            CryptoError::InvalidInput(msg) => arca_core::Error::InvalidInput(msg),
            other => arca_core::Error::Internal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authentication_display() {
        let err = CryptoError::Authentication;
        assert!(err.to_string().contains("Authentication failed"));
    }

    #[test]
    fn test_master_key_maps_to_config() {
        let err: arca_core::Error = CryptoError::MasterKey("not set".into()).into();
        assert!(matches!(err, arca_core::Error::Config(_)));
    }

    #[test]
    fn test_authentication_maps_to_core_authentication() {
        let err: arca_core::Error = CryptoError::Authentication.into();
        assert!(matches!(err, arca_core::Error::Authentication));
        assert!(!err.is_transient());
    }
}
