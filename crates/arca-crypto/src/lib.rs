//! # arca-crypto
//!
//! Encryption layer for the arca pipeline.
//!
//! Three pieces:
//! - [`cipher`] - AES-256-GCM primitives with a uniform
//!   `nonce || ciphertext || tag` framing.
//! - [`vault`] - the per-tenant [`KeyVault`]: key generation, wrapping under
//!   a process master key, rotation with historical-key retention, one-way
//!   fingerprints, and a TTL-bounded unwrap cache.
//! - [`codec`] - the vector codec: dense little-endian float32 packing and
//!   authenticated encryption of embedding buffers, with batch variants.
//!
//! Security invariant: raw key bytes exist only inside [`MasterKey`] and
//! [`TenantKey`], both of which zeroize on drop and redact their `Debug`
//! output. Only wrapped keys and fingerprints are ever persisted or logged.

pub mod cipher;
pub mod codec;
pub mod error;
pub mod vault;

pub use error::{CryptoError, CryptoResult};
pub use vault::{derive_master_key, fingerprint, KeyVault, MasterKey, TenantKey, VaultConfig};
