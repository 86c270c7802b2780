//! Per-tenant key lifecycle: generation, wrapping, rotation, and a bounded
//! unwrap cache.
//!
//! The vault persists keys only in wrapped form (AES-GCM under the process
//! master key) and hands out unwrapped keys as [`TenantKey`] values that
//! zeroize themselves on drop. Raw key bytes are never logged, serialized,
//! or stored unwrapped; lookups go through the one-way fingerprint.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};
use uuid::Uuid;
use zeroize::{Zeroize, ZeroizeOnDrop};

use arca_core::{
    defaults, EncryptionKey, Error, KeyRepository, Result, TenantRepository,
};

use crate::cipher;
use crate::error::{CryptoError, CryptoResult};

/// Process-wide key-wrapping key.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct MasterKey {
    key: [u8; 32],
}

impl MasterKey {
    /// Wrap raw bytes as a master key.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self { key: bytes }
    }

    /// Load the master key from the environment.
    ///
    /// Sources, in order:
    /// 1. `ARCA_MASTER_KEY` - base64 of exactly 32 bytes.
    /// 2. `ARCA_MASTER_PASSPHRASE` + `ARCA_MASTER_SALT` (base64, >= 16
    ///    bytes) - Argon2id derivation.
    ///
    /// Fails eagerly when neither is configured; nothing in the pipeline
    /// can run without a wrapping key.
    pub fn from_env() -> CryptoResult<Self> {
        use base64::Engine;
        let b64 = base64::engine::general_purpose::STANDARD;

        if let Ok(encoded) = std::env::var("ARCA_MASTER_KEY") {
            let mut decoded = b64
                .decode(encoded.trim())
                .map_err(|e| CryptoError::MasterKey(format!("ARCA_MASTER_KEY: {}", e)))?;
            if decoded.len() != 32 {
                decoded.zeroize();
                return Err(CryptoError::MasterKey(
                    "ARCA_MASTER_KEY must decode to exactly 32 bytes".into(),
                ));
            }
            let mut bytes = [0u8; 32];
            bytes.copy_from_slice(&decoded);
            decoded.zeroize();
            return Ok(Self::from_bytes(bytes));
        }

        if let Ok(passphrase) = std::env::var("ARCA_MASTER_PASSPHRASE") {
            let salt_b64 = std::env::var("ARCA_MASTER_SALT").map_err(|_| {
                CryptoError::MasterKey(
                    "ARCA_MASTER_SALT is required with ARCA_MASTER_PASSPHRASE".into(),
                )
            })?;
            let salt = b64
                .decode(salt_b64.trim())
                .map_err(|e| CryptoError::MasterKey(format!("ARCA_MASTER_SALT: {}", e)))?;
            if salt.len() < 16 {
                return Err(CryptoError::MasterKey(
                    "ARCA_MASTER_SALT must decode to at least 16 bytes".into(),
                ));
            }
            return derive_master_key(passphrase.as_bytes(), &salt);
        }

        Err(CryptoError::MasterKey(
            "no master key configured (set ARCA_MASTER_KEY or ARCA_MASTER_PASSPHRASE)".into(),
        ))
    }

    fn as_bytes(&self) -> &[u8; 32] {
        &self.key
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MasterKey")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

/// Derive a master key from an operator passphrase using Argon2id
/// (64 MiB, 3 iterations, parallelism 4).
pub fn derive_master_key(passphrase: &[u8], salt: &[u8]) -> CryptoResult<MasterKey> {
    use argon2::{Algorithm, Argon2, Params, Version};

    let params = Params::new(65536, 3, 4, Some(32))
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut out = [0u8; 32];
    argon2
        .hash_password_into(passphrase, salt, &mut out)
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;

    Ok(MasterKey::from_bytes(out))
}

/// An unwrapped tenant key, zeroized on drop.
///
/// Carries the fingerprint so callers can record which key sealed a given
/// ciphertext without touching the key bytes.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct TenantKey {
    #[zeroize(skip)]
    fingerprint: String,
    key: [u8; 32],
}

impl TenantKey {
    fn new(fingerprint: String, key: [u8; 32]) -> Self {
        Self { fingerprint, key }
    }

    /// Build a key directly from raw bytes, bypassing the vault. Used by
    /// tests and by callers that manage key material themselves.
    pub fn from_raw(fingerprint: String, key: [u8; 32]) -> Self {
        Self::new(fingerprint, key)
    }

    /// One-way fingerprint of this key.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Raw key bytes, for handing to the cipher only.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.key
    }
}

impl std::fmt::Debug for TenantKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TenantKey")
            .field("fingerprint", &self.fingerprint)
            .field("key", &"[REDACTED]")
            .finish()
    }
}

/// Compute the deterministic fingerprint of raw key bytes (hex SHA-256).
pub fn fingerprint(raw: &[u8; 32]) -> String {
    hex::encode(Sha256::digest(raw))
}

/// Vault configuration.
#[derive(Debug, Clone)]
pub struct VaultConfig {
    /// How long an unwrapped key may be served from the cache before the
    /// wrapped form is unwrapped again.
    pub cache_ttl: Duration,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(defaults::KEY_CACHE_TTL_SECS),
        }
    }
}

struct CacheEntry {
    key: Arc<TenantKey>,
    cached_at: Instant,
}

/// Per-tenant key vault.
///
/// The unwrap cache is an owned field, not process-global: independent
/// vault instances have fully isolated caches. The cache is read-heavy and
/// safe for concurrent workers; a racing unwrap only costs a redundant
/// unwrap, never corruption.
pub struct KeyVault {
    master: MasterKey,
    tenants: Arc<dyn TenantRepository>,
    keys: Arc<dyn KeyRepository>,
    cache: RwLock<HashMap<(Uuid, String), CacheEntry>>,
    ttl: Duration,
}

impl KeyVault {
    /// Create a vault around a configured master key.
    pub fn new(
        master: MasterKey,
        tenants: Arc<dyn TenantRepository>,
        keys: Arc<dyn KeyRepository>,
        config: VaultConfig,
    ) -> Self {
        Self {
            master,
            tenants,
            keys,
            cache: RwLock::new(HashMap::new()),
            ttl: config.cache_ttl,
        }
    }

    /// Generate a fresh key, persist it wrapped as the tenant's active key,
    /// and return its fingerprint.
    pub async fn generate_key(&self, tenant_id: Uuid) -> Result<String> {
        let raw = cipher::generate_key_bytes();
        let fp = fingerprint(&raw);
        let wrapped = cipher::seal(self.master.as_bytes(), &raw)?;

        let key = EncryptionKey {
            id: arca_core::new_v7(),
            tenant_id,
            wrapped_key: wrapped,
            fingerprint: fp.clone(),
            active: true,
            created_at: chrono::Utc::now(),
            rotated_at: None,
        };
        self.keys.insert_active(key).await?;
        self.tenants.set_active_fingerprint(tenant_id, &fp).await?;

        self.cache_insert(tenant_id, Arc::new(TenantKey::new(fp.clone(), raw)));
        info!(tenant_id = %tenant_id, fingerprint = %fp, "Generated tenant key");
        Ok(fp)
    }

    /// Generate a replacement key and retire the previous active key.
    ///
    /// The old key stays in the store, inactive, so ciphertext sealed under
    /// it remains decryptable via [`KeyVault::get_key_by_fingerprint`].
    pub async fn rotate_key(&self, tenant_id: Uuid) -> Result<String> {
        let fp = self.generate_key(tenant_id).await?;
        info!(tenant_id = %tenant_id, fingerprint = %fp, "Rotated tenant key");
        Ok(fp)
    }

    /// Unwrap and return the tenant's active key.
    ///
    /// Served from the TTL cache when possible so bulk operations do not
    /// unwrap once per item.
    pub async fn get_active_key(&self, tenant_id: Uuid) -> Result<Arc<TenantKey>> {
        let row = self
            .keys
            .fetch_active(tenant_id)
            .await?
            .ok_or(Error::KeyNotFound(tenant_id))?;

        if let Some(cached) = self.cache_lookup(tenant_id, &row.fingerprint) {
            return Ok(cached);
        }
        self.unwrap_and_cache(tenant_id, &row)
    }

    /// Unwrap a specific historical key by fingerprint.
    pub async fn get_key_by_fingerprint(
        &self,
        tenant_id: Uuid,
        fp: &str,
    ) -> Result<Arc<TenantKey>> {
        if let Some(cached) = self.cache_lookup(tenant_id, fp) {
            return Ok(cached);
        }

        let row = self
            .keys
            .fetch_by_fingerprint(tenant_id, fp)
            .await?
            .ok_or_else(|| Error::NotFound(format!("key fingerprint {}", fp)))?;
        self.unwrap_and_cache(tenant_id, &row)
    }

    fn unwrap_and_cache(&self, tenant_id: Uuid, row: &EncryptionKey) -> Result<Arc<TenantKey>> {
        let mut raw_vec = cipher::open(self.master.as_bytes(), &row.wrapped_key).map_err(|e| {
            warn!(
                tenant_id = %tenant_id,
                fingerprint = %row.fingerprint,
                "Failed to unwrap stored key"
            );
            Error::from(e)
        })?;

        if raw_vec.len() != 32 {
            raw_vec.zeroize();
            return Err(Error::Internal("unwrapped key has wrong length".into()));
        }
        let mut raw = [0u8; 32];
        raw.copy_from_slice(&raw_vec);
        raw_vec.zeroize();

        let key = Arc::new(TenantKey::new(row.fingerprint.clone(), raw));
        self.cache_insert(tenant_id, key.clone());
        debug!(tenant_id = %tenant_id, fingerprint = %row.fingerprint, "Unwrapped tenant key");
        Ok(key)
    }

    fn cache_lookup(&self, tenant_id: Uuid, fp: &str) -> Option<Arc<TenantKey>> {
        let cache_key = (tenant_id, fp.to_string());
        {
            let cache = self.cache.read().expect("key cache poisoned");
            if let Some(entry) = cache.get(&cache_key) {
                if entry.cached_at.elapsed() < self.ttl {
                    return Some(entry.key.clone());
                }
            } else {
                return None;
            }
        }
        // Entry exists but expired; drop it under the write lock.
        let mut cache = self.cache.write().expect("key cache poisoned");
        if let Some(entry) = cache.get(&cache_key) {
            if entry.cached_at.elapsed() < self.ttl {
                return Some(entry.key.clone());
            }
            cache.remove(&cache_key);
        }
        None
    }

    fn cache_insert(&self, tenant_id: Uuid, key: Arc<TenantKey>) {
        let mut cache = self.cache.write().expect("key cache poisoned");
        cache.insert(
            (tenant_id, key.fingerprint().to_string()),
            CacheEntry {
                key,
                cached_at: Instant::now(),
            },
        );
    }
}

impl std::fmt::Debug for KeyVault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyVault")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_deterministic() {
        let raw = [7u8; 32];
        assert_eq!(fingerprint(&raw), fingerprint(&raw));
        assert_eq!(fingerprint(&raw).len(), 64);
    }

    #[test]
    fn test_fingerprint_differs_per_key() {
        assert_ne!(fingerprint(&[1u8; 32]), fingerprint(&[2u8; 32]));
    }

    #[test]
    fn test_master_key_debug_redacted() {
        let master = MasterKey::from_bytes([5u8; 32]);
        let s = format!("{:?}", master);
        assert!(s.contains("REDACTED"));
        assert!(!s.contains('5'));
    }

    #[test]
    fn test_tenant_key_debug_redacted() {
        let key = TenantKey::new("fp".into(), [5u8; 32]);
        let s = format!("{:?}", key);
        assert!(s.contains("REDACTED"));
        assert!(s.contains("fp"));
    }

    #[test]
    fn test_derive_master_key_deterministic() {
        let a = derive_master_key(b"correct horse battery staple", &[9u8; 16]).unwrap();
        let b = derive_master_key(b"correct horse battery staple", &[9u8; 16]).unwrap();
        assert_eq!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn test_derive_master_key_salt_sensitive() {
        let a = derive_master_key(b"correct horse battery staple", &[9u8; 16]).unwrap();
        let b = derive_master_key(b"correct horse battery staple", &[8u8; 16]).unwrap();
        assert_ne!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn test_vault_config_default_ttl() {
        let config = VaultConfig::default();
        assert_eq!(config.cache_ttl, Duration::from_secs(300));
    }

    mod async_tests {
        use super::super::*;
        use async_trait::async_trait;
        use std::sync::Mutex;

        #[derive(Default)]
        struct InMemoryRepos {
            keys: Mutex<Vec<EncryptionKey>>,
            fingerprints: Mutex<HashMap<Uuid, String>>,
        }

        #[async_trait]
        impl KeyRepository for InMemoryRepos {
            async fn insert_active(&self, key: EncryptionKey) -> arca_core::Result<()> {
                let mut keys = self.keys.lock().unwrap();
                for existing in keys.iter_mut().filter(|k| k.tenant_id == key.tenant_id) {
                    if existing.active {
                        existing.active = false;
                        existing.rotated_at = Some(chrono::Utc::now());
                    }
                }
                keys.push(key);
                Ok(())
            }

            async fn fetch_active(
                &self,
                tenant_id: Uuid,
            ) -> arca_core::Result<Option<EncryptionKey>> {
                Ok(self
                    .keys
                    .lock()
                    .unwrap()
                    .iter()
                    .find(|k| k.tenant_id == tenant_id && k.active)
                    .cloned())
            }

            async fn fetch_by_fingerprint(
                &self,
                tenant_id: Uuid,
                fingerprint: &str,
            ) -> arca_core::Result<Option<EncryptionKey>> {
                Ok(self
                    .keys
                    .lock()
                    .unwrap()
                    .iter()
                    .find(|k| k.tenant_id == tenant_id && k.fingerprint == fingerprint)
                    .cloned())
            }
        }

        #[async_trait]
        impl TenantRepository for InMemoryRepos {
            async fn insert(&self, _name: &str) -> arca_core::Result<arca_core::Tenant> {
                unimplemented!("not needed by vault tests")
            }

            async fn fetch(&self, tenant_id: Uuid) -> arca_core::Result<arca_core::Tenant> {
                Err(Error::TenantNotFound(tenant_id))
            }

            async fn set_active_fingerprint(
                &self,
                tenant_id: Uuid,
                fingerprint: &str,
            ) -> arca_core::Result<()> {
                self.fingerprints
                    .lock()
                    .unwrap()
                    .insert(tenant_id, fingerprint.to_string());
                Ok(())
            }
        }

        fn test_vault(ttl: Duration) -> KeyVault {
            let repos = Arc::new(InMemoryRepos::default());
            KeyVault::new(
                MasterKey::from_bytes([13u8; 32]),
                repos.clone(),
                repos,
                VaultConfig { cache_ttl: ttl },
            )
        }

        #[tokio::test]
        async fn test_generate_then_get_active() {
            let vault = test_vault(Duration::from_secs(300));
            let tenant = Uuid::new_v4();

            let fp = vault.generate_key(tenant).await.unwrap();
            let key = vault.get_active_key(tenant).await.unwrap();

            assert_eq!(key.fingerprint(), fp);
        }

        #[tokio::test]
        async fn test_get_active_without_key() {
            let vault = test_vault(Duration::from_secs(300));
            let tenant = Uuid::new_v4();

            let result = vault.get_active_key(tenant).await;
            assert!(matches!(result, Err(Error::KeyNotFound(id)) if id == tenant));
        }

        #[tokio::test]
        async fn test_rotation_retains_historical_key() {
            let vault = test_vault(Duration::from_secs(300));
            let tenant = Uuid::new_v4();

            let fp1 = vault.generate_key(tenant).await.unwrap();
            let old = vault.get_active_key(tenant).await.unwrap();

            let fp2 = vault.rotate_key(tenant).await.unwrap();
            assert_ne!(fp1, fp2);

            let active = vault.get_active_key(tenant).await.unwrap();
            assert_eq!(active.fingerprint(), fp2);

            // Historical key still resolvable by explicit fingerprint.
            let historical = vault.get_key_by_fingerprint(tenant, &fp1).await.unwrap();
            assert_eq!(historical.as_bytes(), old.as_bytes());
        }

        #[tokio::test]
        async fn test_expired_cache_entry_is_reunwrapped() {
            let vault = test_vault(Duration::from_millis(0));
            let tenant = Uuid::new_v4();

            vault.generate_key(tenant).await.unwrap();
            // TTL zero: every lookup goes back through the wrapped form.
            let a = vault.get_active_key(tenant).await.unwrap();
            let b = vault.get_active_key(tenant).await.unwrap();
            assert_eq!(a.as_bytes(), b.as_bytes());
        }

        #[tokio::test]
        async fn test_fingerprint_lookup_is_tenant_scoped() {
            let repos = Arc::new(InMemoryRepos::default());
            let vault = KeyVault::new(
                MasterKey::from_bytes([13u8; 32]),
                repos.clone(),
                repos,
                VaultConfig::default(),
            );
            let tenant_a = Uuid::new_v4();
            let tenant_b = Uuid::new_v4();

            let fp = vault.generate_key(tenant_a).await.unwrap();
            let result = vault.get_key_by_fingerprint(tenant_b, &fp).await;
            assert!(matches!(result, Err(Error::NotFound(_))));
        }
    }
}
