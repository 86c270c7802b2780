//! In-memory metadata store.
//!
//! A single [`MemoryStore`] implements every repository trait, giving tests
//! and local development a store with the same semantics as the PostgreSQL
//! implementation: tenant-scoped reads, idempotent chunk upserts, one
//! active key per tenant, and leased `claim_due` scans.
//!
//! Failure injection (`fail_next_chunk_upserts`, `fail_next_chunk_fetches`)
//! exists so pipeline tests can exercise the dual-write retry path and
//! degraded search deterministically.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use uuid::Uuid;

use arca_core::{
    Chunk, ChunkRepository, Document, DocumentRepository, DocumentStatus, EncryptionKey, Error,
    KeyRepository, Result, Tenant, TenantRepository,
};

/// Lease applied to claimed documents so concurrent workers do not pick up
/// the same document twice. A crashed worker's claim expires naturally.
const CLAIM_LEASE_SECS: i64 = 60;

#[derive(Default)]
struct Inner {
    tenants: HashMap<Uuid, Tenant>,
    keys: Vec<EncryptionKey>,
    documents: HashMap<Uuid, Document>,
    chunks: HashMap<Uuid, Chunk>,
}

/// In-memory implementation of all metadata repositories.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    fail_chunk_upserts: AtomicUsize,
    fail_chunk_fetches: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` chunk upserts fail with a transient error.
    pub fn fail_next_chunk_upserts(&self, n: usize) {
        self.fail_chunk_upserts.store(n, Ordering::SeqCst);
    }

    /// Make the next `n` batched chunk lookups fail with a transient error.
    pub fn fail_next_chunk_fetches(&self, n: usize) {
        self.fail_chunk_fetches.store(n, Ordering::SeqCst);
    }

    /// Total number of chunk rows, across all tenants. Test helper.
    pub fn chunk_row_count(&self) -> usize {
        self.inner.lock().unwrap().chunks.len()
    }

    fn take_injected(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl TenantRepository for MemoryStore {
    async fn insert(&self, name: &str) -> Result<Tenant> {
        let id = arca_core::new_v7();
        let tenant = Tenant {
            id,
            name: name.to_string(),
            namespace: Tenant::namespace_for(id),
            active_fingerprint: None,
            created_at: Utc::now(),
        };
        self.inner
            .lock()
            .unwrap()
            .tenants
            .insert(id, tenant.clone());
        Ok(tenant)
    }

    async fn fetch(&self, tenant_id: Uuid) -> Result<Tenant> {
        self.inner
            .lock()
            .unwrap()
            .tenants
            .get(&tenant_id)
            .cloned()
            .ok_or(Error::TenantNotFound(tenant_id))
    }

    async fn set_active_fingerprint(&self, tenant_id: Uuid, fingerprint: &str) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        let tenant = inner
            .tenants
            .get_mut(&tenant_id)
            .ok_or(Error::TenantNotFound(tenant_id))?;
        tenant.active_fingerprint = Some(fingerprint.to_string());
        Ok(())
    }
}

#[async_trait]
impl KeyRepository for MemoryStore {
    async fn insert_active(&self, key: EncryptionKey) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        for existing in inner
            .keys
            .iter_mut()
            .filter(|k| k.tenant_id == key.tenant_id && k.active)
        {
            existing.active = false;
            existing.rotated_at = Some(Utc::now());
        }
        inner.keys.push(key);
        Ok(())
    }

    async fn fetch_active(&self, tenant_id: Uuid) -> Result<Option<EncryptionKey>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .keys
            .iter()
            .find(|k| k.tenant_id == tenant_id && k.active)
            .cloned())
    }

    async fn fetch_by_fingerprint(
        &self,
        tenant_id: Uuid,
        fingerprint: &str,
    ) -> Result<Option<EncryptionKey>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .keys
            .iter()
            .find(|k| k.tenant_id == tenant_id && k.fingerprint == fingerprint)
            .cloned())
    }
}

#[async_trait]
impl DocumentRepository for MemoryStore {
    async fn insert(&self, tenant_id: Uuid, title: &str, content: &str) -> Result<Document> {
        let now = Utc::now();
        let document = Document {
            id: arca_core::new_v7(),
            tenant_id,
            title: title.to_string(),
            content: content.to_string(),
            status: DocumentStatus::Uploaded,
            chunk_count: 0,
            retry_count: 0,
            last_error: None,
            next_attempt_at: None,
            created_at: now,
            updated_at: now,
        };
        self.inner
            .lock()
            .unwrap()
            .documents
            .insert(document.id, document.clone());
        Ok(document)
    }

    async fn fetch(&self, tenant_id: Uuid, document_id: Uuid) -> Result<Document> {
        self.inner
            .lock()
            .unwrap()
            .documents
            .get(&document_id)
            .filter(|d| d.tenant_id == tenant_id)
            .cloned()
            .ok_or(Error::DocumentNotFound(document_id))
    }

    async fn set_status(
        &self,
        tenant_id: Uuid,
        document_id: Uuid,
        status: DocumentStatus,
    ) -> Result<()> {
        self.with_document(tenant_id, document_id, |d| {
            d.status = status;
        })
    }

    async fn set_chunk_count(&self, tenant_id: Uuid, document_id: Uuid, count: i32) -> Result<()> {
        self.with_document(tenant_id, document_id, |d| {
            d.chunk_count = count;
        })
    }

    async fn record_failure(
        &self,
        tenant_id: Uuid,
        document_id: Uuid,
        error: &str,
        next_attempt_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        self.with_document(tenant_id, document_id, |d| {
            d.retry_count += 1;
            d.last_error = Some(error.to_string());
            d.next_attempt_at = next_attempt_at;
            if next_attempt_at.is_none() {
                d.status = DocumentStatus::Failed;
            }
        })
    }

    async fn reset_for_retry(&self, tenant_id: Uuid, document_id: Uuid) -> Result<()> {
        self.with_document(tenant_id, document_id, |d| {
            d.status = DocumentStatus::Uploaded;
            d.retry_count = 0;
            d.last_error = None;
            d.next_attempt_at = None;
        })
    }

    async fn claim_due(&self, limit: i64) -> Result<Vec<Document>> {
        let now = Utc::now();
        let lease = now + ChronoDuration::seconds(CLAIM_LEASE_SECS);
        let mut inner = self.inner.lock().unwrap();

        let mut due: Vec<Uuid> = inner
            .documents
            .values()
            .filter(|d| {
                !d.status.is_terminal() && d.next_attempt_at.map(|t| t <= now).unwrap_or(true)
            })
            .map(|d| d.id)
            .collect();
        due.sort_by_key(|id| inner.documents[id].created_at);
        due.truncate(limit.max(0) as usize);

        let mut claimed = Vec::with_capacity(due.len());
        for id in due {
            let doc = inner.documents.get_mut(&id).expect("present");
            doc.next_attempt_at = Some(lease);
            doc.updated_at = now;
            claimed.push(doc.clone());
        }
        Ok(claimed)
    }
}

impl MemoryStore {
    fn with_document<F>(&self, tenant_id: Uuid, document_id: Uuid, f: F) -> Result<()>
    where
        F: FnOnce(&mut Document),
    {
        let mut inner = self.inner.lock().unwrap();
        let doc = inner
            .documents
            .get_mut(&document_id)
            .filter(|d| d.tenant_id == tenant_id)
            .ok_or(Error::DocumentNotFound(document_id))?;
        f(doc);
        doc.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl ChunkRepository for MemoryStore {
    async fn upsert(&self, chunk: Chunk) -> Result<()> {
        if Self::take_injected(&self.fail_chunk_upserts) {
            return Err(Error::Transient("injected chunk upsert failure".into()));
        }

        self.inner.lock().unwrap().chunks.insert(chunk.id, chunk);
        Ok(())
    }

    async fn fetch_by_ids(&self, tenant_id: Uuid, ids: &[Uuid]) -> Result<Vec<Chunk>> {
        if Self::take_injected(&self.fail_chunk_fetches) {
            return Err(Error::Transient("injected chunk fetch failure".into()));
        }
        let inner = self.inner.lock().unwrap();
        Ok(ids
            .iter()
            .filter_map(|id| inner.chunks.get(id))
            .filter(|c| c.tenant_id == tenant_id)
            .cloned()
            .collect())
    }

    async fn fetch_by_sequences(
        &self,
        tenant_id: Uuid,
        positions: &[(Uuid, i32)],
    ) -> Result<Vec<Chunk>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .chunks
            .values()
            .filter(|c| {
                c.tenant_id == tenant_id
                    && positions.contains(&(c.document_id, c.sequence))
            })
            .cloned()
            .collect())
    }

    async fn ids_for_document(&self, tenant_id: Uuid, document_id: Uuid) -> Result<Vec<Uuid>> {
        let inner = self.inner.lock().unwrap();
        let mut chunks: Vec<&Chunk> = inner
            .chunks
            .values()
            .filter(|c| c.tenant_id == tenant_id && c.document_id == document_id)
            .collect();
        chunks.sort_by_key(|c| c.sequence);
        Ok(chunks.iter().map(|c| c.id).collect())
    }
}
