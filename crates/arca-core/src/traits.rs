//! Core traits for arca abstractions.
//!
//! These traits define the seams between the pipeline and its three external
//! collaborators: the relational metadata store, the embedding provider, and
//! the encrypted vector index. Every store operation carries the tenant id;
//! no query may omit that predicate.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::models::*;

// =============================================================================
// METADATA STORE TRAITS
// =============================================================================

/// Repository for tenant provisioning and lookup.
#[async_trait]
pub trait TenantRepository: Send + Sync {
    /// Create a tenant with its immutable index namespace.
    async fn insert(&self, name: &str) -> Result<Tenant>;

    /// Fetch a tenant by id.
    async fn fetch(&self, tenant_id: Uuid) -> Result<Tenant>;

    /// Record the tenant's current active key fingerprint.
    async fn set_active_fingerprint(&self, tenant_id: Uuid, fingerprint: &str) -> Result<()>;
}

/// Repository for wrapped per-tenant encryption keys.
///
/// Only wrapped key bytes ever cross this interface. Keys are never
/// physically deleted while referenced ciphertext exists.
#[async_trait]
pub trait KeyRepository: Send + Sync {
    /// Persist a new key as the tenant's active key, flagging any previous
    /// active key inactive in the same transaction.
    async fn insert_active(&self, key: EncryptionKey) -> Result<()>;

    /// Fetch the tenant's single active key, if any.
    async fn fetch_active(&self, tenant_id: Uuid) -> Result<Option<EncryptionKey>>;

    /// Fetch a historical key by fingerprint, scoped to the tenant.
    async fn fetch_by_fingerprint(
        &self,
        tenant_id: Uuid,
        fingerprint: &str,
    ) -> Result<Option<EncryptionKey>>;
}

/// Repository for document lifecycle state.
#[async_trait]
pub trait DocumentRepository: Send + Sync {
    /// Insert a freshly uploaded document in `Uploaded` state.
    async fn insert(&self, tenant_id: Uuid, title: &str, content: &str) -> Result<Document>;

    /// Fetch a document, scoped to its tenant.
    async fn fetch(&self, tenant_id: Uuid, document_id: Uuid) -> Result<Document>;

    /// Persist a status transition.
    async fn set_status(
        &self,
        tenant_id: Uuid,
        document_id: Uuid,
        status: DocumentStatus,
    ) -> Result<()>;

    /// Record the chunk count produced by the chunking stage.
    async fn set_chunk_count(&self, tenant_id: Uuid, document_id: Uuid, count: i32) -> Result<()>;

    /// Record a failed attempt: bump the retry counter, retain the error
    /// verbatim, and schedule the next attempt.
    async fn record_failure(
        &self,
        tenant_id: Uuid,
        document_id: Uuid,
        error: &str,
        next_attempt_at: Option<DateTime<Utc>>,
    ) -> Result<()>;

    /// Reset retry state and re-enter the pipeline at `Uploaded`. Used by
    /// the manual retry operation.
    async fn reset_for_retry(&self, tenant_id: Uuid, document_id: Uuid) -> Result<()>;

    /// Claim documents that are due for processing: non-terminal status and
    /// `next_attempt_at` absent or in the past. Returns at most `limit`.
    async fn claim_due(&self, limit: i64) -> Result<Vec<Document>>;
}

/// Repository for chunk rows and their encrypted embeddings.
#[async_trait]
pub trait ChunkRepository: Send + Sync {
    /// Insert or overwrite a chunk by its deterministic id.
    async fn upsert(&self, chunk: Chunk) -> Result<()>;

    /// Batched lookup by chunk ids for search rehydration. Missing ids are
    /// simply absent from the result, never an error.
    async fn fetch_by_ids(&self, tenant_id: Uuid, ids: &[Uuid]) -> Result<Vec<Chunk>>;

    /// Batched lookup of specific `(document_id, sequence)` positions, used
    /// for context augmentation.
    async fn fetch_by_sequences(
        &self,
        tenant_id: Uuid,
        positions: &[(Uuid, i32)],
    ) -> Result<Vec<Chunk>>;

    /// All chunk ids for a document, in sequence order.
    async fn ids_for_document(&self, tenant_id: Uuid, document_id: Uuid) -> Result<Vec<Uuid>>;
}

// =============================================================================
// EMBEDDING PROVIDER
// =============================================================================

/// Text to fixed-dimension float vector.
///
/// Implementations must be deterministic for identical input and model
/// version, and must return one vector per input string in order.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    /// Embed a batch of texts.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Fixed output dimension of this backend.
    fn dimension(&self) -> usize;

    /// Model identifier, for logging.
    fn model(&self) -> &str;
}

// =============================================================================
// ENCRYPTED VECTOR INDEX
// =============================================================================

/// Opaque-ciphertext nearest-neighbor index, namespaced per tenant.
///
/// The index never receives plaintext vectors or query text; its internal
/// search algorithm is a black box that returns ranked ciphertext ids.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Create a namespace if it does not exist. Idempotent.
    async fn ensure_namespace(&self, namespace: &str) -> Result<()>;

    /// Insert or overwrite entries by id within a namespace.
    async fn upsert(&self, namespace: &str, entries: Vec<IndexEntry>) -> Result<()>;

    /// Nearest-neighbor search over ciphertext within a single namespace.
    async fn search(
        &self,
        namespace: &str,
        encrypted_query: &[u8],
        top_k: usize,
    ) -> Result<Vec<ScoredId>>;

    /// Drop a namespace and everything in it.
    async fn delete_namespace(&self, namespace: &str) -> Result<()>;
}
