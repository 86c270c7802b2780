//! Domain models for tenants, keys, documents, and chunks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An isolated customer account. All data and keys are partitioned by tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
    pub id: Uuid,
    pub name: String,
    /// Isolated vector-index namespace. Globally unique, immutable once
    /// created at provisioning time.
    pub namespace: String,
    /// Fingerprint of the tenant's current active key, if one exists.
    pub active_fingerprint: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Tenant {
    /// Derive the immutable index namespace for a tenant id.
    pub fn namespace_for(id: Uuid) -> String {
        format!("tenant-{}", id.as_simple())
    }
}

/// A per-tenant symmetric key, stored only in wrapped form.
///
/// The raw key never appears in this struct: `wrapped_key` is the key
/// encrypted under the process master key, and `fingerprint` is a one-way
/// hash used for lookup. Inactive keys are retained indefinitely so that
/// historical ciphertext stays decryptable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptionKey {
    pub id: Uuid,
    pub tenant_id: Uuid,
    /// Nonce-prefixed AES-256-GCM ciphertext of the raw key.
    #[serde(skip_serializing)]
    pub wrapped_key: Vec<u8>,
    /// Hex SHA-256 of the raw key. Deterministic, not reversible.
    pub fingerprint: String,
    /// At most one active key per tenant.
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub rotated_at: Option<DateTime<Utc>>,
}

/// Processing state of a document moving through the ingestion pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Uploaded,
    Extracting,
    Chunking,
    Embedding,
    Indexing,
    Completed,
    Failed,
}

impl DocumentStatus {
    /// Whether the document has reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, DocumentStatus::Completed | DocumentStatus::Failed)
    }

    /// The stage that follows this one in the pipeline, if any.
    pub fn next(&self) -> Option<DocumentStatus> {
        match self {
            DocumentStatus::Uploaded => Some(DocumentStatus::Extracting),
            DocumentStatus::Extracting => Some(DocumentStatus::Chunking),
            DocumentStatus::Chunking => Some(DocumentStatus::Embedding),
            DocumentStatus::Embedding => Some(DocumentStatus::Indexing),
            DocumentStatus::Indexing => Some(DocumentStatus::Completed),
            DocumentStatus::Completed | DocumentStatus::Failed => None,
        }
    }
}

impl std::fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DocumentStatus::Uploaded => "uploaded",
            DocumentStatus::Extracting => "extracting",
            DocumentStatus::Chunking => "chunking",
            DocumentStatus::Embedding => "embedding",
            DocumentStatus::Indexing => "indexing",
            DocumentStatus::Completed => "completed",
            DocumentStatus::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for DocumentStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "uploaded" => Ok(DocumentStatus::Uploaded),
            "extracting" => Ok(DocumentStatus::Extracting),
            "chunking" => Ok(DocumentStatus::Chunking),
            "embedding" => Ok(DocumentStatus::Embedding),
            "indexing" => Ok(DocumentStatus::Indexing),
            "completed" => Ok(DocumentStatus::Completed),
            "failed" => Ok(DocumentStatus::Failed),
            _ => Err(format!("Invalid document status: {}", s)),
        }
    }
}

/// An uploaded document. Mutated only by the ingestion pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub title: String,
    /// Raw extracted text. Chunk plaintext is stored on the chunk rows.
    pub content: String,
    pub status: DocumentStatus,
    /// Number of chunks produced by the chunking stage. Zero until then.
    pub chunk_count: i32,
    pub retry_count: i32,
    /// Last stage error, retained verbatim for operators.
    pub last_error: Option<String>,
    /// Earliest time the worker may re-attempt processing.
    pub next_attempt_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A bounded contiguous span of a document's text, the unit of embedding
/// and retrieval.
///
/// The chunk id is deterministic, derived from `(document_id, sequence)`,
/// so retried ingestion upserts the same rows instead of duplicating them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub document_id: Uuid,
    /// Dense, zero-based reading-order index within the document.
    pub sequence: i32,
    /// Plaintext content, stored separately from the encrypted embedding.
    pub content: String,
    /// Nonce-prefixed AEAD ciphertext of the little-endian f32 embedding.
    #[serde(skip_serializing)]
    pub encrypted_embedding: Vec<u8>,
    /// Fingerprint of the key that sealed `encrypted_embedding`.
    pub key_fingerprint: String,
    /// Optional page/section metadata carried from extraction.
    pub section: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Entry pushed to the external vector index. The metadata store remains
/// the source of truth; index contents are a rebuildable projection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Equal to the chunk id.
    pub id: Uuid,
    /// Encrypted embedding payload. The index never sees plaintext.
    pub ciphertext: Vec<u8>,
    pub document_id: Uuid,
    pub sequence: i32,
}

/// A ranked `(id, score)` pair as returned by the encrypted index.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoredId {
    pub id: Uuid,
    pub score: f32,
}

/// A fully rehydrated search result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub chunk_id: Uuid,
    pub document_id: Uuid,
    pub sequence: i32,
    pub score: f32,
    pub content: String,
    /// Plaintext of the preceding chunk, when context augmentation is on.
    pub context_before: Option<String>,
    /// Plaintext of the following chunk, when context augmentation is on.
    pub context_after: Option<String>,
}

/// Response from the query pipeline.
///
/// When `partial` is true, rehydration failed and `bare_hits` carries the
/// raw `(id, score)` ranking instead of `results`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
    pub bare_hits: Vec<ScoredId>,
    pub partial: bool,
}
