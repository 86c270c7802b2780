//! Document ingestion pipeline.
//!
//! Drives a document through the persisted stage machine:
//! `Uploaded → Extracting → Chunking → Embedding → Indexing → Completed`.
//! Every transition is written to the store before the stage's work runs,
//! so a crashed or retried attempt resumes from a known state. Chunking
//! and chunk ids are deterministic, which makes a full re-run of the
//! stages idempotent: the same document always produces the same chunk
//! rows and index entries.
//!
//! Chunks move through embed, encrypt, and dual-write one batch at a
//! time; within a batch the index write comes before the chunk row
//! write. Both sides are keyed by the deterministic chunk id, so a
//! partial failure anywhere in the sequence converges on the next
//! attempt.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use arca_chunk::Chunker;
use arca_core::{
    chunk_id, defaults, Chunk, ChunkRepository, Document, DocumentRepository, DocumentStatus,
    EmbeddingBackend, Error, IndexEntry, Result, VectorIndex,
};
use arca_crypto::{codec, KeyVault};

use crate::registry::TenantIndexRegistry;

/// Ingestion tuning knobs.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Chunks embedded and encrypted per batch.
    pub embed_batch_size: usize,
    /// Failed attempts before a document is parked in `Failed`.
    pub max_retries: i32,
    /// Base of the geometric backoff schedule, in seconds.
    pub backoff_base_secs: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            embed_batch_size: defaults::EMBED_BATCH_SIZE,
            max_retries: defaults::MAX_RETRIES,
            backoff_base_secs: defaults::BACKOFF_BASE_SECS,
        }
    }
}

impl IngestConfig {
    /// Set the embed batch size.
    pub fn with_embed_batch_size(mut self, size: usize) -> Self {
        self.embed_batch_size = size.max(1);
        self
    }

    /// Set the retry budget.
    pub fn with_max_retries(mut self, max: i32) -> Self {
        self.max_retries = max;
        self
    }

    /// Set the backoff base.
    pub fn with_backoff_base_secs(mut self, secs: u64) -> Self {
        self.backoff_base_secs = secs;
        self
    }
}

/// The ingestion pipeline. Cheap to clone via its shared collaborators;
/// one instance serves all tenants.
pub struct IngestionPipeline {
    documents: Arc<dyn DocumentRepository>,
    chunks: Arc<dyn ChunkRepository>,
    vault: Arc<KeyVault>,
    chunker: Arc<dyn Chunker>,
    embedder: Arc<dyn EmbeddingBackend>,
    index: Arc<dyn VectorIndex>,
    registry: Arc<TenantIndexRegistry>,
    config: IngestConfig,
}

impl IngestionPipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        documents: Arc<dyn DocumentRepository>,
        chunks: Arc<dyn ChunkRepository>,
        vault: Arc<KeyVault>,
        chunker: Arc<dyn Chunker>,
        embedder: Arc<dyn EmbeddingBackend>,
        index: Arc<dyn VectorIndex>,
        registry: Arc<TenantIndexRegistry>,
        config: IngestConfig,
    ) -> Self {
        Self {
            documents,
            chunks,
            vault,
            chunker,
            embedder,
            index,
            registry,
            config,
        }
    }

    /// Accept a document into the pipeline in `Uploaded` state. The
    /// worker picks it up on its next poll.
    pub async fn upload(&self, tenant_id: Uuid, title: &str, content: &str) -> Result<Document> {
        let document = self.documents.insert(tenant_id, title, content).await?;
        info!(
            tenant_id = %tenant_id,
            document_id = %document.id,
            "Accepted document for ingestion"
        );
        Ok(document)
    }

    /// Upload and process inline. Convenience for callers that do not
    /// run the background worker.
    pub async fn ingest(&self, tenant_id: Uuid, title: &str, content: &str) -> Result<Document> {
        let document = self.upload(tenant_id, title, content).await?;
        self.process(&document).await?;
        self.documents.fetch(tenant_id, document.id).await
    }

    /// Run one processing attempt for a claimed document.
    ///
    /// On failure the attempt is recorded before the error is returned:
    /// transient errors within the retry budget schedule the next attempt
    /// with geometric backoff; anything else parks the document in
    /// `Failed` with the error retained verbatim.
    pub async fn process(&self, document: &Document) -> Result<()> {
        if document.status.is_terminal() {
            return Ok(());
        }
        match self.run_stages(document).await {
            Ok(()) => Ok(()),
            Err(err) => self.record_attempt_failure(document, err).await,
        }
    }

    /// Reset retry state and re-enter the pipeline at `Uploaded`.
    pub async fn retry(&self, tenant_id: Uuid, document_id: Uuid) -> Result<Document> {
        self.documents.reset_for_retry(tenant_id, document_id).await?;
        let document = self.documents.fetch(tenant_id, document_id).await?;
        info!(tenant_id = %tenant_id, document_id = %document_id, "Manual retry requested");
        Ok(document)
    }

    async fn run_stages(&self, document: &Document) -> Result<()> {
        let tenant_id = document.tenant_id;
        let document_id = document.id;

        self.documents
            .set_status(tenant_id, document_id, DocumentStatus::Extracting)
            .await?;
        let content = document.content.trim();
        if content.is_empty() {
            return Err(Error::InvalidInput("document has no content".into()));
        }

        self.documents
            .set_status(tenant_id, document_id, DocumentStatus::Chunking)
            .await?;
        let pieces = self.chunker.split(content);
        self.documents
            .set_chunk_count(tenant_id, document_id, pieces.len() as i32)
            .await?;
        if pieces.is_empty() {
            self.documents
                .set_status(tenant_id, document_id, DocumentStatus::Completed)
                .await?;
            return Ok(());
        }

        self.documents
            .set_status(tenant_id, document_id, DocumentStatus::Embedding)
            .await?;
        // One key fetch per document; every batch encrypts under it.
        let key = self.vault.get_active_key(tenant_id).await?;
        let namespace = self.registry.namespace_for(tenant_id).await?;

        // Each batch is fully dual-written before the next one is embedded,
        // so a mid-document failure leaves at most one batch in flight.
        for (batch_index, batch) in pieces.chunks(self.config.embed_batch_size).enumerate() {
            let base = (batch_index * self.config.embed_batch_size) as i32;
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let vectors = self.embedder.embed_batch(&texts).await?;
            let ciphertexts = codec::encrypt_batch(&vectors, &key)?;

            let entries: Vec<IndexEntry> = ciphertexts
                .iter()
                .enumerate()
                .map(|(offset, ciphertext)| IndexEntry {
                    id: chunk_id(document_id, base + offset as i32),
                    ciphertext: ciphertext.clone(),
                    document_id,
                    sequence: base + offset as i32,
                })
                .collect();
            self.index.upsert(&namespace, entries).await?;

            for (offset, (piece, ciphertext)) in batch.iter().zip(ciphertexts).enumerate() {
                let sequence = base + offset as i32;
                self.chunks
                    .upsert(Chunk {
                        id: chunk_id(document_id, sequence),
                        tenant_id,
                        document_id,
                        sequence,
                        content: piece.text.clone(),
                        encrypted_embedding: ciphertext,
                        key_fingerprint: key.fingerprint().to_string(),
                        section: None,
                        created_at: Utc::now(),
                    })
                    .await?;
            }
        }

        // All entries are visible in the index once this checkpoint lands.
        self.documents
            .set_status(tenant_id, document_id, DocumentStatus::Indexing)
            .await?;
        self.documents
            .set_status(tenant_id, document_id, DocumentStatus::Completed)
            .await?;
        info!(
            tenant_id = %tenant_id,
            document_id = %document_id,
            chunk_count = pieces.len(),
            "Document ingested"
        );
        Ok(())
    }

    /// Record a failed attempt and return the error the caller should see.
    async fn record_attempt_failure(&self, document: &Document, err: Error) -> Result<()> {
        let attempts = document.retry_count + 1;
        let retryable = err.is_transient() && attempts < self.config.max_retries;

        if matches!(err, Error::Authentication) {
            warn!(
                tenant_id = %document.tenant_id,
                document_id = %document.id,
                "Authentication failure during ingestion"
            );
        }

        let next_attempt_at = if retryable {
            let delay_secs = self.config.backoff_base_secs.pow(attempts as u32) as i64;
            Some(Utc::now() + chrono::Duration::seconds(delay_secs))
        } else {
            None
        };

        warn!(
            tenant_id = %document.tenant_id,
            document_id = %document.id,
            retry_count = attempts,
            retryable,
            error_msg = %err,
            "Ingestion attempt failed"
        );
        self.documents
            .record_failure(
                document.tenant_id,
                document.id,
                &err.to_string(),
                next_attempt_at,
            )
            .await?;

        if retryable {
            Err(err)
        } else if err.is_transient() {
            Err(Error::Permanent(err.to_string()))
        } else {
            Err(err)
        }
    }
}
