//! In-memory namespaced vector index.
//!
//! Used by tests and local development. Entries are stored per namespace
//! and scored with a deterministic hash over the ciphertext pair, so the
//! index behaves like the remote service from the pipeline's point of
//! view: opaque payloads in, ranked ids out, never the same tenant twice.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use arca_core::{Error, IndexEntry, Result, ScoredId, VectorIndex};

/// Deterministic pseudo-similarity in `[0, 1)` over opaque bytes.
///
/// The real index ranks by distance over its own ciphertext structure;
/// for tests all that matters is that the score is a pure function of
/// the query and entry payloads.
fn pseudo_score(query: &[u8], ciphertext: &[u8]) -> f32 {
    let mut hasher = blake3::Hasher::new();
    hasher.update(query);
    hasher.update(ciphertext);
    let bytes = hasher.finalize();
    let b = bytes.as_bytes();
    let n = u32::from_le_bytes([b[0], b[1], b[2], b[3]]);
    n as f32 / u32::MAX as f32
}

#[derive(Default)]
struct Inner {
    namespaces: HashMap<String, HashMap<Uuid, IndexEntry>>,
}

/// In-memory [`VectorIndex`] with failure injection for retry tests.
#[derive(Default)]
pub struct MemoryVectorIndex {
    inner: Mutex<Inner>,
    fail_upserts: AtomicUsize,
    fail_searches: AtomicUsize,
}

impl MemoryVectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` upsert calls fail with a transient error.
    pub fn fail_next_upserts(&self, n: usize) {
        self.fail_upserts.store(n, Ordering::SeqCst);
    }

    /// Make the next `n` search calls fail with a transient error.
    pub fn fail_next_searches(&self, n: usize) {
        self.fail_searches.store(n, Ordering::SeqCst);
    }

    /// Number of entries stored under a namespace.
    pub fn entry_count(&self, namespace: &str) -> usize {
        let inner = self.inner.lock().unwrap();
        inner.namespaces.get(namespace).map_or(0, HashMap::len)
    }

    /// Whether a namespace has been provisioned.
    pub fn has_namespace(&self, namespace: &str) -> bool {
        let inner = self.inner.lock().unwrap();
        inner.namespaces.contains_key(namespace)
    }

    fn take_failure(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl VectorIndex for MemoryVectorIndex {
    async fn ensure_namespace(&self, namespace: &str) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.namespaces.entry(namespace.to_string()).or_default();
        Ok(())
    }

    async fn upsert(&self, namespace: &str, entries: Vec<IndexEntry>) -> Result<()> {
        if Self::take_failure(&self.fail_upserts) {
            return Err(Error::Transient("injected index upsert failure".into()));
        }
        let mut inner = self.inner.lock().unwrap();
        let ns = inner
            .namespaces
            .get_mut(namespace)
            .ok_or_else(|| Error::Index(format!("unknown namespace: {namespace}")))?;
        let count = entries.len();
        for entry in entries {
            ns.insert(entry.id, entry);
        }
        debug!(namespace = %namespace, batch_size = count, "Upserted index entries");
        Ok(())
    }

    async fn search(
        &self,
        namespace: &str,
        encrypted_query: &[u8],
        top_k: usize,
    ) -> Result<Vec<ScoredId>> {
        if Self::take_failure(&self.fail_searches) {
            return Err(Error::Transient("injected index search failure".into()));
        }
        let inner = self.inner.lock().unwrap();
        let ns = inner
            .namespaces
            .get(namespace)
            .ok_or_else(|| Error::Index(format!("unknown namespace: {namespace}")))?;

        let mut scored: Vec<ScoredId> = ns
            .values()
            .map(|entry| ScoredId {
                id: entry.id,
                score: pseudo_score(encrypted_query, &entry.ciphertext),
            })
            .collect();
        // Stable ranking: score descending, id as tie-break.
        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        scored.truncate(top_k);
        Ok(scored)
    }

    async fn delete_namespace(&self, namespace: &str) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.namespaces.remove(namespace);
        Ok(())
    }
}
