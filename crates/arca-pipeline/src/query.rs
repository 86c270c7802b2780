//! Tenant-scoped semantic search.
//!
//! The query never leaves the process in plaintext: it is embedded,
//! encrypted under the tenant's active key, and only the ciphertext goes
//! to the index. The index returns ranked ids; everything readable comes
//! from the metadata store during rehydration.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, warn};
use uuid::Uuid;

use arca_core::{
    defaults, ChunkRepository, EmbeddingBackend, Error, Result, ScoredId, SearchResponse,
    SearchResult, VectorIndex,
};
use arca_crypto::{codec, KeyVault};

use crate::registry::TenantIndexRegistry;

/// Per-query knobs.
#[derive(Debug, Clone)]
pub struct QueryOptions {
    /// Maximum number of results.
    pub top_k: usize,
    /// Splice in the neighboring chunks (`sequence ± 1`) of each hit.
    pub augment: bool,
    /// Re-rank hits by lexical term overlap, semantic rank as tie-break.
    pub rerank: bool,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            top_k: defaults::DEFAULT_TOP_K,
            augment: false,
            rerank: false,
        }
    }
}

impl QueryOptions {
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    pub fn with_augment(mut self, augment: bool) -> Self {
        self.augment = augment;
        self
    }

    pub fn with_rerank(mut self, rerank: bool) -> Self {
        self.rerank = rerank;
        self
    }
}

/// The query pipeline. One instance serves all tenants; scoping comes
/// from the namespace and the tenant predicate on every store read.
pub struct QueryPipeline {
    chunks: Arc<dyn ChunkRepository>,
    vault: Arc<KeyVault>,
    embedder: Arc<dyn EmbeddingBackend>,
    index: Arc<dyn VectorIndex>,
    registry: Arc<TenantIndexRegistry>,
}

impl QueryPipeline {
    pub fn new(
        chunks: Arc<dyn ChunkRepository>,
        vault: Arc<KeyVault>,
        embedder: Arc<dyn EmbeddingBackend>,
        index: Arc<dyn VectorIndex>,
        registry: Arc<TenantIndexRegistry>,
    ) -> Self {
        Self {
            chunks,
            vault,
            embedder,
            index,
            registry,
        }
    }

    /// Run a search for one tenant.
    pub async fn search(
        &self,
        tenant_id: Uuid,
        query: &str,
        options: QueryOptions,
    ) -> Result<SearchResponse> {
        let start = Instant::now();
        let query = query.trim();
        if query.is_empty() {
            return Err(Error::InvalidInput("empty query".into()));
        }

        let vectors = self.embedder.embed_batch(&[query.to_string()]).await?;
        let vector = vectors
            .first()
            .ok_or_else(|| Error::Embedding("backend returned no query vector".into()))?;

        let key = self.vault.get_active_key(tenant_id).await?;
        let encrypted_query = codec::encrypt_vector(vector, &key)?;

        let namespace = self.registry.namespace_for(tenant_id).await?;
        let hits = self
            .index
            .search(&namespace, &encrypted_query, options.top_k)
            .await?;
        if hits.is_empty() {
            return Ok(SearchResponse {
                results: Vec::new(),
                bare_hits: Vec::new(),
                partial: false,
            });
        }

        let ids: Vec<Uuid> = hits.iter().map(|h| h.id).collect();
        let rows = match self.chunks.fetch_by_ids(tenant_id, &ids).await {
            Ok(rows) => rows,
            Err(err) => {
                // Degraded mode: the ranking is still useful without text.
                warn!(
                    tenant_id = %tenant_id,
                    error_msg = %err,
                    "Rehydration failed, returning bare hits"
                );
                return Ok(SearchResponse {
                    results: Vec::new(),
                    bare_hits: hits,
                    partial: true,
                });
            }
        };

        let by_id: HashMap<Uuid, _> = rows.into_iter().map(|c| (c.id, c)).collect();
        // Hit order is the ranking; ids the store no longer knows are
        // stale index residue and are dropped.
        let mut results: Vec<SearchResult> = hits
            .iter()
            .filter_map(|hit| {
                by_id.get(&hit.id).map(|chunk| SearchResult {
                    chunk_id: chunk.id,
                    document_id: chunk.document_id,
                    sequence: chunk.sequence,
                    score: hit.score,
                    content: chunk.content.clone(),
                    context_before: None,
                    context_after: None,
                })
            })
            .collect();

        if options.augment && !results.is_empty() {
            self.augment(tenant_id, &mut results).await;
        }
        if options.rerank {
            rerank(query, &mut results);
        }

        debug!(
            tenant_id = %tenant_id,
            result_count = results.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Search completed"
        );
        Ok(SearchResponse {
            results,
            bare_hits: Vec::new(),
            partial: false,
        })
    }

    /// Fetch `sequence ± 1` neighbors in one batched lookup and splice
    /// their text into the results. Failure here downgrades to plain
    /// results rather than failing the query.
    async fn augment(&self, tenant_id: Uuid, results: &mut [SearchResult]) {
        let mut positions: Vec<(Uuid, i32)> = Vec::with_capacity(results.len() * 2);
        for result in results.iter() {
            if result.sequence > 0 {
                positions.push((result.document_id, result.sequence - 1));
            }
            positions.push((result.document_id, result.sequence + 1));
        }
        positions.sort_unstable();
        positions.dedup();

        let neighbors = match self.chunks.fetch_by_sequences(tenant_id, &positions).await {
            Ok(neighbors) => neighbors,
            Err(err) => {
                warn!(
                    tenant_id = %tenant_id,
                    error_msg = %err,
                    "Context augmentation failed, returning results without context"
                );
                return;
            }
        };

        let by_position: HashMap<(Uuid, i32), String> = neighbors
            .into_iter()
            .map(|c| ((c.document_id, c.sequence), c.content))
            .collect();
        for result in results.iter_mut() {
            result.context_before = by_position
                .get(&(result.document_id, result.sequence - 1))
                .cloned();
            result.context_after = by_position
                .get(&(result.document_id, result.sequence + 1))
                .cloned();
        }
    }
}

/// Weight of the lexical signal folded into the semantic score. Index
/// scores live in `[0, 1)`, so a full-match boost always outranks a
/// lexical miss.
const LEXICAL_BOOST: f32 = 1.0;

/// Fold a lexical boost into each result's score: the fraction of query
/// terms found in the content, scaled by [`LEXICAL_BOOST`]. Stable sort,
/// so equal combined scores keep their semantic ranking.
fn rerank(query: &str, results: &mut [SearchResult]) {
    let terms: Vec<String> = query
        .split_whitespace()
        .map(|t| t.to_lowercase())
        .collect();
    if terms.is_empty() {
        return;
    }
    for result in results.iter_mut() {
        let content = result.content.to_lowercase();
        let matched = terms.iter().filter(|t| content.contains(t.as_str())).count();
        result.score += LEXICAL_BOOST * matched as f32 / terms.len() as f32;
    }
    results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(content: &str, score: f32) -> SearchResult {
        SearchResult {
            chunk_id: Uuid::new_v4(),
            document_id: Uuid::new_v4(),
            sequence: 0,
            score,
            content: content.to_string(),
            context_before: None,
            context_after: None,
        }
    }

    #[test]
    fn test_rerank_boosts_term_matches() {
        let mut results = vec![
            result("nothing relevant here", 0.9),
            result("the quick brown fox", 0.5),
        ];
        rerank("brown FOX", &mut results);
        assert_eq!(results[0].content, "the quick brown fox");
        // Both terms matched: full boost on top of the semantic score.
        assert!((results[0].score - 1.5).abs() < 1e-6);
        assert!((results[1].score - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_rerank_ties_keep_semantic_order() {
        let mut results = vec![
            result("alpha fox", 0.9),
            result("beta fox", 0.7),
            result("gamma fox", 0.5),
        ];
        rerank("fox", &mut results);
        // Every result gets the same boost, so the semantic order holds.
        let contents: Vec<&str> = results.iter().map(|r| r.content.as_str()).collect();
        assert_eq!(contents, vec!["alpha fox", "beta fox", "gamma fox"]);
        let scores: Vec<f32> = results.iter().map(|r| r.score).collect();
        assert_eq!(scores, vec![1.9, 1.7, 1.5]);
    }

    #[test]
    fn test_query_options_builders() {
        let options = QueryOptions::default()
            .with_top_k(3)
            .with_augment(true)
            .with_rerank(true);
        assert_eq!(options.top_k, 3);
        assert!(options.augment);
        assert!(options.rerank);
        assert_eq!(QueryOptions::default().top_k, defaults::DEFAULT_TOP_K);
    }
}
