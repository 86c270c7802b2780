//! HTTP client for the external encrypted-search service.
//!
//! The service exposes a namespace-scoped REST surface; payloads are
//! base64 in JSON and stay ciphertext end to end. Ranking internals are
//! the service's business.

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use arca_core::{Error, IndexEntry, Result, ScoredId, VectorIndex};

/// Default index service URL.
pub const DEFAULT_INDEX_URL: &str = "http://localhost:7700";

/// Request timeout (seconds).
const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Serialize)]
struct WireEntry {
    id: Uuid,
    ciphertext: String,
    document_id: Uuid,
    sequence: i32,
}

#[derive(Serialize)]
struct UpsertRequest {
    entries: Vec<WireEntry>,
}

#[derive(Serialize)]
struct SearchRequest {
    query: String,
    top_k: usize,
}

#[derive(Deserialize)]
struct SearchResponse {
    hits: Vec<WireHit>,
}

#[derive(Deserialize)]
struct WireHit {
    id: Uuid,
    score: f32,
}

/// Remote [`VectorIndex`] backed by the encrypted-search service.
pub struct RemoteVectorIndex {
    client: Client,
    base_url: String,
}

impl RemoteVectorIndex {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Construct from `ARCA_INDEX_URL`, falling back to the default.
    pub fn from_env() -> Result<Self> {
        let base_url =
            std::env::var("ARCA_INDEX_URL").unwrap_or_else(|_| DEFAULT_INDEX_URL.to_string());
        Self::new(base_url)
    }

    fn namespace_url(&self, namespace: &str) -> String {
        format!("{}/namespaces/{}", self.base_url, namespace)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(Error::Index(format!(
            "index service returned {status}: {body}"
        )))
    }
}

#[async_trait]
impl VectorIndex for RemoteVectorIndex {
    async fn ensure_namespace(&self, namespace: &str) -> Result<()> {
        let response = self
            .client
            .put(self.namespace_url(namespace))
            .send()
            .await?;
        Self::check(response).await?;
        debug!(namespace = %namespace, "Ensured index namespace");
        Ok(())
    }

    async fn upsert(&self, namespace: &str, entries: Vec<IndexEntry>) -> Result<()> {
        let request = UpsertRequest {
            entries: entries
                .into_iter()
                .map(|e| WireEntry {
                    id: e.id,
                    ciphertext: BASE64.encode(&e.ciphertext),
                    document_id: e.document_id,
                    sequence: e.sequence,
                })
                .collect(),
        };
        let response = self
            .client
            .post(format!("{}/entries", self.namespace_url(namespace)))
            .json(&request)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn search(
        &self,
        namespace: &str,
        encrypted_query: &[u8],
        top_k: usize,
    ) -> Result<Vec<ScoredId>> {
        let request = SearchRequest {
            query: BASE64.encode(encrypted_query),
            top_k,
        };
        let response = self
            .client
            .post(format!("{}/search", self.namespace_url(namespace)))
            .json(&request)
            .send()
            .await?;
        let parsed: SearchResponse = Self::check(response).await?.json().await?;
        Ok(parsed
            .hits
            .into_iter()
            .map(|h| ScoredId {
                id: h.id,
                score: h.score,
            })
            .collect())
    }

    async fn delete_namespace(&self, namespace: &str) -> Result<()> {
        let response = self
            .client
            .delete(self.namespace_url(namespace))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespace_url_strips_trailing_slash() {
        let index = RemoteVectorIndex::new("http://example.test/").unwrap();
        assert_eq!(
            index.namespace_url("tenant-abc"),
            "http://example.test/namespaces/tenant-abc"
        );
    }

    #[test]
    fn test_search_request_wire_shape() {
        let request = SearchRequest {
            query: BASE64.encode(b"ciphertext"),
            top_k: 5,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["top_k"], 5);
        assert_eq!(json["query"], BASE64.encode(b"ciphertext"));
    }
}
