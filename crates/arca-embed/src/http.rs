//! Remote embedding backend over the Ollama-style `/api/embed` contract.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use arca_core::{EmbeddingBackend, Error, Result};

/// Default embedding service URL.
pub const DEFAULT_EMBED_URL: &str = "http://localhost:11434";

/// Default embedding model.
pub const DEFAULT_EMBED_MODEL: &str = "nomic-embed-text";

/// Default embedding dimension for nomic-embed-text.
pub const DEFAULT_EMBED_DIMENSION: usize = 768;

/// Timeout for embedding requests (seconds).
const EMBED_TIMEOUT_SECS: u64 = 120;

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

/// [`EmbeddingBackend`] that calls a remote embedding service.
pub struct HttpEmbeddingBackend {
    client: Client,
    base_url: String,
    model: String,
    dimension: usize,
}

impl HttpEmbeddingBackend {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, dimension: usize) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(EMBED_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            dimension,
        })
    }

    /// Construct from `ARCA_EMBED_URL`, `ARCA_EMBED_MODEL`, and
    /// `ARCA_EMBED_DIMENSION`, with defaults for each.
    pub fn from_env() -> Result<Self> {
        let base_url =
            std::env::var("ARCA_EMBED_URL").unwrap_or_else(|_| DEFAULT_EMBED_URL.to_string());
        let model =
            std::env::var("ARCA_EMBED_MODEL").unwrap_or_else(|_| DEFAULT_EMBED_MODEL.to_string());
        let dimension = match std::env::var("ARCA_EMBED_DIMENSION") {
            Ok(raw) => raw
                .parse::<usize>()
                .map_err(|_| Error::Config(format!("invalid ARCA_EMBED_DIMENSION: {raw}")))?,
            Err(_) => DEFAULT_EMBED_DIMENSION,
        };
        Self::new(base_url, model, dimension)
    }
}

#[async_trait]
impl EmbeddingBackend for HttpEmbeddingBackend {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = EmbedRequest {
            model: &self.model,
            input: texts,
        };
        let response = self
            .client
            .post(format!("{}/api/embed", self.base_url))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Embedding(format!(
                "embedding service returned {status}: {body}"
            )));
        }

        let parsed: EmbedResponse = response.json().await?;
        if parsed.embeddings.len() != texts.len() {
            return Err(Error::Embedding(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                parsed.embeddings.len()
            )));
        }
        for embedding in &parsed.embeddings {
            if embedding.len() != self.dimension {
                return Err(Error::Embedding(format!(
                    "expected dimension {}, got {}",
                    self.dimension,
                    embedding.len()
                )));
            }
        }

        debug!(batch_size = texts.len(), model = %self.model, "Embedded batch");
        Ok(parsed.embeddings)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embed_request_wire_shape() {
        let input = vec!["hello".to_string()];
        let request = EmbedRequest {
            model: "nomic-embed-text",
            input: &input,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "nomic-embed-text");
        assert_eq!(json["input"][0], "hello");
    }

    #[test]
    fn test_from_env_defaults() {
        // No env overrides set in the test environment for these names.
        let backend = HttpEmbeddingBackend::new(
            format!("{}/", DEFAULT_EMBED_URL),
            DEFAULT_EMBED_MODEL,
            DEFAULT_EMBED_DIMENSION,
        )
        .unwrap();
        assert_eq!(backend.dimension(), DEFAULT_EMBED_DIMENSION);
        assert_eq!(backend.model(), DEFAULT_EMBED_MODEL);
        assert_eq!(backend.base_url, DEFAULT_EMBED_URL);
    }
}
