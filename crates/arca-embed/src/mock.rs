//! Mock embedding backend for deterministic testing.
//!
//! Generates reproducible vectors from text content alone, so tests can
//! assert on chunk ids, index contents, and retry behavior without a
//! running embedding service.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use arca_core::{EmbeddingBackend, Error, Result};

/// Default mock dimension, kept small so test vectors stay cheap.
pub const DEFAULT_MOCK_DIMENSION: usize = 64;

/// Deterministic [`EmbeddingBackend`] for tests.
///
/// The same text always yields the same unit vector. Scripted failures
/// make the next `n` batches return `Error::Transient`, which is how
/// retry tests drive the backoff state machine.
#[derive(Clone)]
pub struct MockEmbeddingBackend {
    dimension: usize,
    fail_next: Arc<AtomicUsize>,
    call_log: Arc<Mutex<Vec<Vec<String>>>>,
}

impl Default for MockEmbeddingBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEmbeddingBackend {
    pub fn new() -> Self {
        Self {
            dimension: DEFAULT_MOCK_DIMENSION,
            fail_next: Arc::new(AtomicUsize::new(0)),
            call_log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Set the embedding dimension.
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = dimension;
        self
    }

    /// Make the next `n` `embed_batch` calls fail with a transient error.
    pub fn fail_next(&self, n: usize) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    /// Number of `embed_batch` calls made, including failed ones.
    pub fn batch_call_count(&self) -> usize {
        self.call_log.lock().unwrap().len()
    }

    /// Generate a deterministic unit vector from text.
    ///
    /// Character-position hashing, same scheme for every call: identical
    /// text always produces an identical vector.
    pub fn generate(text: &str, dimension: usize) -> Vec<f32> {
        let mut vec = vec![0.0f32; dimension];
        for (i, c) in text.chars().enumerate() {
            let idx = (c as usize + i) % dimension;
            vec[idx] += 0.1;
        }
        let magnitude: f32 = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for item in vec.iter_mut() {
                *item /= magnitude;
            }
        }
        vec
    }
}

#[async_trait]
impl EmbeddingBackend for MockEmbeddingBackend {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.call_log.lock().unwrap().push(texts.to_vec());

        let scripted_failure = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if scripted_failure {
            return Err(Error::Transient("injected embedding failure".into()));
        }

        Ok(texts
            .iter()
            .map(|text| Self::generate(text, self.dimension))
            .collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model(&self) -> &str {
        "mock-embed"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_deterministic() {
        let a = MockEmbeddingBackend::generate("hello world", 128);
        let b = MockEmbeddingBackend::generate("hello world", 128);
        assert_eq!(a, b);
    }

    #[test]
    fn test_generate_normalized() {
        let vec = MockEmbeddingBackend::generate("some text", 64);
        let magnitude: f32 = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((magnitude - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_distinct_texts_distinct_vectors() {
        let a = MockEmbeddingBackend::generate("alpha", 64);
        let b = MockEmbeddingBackend::generate("beta", 64);
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_embed_batch_order_and_dimension() {
        let backend = MockEmbeddingBackend::new().with_dimension(32);
        let texts = vec!["first".to_string(), "second".to_string()];
        let vectors = backend.embed_batch(&texts).await.unwrap();

        assert_eq!(vectors.len(), 2);
        assert_eq!(vectors[0].len(), 32);
        assert_eq!(vectors[0], MockEmbeddingBackend::generate("first", 32));
        assert_eq!(vectors[1], MockEmbeddingBackend::generate("second", 32));
    }

    #[tokio::test]
    async fn test_scripted_failures() {
        let backend = MockEmbeddingBackend::new();
        backend.fail_next(2);
        let texts = vec!["text".to_string()];

        assert!(matches!(
            backend.embed_batch(&texts).await,
            Err(Error::Transient(_))
        ));
        assert!(backend.embed_batch(&texts).await.is_err());
        assert!(backend.embed_batch(&texts).await.is_ok());
        assert_eq!(backend.batch_call_count(), 3);
    }
}
