//! Embedding provider backends.
//!
//! `HttpEmbeddingBackend` talks to an Ollama-compatible `/api/embed`
//! endpoint; `MockEmbeddingBackend` produces deterministic vectors for
//! tests.

pub mod http;
pub mod mock;

pub use http::{HttpEmbeddingBackend, DEFAULT_EMBED_DIMENSION, DEFAULT_EMBED_MODEL, DEFAULT_EMBED_URL};
pub use mock::MockEmbeddingBackend;
