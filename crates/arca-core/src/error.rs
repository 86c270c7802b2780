//! Error types for the arca pipeline.

use thiserror::Error;

/// Result type alias using arca's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for arca operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error. Fatal at startup: a component refuses to
    /// construct rather than failing lazily at first use.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The tenant has no active encryption key. Surfaced to the caller,
    /// never retried.
    #[error("No active key for tenant: {0}")]
    KeyNotFound(uuid::Uuid),

    /// Authenticated decryption failed: wrong tenant key or tampered
    /// ciphertext. Never retried.
    #[error("Authentication failed - wrong key or tampered ciphertext")]
    Authentication,

    /// A transient fault in an external collaborator (embedding provider,
    /// metadata store, vector index). Retried with backoff.
    #[error("Transient error: {0}")]
    Transient(String),

    /// The retry budget is exhausted; the document is parked in `Failed`.
    #[error("Permanent failure: {0}")]
    Permanent(String),

    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Tenant not found
    #[error("Tenant not found: {0}")]
    TenantNotFound(uuid::Uuid),

    /// Document not found
    #[error("Document not found: {0}")]
    DocumentNotFound(uuid::Uuid),

    /// Embedding generation failed
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Vector index operation failed
    #[error("Index error: {0}")]
    Index(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// HTTP/network request failed
    #[error("Request error: {0}")]
    Request(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the ingestion pipeline may retry after this error.
    ///
    /// Transient collaborator faults are retried with backoff; key and
    /// authentication failures are surfaced immediately.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::Transient(_)
                | Error::Database(_)
                | Error::Embedding(_)
                | Error::Index(_)
                | Error::Request(_)
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Request(e.to_string())
    }
}
