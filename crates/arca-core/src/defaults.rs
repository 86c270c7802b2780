//! Default tuning constants shared across the workspace.
//!
//! Components take these as the defaults of their own config structs; every
//! value can be overridden per instance or from the environment.

/// Maximum tokens per chunk.
pub const CHUNK_MAX_TOKENS: usize = 512;

/// Chunks below this token floor are noise and are discarded.
pub const CHUNK_MIN_TOKENS: usize = 8;

/// Tokens shared between consecutive chunks.
pub const CHUNK_OVERLAP_TOKENS: usize = 32;

/// Chunks embedded and encrypted per pipeline batch.
pub const EMBED_BATCH_SIZE: usize = 32;

/// Retry budget before a document is parked in `Failed`.
pub const MAX_RETRIES: i32 = 5;

/// Base of the geometric backoff schedule, in seconds. The delay before
/// attempt `n` is `BACKOFF_BASE_SECS^n`.
pub const BACKOFF_BASE_SECS: u64 = 2;

/// How long an unwrapped tenant key may sit in the KeyVault cache.
pub const KEY_CACHE_TTL_SECS: u64 = 300;

/// Concurrent documents processed by the ingestion worker.
pub const WORKER_MAX_CONCURRENT: usize = 4;

/// Worker polling interval when no documents are due.
pub const WORKER_POLL_INTERVAL_MS: u64 = 500;

/// Default number of results returned by the query pipeline.
pub const DEFAULT_TOP_K: usize = 10;

/// Capacity of the worker's broadcast event channel.
pub const EVENT_BUS_CAPACITY: usize = 256;
