//! Structured logging field name constants for arca.
//!
//! All crates use these constants for consistent structured logging fields,
//! so log aggregation tools can query by standardized names across every
//! subsystem.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue or security event (auth failure) |
//! | INFO  | Lifecycle events, stage completions |
//! | DEBUG | Decision points, intermediate values |
//! | TRACE | Per-item iteration (chunks, search hits) |
//!
//! Security invariant: raw key bytes never appear in any log event at any
//! level. Authentication failures log the key fingerprint only.

/// Subsystem originating the log event.
/// Values: "crypto", "chunk", "store", "index", "embed", "pipeline"
pub const SUBSYSTEM: &str = "subsystem";

/// Logical operation name.
/// Examples: "ingest", "search", "rotate_key", "claim_due"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Tenant UUID the operation is scoped to.
pub const TENANT_ID: &str = "tenant_id";

/// Document UUID being processed.
pub const DOCUMENT_ID: &str = "document_id";

/// Chunk UUID being operated on.
pub const CHUNK_ID: &str = "chunk_id";

/// Key fingerprint (never the key itself).
pub const FINGERPRINT: &str = "fingerprint";

/// Vector index namespace.
pub const NAMESPACE: &str = "namespace";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of chunks produced or processed.
pub const CHUNK_COUNT: &str = "chunk_count";

/// Number of results returned by a search.
pub const RESULT_COUNT: &str = "result_count";

/// Size of an embedding batch.
pub const BATCH_SIZE: &str = "batch_size";

/// Current retry attempt for a document.
pub const RETRY_COUNT: &str = "retry_count";

/// Scheduled backoff delay in seconds.
pub const BACKOFF_SECS: &str = "backoff_secs";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Pipeline stage / document status the event refers to.
pub const STAGE: &str = "stage";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";

/// Whether a search response is degraded to bare hits.
pub const PARTIAL: &str = "partial";
