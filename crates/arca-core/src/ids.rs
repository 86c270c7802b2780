//! Deterministic identifier utilities.
//!
//! Chunk ids are derived from `(document_id, sequence)` with a keyed hash
//! rather than generated randomly, so a retried ingestion batch upserts the
//! same rows and index entries instead of duplicating them.
//!
//! The hash output is folded into a UUIDv8 (RFC 9562 custom format): the
//! version and variant bits are overwritten, the remaining 122 bits come
//! from BLAKE3.

use uuid::Uuid;

/// Domain separator for chunk id derivation. Changing this re-keys every
/// chunk id in existence, so it is fixed for the life of the schema.
const CHUNK_ID_CONTEXT: &str = "arca chunk id v1";

/// Generate a new time-ordered UUIDv7 identifier.
#[inline]
pub fn new_v7() -> Uuid {
    Uuid::now_v7()
}

/// Derive the deterministic chunk id for `(document_id, sequence)`.
///
/// Stable across retries and across processes: the same document and
/// sequence always map to the same id.
///
/// # Example
///
/// ```
/// use arca_core::ids::chunk_id;
/// use uuid::Uuid;
///
/// let doc = Uuid::new_v4();
/// assert_eq!(chunk_id(doc, 0), chunk_id(doc, 0));
/// assert_ne!(chunk_id(doc, 0), chunk_id(doc, 1));
/// ```
pub fn chunk_id(document_id: Uuid, sequence: i32) -> Uuid {
    let mut hasher = blake3::Hasher::new_derive_key(CHUNK_ID_CONTEXT);
    hasher.update(document_id.as_bytes());
    hasher.update(&sequence.to_le_bytes());
    let digest = hasher.finalize();

    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest.as_bytes()[..16]);

    // Stamp version 8 (custom) and RFC variant bits.
    bytes[6] = (bytes[6] & 0x0F) | 0x80;
    bytes[8] = (bytes[8] & 0x3F) | 0x80;

    Uuid::from_bytes(bytes)
}
