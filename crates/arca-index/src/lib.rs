//! Encrypted vector index clients.
//!
//! The index only ever handles ciphertext: encrypted embeddings go in,
//! ranked ids come out. `RemoteVectorIndex` talks to the external
//! encrypted-search service over HTTP; `MemoryVectorIndex` is the
//! in-process stand-in for tests.

pub mod memory;
pub mod remote;

pub use memory::MemoryVectorIndex;
pub use remote::{RemoteVectorIndex, DEFAULT_INDEX_URL};
