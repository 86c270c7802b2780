//! Metadata store for tenants, keys, documents, and chunks.
//!
//! Two backends implement the repository traits from `arca-core`: a
//! PostgreSQL store for production and an in-memory store for tests and
//! local development.

pub mod memory;
pub mod pool;
pub mod postgres;

pub use memory::MemoryStore;
pub use pool::PoolConfig;
pub use postgres::PgStore;
