//! # arca-core
//!
//! Core types, traits, and abstractions for the arca encrypted document
//! pipeline.
//!
//! This crate provides the foundational data structures and trait definitions
//! that other arca crates depend on: the domain models (tenants, keys,
//! documents, chunks), the error taxonomy, the repository and backend traits,
//! deterministic id derivation, and shared defaults.

pub mod defaults;
pub mod error;
pub mod ids;
pub mod logging;
pub mod models;
pub mod traits;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use ids::{chunk_id, new_v7};
pub use models::*;
pub use traits::*;
