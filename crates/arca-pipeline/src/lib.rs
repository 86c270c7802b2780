//! # arca-pipeline
//!
//! The ingestion and query pipelines over the arca building blocks.
//!
//! [`IngestionPipeline`] drives uploaded documents through the persisted
//! stage machine (extract → chunk → embed → encrypt → index) with
//! transient-failure retry and geometric backoff. [`QueryPipeline`] runs
//! tenant-scoped semantic search with batched rehydration, optional
//! context augmentation, and optional lexical rerank.
//! [`TenantIndexRegistry`] owns namespace provisioning, and
//! [`IngestWorker`] is the background poll loop that keeps documents
//! moving.

pub mod ingest;
pub mod query;
pub mod registry;
pub mod worker;

pub use ingest::{IngestConfig, IngestionPipeline};
pub use query::{QueryOptions, QueryPipeline};
pub use registry::TenantIndexRegistry;
pub use worker::{IngestWorker, WorkerConfig, WorkerEvent, WorkerHandle};
