//! # arca-chunk
//!
//! Token-aware document chunking for the arca ingestion pipeline.
//!
//! Splitting is recursive over separator priorities (paragraph → line →
//! sentence → whitespace), merges undersized siblings, applies an overlap
//! window between consecutive chunks, and discards sub-floor fragments.
//! Token counting is pluggable via [`TokenCounter`]; both a tiktoken-backed
//! counter and a fast chars/4 heuristic are provided.

pub mod chunker;
pub mod tokenizer;

pub use chunker::{Chunker, ChunkerConfig, RecursiveChunker, TextChunk};
pub use tokenizer::{HeuristicCounter, TiktokenCounter, TokenCounter};
