//! Token counting for chunk sizing.
//!
//! Counting is pluggable: the chunker only needs a number per string, and
//! that number must be deterministic for identical input and configuration.

use arca_core::{Error, Result};

/// Deterministic token counting.
pub trait TokenCounter: Send + Sync {
    /// Count the tokens in the given text.
    fn count(&self, text: &str) -> usize;

    /// Name/identifier of this counter.
    fn name(&self) -> &str;
}

/// Character-based estimation: ceil(chars / 4).
///
/// Much faster than real tokenization and close enough for sizing English
/// prose; use [`TiktokenCounter`] when chunk budgets must match the
/// embedding model exactly.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicCounter;

impl TokenCounter for HeuristicCounter {
    fn count(&self, text: &str) -> usize {
        text.chars().count().div_ceil(4)
    }

    fn name(&self) -> &str {
        "heuristic-chars/4"
    }
}

/// Tiktoken-based counter using cl100k_base, the scheme used by the
/// common embedding models.
pub struct TiktokenCounter {
    bpe: tiktoken_rs::CoreBPE,
}

impl TiktokenCounter {
    /// Initialize the cl100k_base encoder.
    pub fn new() -> Result<Self> {
        let bpe = tiktoken_rs::cl100k_base()
            .map_err(|e| Error::Internal(format!("Failed to initialize cl100k_base: {}", e)))?;
        Ok(Self { bpe })
    }
}

impl TokenCounter for TiktokenCounter {
    fn count(&self, text: &str) -> usize {
        self.bpe.encode_ordinary(text).len()
    }

    fn name(&self) -> &str {
        "cl100k_base"
    }
}
