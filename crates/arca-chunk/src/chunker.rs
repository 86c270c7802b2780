//! Token-aware recursive chunking.
//!
//! The splitter keeps a unit intact when it fits the token budget and
//! otherwise splits it at the highest-priority separator present in the
//! text, descending priority (paragraph → line → sentence → whitespace)
//! only when a separator is absent or a piece still exceeds the budget.
//! Adjacent undersized siblings are merged back toward `max_tokens` so a
//! document of short lines does not shatter into fragments.

use std::sync::Arc;

use regex::Regex;
use tracing::trace;

use arca_core::defaults;

use crate::tokenizer::TokenCounter;

/// Configuration for chunking.
#[derive(Debug, Clone)]
pub struct ChunkerConfig {
    /// Maximum tokens per chunk.
    pub max_tokens: usize,
    /// Chunks below this floor are noise and are discarded.
    pub min_tokens: usize,
    /// Tokens of trailing context shared with the following chunk.
    pub overlap_tokens: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            max_tokens: defaults::CHUNK_MAX_TOKENS,
            min_tokens: defaults::CHUNK_MIN_TOKENS,
            overlap_tokens: defaults::CHUNK_OVERLAP_TOKENS,
        }
    }
}

/// A chunk of document text in reading order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    /// Chunk text, including any leading overlap window.
    pub text: String,
    /// Token count of `text` under the configured counter.
    pub token_count: usize,
}

/// Common trait for chunking strategies.
pub trait Chunker: Send + Sync {
    /// Split text into ordered chunks. The output order is the document's
    /// reading order; the position in the vector is the 0-based sequence.
    fn split(&self, text: &str) -> Vec<TextChunk>;

    /// Get the configuration used by this chunker.
    fn config(&self) -> &ChunkerConfig;
}

/// Separator priority levels, highest first.
const LEVEL_PARAGRAPH: usize = 0;
const LEVEL_LINE: usize = 1;
const LEVEL_SENTENCE: usize = 2;
const LEVEL_WORD: usize = 3;

fn joiner(level: usize) -> &'static str {
    match level {
        LEVEL_PARAGRAPH => "\n\n",
        LEVEL_LINE => "\n",
        _ => " ",
    }
}

/// Hierarchical splitter with a pluggable token counter.
pub struct RecursiveChunker {
    config: ChunkerConfig,
    counter: Arc<dyn TokenCounter>,
    paragraph_re: Regex,
    sentence_re: Regex,
    abbrev_re: Regex,
}

impl RecursiveChunker {
    /// Create a chunker with the given configuration and token counter.
    pub fn new(config: ChunkerConfig, counter: Arc<dyn TokenCounter>) -> Self {
        Self {
            config,
            counter,
            paragraph_re: Regex::new(r"\n\s*\n").expect("static regex"),
            sentence_re: Regex::new(r"[.!?]+(?:\s+|$)").expect("static regex"),
            abbrev_re: Regex::new(r"(?i)\b(?:dr|mr|mrs|ms|prof|sr|jr|inc|ltd|co|etc|vs|e\.g|i\.e)\.$")
                .expect("static regex"),
        }
    }

    fn count(&self, text: &str) -> usize {
        self.counter.count(text)
    }

    /// Split `text` into pieces that each fit `max_tokens`, except for
    /// un-splittable units (a single over-long word), which are emitted
    /// whole rather than dropped or truncated.
    fn decompose(&self, text: &str, level: usize) -> Vec<String> {
        let text = text.trim();
        if text.is_empty() {
            return vec![];
        }
        if self.count(text) <= self.config.max_tokens || level > LEVEL_WORD {
            return vec![text.to_string()];
        }

        let parts = self.split_at_level(text, level);
        if parts.len() <= 1 {
            // Separator absent at this level; descend.
            return self.decompose(text, level + 1);
        }

        let mut pieces = Vec::new();
        for part in &parts {
            pieces.extend(self.decompose(part, level + 1));
        }
        self.merge(pieces, joiner(level))
    }

    fn split_at_level(&self, text: &str, level: usize) -> Vec<String> {
        match level {
            LEVEL_PARAGRAPH => self
                .paragraph_re
                .split(text)
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(String::from)
                .collect(),
            LEVEL_LINE => text
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(String::from)
                .collect(),
            LEVEL_SENTENCE => self.find_sentences(text),
            _ => text.split_whitespace().map(String::from).collect(),
        }
    }

    /// Find sentence boundaries, skipping common abbreviations.
    fn find_sentences(&self, text: &str) -> Vec<String> {
        let mut sentences = Vec::new();
        let mut last_end = 0;

        for mat in self.sentence_re.find_iter(text) {
            let end = mat.end();
            let candidate = text[last_end..end].trim();

            if self.abbrev_re.is_match(candidate) {
                continue;
            }
            if !candidate.is_empty() {
                sentences.push(candidate.to_string());
            }
            last_end = end;
        }

        let rest = text[last_end..].trim();
        if !rest.is_empty() {
            sentences.push(rest.to_string());
        }

        sentences
    }

    /// Greedily merge adjacent undersized pieces back toward `max_tokens`.
    fn merge(&self, pieces: Vec<String>, joiner: &str) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for piece in pieces {
            if let Some(last) = out.last_mut() {
                let candidate = format!("{}{}{}", last, joiner, piece);
                if self.count(&candidate) <= self.config.max_tokens {
                    *last = candidate;
                    continue;
                }
            }
            out.push(piece);
        }
        out
    }

    /// The trailing `overlap_tokens` window of a chunk, on word boundaries.
    fn overlap_tail(&self, prev: &str) -> Option<String> {
        if self.config.overlap_tokens == 0 {
            return None;
        }
        let words: Vec<&str> = prev.split_whitespace().collect();
        if words.is_empty() {
            return None;
        }

        let mut start = words.len();
        while start > 0 {
            let candidate = words[start - 1..].join(" ");
            if self.count(&candidate) > self.config.overlap_tokens {
                break;
            }
            start -= 1;
        }

        if start == words.len() {
            None
        } else {
            Some(words[start..].join(" "))
        }
    }
}

impl Chunker for RecursiveChunker {
    fn split(&self, text: &str) -> Vec<TextChunk> {
        let pieces = self.decompose(text, LEVEL_PARAGRAPH);

        // Noise floor. An over-long un-splittable unit exceeds max_tokens
        // and therefore always survives this filter.
        let kept: Vec<String> = pieces
            .into_iter()
            .filter(|p| self.count(p) >= self.config.min_tokens)
            .collect();

        let mut chunks = Vec::with_capacity(kept.len());
        for (i, piece) in kept.iter().enumerate() {
            let text = if i == 0 {
                piece.clone()
            } else {
                match self.overlap_tail(&kept[i - 1]) {
                    Some(tail) => format!("{} {}", tail, piece),
                    None => piece.clone(),
                }
            };
            let token_count = self.count(&text);
            trace!(sequence = i, token_count, "Produced chunk");
            chunks.push(TextChunk { text, token_count });
        }
        chunks
    }

    fn config(&self) -> &ChunkerConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::HeuristicCounter;

    fn chunker(max: usize, min: usize, overlap: usize) -> RecursiveChunker {
        RecursiveChunker::new(
            ChunkerConfig {
                max_tokens: max,
                min_tokens: min,
                overlap_tokens: overlap,
            },
            Arc::new(HeuristicCounter),
        )
    }

    #[test]
    fn test_empty_text() {
        assert!(chunker(10, 1, 0).split("").is_empty());
        assert!(chunker(10, 1, 0).split("   \n\n  ").is_empty());
    }

    #[test]
    fn test_text_under_budget_stays_whole() {
        let chunks = chunker(100, 1, 0).split("A short paragraph.");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "A short paragraph.");
    }

    #[test]
    fn test_paragraph_then_whitespace_split() {
        let chunks = chunker(3, 1, 0).split("Alpha.\n\nBeta gamma delta.");
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["Alpha.", "Beta gamma", "delta."]);
    }

    #[test]
    fn test_overlong_word_emitted_whole() {
        let word = "pneumonoultramicroscopicsilicovolcanoconiosis";
        let chunks = chunker(2, 1, 0).split(word);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, word);
        assert!(chunks[0].token_count > 2);
    }

    #[test]
    fn test_noise_floor_discards_fragments() {
        // "Hi." is 1 estimated token, below the floor of 2.
        let chunks = chunker(10, 2, 0).split("Hi.\n\nA considerably longer paragraph here.");
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].text.starts_with("A considerably"));
    }

    #[test]
    fn test_small_lines_are_merged() {
        let text = "one\ntwo\nthree\nfour\nfive\nsix\nseven\neight";
        let chunks = chunker(5, 1, 0).split(text);
        // Lines merge toward the budget instead of one chunk per line.
        assert!(chunks.len() > 1);
        assert!(chunks.len() < 8);
        for c in &chunks {
            assert!(c.token_count <= 5, "chunk over budget: {:?}", c);
        }
    }

    #[test]
    fn test_sentence_split_on_long_paragraph() {
        let text = "First sentence here. Second sentence follows! Third one ends it?";
        let chunks = chunker(6, 1, 0).split(text);
        assert!(chunks.len() >= 2);
        assert!(chunks[0].text.contains("First"));
    }

    #[test]
    fn test_abbreviations_do_not_split() {
        let sentences = chunker(5, 1, 0).find_sentences("Talk to Dr. Smith today. Then rest.");
        assert_eq!(sentences.len(), 2);
        assert_eq!(sentences[0], "Talk to Dr. Smith today.");
    }

    #[test]
    fn test_overlap_prefixes_previous_tail() {
        let text = "alpha beta gamma delta epsilon zeta eta theta iota kappa";
        let with = chunker(4, 1, 2).split(text);
        let without = chunker(4, 1, 0).split(text);
        assert_eq!(with.len(), without.len());
        assert!(with.len() > 1);

        // Later chunks carry trailing words of the previous core chunk.
        let prev_last_word = without[0].text.split_whitespace().last().unwrap();
        assert!(with[1].text.starts_with(prev_last_word)
            || with[1].text.contains(&format!("{} ", prev_last_word)));
        // First chunk never gets a prefix.
        assert_eq!(with[0].text, without[0].text);
    }

    #[test]
    fn test_deterministic_for_identical_input() {
        let text = "Some repeated text.\n\nAnother paragraph with more words in it.";
        let a = chunker(5, 1, 2).split(text);
        let b = chunker(5, 1, 2).split(text);
        assert_eq!(a, b);
    }

    #[test]
    fn test_reading_order_preserved() {
        let text = "First block.\n\nSecond block.\n\nThird block.";
        let chunks = chunker(4, 1, 0).split(text);
        let joined: String = chunks
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        let first = joined.find("First").unwrap();
        let second = joined.find("Second").unwrap();
        let third = joined.find("Third").unwrap();
        assert!(first < second && second < third);
    }
}
