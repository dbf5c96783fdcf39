//! Core data types and error definitions for the processing pipeline.

use crate::document::ExtractionError;
use crate::rewrite::RemoteError;
use anyhow::Error as TokenizerError;
use serde::Serialize;
use thiserror::Error;

use super::analysis::ContentStats;
use super::chunking::PARAGRAPH_SEPARATOR;

/// Errors produced while preparing a token estimator.
#[derive(Debug, Error)]
pub enum ChunkingError {
    /// Tokenizer resources were unavailable for the configured model.
    #[error("failed to initialize tokenizer for model '{model}': {source}")]
    Tokenizer {
        /// Model we attempted to load an encoding for.
        model: String,
        /// Underlying error raised by the tokenizer library.
        #[source]
        source: TokenizerError,
    },
}

/// Errors raised by the chunk processing pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Every chunk failed, so the output would be the unmodified document.
    #[error("Failed to process any of {attempted} chunks; check the API key and try again")]
    NoProgress {
        /// Number of chunks that were attempted.
        attempted: usize,
    },
}

/// Errors emitted by the document service.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Text could not be extracted from the uploaded file.
    #[error("Failed to extract document: {0}")]
    Extraction(#[from] ExtractionError),
    /// The rewriting pipeline made no progress.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    /// The rewrite client could not be built or used.
    #[error("Rewrite service error: {0}")]
    Remote(#[from] RemoteError),
}

/// Result of rewriting one chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkOutcome {
    /// Text returned by the rewriting service.
    Rewritten(String),
    /// Original chunk text kept after the service failed.
    Fallback(String),
}

impl ChunkOutcome {
    /// Text recorded for this chunk, whichever way it was produced.
    pub fn text(&self) -> &str {
        match self {
            Self::Rewritten(text) | Self::Fallback(text) => text,
        }
    }

    /// Whether the service rewrote this chunk.
    pub fn is_rewritten(&self) -> bool {
        matches!(self, Self::Rewritten(_))
    }
}

/// Per-chunk results of a completed pipeline run, in chunk order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessingResult {
    outcomes: Vec<ChunkOutcome>,
}

impl ProcessingResult {
    /// Wrap per-chunk outcomes.
    pub fn new(outcomes: Vec<ChunkOutcome>) -> Self {
        Self { outcomes }
    }

    /// Number of chunks covered.
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    /// Whether no chunk was processed.
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Outcomes in chunk order.
    pub fn outcomes(&self) -> &[ChunkOutcome] {
        &self.outcomes
    }

    /// Text recorded for chunk `index`.
    pub fn text_at(&self, index: usize) -> Option<&str> {
        self.outcomes.get(index).map(ChunkOutcome::text)
    }

    /// Chunks rewritten by the service.
    pub fn rewritten_count(&self) -> usize {
        self.outcomes.iter().filter(|outcome| outcome.is_rewritten()).count()
    }

    /// Chunks that kept their original text.
    pub fn fallback_count(&self) -> usize {
        self.len() - self.rewritten_count()
    }

    /// Reassemble the document by joining every chunk with a blank line.
    pub fn assemble(&self) -> String {
        self.outcomes
            .iter()
            .map(ChunkOutcome::text)
            .collect::<Vec<_>>()
            .join(PARAGRAPH_SEPARATOR)
    }
}

/// Chunking preview produced without calling the rewriting service.
#[derive(Debug, Clone, Serialize)]
pub struct ChunkPlan {
    /// Statistics for the whole document.
    pub stats: ContentStats,
    /// Token budget used for chunking.
    pub chunk_budget: usize,
    /// Estimated token cost of each chunk, in order.
    pub chunk_tokens: Vec<usize>,
    /// Chunks whose estimate exceeds the budget (single oversized sentences).
    pub oversized_chunks: usize,
}

/// Summary of a completed rewrite produced by the document service.
#[derive(Debug, Clone, Serialize)]
pub struct RewriteOutcome {
    /// Name of the source document.
    pub source_name: String,
    /// Page count reported by extraction.
    pub page_count: usize,
    /// Statistics for the original text.
    pub stats: ContentStats,
    /// Token budget used for chunking.
    pub chunk_budget: usize,
    /// Number of chunks sent to the service.
    pub chunk_count: usize,
    /// Chunks rewritten successfully.
    pub rewritten: usize,
    /// Chunks that kept their original text.
    pub fallbacks: usize,
    /// Reassembled output text.
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_counts_and_assembles_in_order() {
        let result = ProcessingResult::new(vec![
            ChunkOutcome::Rewritten("one".into()),
            ChunkOutcome::Fallback("two".into()),
            ChunkOutcome::Rewritten("three".into()),
        ]);

        assert_eq!(result.rewritten_count(), 2);
        assert_eq!(result.fallback_count(), 1);
        assert_eq!(result.text_at(1), Some("two"));
        assert_eq!(result.text_at(3), None);
        assert_eq!(result.assemble(), "one\n\ntwo\n\nthree");
    }

    #[test]
    fn no_progress_message_mentions_attempts() {
        let error = PipelineError::NoProgress { attempted: 5 };
        assert!(error.to_string().contains("any of 5 chunks"));
    }
}
