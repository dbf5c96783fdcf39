//! Token cost estimation.
//!
//! Chunk budgets are expressed in model tokens, but the rewriting model's tokenizer is not
//! available locally. The default [`CharRatioEstimator`] divides the character count by a fixed
//! ratio; [`TiktokenEstimator`] counts BPE tokens with `tiktoken-rs` for callers who want a
//! closer approximation. Both implement [`TokenEstimator`], so the chunker stays agnostic.

use crate::config::EstimatorKind;
use anyhow::Error as TokenizerError;
use std::sync::Arc;
use tiktoken_rs::{CoreBPE, cl100k_base, get_bpe_from_model, o200k_base, p50k_base, r50k_base};

use super::types::ChunkingError;

/// Default characters-per-token ratio.
pub const DEFAULT_CHARS_PER_TOKEN: usize = 4;

/// Approximates how many model tokens a string will consume.
///
/// Implementations must be monotonic: appending text never lowers the estimate.
pub trait TokenEstimator: Send + Sync {
    /// Estimated token count for `text`.
    fn estimate(&self, text: &str) -> usize;
}

/// `ceil(chars / ratio)` estimator.
#[derive(Debug, Clone, Copy)]
pub struct CharRatioEstimator {
    chars_per_token: usize,
}

impl CharRatioEstimator {
    /// Build an estimator with a custom ratio; a zero ratio is treated as one.
    pub fn new(chars_per_token: usize) -> Self {
        Self {
            chars_per_token: chars_per_token.max(1),
        }
    }

    /// Characters assumed per token.
    pub fn chars_per_token(&self) -> usize {
        self.chars_per_token
    }
}

impl Default for CharRatioEstimator {
    fn default() -> Self {
        Self::new(DEFAULT_CHARS_PER_TOKEN)
    }
}

impl TokenEstimator for CharRatioEstimator {
    fn estimate(&self, text: &str) -> usize {
        text.chars().count().div_ceil(self.chars_per_token)
    }
}

/// BPE token counter backed by `tiktoken-rs`.
pub struct TiktokenEstimator {
    encoding: CoreBPE,
}

impl TiktokenEstimator {
    /// Resolve an encoding for `model`, falling back to `cl100k_base` for unknown names.
    pub fn for_model(model: &str) -> Result<Self, ChunkingError> {
        let normalized = model.trim();
        let target = if normalized.is_empty() {
            "cl100k_base"
        } else {
            normalized
        };
        let encoding = resolve_encoding(target).map_err(|source| ChunkingError::Tokenizer {
            model: target.to_string(),
            source,
        })?;
        Ok(Self { encoding })
    }
}

impl TokenEstimator for TiktokenEstimator {
    fn estimate(&self, text: &str) -> usize {
        self.encoding.encode_ordinary(text).len()
    }
}

/// Build the estimator selected in configuration.
///
/// Gemini models are unknown to `tiktoken`, so the BPE estimator usually resolves to the
/// `cl100k_base` fallback; if even that fails the character estimator is used.
pub fn build_estimator(kind: EstimatorKind, model: &str) -> Arc<dyn TokenEstimator> {
    match kind {
        EstimatorKind::Chars => Arc::new(CharRatioEstimator::default()),
        EstimatorKind::Tiktoken => match TiktokenEstimator::for_model(model) {
            Ok(estimator) => Arc::new(estimator),
            Err(error) => {
                tracing::warn!(
                    model,
                    error = %error,
                    "Tokenizer unavailable; falling back to character ratio estimator"
                );
                Arc::new(CharRatioEstimator::default())
            }
        },
    }
}

fn resolve_encoding(model: &str) -> Result<CoreBPE, TokenizerError> {
    match get_bpe_from_model(model) {
        Ok(encoding) => Ok(encoding),
        Err(model_err) => {
            tracing::debug!(
                model,
                error = %model_err,
                "Tokenizer model lookup failed; trying encoding name"
            );
            match model {
                "o200k_base" => o200k_base(),
                "p50k_base" => p50k_base(),
                "r50k_base" | "gpt2" => r50k_base(),
                _ => cl100k_base(),
            }
        }
    }
}
