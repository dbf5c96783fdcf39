//! Descriptive statistics over raw document text.

use serde::Serialize;

use super::chunking::paragraph_break;
use super::estimator::TokenEstimator;

/// Counts reported while a document moves through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ContentStats {
    /// Number of characters in the text.
    pub total_characters: usize,
    /// Estimated token cost of the whole text.
    pub estimated_tokens: usize,
    /// Blank-line-separated paragraphs (separator runs plus one).
    pub paragraph_count: usize,
    /// Whitespace-delimited words.
    pub word_count: usize,
}

/// Compute [`ContentStats`] for `text`.
pub fn analyze(text: &str, estimator: &dyn TokenEstimator) -> ContentStats {
    ContentStats {
        total_characters: text.chars().count(),
        estimated_tokens: estimator.estimate(text),
        paragraph_count: paragraph_break().find_iter(text).count() + 1,
        word_count: text.split_whitespace().count(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::estimator::CharRatioEstimator;

    #[test]
    fn counts_paragraphs_words_and_tokens() {
        let text = "One two three.\n\nFour five.\n\n\n\nSix";
        let stats = analyze(text, &CharRatioEstimator::default());
        assert_eq!(stats.total_characters, 33);
        assert_eq!(stats.estimated_tokens, 9);
        assert_eq!(stats.paragraph_count, 3);
        assert_eq!(stats.word_count, 6);
    }

    #[test]
    fn empty_text_has_one_paragraph_and_no_words() {
        let stats = analyze("", &CharRatioEstimator::default());
        assert_eq!(
            stats,
            ContentStats {
                total_characters: 0,
                estimated_tokens: 0,
                paragraph_count: 1,
                word_count: 0,
            }
        );
    }

    #[test]
    fn single_newlines_do_not_start_paragraphs() {
        let stats = analyze("line one\nline two\n", &CharRatioEstimator::default());
        assert_eq!(stats.paragraph_count, 1);
        assert_eq!(stats.word_count, 4);
    }
}
