//! Budget-bounded chunk assembly.
//!
//! Text is packed greedily, in document order, into chunks whose estimated token cost stays at or
//! below a budget:
//!
//! - Paragraphs (separated by runs of blank lines) are the preferred unit and are joined with a
//!   blank line.
//! - A paragraph that alone exceeds the budget switches the assembler into sentence packing for
//!   that paragraph; sentences are joined with a single space.
//! - A sentence that alone exceeds the budget becomes its own chunk. It is never cut mid-sentence
//!   and never dropped.
//!
//! Whatever sentences remain after sentence packing stay in the accumulator, so the tail of a long
//! paragraph may share a chunk with the paragraph that follows it.

use regex::Regex;
use std::sync::{Arc, OnceLock};

use super::estimator::{CharRatioEstimator, TokenEstimator};
use super::sentences::split_sentences;

/// Separator placed between paragraphs that share a chunk.
pub const PARAGRAPH_SEPARATOR: &str = "\n\n";
/// Separator placed between sentences that share a chunk.
pub const SENTENCE_SEPARATOR: &str = " ";

/// Split text into paragraphs on runs of two or more newlines.
pub(crate) fn split_paragraphs(text: &str) -> impl Iterator<Item = &str> {
    paragraph_break().split(text)
}

/// Shared matcher for paragraph breaks.
pub(crate) fn paragraph_break() -> &'static Regex {
    static PARAGRAPH_BREAK: OnceLock<Regex> = OnceLock::new();
    PARAGRAPH_BREAK.get_or_init(|| Regex::new(r"\n\n+").expect("paragraph break pattern is valid"))
}

/// How the assembler treats the paragraph currently being absorbed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PackingMode {
    /// The paragraph fits the budget on its own and is packed whole.
    Paragraph,
    /// The paragraph overflows and is packed sentence by sentence.
    Sentence,
}

/// Fold state threaded through the paragraph sequence.
#[derive(Debug, Default)]
struct PackState {
    accumulator: String,
    chunks: Vec<String>,
}

impl PackState {
    fn emit(&mut self, text: String) {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return;
        }
        if trimmed.len() == text.len() {
            self.chunks.push(text);
        } else {
            self.chunks.push(trimmed.to_string());
        }
    }

    fn flush(&mut self) {
        let pending = std::mem::take(&mut self.accumulator);
        self.emit(pending);
    }

    fn finish(mut self) -> Vec<String> {
        self.flush();
        self.chunks
    }
}

fn join(accumulator: &str, next: &str, separator: &str) -> String {
    if accumulator.is_empty() {
        return next.to_string();
    }
    let mut joined = String::with_capacity(accumulator.len() + separator.len() + next.len());
    joined.push_str(accumulator);
    joined.push_str(separator);
    joined.push_str(next);
    joined
}

/// Greedy paragraph-then-sentence chunker.
///
/// Holds no per-document state; a single assembler can chunk any number of documents, including
/// concurrently.
#[derive(Clone)]
pub struct ChunkAssembler {
    estimator: Arc<dyn TokenEstimator>,
    budget: usize,
}

impl std::fmt::Debug for ChunkAssembler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkAssembler")
            .field("budget", &self.budget)
            .finish_non_exhaustive()
    }
}

impl ChunkAssembler {
    /// Build an assembler with an explicit estimator. A zero budget is clamped to one token.
    pub fn new(estimator: Arc<dyn TokenEstimator>, budget: usize) -> Self {
        Self {
            estimator,
            budget: budget.max(1),
        }
    }

    /// Build an assembler using the default four-characters-per-token estimator.
    pub fn with_budget(budget: usize) -> Self {
        Self::new(Arc::new(CharRatioEstimator::default()), budget)
    }

    /// Maximum estimated tokens per chunk.
    pub fn budget(&self) -> usize {
        self.budget
    }

    /// Estimator used for every budget check.
    pub fn estimator(&self) -> &Arc<dyn TokenEstimator> {
        &self.estimator
    }

    /// Whether `text` stays within the budget.
    pub fn fits(&self, text: &str) -> bool {
        self.estimator.estimate(text) <= self.budget
    }

    /// Partition `text` into an ordered, non-empty sequence of chunks.
    ///
    /// Blank input produces a single chunk holding the trimmed (empty) input.
    pub fn chunk(&self, text: &str) -> Vec<String> {
        let chunks = split_paragraphs(text)
            .fold(PackState::default(), |state, paragraph| {
                self.absorb_paragraph(state, paragraph)
            })
            .finish();

        tracing::debug!(
            budget = self.budget,
            chunks = chunks.len(),
            characters = text.len(),
            "Assembled chunks"
        );

        if chunks.is_empty() {
            vec![text.trim().to_string()]
        } else {
            chunks
        }
    }

    fn mode_for(&self, paragraph: &str) -> PackingMode {
        if self.fits(paragraph) {
            PackingMode::Paragraph
        } else {
            PackingMode::Sentence
        }
    }

    fn absorb_paragraph(&self, mut state: PackState, paragraph: &str) -> PackState {
        let candidate = join(&state.accumulator, paragraph, PARAGRAPH_SEPARATOR);
        if self.fits(&candidate) {
            state.accumulator = candidate;
            return state;
        }

        state.flush();
        match self.mode_for(paragraph) {
            PackingMode::Paragraph => state.accumulator = paragraph.to_string(),
            PackingMode::Sentence => self.pack_sentences(&mut state, paragraph),
        }
        state
    }

    /// Pack an overflowing paragraph sentence by sentence.
    ///
    /// Expects an empty accumulator and leaves the unflushed tail in it.
    fn pack_sentences(&self, state: &mut PackState, paragraph: &str) {
        let mut pending = String::new();

        for sentence in split_sentences(paragraph) {
            if !self.fits(&sentence) {
                tracing::debug!(
                    budget = self.budget,
                    tokens = self.estimator.estimate(&sentence),
                    "Sentence exceeds budget; emitting as its own chunk"
                );
                state.emit(std::mem::take(&mut pending));
                state.emit(sentence);
                continue;
            }

            let candidate = join(&pending, &sentence, SENTENCE_SEPARATOR);
            if self.fits(&candidate) {
                pending = candidate;
            } else {
                state.emit(std::mem::replace(&mut pending, sentence));
            }
        }

        state.accumulator = pending;
    }
}

/// Chunk `text` with the default estimator.
pub fn chunk_text(text: &str, budget: usize) -> Vec<String> {
    ChunkAssembler::with_budget(budget).chunk(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn non_whitespace(text: &str) -> String {
        text.chars().filter(|c| !c.is_whitespace()).collect()
    }

    #[test]
    fn empty_and_blank_input_yield_single_empty_chunk() {
        assert_eq!(chunk_text("", 10), vec![String::new()]);
        assert_eq!(chunk_text("   ", 10), vec![String::new()]);
        assert_eq!(chunk_text("\n\n\n\n", 10), vec![String::new()]);
    }

    #[test]
    fn small_text_stays_in_one_chunk() {
        let text = "First paragraph.\n\nSecond paragraph.";
        assert_eq!(chunk_text(text, 100), vec![text.to_string()]);
    }

    #[test]
    fn paragraphs_that_do_not_fit_together_are_separated() {
        let first = "a".repeat(20);
        let second = "b".repeat(25);
        let text = format!("{first}\n\n{second}");
        assert_eq!(chunk_text(&text, 10), vec![first, second]);
    }

    #[test]
    fn paragraph_exactly_at_budget_is_not_split() {
        let paragraph = "word. ".repeat(7) + "done";
        assert_eq!(paragraph.chars().count(), 46);
        let budget = 12;
        assert_eq!(chunk_text(&paragraph, budget), vec![paragraph.clone()]);
    }

    #[test]
    fn long_paragraph_without_terminators_is_kept_whole() {
        let paragraph = "abcde fghij ".repeat(16) + "klmnopqr";
        let paragraph = paragraph[..200].to_string();
        assert_eq!(paragraph.chars().count(), 200);
        let chunks = chunk_text(&paragraph, 10);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0], paragraph.trim());
    }

    #[test]
    fn overflowing_paragraph_is_packed_by_sentence() {
        let sentence = "Alpha beta gam.";
        let paragraph = [sentence; 4].join(" ");
        let chunks = chunk_text(&paragraph, 10);
        assert_eq!(
            chunks,
            vec![format!("{sentence} {sentence}"), format!("{sentence} {sentence}")]
        );
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 40);
        }
    }

    #[test]
    fn sentence_tail_merges_with_next_paragraph() {
        let sentence = "Alpha beta gam.";
        let text = format!("{}\n\nTail.", [sentence; 4].join(" "));
        let chunks = chunk_text(&text, 10);
        assert_eq!(
            chunks,
            vec![
                format!("{sentence} {sentence}"),
                format!("{sentence} {sentence}\n\nTail."),
            ]
        );
    }

    #[test]
    fn oversized_sentence_becomes_its_own_chunk() {
        let long_sentence = format!("{}.", "x".repeat(60));
        let text = format!("Short one. {long_sentence} Last bit.");
        let chunks = chunk_text(&text, 10);
        assert_eq!(
            chunks,
            vec![
                "Short one.".to_string(),
                long_sentence.clone(),
                "Last bit.".to_string(),
            ]
        );
    }

    #[test]
    fn pending_paragraph_is_flushed_before_sentence_packing() {
        let text = format!("Intro.\n\n{}", ["Alpha beta gam."; 4].join(" "));
        let chunks = chunk_text(&text, 10);
        assert_eq!(chunks[0], "Intro.");
        assert_eq!(chunks.len(), 3);
    }

    #[test]
    fn chunks_respect_budget_and_preserve_content() {
        let text = "The system reads a document. It splits the text!\n\n\
                    Each chunk is rewritten. Failures fall back to the original?\n\n\n\
                    Short.\n\nAnother paragraph that is a bit longer than the others here.";
        let assembler = ChunkAssembler::with_budget(12);
        let chunks = assembler.chunk(text);
        for chunk in &chunks {
            assert!(
                assembler.fits(chunk) || split_sentences(chunk).len() == 1,
                "chunk over budget: {chunk:?}"
            );
        }
        assert_eq!(non_whitespace(&chunks.concat()), non_whitespace(text));
    }

    #[test]
    fn zero_budget_is_clamped() {
        let assembler = ChunkAssembler::with_budget(0);
        assert_eq!(assembler.budget(), 1);
        let chunks = assembler.chunk("One. Two.");
        assert_eq!(chunks, vec!["One.".to_string(), "Two.".to_string()]);
    }

    #[test]
    fn split_paragraphs_collapses_blank_line_runs() {
        let paragraphs: Vec<&str> = split_paragraphs("a\n\nb\n\n\n\nc\nd").collect();
        assert_eq!(paragraphs, vec!["a", "b", "c\nd"]);
    }
}
