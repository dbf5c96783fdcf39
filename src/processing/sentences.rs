//! Sentence-level splitting used when a paragraph alone exceeds the chunk budget.

const TERMINATORS: [char; 3] = ['.', '!', '?'];

fn is_terminator(ch: char) -> bool {
    TERMINATORS.contains(&ch)
}

/// Split a paragraph into trimmed sentence-like units.
///
/// A sentence is a run of non-terminator characters followed by one or more of `.`, `!`, `?`.
/// Text after the last terminator is kept as a final sentence unless it is only whitespace, and
/// a paragraph without terminators comes back as a single element. Returns an empty vector only
/// when the input is blank.
pub fn split_sentences(paragraph: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = paragraph.char_indices().peekable();

    while let Some((offset, ch)) = chars.next() {
        if !is_terminator(ch) {
            continue;
        }
        let mut end = offset + ch.len_utf8();
        while let Some(&(next_offset, next)) = chars.peek() {
            if !is_terminator(next) {
                break;
            }
            end = next_offset + next.len_utf8();
            chars.next();
        }
        // A terminator run with no text before it belongs to the following sentence.
        if paragraph[start..end].trim().chars().all(is_terminator) {
            continue;
        }
        push_trimmed(&mut sentences, &paragraph[start..end]);
        start = end;
    }

    push_trimmed(&mut sentences, &paragraph[start..]);
    sentences
}

fn push_trimmed(sentences: &mut Vec<String>, fragment: &str) {
    let trimmed = fragment.trim();
    if !trimmed.is_empty() {
        sentences.push(trimmed.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_terminators_and_trims() {
        let sentences = split_sentences("First one. Second one!  Third one?");
        assert_eq!(sentences, vec!["First one.", "Second one!", "Third one?"]);
    }

    #[test]
    fn keeps_terminator_runs_together() {
        let sentences = split_sentences("Wait... What?! Fine.");
        assert_eq!(sentences, vec!["Wait...", "What?!", "Fine."]);
    }

    #[test]
    fn paragraph_without_terminator_is_one_sentence() {
        let sentences = split_sentences("no punctuation anywhere here");
        assert_eq!(sentences, vec!["no punctuation anywhere here"]);
    }

    #[test]
    fn trailing_fragment_is_kept() {
        let sentences = split_sentences("Complete sentence. dangling tail");
        assert_eq!(sentences, vec!["Complete sentence.", "dangling tail"]);
    }

    #[test]
    fn trailing_whitespace_is_discarded() {
        let sentences = split_sentences("Only one.   \n ");
        assert_eq!(sentences, vec!["Only one."]);
    }

    #[test]
    fn leading_terminators_join_the_first_sentence() {
        let sentences = split_sentences("...and then it ended.");
        assert_eq!(sentences, vec!["...and then it ended."]);
    }

    #[test]
    fn blank_input_yields_nothing() {
        assert!(split_sentences("").is_empty());
        assert!(split_sentences("  \n\t").is_empty());
    }

    #[test]
    fn handles_multibyte_text() {
        let sentences = split_sentences("Ça va. Très bien!");
        assert_eq!(sentences, vec!["Ça va.", "Très bien!"]);
    }
}
