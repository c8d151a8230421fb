//! Word-boundary tokenizer used for chunk budgeting.
//!
//! Tokens are UAX #29 word-bound segments that contain at least one
//! non-whitespace character. Whitespace is not counted: it is attached to the
//! preceding token (leading whitespace goes to the first token), so the token
//! byte ranges partition the input exactly.

use std::ops::Range;

use unicode_segmentation::UnicodeSegmentation;

/// Byte ranges of every token in `text`, in order and without gaps.
///
/// Whitespace-only input yields no tokens.
pub fn token_spans(text: &str) -> Vec<Range<usize>> {
    let mut spans: Vec<Range<usize>> = Vec::new();
    let mut leading_ws: Option<usize> = None;

    for (start, seg) in text.split_word_bound_indices() {
        let end = start + seg.len();
        if seg.chars().all(char::is_whitespace) {
            match spans.last_mut() {
                Some(last) => last.end = end,
                None => {
                    leading_ws.get_or_insert(start);
                }
            }
        } else {
            let s = leading_ws.take().unwrap_or(start);
            spans.push(s..end);
        }
    }
    spans
}

/// Number of tokens in `text`; counts what [`token_spans`] returns.
#[cfg(test)]
pub(crate) fn count_tokens(text: &str) -> usize {
    text.split_word_bounds()
        .filter(|seg| !seg.chars().all(char::is_whitespace))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spans_partition_text() {
        let text = "  Install the CLI:\n\n    cargo install foo-bar\n";
        let spans = token_spans(text);
        assert_eq!(spans.first().map(|s| s.start), Some(0));
        assert_eq!(spans.last().map(|s| s.end), Some(text.len()));
        for w in spans.windows(2) {
            assert_eq!(w[0].end, w[1].start);
        }
        assert_eq!(spans.len(), count_tokens(text));
    }

    #[test]
    fn whitespace_is_free() {
        assert!(token_spans(" \n\t ").is_empty());
        assert_eq!(count_tokens("a   b"), 2);
        assert_eq!(count_tokens("hello, world"), 3);
    }
}
