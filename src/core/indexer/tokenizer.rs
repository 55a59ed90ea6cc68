//! Whitespace tokenizer and text index computation.
//!
//! Tokens are the lowercase, whitespace-delimited pieces of a single
//! line. Nothing else is stripped: `"don't,"` stays one token.

use crate::core::indexer::skipgram::skip_grams;
use crate::core::types::TextIndex;

/// Shortest token kept verbatim in the exact-word bucket
pub const EXACT_MIN_LEN: usize = 3;

/// Longest token kept verbatim in the exact-word bucket
pub const EXACT_MAX_LEN: usize = 4;

/// Shortest token that is broken into skip-gram fragments
pub const SKIP_GRAM_MIN_LEN: usize = 5;

/// Split on runs of whitespace and lowercase every piece.
pub fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split_whitespace().map(str::to_lowercase)
}

/// Compute the exact-word and skip-gram buckets for one line of text.
///
/// Lengths are counted in characters. A token of 3 or 4 characters
/// goes to the exact bucket once per occurrence; a token of 5 or more
/// contributes its fragments to the skip bucket; shorter tokens are
/// dropped.
pub fn compute_text_index(text: &str) -> TextIndex {
    let mut index = TextIndex::default();

    for token in tokenize(text) {
        let len = token.chars().count();
        if (EXACT_MIN_LEN..=EXACT_MAX_LEN).contains(&len) {
            index.exact_words.push(token);
        } else if len >= SKIP_GRAM_MIN_LEN {
            index.skip_fragments.extend(skip_grams(&token));
        }
    }

    index
}
