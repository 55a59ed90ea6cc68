//! Deletion-neighborhood fragments for typo-tolerant matching.
//!
//! Two fragment families are generated from a token of `L` characters:
//!
//! - contiguous windows `x[i..i+5]` for `i` in `0..L-5`
//! - deletion fragments: for `i` in `0..L-6` and `skip` in `0..5`, the
//!   window starting at `i` with the character at offset `skip` removed,
//!   `x[i..i+skip] + x[i+skip+1..i+skip+5]`
//!
//! The contiguous range stops one short of the last window, so a token
//! of exactly 5 characters yields nothing. Query-side matching depends
//! on this convention; keep both sides in step if it ever changes.
//!
//! Slice ends past the token are clamped, so deletion fragments near the
//! end of a token can be shorter than `skip + 4`. Duplicates are kept.

/// Width of the sliding window
pub const WINDOW: usize = 5;

/// Generate every fragment for `token`, contiguous windows first.
pub fn skip_grams(token: &str) -> Vec<String> {
    let chars: Vec<char> = token.chars().collect();
    let len = chars.len();

    let contiguous = len.saturating_sub(WINDOW);
    let deletion_starts = len.saturating_sub(WINDOW + 1);

    let mut fragments = Vec::with_capacity(contiguous + deletion_starts * WINDOW);

    for i in 0..contiguous {
        fragments.push(slice(&chars, i, i + WINDOW));
    }

    for i in 0..deletion_starts {
        for skip in 0..WINDOW {
            let mut fragment = slice(&chars, i, i + skip);
            fragment.push_str(&slice(&chars, i + skip + 1, i + skip + WINDOW));
            fragments.push(fragment);
        }
    }

    fragments
}

/// Character slice with end clamped to the token length
fn slice(chars: &[char], start: usize, end: usize) -> String {
    let end = end.min(chars.len());
    let start = start.min(end);
    chars[start..end].iter().collect()
}
