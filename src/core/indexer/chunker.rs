//! Line chunking.
//!
//! A text field becomes one chunk per line, split on `'\n'` with plain
//! split semantics: an empty text is a single empty line and a trailing
//! newline adds a trailing empty line. Every chunk carries the original
//! line (case and `'\r'` preserved) and that line's token index.
//!
//! # Example
//!
//! ```
//! use skipdex::core::indexer::compute_text_chunks;
//!
//! let chunks: Vec<_> = compute_text_chunks("Cat nap\nthe end\n").collect();
//!
//! assert_eq!(chunks.len(), 3);
//! assert_eq!(chunks[0].line_text, "Cat nap");
//! assert_eq!(chunks[0].index.exact_words, vec!["cat", "nap"]);
//! assert_eq!(chunks[2].line_text, "");
//! ```

use crate::core::indexer::tokenizer::compute_text_index;
use crate::core::types::LineChunk;
use std::iter::Enumerate;
use std::str::Split;

/// Lazy iterator over the line chunks of a text.
///
/// A clone walks the remaining lines independently. A fresh call to
/// [`compute_text_chunks`] starts again from line 0.
#[derive(Debug, Clone)]
pub struct LineChunks<'a> {
    lines: Enumerate<Split<'a, char>>,
}

impl Iterator for LineChunks<'_> {
    type Item = LineChunk;

    fn next(&mut self) -> Option<LineChunk> {
        let (line_number, line) = self.lines.next()?;
        Some(LineChunk {
            line_number,
            line_text: line.to_string(),
            index: compute_text_index(line),
        })
    }
}

/// Chunk `text` line by line.
pub fn compute_text_chunks(text: &str) -> LineChunks<'_> {
    LineChunks {
        lines: text.split('\n').enumerate(),
    }
}

/// Number of chunks [`compute_text_chunks`] yields for `text`
pub fn count_lines(text: &str) -> usize {
    text.matches('\n').count() + 1
}
