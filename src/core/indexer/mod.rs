//! Text indexing and index maintenance.
//!
//! The pure half turns text into chunk records:
//!
//! - **tokenizer**: whitespace split + lowercase, exact/skip buckets
//! - **skipgram**: deletion-neighborhood fragments of one token
//! - **chunker**: one chunk per line, each with its own index
//!
//! The async half keeps chunk stores up to date:
//!
//! - **maintainer**: consumes one change feed, replaces owner chunks
//! - **supervisor**: runs and restarts one maintainer task per kind
//!
//! All lengths are counted in characters, never bytes, so multi-byte
//! text is sliced safely.

pub mod chunker;
pub mod maintainer;
pub mod skipgram;
pub mod supervisor;
pub mod tokenizer;

pub use chunker::{compute_text_chunks, count_lines, LineChunks};
pub use maintainer::{
    IndexMaintainer, MaintainerExit, MaintainerStats, ReconnectPolicy, ReindexOutcome,
    StatsSnapshot,
};
pub use skipgram::skip_grams;
pub use supervisor::Supervisor;
pub use tokenizer::{compute_text_index, tokenize};
