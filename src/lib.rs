//! skipdex - Reactive fuzzy-text indexing
//!
//! Watches source collections (files, threads, thread comments and
//! optionally chat messages and folders) through ordered change feeds
//! and keeps one derived chunk store per collection up to date. Every
//! chunk is one line of text plus two token buckets:
//!
//! - **exact words**: whole tokens of 3-4 characters
//! - **skip fragments**: deletion-neighborhood fragments of longer
//!   tokens, so a single typo still shares fragments with the original
//!
//! # Architecture
//!
//! - **core**: Domain logic
//!   - config, error, types, xdg
//!   - feed (change feeds, in-process source collections)
//!   - indexer (tokenizer, skip-grams, chunker, maintainers)
//!   - storage (chunk stores: memory, Tantivy)
//!   - services (unified service container)
//!
//! - **cli**: `skipdex` command line adapter (depends on core)

// Core domain logic
pub mod core;

// CLI adapter
pub mod cli;

// Re-export commonly used types for convenience
pub use core::config::Config;
pub use core::error::{Result, SkipdexError};
pub use core::services::Services;
pub use core::types::*;
