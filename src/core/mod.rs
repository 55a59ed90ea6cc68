//! Core domain logic (transport-agnostic)
//!
//! # Architecture
//!
//! - **config**: Configuration loading (TOML + environment)
//! - **error**: Error types and Result alias
//! - **types**: Source documents, change events, chunk records
//! - **xdg**: XDG directory handling
//! - **feed**: Ordered change feeds over source collections
//! - **indexer**: Tokenizing, chunking and the maintainer tasks
//! - **storage**: Chunk stores (memory, Tantivy)
//! - **services**: Unified service container

pub mod config;
pub mod error;
pub mod feed;
pub mod indexer;
pub mod services;
pub mod storage;
pub mod types;
pub mod xdg;

// Re-export key types for convenience
pub use config::Config;
pub use error::{Result, SkipdexError};
pub use services::Services;
