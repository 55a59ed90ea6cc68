//! Error types and error handling for the skipdex indexing pipeline.
//!
//! Every failure in the pipeline maps to one variant of
//! [`SkipdexError`]. The classification helpers decide what a
//! maintainer does with it: retry the feed, skip the event, or
//! stop the task and let the supervisor restart it.

use thiserror::Error;

/// Result type alias for skipdex operations
pub type Result<T> = std::result::Result<T, SkipdexError>;

/// Main error type for the indexing pipeline
#[derive(Error, Debug)]
pub enum SkipdexError {
    #[error("Unexpected '{operation}' event on the {source_kind} feed")]
    UnexpectedOperation {
        source_kind: String,
        operation: String,
    },

    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    #[error("Document already exists: {0}")]
    DuplicateDocument(String),

    /// Raised by external feed backends (database change streams) when
    /// the connection drops; the in-process collection never loses one.
    #[error("Change feed disconnected: {0}")]
    FeedDisconnected(String),

    /// A feed that buffers for slow consumers dropped events
    #[error("Change feed lagged, {0} events were dropped")]
    FeedLagged(u64),

    #[error("Change feed closed")]
    FeedClosed,

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Unknown source kind: {0}")]
    UnknownSource(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),
}

impl SkipdexError {
    /// Get user-friendly error message
    pub fn message(&self) -> String {
        self.to_string()
    }

    /// Feed-level failures that a fresh subscription can recover from
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SkipdexError::FeedDisconnected(_)
                | SkipdexError::FeedLagged(_)
                | SkipdexError::Timeout(_)
        )
    }

    /// Failures that must stop the maintainer task
    pub fn is_fatal(&self) -> bool {
        matches!(self, SkipdexError::UnexpectedOperation { .. })
    }

    /// Check if this is a "not found" type error
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            SkipdexError::DocumentNotFound(_) | SkipdexError::UnknownSource(_)
        )
    }
}
