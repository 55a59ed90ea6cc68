//! Core data types for the skipdex indexing pipeline.
//!
//! Source documents and change events flow in from the workspace's
//! CRUD layer; text indexes and chunk records flow out to the chunk
//! stores. The chunk types serialize in camelCase because that is the
//! record shape the query layer reads.

use crate::core::error::{Result, SkipdexError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// A watched source collection and everything that differs between
/// one maintainer instance and the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    File,
    Thread,
    ThreadComment,
    ChatMessage,
    Folder,
}

impl SourceKind {
    pub const ALL: [SourceKind; 5] = [
        SourceKind::File,
        SourceKind::Thread,
        SourceKind::ThreadComment,
        SourceKind::ChatMessage,
        SourceKind::Folder,
    ];

    /// Kinds that run a maintainer when configuration says nothing
    pub fn default_enabled() -> Vec<SourceKind> {
        vec![SourceKind::File, SourceKind::Thread, SourceKind::ThreadComment]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::File => "file",
            SourceKind::Thread => "thread",
            SourceKind::ThreadComment => "thread-comment",
            SourceKind::ChatMessage => "chat-message",
            SourceKind::Folder => "folder",
        }
    }

    /// Name of the collection the CRUD layer writes
    pub fn source_collection(&self) -> &'static str {
        match self {
            SourceKind::File => "files",
            SourceKind::Thread => "threads",
            SourceKind::ThreadComment => "thread-comments",
            SourceKind::ChatMessage => "chat-messages",
            SourceKind::Folder => "folders",
        }
    }

    /// Name of the derived collection holding this kind's chunks
    pub fn chunk_collection(&self) -> &'static str {
        match self {
            SourceKind::File => "file-chunks",
            SourceKind::Thread => "thread-chunks",
            SourceKind::ThreadComment => "thread-comment-chunks",
            SourceKind::ChatMessage => "chat-message-chunks",
            SourceKind::Folder => "folder-chunks",
        }
    }

    /// Field on each chunk that points back at the owning document
    pub fn owner_field(&self) -> &'static str {
        match self {
            SourceKind::File => "file",
            SourceKind::Thread => "thread",
            SourceKind::ThreadComment => "threadComment",
            SourceKind::ChatMessage => "chatMessage",
            SourceKind::Folder => "folder",
        }
    }

    /// Document field whose text gets chunked
    pub fn text_field(&self) -> &'static str {
        match self {
            SourceKind::Folder => "name",
            _ => "text",
        }
    }

    /// Resolve a source collection name (`files`, `threads`, ...)
    pub fn from_collection(name: &str) -> Option<SourceKind> {
        SourceKind::ALL
            .into_iter()
            .find(|kind| kind.source_collection() == name)
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = SkipdexError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_lowercase();
        SourceKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == wanted || kind.source_collection() == wanted)
            .ok_or_else(|| SkipdexError::UnknownSource(s.to_string()))
    }
}

/// A document in a watched source collection.
///
/// Only `_id`, `space` and the kind's text field are read; every other
/// field is carried along untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDocument {
    #[serde(rename = "_id")]
    pub id: String,

    /// Tenant scope (workspace id)
    pub space: String,

    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl SourceDocument {
    pub fn new(id: impl Into<String>, space: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            space: space.into(),
            fields: Map::new(),
        }
    }

    /// Builder-style field setter
    pub fn with_field(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(name.to_string(), value.into());
        self
    }

    /// Read a string field, failing if it is missing or not a string
    pub fn text(&self, field: &str) -> Result<&str> {
        match self.fields.get(field) {
            Some(Value::String(text)) => Ok(text),
            Some(other) => Err(SkipdexError::InvalidDocument(format!(
                "{}: field '{field}' is not a string (found {other})",
                self.id
            ))),
            None => Err(SkipdexError::InvalidDocument(format!(
                "{}: missing field '{field}'",
                self.id
            ))),
        }
    }

    /// Apply a `$set`-style partial update.
    ///
    /// `_id` is immutable; `space` must stay a string.
    pub fn apply_set(&mut self, set: Map<String, Value>) -> Result<()> {
        for (name, value) in set {
            match name.as_str() {
                "_id" => {
                    return Err(SkipdexError::InvalidDocument(format!(
                        "{}: _id cannot be updated",
                        self.id
                    )))
                }
                "space" => match value {
                    Value::String(space) => self.space = space,
                    other => {
                        return Err(SkipdexError::InvalidDocument(format!(
                            "{}: space must be a string (found {other})",
                            self.id
                        )))
                    }
                },
                _ => {
                    self.fields.insert(name, value);
                }
            }
        }
        Ok(())
    }
}

/// Kind of write reported by a change feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Insert,
    Update,
    Delete,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Insert => "insert",
            OperationKind::Update => "update",
            OperationKind::Delete => "delete",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One committed write, as delivered by a change feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Per-collection commit sequence number
    pub sequence: u64,

    pub operation: OperationKind,

    pub document_id: String,

    /// Complete post-write document (absent for deletes)
    pub full_document: Option<SourceDocument>,
}

/// Token index attached to any indexable text unit
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextIndex {
    /// Whole tokens of 3 or 4 characters
    pub exact_words: Vec<String>,

    /// Skip-gram fragments of tokens with 5 or more characters
    pub skip_fragments: Vec<String>,
}

/// One line of a text field with its own index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineChunk {
    /// 0-based line position
    pub line_number: usize,

    /// The line exactly as it appears in the source (not lowercased)
    pub line_text: String,

    #[serde(flatten)]
    pub index: TextIndex,
}

/// A line chunk stamped with its owner and tenant scope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkRecord {
    pub owner_id: String,

    pub space: String,

    #[serde(flatten)]
    pub chunk: LineChunk,
}

impl ChunkRecord {
    pub fn new(owner_id: &str, space: &str, chunk: LineChunk) -> Self {
        Self {
            owner_id: owner_id.to_string(),
            space: space.to_string(),
            chunk,
        }
    }
}
