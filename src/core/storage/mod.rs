//! Chunk stores: the derived collections holding every current chunk.
//!
//! One store exists per source kind. Its only writer is that kind's
//! maintainer; its readers are the query layer, through the two
//! compound lookups `(space, exact word)` and `(space, skip fragment)`.
//!
//! # Backends
//!
//! - **MemoryChunkStore**: in-process maps, used for tests and the
//!   `memory` storage backend
//! - **TantivyChunkStore**: one tantivy index per chunk collection
//!
//! # On-disk layout (tantivy backend)
//!
//! ```text
//! {index_dir}/
//! ├── file-chunks/            # tantivy index
//! ├── thread-chunks/
//! └── thread-comment-chunks/
//! ```

mod memory;
mod tantivy;

pub use memory::MemoryChunkStore;
pub use tantivy::{create_schema, TantivyChunkStore, SCHEMA_VERSION};

use crate::core::config::{StorageBackend, StorageConfig};
use crate::core::error::Result;
use crate::core::types::{ChunkRecord, SourceKind};
use async_trait::async_trait;
use std::sync::Arc;

/// Derived chunk collection for one source kind.
///
/// Lookups return each matching chunk once, ordered by owner id then
/// line number.
#[async_trait]
pub trait ChunkStore: Send + Sync {
    /// Name of the chunk collection (`file-chunks`, ...)
    fn collection(&self) -> &str;

    /// Insert chunk records, returning how many were written
    async fn insert_many(&self, chunks: Vec<ChunkRecord>) -> Result<usize>;

    /// Remove every chunk of one owner, returning how many were removed
    async fn delete_by_owner(&self, owner_id: &str) -> Result<usize>;

    /// Chunks in `space` whose exact-word bucket contains `word`
    async fn find_by_exact_word(&self, space: &str, word: &str) -> Result<Vec<ChunkRecord>>;

    /// Chunks in `space` whose skip-gram bucket contains `fragment`
    async fn find_by_skip_fragment(&self, space: &str, fragment: &str)
        -> Result<Vec<ChunkRecord>>;

    /// Every chunk of one owner
    async fn find_by_owner(&self, owner_id: &str) -> Result<Vec<ChunkRecord>>;

    /// Total number of chunks held
    async fn count(&self) -> Result<usize>;
}

/// Open the chunk store for `kind` with the configured backend
pub fn open_chunk_store(kind: SourceKind, config: &StorageConfig) -> Result<Arc<dyn ChunkStore>> {
    match config.backend {
        StorageBackend::Memory => Ok(Arc::new(MemoryChunkStore::new(kind))),
        StorageBackend::Tantivy => {
            let dir = config.index_dir.join(kind.chunk_collection());
            let store = TantivyChunkStore::open(kind, &dir, config.writer_heap_bytes())?;
            Ok(Arc::new(store))
        }
    }
}

/// Sort key shared by every backend
fn sort_records(records: &mut [ChunkRecord]) {
    records.sort_by(|a, b| {
        a.owner_id
            .cmp(&b.owner_id)
            .then(a.chunk.line_number.cmp(&b.chunk.line_number))
    });
}
