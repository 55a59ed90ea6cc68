//! Tantivy-backed chunk store.
//!
//! Each chunk is one tantivy document. The exact-word and skip-fragment
//! buckets are multi-valued raw (`STRING`) fields, so a compound lookup
//! is the intersection of two term queries: one on `space`, one on the
//! token. Every mutation commits and reloads the reader before
//! returning, which makes writes visible to the next lookup.

use crate::core::error::{Result, SkipdexError};
use crate::core::storage::{sort_records, ChunkStore};
use crate::core::types::{ChunkRecord, LineChunk, SourceKind, TextIndex};
use async_trait::async_trait;
use chrono::Utc;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tantivy::collector::{Count, DocSetCollector};
use tantivy::directory::MmapDirectory;
use tantivy::query::{AllQuery, BooleanQuery, Occur, Query, TermQuery};
use tantivy::schema::*;
use tantivy::{Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term};

/// Current schema version
/// Version 1: Initial chunk schema (owner, space, line, buckets)
/// Version 2: Owner field named after the source kind's back-reference
pub const SCHEMA_VERSION: u32 = 2;

/// Create the tantivy schema for one kind's chunk collection
///
/// Fields:
/// - {owner field}: Owning document id (STRING | STORED)
/// - space: Tenant scope (STRING | STORED)
/// - line_number: 0-based line (u64, INDEXED | STORED)
/// - line_text: Original line (STORED)
/// - exact_words: Exact-word bucket (STRING | STORED, multi-valued)
/// - skip_fragments: Skip-gram bucket (STRING | STORED, multi-valued)
/// - indexed_at: Timestamp (Date | STORED)
pub fn create_schema(kind: SourceKind) -> Schema {
    let mut builder = Schema::builder();

    // Keys
    builder.add_text_field(kind.owner_field(), STRING | STORED);
    builder.add_text_field("space", STRING | STORED);
    builder.add_u64_field("line_number", INDEXED | STORED);

    builder.add_text_field("line_text", STORED);

    // Token buckets
    builder.add_text_field("exact_words", STRING | STORED);
    builder.add_text_field("skip_fragments", STRING | STORED);

    // Timestamp
    builder.add_date_field("indexed_at", STORED);

    builder.build()
}

/// Resolved schema fields
struct ChunkFields {
    owner: Field,
    space: Field,
    line_number: Field,
    line_text: Field,
    exact_words: Field,
    skip_fragments: Field,
    indexed_at: Field,
}

impl ChunkFields {
    fn resolve(schema: &Schema, kind: SourceKind) -> Result<Self> {
        let field = |name: &str| {
            schema
                .get_field(name)
                .map_err(|e| SkipdexError::StorageError(format!("Missing {name} field: {e}")))
        };

        Ok(Self {
            owner: field(kind.owner_field())?,
            space: field("space")?,
            line_number: field("line_number")?,
            line_text: field("line_text")?,
            exact_words: field("exact_words")?,
            skip_fragments: field("skip_fragments")?,
            indexed_at: field("indexed_at")?,
        })
    }
}

fn storage_error(action: &'static str) -> impl Fn(tantivy::TantivyError) -> SkipdexError {
    move |e| SkipdexError::StorageError(format!("Failed to {action}: {e}"))
}

/// Chunk store persisted in a tantivy index
pub struct TantivyChunkStore {
    kind: SourceKind,
    fields: ChunkFields,
    /// Absent for read-only stores
    writer: Option<Mutex<IndexWriter>>,
    reader: IndexReader,
}

impl std::fmt::Debug for TantivyChunkStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TantivyChunkStore")
            .field("collection", &self.kind.chunk_collection())
            .finish()
    }
}

impl TantivyChunkStore {
    /// Open the index in `index_dir`, creating it if needed
    pub fn open(kind: SourceKind, index_dir: &Path, writer_heap_bytes: usize) -> Result<Self> {
        std::fs::create_dir_all(index_dir)?;

        let directory = MmapDirectory::open(index_dir).map_err(|e| {
            SkipdexError::StorageError(format!("Failed to open {index_dir:?}: {e}"))
        })?;
        let index = Index::open_or_create(directory, create_schema(kind))
            .map_err(storage_error("open index"))?;

        tracing::debug!("Opened {} at {:?}", kind.chunk_collection(), index_dir);
        Self::from_index(kind, index, Some(writer_heap_bytes))
    }

    /// Open an existing index for lookups only.
    ///
    /// Takes no writer lock, so it can run next to the process that
    /// maintains the index. Mutations fail with a storage error.
    pub fn open_read_only(kind: SourceKind, index_dir: &Path) -> Result<Self> {
        let index = Index::open_in_dir(index_dir).map_err(|e| {
            SkipdexError::StorageError(format!(
                "No {} index at {index_dir:?}: {e}",
                kind.chunk_collection()
            ))
        })?;

        Self::from_index(kind, index, None)
    }

    /// Create a throwaway index held in memory
    pub fn in_ram(kind: SourceKind, writer_heap_bytes: usize) -> Result<Self> {
        Self::from_index(
            kind,
            Index::create_in_ram(create_schema(kind)),
            Some(writer_heap_bytes),
        )
    }

    fn from_index(kind: SourceKind, index: Index, writer_heap_bytes: Option<usize>) -> Result<Self> {
        let fields = ChunkFields::resolve(&index.schema(), kind)?;

        let writer = match writer_heap_bytes {
            Some(heap) => {
                let writer: IndexWriter = index
                    .writer_with_num_threads(1, heap)
                    .map_err(storage_error("create writer"))?;
                Some(Mutex::new(writer))
            }
            None => None,
        };

        let reader: IndexReader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()
            .map_err(storage_error("create reader"))?;

        Ok(Self {
            kind,
            fields,
            writer,
            reader,
        })
    }

    fn lock_writer(&self) -> Result<MutexGuard<'_, IndexWriter>> {
        let writer = self.writer.as_ref().ok_or_else(|| {
            SkipdexError::StorageError(format!(
                "{} was opened read-only",
                self.kind.chunk_collection()
            ))
        })?;
        Ok(writer.lock().unwrap_or_else(|poisoned| poisoned.into_inner()))
    }

    /// Commit pending writer operations and make them searchable
    fn commit(&self, writer: &mut IndexWriter) -> Result<()> {
        writer.commit().map_err(storage_error("commit"))?;
        self.reader.reload().map_err(storage_error("reload reader"))?;
        Ok(())
    }

    /// Drop uncommitted operations so a failed batch never rides along
    /// with a later commit.
    fn discard_staged(&self, writer: &mut IndexWriter) {
        if let Err(e) = writer.rollback() {
            tracing::warn!(
                collection = self.kind.chunk_collection(),
                error = %e,
                "Failed to roll back staged chunks"
            );
        }
    }

    fn term_query(field: Field, value: &str) -> TermQuery {
        TermQuery::new(
            Term::from_field_text(field, value),
            IndexRecordOption::Basic,
        )
    }

    fn to_document(&self, record: &ChunkRecord, indexed_at: tantivy::DateTime) -> TantivyDocument {
        let fields = &self.fields;
        let mut doc = TantivyDocument::default();

        doc.add_text(fields.owner, &record.owner_id);
        doc.add_text(fields.space, &record.space);
        doc.add_u64(fields.line_number, record.chunk.line_number as u64);
        doc.add_text(fields.line_text, &record.chunk.line_text);
        for word in &record.chunk.index.exact_words {
            doc.add_text(fields.exact_words, word);
        }
        for fragment in &record.chunk.index.skip_fragments {
            doc.add_text(fields.skip_fragments, fragment);
        }
        doc.add_date(fields.indexed_at, indexed_at);

        doc
    }

    fn from_document(&self, doc: &TantivyDocument) -> ChunkRecord {
        let fields = &self.fields;

        ChunkRecord {
            owner_id: Self::extract_text(doc, fields.owner),
            space: Self::extract_text(doc, fields.space),
            chunk: LineChunk {
                line_number: doc
                    .get_first(fields.line_number)
                    .and_then(|v| v.as_u64())
                    .unwrap_or(0) as usize,
                line_text: Self::extract_text(doc, fields.line_text),
                index: TextIndex {
                    exact_words: Self::extract_all(doc, fields.exact_words),
                    skip_fragments: Self::extract_all(doc, fields.skip_fragments),
                },
            },
        }
    }

    /// Extract text field from document
    fn extract_text(doc: &TantivyDocument, field: Field) -> String {
        doc.get_first(field)
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string()
    }

    /// Extract every value of a multi-valued text field, in insertion order
    fn extract_all(doc: &TantivyDocument, field: Field) -> Vec<String> {
        doc.get_all(field)
            .filter_map(|v| v.as_str())
            .map(str::to_string)
            .collect()
    }

    /// Run a query and load every matching chunk
    fn search(&self, query: &dyn Query) -> Result<Vec<ChunkRecord>> {
        let searcher = self.reader.searcher();
        let addresses = searcher
            .search(query, &DocSetCollector)
            .map_err(storage_error("search chunks"))?;

        let mut records = Vec::with_capacity(addresses.len());
        for address in addresses {
            let doc: TantivyDocument = searcher
                .doc(address)
                .map_err(storage_error("retrieve chunk"))?;
            records.push(self.from_document(&doc));
        }

        sort_records(&mut records);
        Ok(records)
    }

    fn find_in_space(&self, space: &str, bucket: Field, token: &str) -> Result<Vec<ChunkRecord>> {
        let query = BooleanQuery::new(vec![
            (
                Occur::Must,
                Box::new(Self::term_query(self.fields.space, space)) as Box<dyn Query>,
            ),
            (Occur::Must, Box::new(Self::term_query(bucket, token))),
        ]);
        self.search(&query)
    }
}

#[async_trait]
impl ChunkStore for TantivyChunkStore {
    fn collection(&self) -> &str {
        self.kind.chunk_collection()
    }

    async fn insert_many(&self, chunks: Vec<ChunkRecord>) -> Result<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }

        let indexed_at = tantivy::DateTime::from_timestamp_secs(Utc::now().timestamp());
        let mut writer = self.lock_writer()?;

        for record in &chunks {
            if let Err(e) = writer.add_document(self.to_document(record, indexed_at)) {
                self.discard_staged(&mut writer);
                return Err(storage_error("add chunk")(e));
            }
        }
        if let Err(e) = self.commit(&mut writer) {
            self.discard_staged(&mut writer);
            return Err(e);
        }

        Ok(chunks.len())
    }

    async fn delete_by_owner(&self, owner_id: &str) -> Result<usize> {
        let mut writer = self.lock_writer()?;

        let existing = self
            .reader
            .searcher()
            .search(&Self::term_query(self.fields.owner, owner_id), &Count)
            .map_err(storage_error("count owner chunks"))?;
        if existing == 0 {
            return Ok(0);
        }

        writer.delete_term(Term::from_field_text(self.fields.owner, owner_id));
        self.commit(&mut writer)?;

        Ok(existing)
    }

    async fn find_by_exact_word(&self, space: &str, word: &str) -> Result<Vec<ChunkRecord>> {
        self.find_in_space(space, self.fields.exact_words, word)
    }

    async fn find_by_skip_fragment(
        &self,
        space: &str,
        fragment: &str,
    ) -> Result<Vec<ChunkRecord>> {
        self.find_in_space(space, self.fields.skip_fragments, fragment)
    }

    async fn find_by_owner(&self, owner_id: &str) -> Result<Vec<ChunkRecord>> {
        self.search(&Self::term_query(self.fields.owner, owner_id))
    }

    async fn count(&self) -> Result<usize> {
        self.reader
            .searcher()
            .search(&AllQuery, &Count)
            .map_err(storage_error("count chunks"))
    }
}
