//! In-process chunk store.

use crate::core::error::Result;
use crate::core::storage::{sort_records, ChunkStore};
use crate::core::types::{ChunkRecord, SourceKind};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// `(owner id, line number)`
type ChunkKey = (String, usize);

/// `(space, token)` → chunks containing the token
type SecondaryIndex = BTreeMap<(String, String), BTreeSet<ChunkKey>>;

/// Chunk store backed by ordered maps
pub struct MemoryChunkStore {
    collection: &'static str,
    state: RwLock<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    by_owner: HashMap<String, Vec<ChunkRecord>>,
    exact_words: SecondaryIndex,
    skip_fragments: SecondaryIndex,
}

impl MemoryState {
    fn index(&mut self, record: &ChunkRecord) {
        let key = (record.owner_id.clone(), record.chunk.line_number);
        for word in &record.chunk.index.exact_words {
            self.exact_words
                .entry((record.space.clone(), word.clone()))
                .or_default()
                .insert(key.clone());
        }
        for fragment in &record.chunk.index.skip_fragments {
            self.skip_fragments
                .entry((record.space.clone(), fragment.clone()))
                .or_default()
                .insert(key.clone());
        }
    }

    fn unindex(&mut self, record: &ChunkRecord) {
        let key = (record.owner_id.clone(), record.chunk.line_number);
        for word in &record.chunk.index.exact_words {
            remove_key(&mut self.exact_words, &record.space, word, &key);
        }
        for fragment in &record.chunk.index.skip_fragments {
            remove_key(&mut self.skip_fragments, &record.space, fragment, &key);
        }
    }

    fn lookup(
        &self,
        index: &SecondaryIndex,
        space: &str,
        token: &str,
        contains: impl Fn(&ChunkRecord) -> bool,
    ) -> Vec<ChunkRecord> {
        let Some(keys) = index.get(&(space.to_string(), token.to_string())) else {
            return Vec::new();
        };

        let owners: BTreeSet<&String> = keys.iter().map(|(owner, _)| owner).collect();

        let mut records: Vec<ChunkRecord> = owners
            .into_iter()
            .filter_map(|owner| self.by_owner.get(owner))
            .flatten()
            .filter(|record| record.space == space && contains(record))
            .cloned()
            .collect();

        sort_records(&mut records);
        records
    }
}

fn remove_key(index: &mut SecondaryIndex, space: &str, token: &str, key: &ChunkKey) {
    let entry = (space.to_string(), token.to_string());
    if let Some(keys) = index.get_mut(&entry) {
        keys.remove(key);
        if keys.is_empty() {
            index.remove(&entry);
        }
    }
}

impl MemoryChunkStore {
    pub fn new(kind: SourceKind) -> Self {
        Self {
            collection: kind.chunk_collection(),
            state: RwLock::new(MemoryState::default()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, MemoryState> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, MemoryState> {
        self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl ChunkStore for MemoryChunkStore {
    fn collection(&self) -> &str {
        self.collection
    }

    async fn insert_many(&self, chunks: Vec<ChunkRecord>) -> Result<usize> {
        let mut state = self.write();
        let inserted = chunks.len();

        for record in chunks {
            state.index(&record);
            state
                .by_owner
                .entry(record.owner_id.clone())
                .or_default()
                .push(record);
        }

        Ok(inserted)
    }

    async fn delete_by_owner(&self, owner_id: &str) -> Result<usize> {
        let mut state = self.write();
        let Some(records) = state.by_owner.remove(owner_id) else {
            return Ok(0);
        };

        for record in &records {
            state.unindex(record);
        }

        Ok(records.len())
    }

    async fn find_by_exact_word(&self, space: &str, word: &str) -> Result<Vec<ChunkRecord>> {
        let state = self.read();
        Ok(state.lookup(&state.exact_words, space, word, |record| {
            record.chunk.index.exact_words.iter().any(|w| w == word)
        }))
    }

    async fn find_by_skip_fragment(
        &self,
        space: &str,
        fragment: &str,
    ) -> Result<Vec<ChunkRecord>> {
        let state = self.read();
        Ok(state.lookup(&state.skip_fragments, space, fragment, |record| {
            record.chunk.index.skip_fragments.iter().any(|f| f == fragment)
        }))
    }

    async fn find_by_owner(&self, owner_id: &str) -> Result<Vec<ChunkRecord>> {
        let mut records = self
            .read()
            .by_owner
            .get(owner_id)
            .cloned()
            .unwrap_or_default();
        sort_records(&mut records);
        Ok(records)
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.read().by_owner.values().map(Vec::len).sum())
    }
}
