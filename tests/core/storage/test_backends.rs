// Lookup behavior shared by the memory and tantivy chunk stores

use skipdex::core::config::{StorageBackend, StorageConfig};
use skipdex::core::indexer::compute_text_chunks;
use skipdex::core::storage::{open_chunk_store, ChunkStore, MemoryChunkStore, TantivyChunkStore};
use skipdex::{ChunkRecord, SourceKind};
use tempfile::TempDir;

const HEAP: usize = 15_000_000;

fn backends(kind: SourceKind) -> Vec<(&'static str, Box<dyn ChunkStore>)> {
    vec![
        ("memory", Box::new(MemoryChunkStore::new(kind))),
        (
            "tantivy",
            Box::new(TantivyChunkStore::in_ram(kind, HEAP).unwrap()),
        ),
    ]
}

fn records(owner: &str, space: &str, text: &str) -> Vec<ChunkRecord> {
    compute_text_chunks(text)
        .map(|chunk| ChunkRecord::new(owner, space, chunk))
        .collect()
}

fn keys(records: &[ChunkRecord]) -> Vec<(String, usize)> {
    records
        .iter()
        .map(|r| (r.owner_id.clone(), r.chunk.line_number))
        .collect()
}

#[tokio::test]
async fn test_lookups_are_scoped_deduplicated_and_ordered() {
    for (name, store) in backends(SourceKind::File) {
        store
            .insert_many(records("f2", "s1", "cat cat\nsearching cats"))
            .await
            .unwrap();
        store
            .insert_many(records("f1", "s1", "nothing\nthe cat"))
            .await
            .unwrap();
        store.insert_many(records("f3", "s2", "cat")).await.unwrap();

        let hits = store.find_by_exact_word("s1", "cat").await.unwrap();
        assert_eq!(
            keys(&hits),
            vec![("f1".to_string(), 1), ("f2".to_string(), 0)],
            "{name}"
        );

        let fuzzy = store.find_by_skip_fragment("s1", "earch").await.unwrap();
        assert_eq!(keys(&fuzzy), vec![("f2".to_string(), 1)], "{name}");

        assert!(store.find_by_exact_word("s3", "cat").await.unwrap().is_empty(), "{name}");
    }
}

#[tokio::test]
async fn test_delete_by_owner_only_touches_that_owner() {
    for (name, store) in backends(SourceKind::Thread) {
        store.insert_many(records("t1", "s1", "cat\ndog")).await.unwrap();
        store.insert_many(records("t2", "s1", "cat")).await.unwrap();

        assert_eq!(store.delete_by_owner("t1").await.unwrap(), 2, "{name}");
        assert_eq!(store.delete_by_owner("missing").await.unwrap(), 0, "{name}");

        assert_eq!(store.count().await.unwrap(), 1, "{name}");
        let hits = store.find_by_exact_word("s1", "cat").await.unwrap();
        assert_eq!(keys(&hits), vec![("t2".to_string(), 0)], "{name}");
    }
}

#[tokio::test]
async fn test_find_by_owner_returns_records_as_written() {
    for (name, store) in backends(SourceKind::ChatMessage) {
        let written = records("m1", "s1", "Hello there\n\nGeneral Kenobi");
        store.insert_many(written.clone()).await.unwrap();

        assert_eq!(store.find_by_owner("m1").await.unwrap(), written, "{name}");
        assert_eq!(store.collection(), "chat-message-chunks", "{name}");
    }
}

#[tokio::test]
async fn test_open_chunk_store_picks_backend() {
    let temp_dir = TempDir::new().unwrap();
    let mut config = StorageConfig {
        backend: StorageBackend::Memory,
        index_dir: temp_dir.path().to_path_buf(),
        writer_heap_mb: 15,
    };

    let memory = open_chunk_store(SourceKind::Folder, &config).unwrap();
    assert_eq!(memory.collection(), "folder-chunks");
    assert!(!temp_dir.path().join("folder-chunks").exists());

    config.backend = StorageBackend::Tantivy;
    let tantivy = open_chunk_store(SourceKind::Folder, &config).unwrap();
    tantivy.insert_many(records("d1", "s1", "Reports")).await.unwrap();
    assert!(temp_dir.path().join("folder-chunks").is_dir());
    assert_eq!(tantivy.count().await.unwrap(), 1);
}
