// Test fixtures: scripted change feeds and misbehaving chunk stores

use async_trait::async_trait;
use skipdex::core::feed::{ChangeFeed, ChangeSubscription};
use skipdex::core::storage::{ChunkStore, MemoryChunkStore};
use skipdex::{ChangeEvent, ChunkRecord, OperationKind, Result, SkipdexError, SourceKind};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::Notify;

/// One item a scripted subscription yields
#[allow(dead_code)] // Used in integration tests
pub enum Step {
    Event(ChangeEvent),
    Fail(SkipdexError),
    End,
}

/// Outcome of one subscribe call
#[allow(dead_code)] // Used in integration tests
pub enum SubscribeStep {
    Open(Vec<Step>),
    Fail(SkipdexError),
    /// Never completes
    Hang,
}

/// Change feed that replays a fixed script.
///
/// Ignores the operation filter, so it can deliver deletes. Once the
/// script runs out, subscribing fails with `FeedClosed`; once a
/// subscription runs out of steps it waits forever.
pub struct ScriptedFeed {
    subscriptions: Mutex<VecDeque<SubscribeStep>>,
    subscribe_calls: AtomicUsize,
}

#[allow(dead_code)] // Used in integration tests
impl ScriptedFeed {
    pub fn new(subscriptions: Vec<SubscribeStep>) -> Self {
        Self {
            subscriptions: Mutex::new(subscriptions.into()),
            subscribe_calls: AtomicUsize::new(0),
        }
    }

    pub fn subscribe_calls(&self) -> usize {
        self.subscribe_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChangeFeed for ScriptedFeed {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn subscribe(&self, _operations: &[OperationKind]) -> Result<Box<dyn ChangeSubscription>> {
        self.subscribe_calls.fetch_add(1, Ordering::SeqCst);
        let next = self.subscriptions.lock().unwrap().pop_front();

        match next {
            Some(SubscribeStep::Open(steps)) => Ok(Box::new(ScriptedSubscription {
                steps: steps.into(),
            })),
            Some(SubscribeStep::Fail(e)) => Err(e),
            Some(SubscribeStep::Hang) => {
                std::future::pending::<()>().await;
                Err(SkipdexError::FeedClosed)
            }
            None => Err(SkipdexError::FeedClosed),
        }
    }
}

struct ScriptedSubscription {
    steps: VecDeque<Step>,
}

#[async_trait]
impl ChangeSubscription for ScriptedSubscription {
    async fn next_event(&mut self) -> Result<Option<ChangeEvent>> {
        match self.steps.pop_front() {
            Some(Step::Event(event)) => Ok(Some(event)),
            Some(Step::Fail(e)) => Err(e),
            Some(Step::End) => Ok(None),
            None => {
                std::future::pending::<()>().await;
                Ok(None)
            }
        }
    }
}

/// Change feed that refuses every subscription
pub struct UnreachableFeed {
    subscribe_calls: AtomicUsize,
}

#[allow(dead_code)] // Used in integration tests
impl UnreachableFeed {
    pub fn new() -> Self {
        Self {
            subscribe_calls: AtomicUsize::new(0),
        }
    }

    pub fn subscribe_calls(&self) -> usize {
        self.subscribe_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChangeFeed for UnreachableFeed {
    fn name(&self) -> &str {
        "unreachable"
    }

    async fn subscribe(&self, _operations: &[OperationKind]) -> Result<Box<dyn ChangeSubscription>> {
        self.subscribe_calls.fetch_add(1, Ordering::SeqCst);
        Err(SkipdexError::FeedDisconnected("connection refused".to_string()))
    }
}

/// Memory store whose next insert can be made to fail
pub struct FlakyStore {
    inner: MemoryChunkStore,
    fail_next_insert: AtomicBool,
}

#[allow(dead_code)] // Used in integration tests
impl FlakyStore {
    pub fn new(kind: SourceKind) -> Self {
        Self {
            inner: MemoryChunkStore::new(kind),
            fail_next_insert: AtomicBool::new(false),
        }
    }

    pub fn fail_next_insert(&self) {
        self.fail_next_insert.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl ChunkStore for FlakyStore {
    fn collection(&self) -> &str {
        self.inner.collection()
    }

    async fn insert_many(&self, chunks: Vec<ChunkRecord>) -> Result<usize> {
        if self.fail_next_insert.swap(false, Ordering::SeqCst) {
            return Err(SkipdexError::StorageError("insert rejected".to_string()));
        }
        self.inner.insert_many(chunks).await
    }

    async fn delete_by_owner(&self, owner_id: &str) -> Result<usize> {
        self.inner.delete_by_owner(owner_id).await
    }

    async fn find_by_exact_word(&self, space: &str, word: &str) -> Result<Vec<ChunkRecord>> {
        self.inner.find_by_exact_word(space, word).await
    }

    async fn find_by_skip_fragment(&self, space: &str, fragment: &str) -> Result<Vec<ChunkRecord>> {
        self.inner.find_by_skip_fragment(space, fragment).await
    }

    async fn find_by_owner(&self, owner_id: &str) -> Result<Vec<ChunkRecord>> {
        self.inner.find_by_owner(owner_id).await
    }

    async fn count(&self) -> Result<usize> {
        self.inner.count().await
    }
}

/// Memory store that signals when a delete starts and inserts slowly
pub struct GatedStore {
    inner: MemoryChunkStore,
    pub delete_started: Notify,
    insert_delay: Duration,
}

#[allow(dead_code)] // Used in integration tests
impl GatedStore {
    pub fn new(kind: SourceKind, insert_delay: Duration) -> Self {
        Self {
            inner: MemoryChunkStore::new(kind),
            delete_started: Notify::new(),
            insert_delay,
        }
    }
}

#[async_trait]
impl ChunkStore for GatedStore {
    fn collection(&self) -> &str {
        self.inner.collection()
    }

    async fn insert_many(&self, chunks: Vec<ChunkRecord>) -> Result<usize> {
        tokio::time::sleep(self.insert_delay).await;
        self.inner.insert_many(chunks).await
    }

    async fn delete_by_owner(&self, owner_id: &str) -> Result<usize> {
        self.delete_started.notify_one();
        self.inner.delete_by_owner(owner_id).await
    }

    async fn find_by_exact_word(&self, space: &str, word: &str) -> Result<Vec<ChunkRecord>> {
        self.inner.find_by_exact_word(space, word).await
    }

    async fn find_by_skip_fragment(&self, space: &str, fragment: &str) -> Result<Vec<ChunkRecord>> {
        self.inner.find_by_skip_fragment(space, fragment).await
    }

    async fn find_by_owner(&self, owner_id: &str) -> Result<Vec<ChunkRecord>> {
        self.inner.find_by_owner(owner_id).await
    }

    async fn count(&self) -> Result<usize> {
        self.inner.count().await
    }
}
