//! In-process source collection with a built-in change feed.
//!
//! Stands in for the workspace's document database: the CRUD layer
//! writes through it, and every committed write is published to the
//! collection's subscribers before the write returns.
//!
//! Each subscriber gets its own bounded queue. A writer waits while any
//! live subscriber's queue is full, so a slow maintainer slows the
//! writers down instead of missing events. Commit and publish happen
//! under one writer lock, so feed order always equals commit order.

use crate::core::error::{Result, SkipdexError};
use crate::core::feed::{ChangeFeed, ChangeSubscription};
use crate::core::types::{ChangeEvent, OperationKind, SourceDocument};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::mpsc;

/// A named collection of source documents
pub struct DocumentCollection {
    name: String,

    /// Queue length of each subscription
    capacity: usize,

    state: Mutex<CollectionState>,

    /// Held from commit until every subscriber has the event
    writer: tokio::sync::Mutex<()>,
}

struct CollectionState {
    documents: HashMap<String, SourceDocument>,

    /// Sequence number of the last committed write
    sequence: u64,

    /// `None` once the feed has been closed
    subscribers: Option<Vec<Subscriber>>,
}

struct Subscriber {
    operations: Vec<OperationKind>,
    sender: mpsc::Sender<ChangeEvent>,
}

/// A committed write and the queues it still has to reach
struct Pending {
    event: ChangeEvent,
    targets: Vec<mpsc::Sender<ChangeEvent>>,
}

impl CollectionState {
    fn commit(
        &mut self,
        operation: OperationKind,
        document_id: &str,
        full_document: Option<SourceDocument>,
    ) -> Pending {
        self.sequence += 1;

        let targets = match self.subscribers.as_mut() {
            Some(subscribers) => {
                subscribers.retain(|s| !s.sender.is_closed());
                subscribers
                    .iter()
                    .filter(|s| s.operations.contains(&operation))
                    .map(|s| s.sender.clone())
                    .collect()
            }
            None => Vec::new(),
        };

        Pending {
            event: ChangeEvent {
                sequence: self.sequence,
                operation,
                document_id: document_id.to_string(),
                full_document,
            },
            targets,
        }
    }
}

impl Pending {
    /// Deliver to every target, waiting for queue space
    async fn publish(self) -> u64 {
        let sequence = self.event.sequence;
        for sender in self.targets {
            // A subscription dropped meanwhile just stops receiving
            let _ = sender.send(self.event.clone()).await;
        }
        sequence
    }
}

impl std::fmt::Debug for DocumentCollection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentCollection")
            .field("name", &self.name)
            .field("len", &self.len())
            .finish()
    }
}

impl DocumentCollection {
    /// Create an empty collection.
    ///
    /// `capacity` is how many events a subscriber may have queued
    /// before writers wait for it.
    pub fn new(name: impl Into<String>, capacity: usize) -> Self {
        Self {
            name: name.into(),
            capacity: capacity.max(1),
            state: Mutex::new(CollectionState {
                documents: HashMap::new(),
                sequence: 0,
                subscribers: Some(Vec::new()),
            }),
            writer: tokio::sync::Mutex::new(()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CollectionState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Insert a new document, returning its commit sequence
    pub async fn insert(&self, document: SourceDocument) -> Result<u64> {
        let _writer = self.writer.lock().await;

        let pending = {
            let mut state = self.lock();
            if state.documents.contains_key(&document.id) {
                return Err(SkipdexError::DuplicateDocument(document.id));
            }

            let id = document.id.clone();
            state.documents.insert(id.clone(), document.clone());
            state.commit(OperationKind::Insert, &id, Some(document))
        };

        Ok(pending.publish().await)
    }

    /// Apply a `$set`-style update, returning its commit sequence.
    ///
    /// The published event carries the whole updated document.
    pub async fn update(&self, id: &str, set: Map<String, Value>) -> Result<u64> {
        let _writer = self.writer.lock().await;

        let pending = {
            let mut state = self.lock();

            // Applied to a copy so a rejected update leaves no partial write
            let mut updated = state
                .documents
                .get(id)
                .cloned()
                .ok_or_else(|| SkipdexError::DocumentNotFound(id.to_string()))?;
            updated.apply_set(set)?;
            state.documents.insert(id.to_string(), updated.clone());
            state.commit(OperationKind::Update, id, Some(updated))
        };

        Ok(pending.publish().await)
    }

    /// Delete a document, returning its commit sequence
    pub async fn delete(&self, id: &str) -> Result<u64> {
        let _writer = self.writer.lock().await;

        let pending = {
            let mut state = self.lock();
            if state.documents.remove(id).is_none() {
                return Err(SkipdexError::DocumentNotFound(id.to_string()));
            }
            state.commit(OperationKind::Delete, id, None)
        };

        Ok(pending.publish().await)
    }

    pub fn get(&self, id: &str) -> Option<SourceDocument> {
        self.lock().documents.get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sequence number of the last committed write (0 before any)
    pub fn last_sequence(&self) -> u64 {
        self.lock().sequence
    }

    /// Close the change feed.
    ///
    /// Subscribers drain what was already published, then see the end
    /// of the feed. Later writes still commit but are not published.
    pub fn close(&self) {
        if self.lock().subscribers.take().is_some() {
            tracing::debug!("Closed change feed for '{}'", self.name);
        }
    }

    pub fn is_closed(&self) -> bool {
        self.lock().subscribers.is_none()
    }
}

#[async_trait]
impl ChangeFeed for DocumentCollection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn subscribe(&self, operations: &[OperationKind]) -> Result<Box<dyn ChangeSubscription>> {
        let mut state = self.lock();
        let subscribers = state.subscribers.as_mut().ok_or(SkipdexError::FeedClosed)?;

        let (sender, receiver) = mpsc::channel(self.capacity);
        subscribers.push(Subscriber {
            operations: operations.to_vec(),
            sender,
        });

        Ok(Box::new(CollectionSubscription { receiver }))
    }
}

/// Subscription handed out by [`DocumentCollection`]
pub struct CollectionSubscription {
    receiver: mpsc::Receiver<ChangeEvent>,
}

#[async_trait]
impl ChangeSubscription for CollectionSubscription {
    async fn next_event(&mut self) -> Result<Option<ChangeEvent>> {
        Ok(self.receiver.recv().await)
    }
}
