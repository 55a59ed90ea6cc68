//! Index maintainer: keeps one chunk collection consistent with one
//! source collection by consuming its change feed.
//!
//! Every insert or update event carries the full post-write document.
//! The maintainer recomputes that document's chunks from scratch,
//! deletes every chunk the owner had, then inserts the new set. Events
//! are handled one at a time in feed order, so two writes to the same
//! document are applied in commit order.
//!
//! The delete/insert pair is not atomic. A store failure between the
//! two leaves the owner with no chunks until its next write.

use crate::core::config::FeedConfig;
use crate::core::error::{Result, SkipdexError};
use crate::core::feed::{ChangeFeed, ChangeSubscription, WATCHED_OPERATIONS};
use crate::core::indexer::chunker::compute_text_chunks;
use crate::core::storage::ChunkStore;
use crate::core::types::{ChangeEvent, ChunkRecord, OperationKind, SourceDocument, SourceKind};
use serde::Serialize;
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Subscribe timeout and reconnect backoff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub subscribe_timeout: Duration,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl ReconnectPolicy {
    /// Delay before retry number `attempt` (0-based): doubles each
    /// time, capped at `max_delay`.
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.initial_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

impl From<&FeedConfig> for ReconnectPolicy {
    fn from(config: &FeedConfig) -> Self {
        Self {
            subscribe_timeout: Duration::from_millis(config.subscribe_timeout_ms),
            initial_delay: Duration::from_millis(config.reconnect_initial_ms),
            max_delay: Duration::from_millis(config.reconnect_max_ms),
        }
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::from(&FeedConfig::default())
    }
}

/// Live counters for one maintainer
#[derive(Debug, Default)]
pub struct MaintainerStats {
    events_applied: AtomicU64,
    chunks_written: AtomicU64,
    chunks_removed: AtomicU64,
    store_failures: AtomicU64,
    invalid_documents: AtomicU64,
    reconnects: AtomicU64,
    lagged_events: AtomicU64,
    restarts: AtomicU64,
    last_sequence: AtomicU64,
}

/// Point-in-time copy of [`MaintainerStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub events_applied: u64,
    pub chunks_written: u64,
    pub chunks_removed: u64,
    pub store_failures: u64,
    pub invalid_documents: u64,
    pub reconnects: u64,
    /// Events the feed reported as dropped before delivery
    pub lagged_events: u64,
    pub restarts: u64,
    pub last_sequence: u64,
}

impl MaintainerStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            events_applied: self.events_applied.load(Ordering::Relaxed),
            chunks_written: self.chunks_written.load(Ordering::Relaxed),
            chunks_removed: self.chunks_removed.load(Ordering::Relaxed),
            store_failures: self.store_failures.load(Ordering::Relaxed),
            invalid_documents: self.invalid_documents.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
            lagged_events: self.lagged_events.load(Ordering::Relaxed),
            restarts: self.restarts.load(Ordering::Relaxed),
            last_sequence: self.last_sequence.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn record_restart(&self) {
        self.restarts.fetch_add(1, Ordering::Relaxed);
    }

    fn add(counter: &AtomicU64, n: usize) {
        counter.fetch_add(n as u64, Ordering::Relaxed);
    }
}

/// What one re-index did to the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReindexOutcome {
    pub removed: usize,
    pub written: usize,
}

/// Why [`IndexMaintainer::run`] returned without an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaintainerExit {
    /// Cancellation was requested
    Shutdown,
    /// The feed ended for good
    FeedClosed,
}

/// One maintainer instance, parameterized by source kind.
pub struct IndexMaintainer {
    kind: SourceKind,
    feed: Arc<dyn ChangeFeed>,
    store: Arc<dyn ChunkStore>,
    policy: ReconnectPolicy,
    stats: Arc<MaintainerStats>,
}

impl IndexMaintainer {
    pub fn new(kind: SourceKind, feed: Arc<dyn ChangeFeed>, store: Arc<dyn ChunkStore>) -> Self {
        Self {
            kind,
            feed,
            store,
            policy: ReconnectPolicy::default(),
            stats: Arc::new(MaintainerStats::default()),
        }
    }

    pub fn with_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    pub fn stats(&self) -> Arc<MaintainerStats> {
        Arc::clone(&self.stats)
    }

    /// Replace every chunk of `document` with chunks computed from its
    /// current text.
    pub async fn reindex(&self, document: &SourceDocument) -> Result<ReindexOutcome> {
        let text = document.text(self.kind.text_field())?;
        let chunks: Vec<ChunkRecord> = compute_text_chunks(text)
            .map(|chunk| ChunkRecord::new(&document.id, &document.space, chunk))
            .collect();

        let removed = self.store.delete_by_owner(&document.id).await?;
        MaintainerStats::add(&self.stats.chunks_removed, removed);

        let written = self.store.insert_many(chunks).await?;
        MaintainerStats::add(&self.stats.chunks_written, written);

        Ok(ReindexOutcome { removed, written })
    }

    /// Apply one feed event.
    ///
    /// Only inserts and updates are expected. Anything else means the
    /// feed ignored its filter and is returned as a fatal error.
    pub async fn apply_event(&self, event: ChangeEvent) -> Result<ReindexOutcome> {
        match event.operation {
            OperationKind::Insert | OperationKind::Update => {}
            other => {
                return Err(SkipdexError::UnexpectedOperation {
                    source_kind: self.kind.to_string(),
                    operation: other.to_string(),
                })
            }
        }

        let document = event.full_document.ok_or_else(|| {
            SkipdexError::InvalidDocument(format!(
                "{}: {} event carries no document",
                event.document_id, event.operation
            ))
        })?;

        let outcome = self.reindex(&document).await?;
        self.stats.events_applied.fetch_add(1, Ordering::Relaxed);
        Ok(outcome)
    }

    /// One subscribe attempt, bounded by the subscribe timeout
    pub async fn subscribe_once(&self) -> Result<Box<dyn ChangeSubscription>> {
        tokio::time::timeout(
            self.policy.subscribe_timeout,
            self.feed.subscribe(&WATCHED_OPERATIONS),
        )
        .await
        .unwrap_or_else(|_| {
            Err(SkipdexError::Timeout(format!(
                "subscribing to {}",
                self.feed.name()
            )))
        })
    }

    /// Subscribe to the feed, retrying with backoff.
    ///
    /// Returns `Ok(None)` if cancellation is requested first and
    /// `Err(FeedClosed)` if the feed will never accept a subscription.
    pub async fn connect(
        &self,
        shutdown: &CancellationToken,
    ) -> Result<Option<Box<dyn ChangeSubscription>>> {
        let mut attempt = 0u32;

        loop {
            let result = tokio::select! {
                biased;
                _ = shutdown.cancelled() => return Ok(None),
                result = self.subscribe_once() => result,
            };

            match result {
                Ok(subscription) => {
                    if attempt > 0 {
                        tracing::info!(
                            source = %self.kind,
                            attempts = attempt + 1,
                            "Resubscribed to {}",
                            self.feed.name()
                        );
                    }
                    return Ok(Some(subscription));
                }
                Err(SkipdexError::FeedClosed) => return Err(SkipdexError::FeedClosed),
                Err(e) => {
                    let delay = self.policy.delay(attempt);
                    tracing::warn!(
                        source = %self.kind,
                        error = %e,
                        "Subscribe failed, retrying in {:?}",
                        delay
                    );
                    attempt = attempt.saturating_add(1);
                    self.stats.reconnects.fetch_add(1, Ordering::Relaxed);

                    tokio::select! {
                        biased;
                        _ = shutdown.cancelled() => return Ok(None),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }

    /// Consume the feed until shutdown, feed close, or a fatal error.
    ///
    /// `initial` is an already open subscription; without one the
    /// maintainer connects first. Cancellation is only observed while
    /// waiting for an event or backing off, so a delete/insert pair
    /// that has started always finishes.
    pub async fn run(
        &self,
        shutdown: &CancellationToken,
        initial: Option<Box<dyn ChangeSubscription>>,
    ) -> Result<MaintainerExit> {
        let mut subscription = match initial {
            Some(subscription) => subscription,
            None => match self.open(shutdown).await? {
                ControlFlow::Continue(subscription) => subscription,
                ControlFlow::Break(exit) => return Ok(exit),
            },
        };

        tracing::info!(
            source = %self.kind,
            "Maintaining {} from {}",
            self.store.collection(),
            self.feed.name()
        );

        loop {
            let next = tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    tracing::info!(source = %self.kind, "Maintainer stopping");
                    return Ok(MaintainerExit::Shutdown);
                }
                next = subscription.next_event() => next,
            };

            match next {
                Ok(Some(event)) => self.handle_event(event).await?,
                Ok(None) => {
                    tracing::info!(source = %self.kind, "Change feed closed");
                    return Ok(MaintainerExit::FeedClosed);
                }
                Err(SkipdexError::FeedLagged(missed)) => {
                    // The subscription is still usable; the missed
                    // documents heal on their next write.
                    self.stats.lagged_events.fetch_add(missed, Ordering::Relaxed);
                    tracing::warn!(
                        source = %self.kind,
                        missed,
                        "Fell behind the change feed, events were lost"
                    );
                }
                Err(e) if e.is_transient() => {
                    tracing::warn!(source = %self.kind, error = %e, "Change feed failed, reconnecting");
                    self.stats.reconnects.fetch_add(1, Ordering::Relaxed);
                    drop(subscription);
                    subscription = match self.open(shutdown).await? {
                        ControlFlow::Continue(subscription) => subscription,
                        ControlFlow::Break(exit) => return Ok(exit),
                    };
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn open(
        &self,
        shutdown: &CancellationToken,
    ) -> Result<ControlFlow<MaintainerExit, Box<dyn ChangeSubscription>>> {
        match self.connect(shutdown).await {
            Ok(Some(subscription)) => Ok(ControlFlow::Continue(subscription)),
            Ok(None) => Ok(ControlFlow::Break(MaintainerExit::Shutdown)),
            Err(SkipdexError::FeedClosed) => Ok(ControlFlow::Break(MaintainerExit::FeedClosed)),
            Err(e) => Err(e),
        }
    }

    /// Apply one event, containing every error except fatal ones.
    async fn handle_event(&self, event: ChangeEvent) -> Result<()> {
        let sequence = event.sequence;
        let document_id = event.document_id.clone();
        self.stats.last_sequence.store(sequence, Ordering::Relaxed);

        match self.apply_event(event).await {
            Ok(outcome) => {
                tracing::debug!(
                    source = %self.kind,
                    document = %document_id,
                    sequence,
                    removed = outcome.removed,
                    written = outcome.written,
                    "Reindexed"
                );
            }
            Err(e) if e.is_fatal() => {
                tracing::error!(
                    source = %self.kind,
                    document = %document_id,
                    sequence,
                    error = %e,
                    "Unexpected event on change feed"
                );
                return Err(e);
            }
            Err(SkipdexError::InvalidDocument(reason)) => {
                self.stats.invalid_documents.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    source = %self.kind,
                    document = %document_id,
                    sequence,
                    "Skipping invalid document: {}",
                    reason
                );
            }
            Err(e) => {
                self.stats.store_failures.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    source = %self.kind,
                    document = %document_id,
                    sequence,
                    error = %e,
                    "Chunk store write failed"
                );
            }
        }

        Ok(())
    }
}
