//! Ordered change feeds over source collections.
//!
//! A maintainer only needs two things from a feed: open a subscription
//! filtered to some operation kinds, then pull events one at a time in
//! commit order. Any backend that can promise per-document commit
//! ordering fits behind these traits.
//!
//! # Delivery
//!
//! - A subscription sees writes committed after it was opened. There is
//!   no resume position, so writes committed while nobody is subscribed
//!   are never delivered.
//! - Each event carries the complete post-write document.
//! - `next_event` returns `Ok(None)` once the feed is closed for good.
//! - A feed that cannot hold events for a slow subscriber reports the
//!   gap as `FeedLagged`. [`DocumentCollection`] never does: its writers
//!   wait instead.

mod collection;
mod mutation;

pub use collection::{CollectionSubscription, DocumentCollection};
pub use mutation::{Mutation, MutationOp};

use crate::core::error::Result;
use crate::core::types::{ChangeEvent, OperationKind};
use async_trait::async_trait;

/// Operation kinds a maintainer subscribes to
pub const WATCHED_OPERATIONS: [OperationKind; 2] = [OperationKind::Insert, OperationKind::Update];

/// A subscribable, commit-ordered stream of writes on one collection
#[async_trait]
pub trait ChangeFeed: Send + Sync {
    /// Collection name, for logging
    fn name(&self) -> &str;

    /// Open a subscription that only yields the given operation kinds.
    async fn subscribe(&self, operations: &[OperationKind]) -> Result<Box<dyn ChangeSubscription>>;
}

/// An open subscription on a [`ChangeFeed`]
#[async_trait]
pub trait ChangeSubscription: Send {
    /// Wait for the next event.
    ///
    /// Must be cancel safe: dropping the future before it completes
    /// loses no event that would otherwise have been returned.
    async fn next_event(&mut self) -> Result<Option<ChangeEvent>>;
}
