//! Unified service container for skipdex
//!
//! Owns the source collections and chunk stores of every enabled
//! source kind and builds the maintainers that connect them.

use crate::core::config::Config;
use crate::core::error::{Result, SkipdexError};
use crate::core::feed::DocumentCollection;
use crate::core::indexer::{IndexMaintainer, ReconnectPolicy, Supervisor};
use crate::core::storage::{open_chunk_store, ChunkStore};
use crate::core::types::SourceKind;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Unified services container
#[derive(Clone)]
pub struct Services {
    /// Application configuration
    pub config: Arc<Config>,

    /// Source collection (and its change feed) per enabled kind
    pub sources: BTreeMap<SourceKind, Arc<DocumentCollection>>,

    /// Chunk store per enabled kind
    pub stores: BTreeMap<SourceKind, Arc<dyn ChunkStore>>,
}

impl Services {
    /// Create services from configuration
    pub fn new(config: Config) -> Result<Self> {
        let mut sources = BTreeMap::new();
        let mut stores = BTreeMap::new();

        for &kind in &config.maintainers.sources {
            sources.insert(
                kind,
                Arc::new(DocumentCollection::new(
                    kind.source_collection(),
                    config.feed.channel_capacity,
                )),
            );
            stores.insert(kind, open_chunk_store(kind, &config.storage)?);
        }

        Ok(Self {
            config: Arc::new(config),
            sources,
            stores,
        })
    }

    /// Source collection of an enabled kind
    pub fn source(&self, kind: SourceKind) -> Result<&Arc<DocumentCollection>> {
        self.sources
            .get(&kind)
            .ok_or_else(|| SkipdexError::UnknownSource(format!("{kind} is not enabled")))
    }

    /// Chunk store of an enabled kind
    pub fn store(&self, kind: SourceKind) -> Result<&Arc<dyn ChunkStore>> {
        self.stores
            .get(&kind)
            .ok_or_else(|| SkipdexError::UnknownSource(format!("{kind} is not enabled")))
    }

    /// One maintainer per enabled kind, wired to its feed and store
    pub fn maintainers(&self) -> Vec<IndexMaintainer> {
        let policy = ReconnectPolicy::from(&self.config.feed);

        self.sources
            .iter()
            .filter_map(|(kind, source)| {
                let store = self.stores.get(kind)?;
                Some(
                    IndexMaintainer::new(*kind, source.clone(), Arc::clone(store))
                        .with_policy(policy),
                )
            })
            .collect()
    }

    /// Start every maintainer under a supervisor
    pub async fn start_maintainers(&self) -> Supervisor {
        let restart_delay = Duration::from_millis(self.config.maintainers.restart_delay_ms);
        Supervisor::start(self.maintainers(), restart_delay).await
    }

    /// Close every source feed; maintainers drain and exit
    pub fn close_sources(&self) {
        for source in self.sources.values() {
            source.close();
        }
    }
}
