//! Supervised maintainer tasks.
//!
//! One tokio task per source kind. A task that fails fatally is
//! restarted after a delay; the others keep running. Shutdown cancels
//! a shared token and waits for every task to finish its in-flight
//! event.

use crate::core::error::SkipdexError;
use crate::core::feed::ChangeSubscription;
use crate::core::indexer::maintainer::{IndexMaintainer, MaintainerExit, MaintainerStats, StatsSnapshot};
use crate::core::types::SourceKind;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Handle on a set of running maintainers
pub struct Supervisor {
    shutdown: CancellationToken,
    tasks: Vec<(SourceKind, JoinHandle<()>)>,
    stats: BTreeMap<SourceKind, Arc<MaintainerStats>>,
}

impl Supervisor {
    /// Subscribe every maintainer, then spawn its task.
    ///
    /// Each maintainer gets one subscribe attempt here. When it
    /// succeeds, any write committed after this returns reaches that
    /// maintainer. When it fails, the task starts unsubscribed and keeps
    /// retrying on its own, so one unreachable feed never holds up the
    /// others.
    pub async fn start(maintainers: Vec<IndexMaintainer>, restart_delay: Duration) -> Self {
        let shutdown = CancellationToken::new();
        let mut tasks = Vec::with_capacity(maintainers.len());
        let mut stats = BTreeMap::new();

        for maintainer in maintainers {
            let kind = maintainer.kind();
            let initial = match maintainer.subscribe_once().await {
                Ok(subscription) => Some(subscription),
                // The task sees the closed feed itself and exits
                Err(SkipdexError::FeedClosed) => None,
                Err(e) => {
                    tracing::warn!(
                        source = %kind,
                        error = %e,
                        "Initial subscribe failed, retrying in the background"
                    );
                    None
                }
            };

            stats.insert(kind, maintainer.stats());
            let handle = tokio::spawn(supervise(
                maintainer,
                shutdown.clone(),
                restart_delay,
                initial,
            ));
            tasks.push((kind, handle));
        }

        tracing::info!("Started {} maintainer(s)", tasks.len());

        Self {
            shutdown,
            tasks,
            stats,
        }
    }

    /// Token that stops every maintainer when cancelled
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn kinds(&self) -> impl Iterator<Item = SourceKind> + '_ {
        self.tasks.iter().map(|(kind, _)| *kind)
    }

    /// Current counters of every maintainer
    pub fn stats(&self) -> BTreeMap<SourceKind, StatsSnapshot> {
        self.stats
            .iter()
            .map(|(kind, stats)| (*kind, stats.snapshot()))
            .collect()
    }

    /// Request shutdown and wait for every task.
    pub async fn shutdown(self) -> BTreeMap<SourceKind, StatsSnapshot> {
        tracing::info!("Shutting down maintainers");
        self.shutdown.cancel();
        self.join().await
    }

    /// Wait for every task to end on its own (feeds closed or shutdown
    /// requested through [`Supervisor::shutdown_token`]).
    pub async fn join(self) -> BTreeMap<SourceKind, StatsSnapshot> {
        for (kind, handle) in self.tasks {
            if let Err(e) = handle.await {
                tracing::error!(source = %kind, "Maintainer task aborted: {}", e);
            }
        }

        self.stats
            .iter()
            .map(|(kind, stats)| (*kind, stats.snapshot()))
            .collect()
    }
}

async fn supervise(
    maintainer: IndexMaintainer,
    shutdown: CancellationToken,
    restart_delay: Duration,
    mut initial: Option<Box<dyn ChangeSubscription>>,
) {
    let kind = maintainer.kind();

    loop {
        match maintainer.run(&shutdown, initial.take()).await {
            Ok(MaintainerExit::Shutdown) => {
                tracing::info!(source = %kind, "Maintainer stopped");
                return;
            }
            Ok(MaintainerExit::FeedClosed) => {
                tracing::info!(source = %kind, "Maintainer finished, feed closed");
                return;
            }
            Err(e) => {
                tracing::error!(
                    source = %kind,
                    error = %e,
                    "Maintainer failed, restarting in {:?}",
                    restart_delay
                );
            }
        }

        tokio::select! {
            biased;
            _ = shutdown.cancelled() => return,
            _ = tokio::time::sleep(restart_delay) => {}
        }

        maintainer.stats().record_restart();
    }
}
