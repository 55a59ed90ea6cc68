// Failure handling: fatal events, reconnects, store errors, shutdown

use crate::common::{
    event, fast_policy, file_doc, FlakyStore, GatedStore, ScriptedFeed, Step, SubscribeStep,
    UnreachableFeed,
};
use skipdex::core::feed::DocumentCollection;
use skipdex::core::indexer::{IndexMaintainer, MaintainerExit, Supervisor};
use skipdex::core::storage::{ChunkStore, MemoryChunkStore};
use skipdex::{OperationKind, SkipdexError, SourceDocument, SourceKind};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const TEST_TIMEOUT: Duration = Duration::from_secs(5);

fn scripted_maintainer(
    subscriptions: Vec<SubscribeStep>,
) -> (IndexMaintainer, Arc<ScriptedFeed>, Arc<MemoryChunkStore>) {
    let feed = Arc::new(ScriptedFeed::new(subscriptions));
    let store = Arc::new(MemoryChunkStore::new(SourceKind::File));
    let maintainer = IndexMaintainer::new(SourceKind::File, feed.clone(), store.clone())
        .with_policy(fast_policy());
    (maintainer, feed, store)
}

#[tokio::test]
async fn test_delete_event_is_fatal_and_task_restarts() {
    let (files, feed, file_store) = scripted_maintainer(vec![
        SubscribeStep::Open(vec![
            Step::Event(event(1, OperationKind::Insert, file_doc("f1", "cat"))),
            Step::Event(event(2, OperationKind::Delete, file_doc("f1", "cat"))),
        ]),
        SubscribeStep::Open(vec![
            Step::Event(event(3, OperationKind::Update, file_doc("f1", "dog"))),
            Step::End,
        ]),
    ]);

    // A healthy maintainer next to the failing one
    let threads_feed = Arc::new(DocumentCollection::new("threads", 16));
    let threads_store = Arc::new(MemoryChunkStore::new(SourceKind::Thread));
    let threads =
        IndexMaintainer::new(SourceKind::Thread, threads_feed.clone(), threads_store.clone());

    let supervisor = Supervisor::start(vec![files, threads], Duration::from_millis(10)).await;
    threads_feed
        .insert(SourceDocument::new("t1", "s1").with_field("text", "owl"))
        .await
        .unwrap();
    threads_feed.close();

    let stats = tokio::time::timeout(TEST_TIMEOUT, supervisor.join())
        .await
        .unwrap();

    let file_stats = stats[&SourceKind::File];
    assert_eq!(file_stats.restarts, 1);
    assert_eq!(file_stats.events_applied, 2);
    assert_eq!(file_stats.last_sequence, 3);
    assert_eq!(feed.subscribe_calls(), 2);

    let chunks = file_store.find_by_owner("f1").await.unwrap();
    assert_eq!(chunks[0].chunk.line_text, "dog");

    assert_eq!(stats[&SourceKind::Thread].restarts, 0);
    assert_eq!(threads_store.find_by_exact_word("s1", "owl").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_run_surfaces_fatal_error() {
    let (maintainer, _, _) = scripted_maintainer(vec![SubscribeStep::Open(vec![Step::Event(
        event(1, OperationKind::Delete, file_doc("f1", "x")),
    )])]);

    let err = maintainer
        .run(&CancellationToken::new(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, SkipdexError::UnexpectedOperation { .. }));
}

#[tokio::test]
async fn test_subscribe_failures_retry_with_backoff() {
    let (maintainer, feed, store) = scripted_maintainer(vec![
        SubscribeStep::Fail(SkipdexError::FeedDisconnected("refused".to_string())),
        SubscribeStep::Hang,
        SubscribeStep::Open(vec![
            Step::Event(event(1, OperationKind::Insert, file_doc("f1", "cat"))),
            Step::End,
        ]),
    ]);

    let exit = tokio::time::timeout(TEST_TIMEOUT, maintainer.run(&CancellationToken::new(), None))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(exit, MaintainerExit::FeedClosed);
    assert_eq!(feed.subscribe_calls(), 3);
    assert_eq!(maintainer.stats().snapshot().reconnects, 2);
    assert_eq!(store.count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_disconnect_mid_stream_resubscribes() {
    let (maintainer, feed, store) = scripted_maintainer(vec![
        SubscribeStep::Open(vec![
            Step::Event(event(1, OperationKind::Insert, file_doc("f1", "cat"))),
            Step::Fail(SkipdexError::FeedDisconnected("reset".to_string())),
        ]),
        SubscribeStep::Open(vec![
            Step::Event(event(5, OperationKind::Insert, file_doc("f2", "dog"))),
            Step::End,
        ]),
    ]);

    let exit = tokio::time::timeout(TEST_TIMEOUT, maintainer.run(&CancellationToken::new(), None))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(exit, MaintainerExit::FeedClosed);
    assert_eq!(feed.subscribe_calls(), 2);
    assert_eq!(maintainer.stats().snapshot().reconnects, 1);
    assert_eq!(store.count().await.unwrap(), 2);
}

#[tokio::test]
async fn test_lag_keeps_the_subscription() {
    let (maintainer, feed, store) = scripted_maintainer(vec![SubscribeStep::Open(vec![
        Step::Event(event(1, OperationKind::Insert, file_doc("f1", "cat"))),
        Step::Fail(SkipdexError::FeedLagged(7)),
        Step::Event(event(9, OperationKind::Insert, file_doc("f2", "dog"))),
        Step::End,
    ])]);

    let exit = maintainer.run(&CancellationToken::new(), None).await.unwrap();

    assert_eq!(exit, MaintainerExit::FeedClosed);
    assert_eq!(feed.subscribe_calls(), 1);
    assert_eq!(maintainer.stats().snapshot().lagged_events, 7);
    assert_eq!(store.count().await.unwrap(), 2);
}

#[tokio::test]
async fn test_unreachable_feed_does_not_block_other_maintainers() {
    let down_feed = Arc::new(UnreachableFeed::new());
    let down = IndexMaintainer::new(
        SourceKind::File,
        down_feed.clone(),
        Arc::new(MemoryChunkStore::new(SourceKind::File)),
    )
    .with_policy(fast_policy());

    let threads_feed = Arc::new(DocumentCollection::new("threads", 16));
    let threads_store = Arc::new(MemoryChunkStore::new(SourceKind::Thread));
    let threads =
        IndexMaintainer::new(SourceKind::Thread, threads_feed.clone(), threads_store.clone());

    let supervisor = tokio::time::timeout(
        TEST_TIMEOUT,
        Supervisor::start(vec![down, threads], Duration::from_millis(10)),
    )
    .await
    .unwrap();

    threads_feed
        .insert(SourceDocument::new("t1", "s1").with_field("text", "owl"))
        .await
        .unwrap();

    // The healthy maintainer indexes while the other keeps retrying
    let mut indexed = false;
    for _ in 0..100 {
        if threads_store.count().await.unwrap() == 1 {
            indexed = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(indexed);

    let stats = tokio::time::timeout(TEST_TIMEOUT, supervisor.shutdown())
        .await
        .unwrap();
    assert_eq!(stats[&SourceKind::Thread].events_applied, 1);
    assert!(stats[&SourceKind::File].reconnects >= 1);
    assert!(down_feed.subscribe_calls() >= 2);
}

#[tokio::test]
async fn test_closed_feed_ends_without_restart() {
    let (maintainer, _, _) = scripted_maintainer(Vec::new());
    let stats = maintainer.stats();

    let supervisor = Supervisor::start(vec![maintainer], Duration::from_millis(10)).await;
    tokio::time::timeout(TEST_TIMEOUT, supervisor.join()).await.unwrap();

    assert_eq!(stats.snapshot().restarts, 0);
}

#[tokio::test]
async fn test_store_failure_heals_on_next_write() {
    let feed = Arc::new(DocumentCollection::new("files", 16));
    let store = Arc::new(FlakyStore::new(SourceKind::File));
    let maintainer = IndexMaintainer::new(SourceKind::File, feed.clone(), store.clone());
    let stats = maintainer.stats();
    let shutdown = CancellationToken::new();

    maintainer.reindex(&file_doc("f1", "old text")).await.unwrap();
    let subscription = maintainer.connect(&shutdown).await.unwrap();

    feed.insert(file_doc("f1", "cat")).await.unwrap();
    store.fail_next_insert();
    feed.close();

    // The delete half succeeds, the insert half fails
    let exit = maintainer.run(&shutdown, subscription).await.unwrap();
    assert_eq!(exit, MaintainerExit::FeedClosed);
    assert_eq!(stats.snapshot().store_failures, 1);
    assert_eq!(stats.snapshot().chunks_removed, 1);
    assert!(store.find_by_owner("f1").await.unwrap().is_empty());

    // The next write for the owner repairs it
    maintainer.reindex(&file_doc("f1", "dog")).await.unwrap();
    assert_eq!(store.find_by_owner("f1").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_shutdown_while_idle() {
    let (maintainer, _, _) = scripted_maintainer(vec![SubscribeStep::Open(Vec::new())]);
    let maintainer = Arc::new(maintainer);
    let shutdown = CancellationToken::new();

    let task = {
        let maintainer = Arc::clone(&maintainer);
        let shutdown = shutdown.clone();
        tokio::spawn(async move { maintainer.run(&shutdown, None).await })
    };

    tokio::time::sleep(Duration::from_millis(20)).await;
    shutdown.cancel();

    let exit = tokio::time::timeout(TEST_TIMEOUT, task)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(exit, MaintainerExit::Shutdown);
}

#[tokio::test]
async fn test_shutdown_while_subscribing() {
    let (maintainer, _, _) = scripted_maintainer(vec![SubscribeStep::Hang]);
    let shutdown = CancellationToken::new();

    let cancel = shutdown.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();
    });

    let subscription = tokio::time::timeout(TEST_TIMEOUT, maintainer.connect(&shutdown))
        .await
        .unwrap()
        .unwrap();
    assert!(subscription.is_none());
}

#[tokio::test]
async fn test_shutdown_finishes_in_flight_event() {
    let feed = Arc::new(DocumentCollection::new("files", 16));
    let store = Arc::new(GatedStore::new(SourceKind::File, Duration::from_millis(100)));
    let maintainer = IndexMaintainer::new(SourceKind::File, feed.clone(), store.clone());

    let supervisor = Supervisor::start(vec![maintainer], Duration::from_millis(10)).await;
    feed.insert(file_doc("f1", "cat\ndog")).await.unwrap();

    // Cancel once the delete half of the pair has started
    store.delete_started.notified().await;
    let stats = tokio::time::timeout(TEST_TIMEOUT, supervisor.shutdown())
        .await
        .unwrap();

    assert_eq!(stats[&SourceKind::File].events_applied, 1);
    assert_eq!(store.count().await.unwrap(), 2);
}
