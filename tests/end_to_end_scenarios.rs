// tests/end_to_end_scenarios.rs

mod common;
use crate::common::builders::{TrackerConfigBuilder, seed};
use crate::common::{init_tracing, reconciler, with_timeout};

use std::sync::Arc;

use resultstracker::engine::{SupervisorHandle, SupervisorOptions, TrackerStats};
use resultstracker::models::ExecutionStatus;
use resultstracker::queue::{MemoryStatusQueue, StatusMessage};
use resultstracker::store::MemoryExecutionStore;

use resultstracker_test_utils::fakes::RecordingDispatcher;

/// Publish `messages`, drain the queue once, return stats + dispatcher.
async fn drain(
    store: &MemoryExecutionStore,
    queue: &MemoryStatusQueue,
    messages: Vec<StatusMessage>,
) -> (TrackerStats, RecordingDispatcher) {
    init_tracing();
    for message in messages {
        queue.publish(message);
    }

    let (reconciler, dispatcher) = reconciler(store);
    let settings = TrackerConfigBuilder::new().settings();
    let handle = SupervisorHandle::start(
        reconciler,
        Arc::new(queue.clone()),
        &settings,
        SupervisorOptions {
            exit_when_idle: true,
        },
    );

    let stats = with_timeout(handle.join()).await.unwrap();
    (stats, dispatcher)
}

#[tokio::test]
async fn requested_to_running_updates_store_without_dispatch() {
    let store = MemoryExecutionStore::new();
    let queue = MemoryStatusQueue::new();
    seed(&store, "E1", ExecutionStatus::Requested);

    let msg = StatusMessage::new("E1", ExecutionStatus::Running);
    let (stats, dispatcher) = drain(&store, &queue, vec![msg.clone()]).await;

    let stored = store.snapshot("E1").unwrap();
    assert_eq!(stored.record.status, ExecutionStatus::Running);
    assert_eq!(stored.revision, 1);
    assert!(dispatcher.notified().is_empty());
    assert_eq!(queue.acked(), vec![msg.message_id]);
    assert_eq!(stats.applied, 1);
}

#[tokio::test]
async fn running_to_succeeded_persists_result_and_dispatches_once() {
    let store = MemoryExecutionStore::new();
    let queue = MemoryStatusQueue::new();
    seed(&store, "E1", ExecutionStatus::Running);

    let msg = StatusMessage::new("E1", ExecutionStatus::Succeeded).with_result("ok");
    let (stats, dispatcher) = drain(&store, &queue, vec![msg.clone()]).await;

    let record = store.snapshot("E1").unwrap().record;
    assert_eq!(record.status, ExecutionStatus::Succeeded);
    assert_eq!(record.result.as_deref(), Some("ok"));
    assert_eq!(record.end_timestamp, Some(msg.observed_at));

    let notified = dispatcher.notified();
    assert_eq!(notified.len(), 1);
    assert_eq!(notified[0], record);

    assert_eq!(queue.acked(), vec![msg.message_id]);
    assert_eq!(stats.acked, 1);
    assert_eq!(stats.dead_lettered, 0);
}

#[tokio::test]
async fn unknown_execution_is_dead_lettered_and_store_untouched() {
    let store = MemoryExecutionStore::new();
    let queue = MemoryStatusQueue::new();
    seed(&store, "E1", ExecutionStatus::Running);
    let before = store.snapshot("E1").unwrap();

    let msg = StatusMessage::new("E9", ExecutionStatus::Succeeded).with_result("ok");
    let (stats, dispatcher) = drain(&store, &queue, vec![msg.clone()]).await;

    let dead = queue.dead_letters();
    assert_eq!(dead.len(), 1);
    assert_eq!(dead[0].message, msg);
    assert!(dead[0].reason.starts_with("unknown_execution:"), "{}", dead[0].reason);
    assert!(queue.acked().is_empty());

    assert_eq!(store.len(), 1);
    assert_eq!(store.write_count(), 0);
    assert_eq!(store.snapshot("E1").unwrap(), before);
    assert!(dispatcher.notified().is_empty());
    assert_eq!(stats.dead_lettered, 1);
}

#[tokio::test]
async fn duplicate_terminal_update_is_acked_without_mutation() {
    let store = MemoryExecutionStore::new();
    let queue = MemoryStatusQueue::new();
    store.insert(
        crate::common::builders::ExecutionBuilder::new("E1")
            .status(ExecutionStatus::Succeeded)
            .result("ok")
            .build(),
    );
    let before = store.snapshot("E1").unwrap();

    let msg = StatusMessage::new("E1", ExecutionStatus::Succeeded).with_result("ok");
    let (stats, dispatcher) = drain(&store, &queue, vec![msg.clone()]).await;

    assert_eq!(store.snapshot("E1").unwrap(), before);
    assert_eq!(store.write_count(), 0);
    assert!(dispatcher.notified().is_empty());
    assert_eq!(queue.acked(), vec![msg.message_id]);
    assert_eq!(stats.duplicates, 1);
}

#[tokio::test]
async fn full_lifecycle_in_one_batch_per_message() {
    let store = MemoryExecutionStore::new();
    let queue = MemoryStatusQueue::new();
    seed(&store, "E1", ExecutionStatus::Requested);

    // One receive per status keeps the order deterministic.
    for (status, result) in [
        (ExecutionStatus::Scheduled, None),
        (ExecutionStatus::Running, None),
        (ExecutionStatus::Failed, Some("exit 2")),
    ] {
        let mut msg = StatusMessage::new("E1", status);
        msg.result = result.map(str::to_string);
        drain(&store, &queue, vec![msg]).await;
    }

    let stored = store.snapshot("E1").unwrap();
    assert_eq!(stored.record.status, ExecutionStatus::Failed);
    assert_eq!(stored.record.result.as_deref(), Some("exit 2"));
    assert_eq!(stored.revision, 3);
}
