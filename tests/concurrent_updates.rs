// tests/concurrent_updates.rs

mod common;
use crate::common::builders::seed;
use crate::common::{init_tracing, reconciler, with_timeout};

use std::sync::Arc;

use tokio::sync::Barrier;

use resultstracker::engine::{Outcome, Reconciler};
use resultstracker::errors::{Result, TrackerError};
use resultstracker::models::ExecutionStatus;
use resultstracker::queue::StatusMessage;
use resultstracker::store::MemoryExecutionStore;

/// Apply both messages from separate tasks, released at the same time.
async fn race(
    reconciler: Arc<Reconciler>,
    a: StatusMessage,
    b: StatusMessage,
) -> (Result<Outcome>, Result<Outcome>) {
    let barrier = Arc::new(Barrier::new(2));

    let spawn = |msg: StatusMessage| {
        let reconciler = Arc::clone(&reconciler);
        let barrier = Arc::clone(&barrier);
        tokio::spawn(async move {
            barrier.wait().await;
            reconciler.apply(&msg).await
        })
    };

    let ta = spawn(a);
    let tb = spawn(b);
    (ta.await.unwrap(), tb.await.unwrap())
}

fn applied(result: &Result<Outcome>) -> bool {
    matches!(result, Ok(Outcome::Applied { .. }))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_results_leave_exactly_one_persisted() {
    init_tracing();

    for round in 0..50 {
        let store = MemoryExecutionStore::new();
        seed(&store, "E1", ExecutionStatus::Running);
        let (reconciler, dispatcher) = reconciler(&store);

        let a = StatusMessage::new("E1", ExecutionStatus::Succeeded).with_result("from-a");
        let b = StatusMessage::new("E1", ExecutionStatus::Succeeded).with_result("from-b");
        let (ra, rb) = with_timeout(race(reconciler, a, b)).await;

        assert!(applied(&ra) ^ applied(&rb), "round {round}: {ra:?} / {rb:?}");
        let (winner, loser) = if applied(&ra) {
            ("from-a", rb)
        } else {
            ("from-b", ra)
        };
        assert!(
            matches!(loser, Err(TrackerError::ResultConflict { .. })),
            "round {round}: loser was {loser:?}"
        );

        let stored = store.snapshot("E1").unwrap();
        assert_eq!(stored.record.result.as_deref(), Some(winner));
        assert_eq!(stored.revision, 1);
        assert_eq!(store.write_count(), 1);
        assert_eq!(dispatcher.notified().len(), 1);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn duplicate_deliveries_converge_to_one_write() {
    for _ in 0..50 {
        let store = MemoryExecutionStore::new();
        seed(&store, "E1", ExecutionStatus::Running);
        let (reconciler, dispatcher) = reconciler(&store);

        let msg = StatusMessage::new("E1", ExecutionStatus::Failed).with_result("exit 1");
        let (ra, rb) = with_timeout(race(reconciler, msg.clone(), msg)).await;

        assert!(applied(&ra) ^ applied(&rb), "{ra:?} / {rb:?}");
        let loser = if applied(&ra) { rb } else { ra };
        assert_eq!(loser.unwrap(), Outcome::Duplicate);
        assert_eq!(store.write_count(), 1);
        assert_eq!(dispatcher.notified().len(), 1);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn competing_terminal_statuses_keep_first_writer() {
    for _ in 0..50 {
        let store = MemoryExecutionStore::new();
        seed(&store, "E1", ExecutionStatus::Running);
        let (reconciler, _) = reconciler(&store);

        let done = StatusMessage::new("E1", ExecutionStatus::Succeeded).with_result("ok");
        let cancel = StatusMessage::new("E1", ExecutionStatus::Canceled);
        let (ra, rb) = with_timeout(race(reconciler, done, cancel)).await;

        assert!(applied(&ra) ^ applied(&rb), "{ra:?} / {rb:?}");
        let loser = if applied(&ra) { rb } else { ra };
        assert_eq!(loser.unwrap(), Outcome::Stale);
        assert_eq!(store.write_count(), 1);
        assert!(store.snapshot("E1").unwrap().record.is_terminal());
    }
}
