#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use resultstracker::dispatch::{Dispatcher, Notifier};
use resultstracker::errors::{Result, TrackerError};
use resultstracker::models::{ActionExecution, ExecutionUpdate, Revision, Versioned};
use resultstracker::queue::{Delivery, MemoryStatusQueue, StatusQueue};
use resultstracker::store::{ExecutionStore, MemoryExecutionStore, UpdateResult};
use resultstracker::types::BoxFuture;

/// Take one unit from `counter` if it is non-zero.
fn take(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

/// A store that wraps `MemoryExecutionStore` and can be told to:
/// - fail the next N calls with `StoreUnavailable`
/// - report a revision conflict for the next N conditional updates
///   without writing.
#[derive(Debug, Clone, Default)]
pub struct FlakyStore {
    inner: MemoryExecutionStore,
    failures: Arc<AtomicUsize>,
    conflicts: Arc<AtomicUsize>,
    calls: Arc<AtomicUsize>,
}

impl FlakyStore {
    pub fn new(inner: MemoryExecutionStore) -> Self {
        Self {
            inner,
            ..Self::default()
        }
    }

    pub fn fail_next(&self, n: usize) {
        self.failures.store(n, Ordering::SeqCst);
    }

    pub fn conflict_next(&self, n: usize) {
        self.conflicts.store(n, Ordering::SeqCst);
    }

    /// Total calls seen, including failed ones.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn maybe_fail(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if take(&self.failures) {
            return Err(TrackerError::StoreUnavailable(
                "injected store failure".to_string(),
            ));
        }
        Ok(())
    }
}

impl ExecutionStore for FlakyStore {
    fn get<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<Option<Versioned<ActionExecution>>>> {
        Box::pin(async move {
            self.maybe_fail()?;
            self.inner.get(id).await
        })
    }

    fn compare_and_update<'a>(
        &'a self,
        id: &'a str,
        expected: Revision,
        update: ExecutionUpdate,
    ) -> BoxFuture<'a, Result<UpdateResult>> {
        Box::pin(async move {
            self.maybe_fail()?;
            if take(&self.conflicts) {
                return Ok(UpdateResult::Conflict {
                    current: expected + 1,
                });
            }
            self.inner.compare_and_update(id, expected, update).await
        })
    }
}

/// A dispatcher that records every snapshot it is given.
#[derive(Debug, Clone, Default)]
pub struct RecordingDispatcher {
    notified: Arc<Mutex<Vec<ActionExecution>>>,
}

impl RecordingDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notified(&self) -> Vec<ActionExecution> {
        self.notified.lock().unwrap().clone()
    }
}

impl Dispatcher for RecordingDispatcher {
    fn notify(&self, snapshot: ActionExecution) {
        self.notified.lock().unwrap().push(snapshot);
    }
}

/// A notifier that fails its first N deliveries, then records the rest.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    failures: Arc<AtomicUsize>,
    attempts: Arc<AtomicUsize>,
    delivered: Arc<Mutex<Vec<ActionExecution>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_first(n: usize) -> Self {
        let notifier = Self::default();
        notifier.failures.store(n, Ordering::SeqCst);
        notifier
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn delivered(&self) -> Vec<ActionExecution> {
        self.delivered.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn deliver<'a>(&'a self, snapshot: &'a ActionExecution) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(async move {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            if take(&self.failures) {
                anyhow::bail!("injected delivery failure");
            }
            self.delivered.lock().unwrap().push(snapshot.clone());
            Ok(())
        })
    }
}

/// A queue that wraps `MemoryStatusQueue` and can fail the next N receives
/// with `QueueUnavailable`.
#[derive(Debug, Clone, Default)]
pub struct FailingQueue {
    inner: MemoryStatusQueue,
    receive_failures: Arc<AtomicUsize>,
}

impl FailingQueue {
    pub fn new(inner: MemoryStatusQueue) -> Self {
        Self {
            inner,
            receive_failures: Arc::default(),
        }
    }

    pub fn fail_receives(&self, n: usize) {
        self.receive_failures.store(n, Ordering::SeqCst);
    }
}

impl StatusQueue for FailingQueue {
    fn receive_batch(
        &self,
        max: usize,
        visibility_timeout: Duration,
    ) -> BoxFuture<'_, Result<Vec<Delivery>>> {
        Box::pin(async move {
            if take(&self.receive_failures) {
                return Err(TrackerError::QueueUnavailable(
                    "injected broker outage".to_string(),
                ));
            }
            self.inner.receive_batch(max, visibility_timeout).await
        })
    }

    fn ack<'a>(&'a self, delivery: &'a Delivery) -> BoxFuture<'a, Result<()>> {
        self.inner.ack(delivery)
    }

    fn nack_to_dead_letter<'a>(
        &'a self,
        delivery: &'a Delivery,
        reason: &'a str,
    ) -> BoxFuture<'a, Result<()>> {
        self.inner.nack_to_dead_letter(delivery, reason)
    }
}
