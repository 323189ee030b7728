#![allow(dead_code)]

pub use resultstracker_test_utils::{builders, fakes, init_tracing, with_timeout};

use std::sync::Arc;

use resultstracker::engine::Reconciler;
use resultstracker::store::{ExecutionStore, MemoryExecutionStore};

use fakes::RecordingDispatcher;

/// A reconciler over `store` that records terminal notifications.
pub fn reconciler(store: &MemoryExecutionStore) -> (Arc<Reconciler>, RecordingDispatcher) {
    reconciler_over(Arc::new(store.clone()), 5)
}

pub fn reconciler_over(
    store: Arc<dyn ExecutionStore>,
    max_attempts: u32,
) -> (Arc<Reconciler>, RecordingDispatcher) {
    let dispatcher = RecordingDispatcher::new();
    let reconciler = Reconciler::new(store, Arc::new(dispatcher.clone()), max_attempts);
    (Arc::new(reconciler), dispatcher)
}
