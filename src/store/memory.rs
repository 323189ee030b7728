// src/store/memory.rs

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::errors::Result;
use crate::models::{ActionExecution, ExecutionUpdate, Revision, Versioned};
use crate::types::BoxFuture;

use super::{ExecutionStore, UpdateResult};

/// In-process execution store. Clones share the same records.
///
/// The compare-and-swap happens under a short internal lock, which stands in
/// for the document store's atomic conditional update.
#[derive(Debug, Clone, Default)]
pub struct MemoryExecutionStore {
    records: Arc<Mutex<HashMap<String, Versioned<ActionExecution>>>>,
    writes: Arc<AtomicUsize>,
}

impl MemoryExecutionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert (or replace) a record at revision 0, as the upstream scheduler
    /// would when it requests an execution.
    pub fn insert(&self, record: ActionExecution) {
        self.lock().insert(
            record.id.clone(),
            Versioned {
                record,
                revision: 0,
            },
        );
    }

    /// Snapshot of a record, bypassing the async interface.
    pub fn snapshot(&self, id: &str) -> Option<Versioned<ActionExecution>> {
        self.lock().get(id).cloned()
    }

    /// Number of successful conditional updates so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Versioned<ActionExecution>>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn compare_and_update_now(
        &self,
        id: &str,
        expected: Revision,
        update: &ExecutionUpdate,
    ) -> UpdateResult {
        let mut records = self.lock();
        let Some(entry) = records.get_mut(id) else {
            return UpdateResult::NotFound;
        };
        if entry.revision != expected {
            return UpdateResult::Conflict {
                current: entry.revision,
            };
        }
        update.apply_to(&mut entry.record);
        entry.revision += 1;
        self.writes.fetch_add(1, Ordering::SeqCst);
        UpdateResult::Updated(entry.revision)
    }
}

impl ExecutionStore for MemoryExecutionStore {
    fn get<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<Option<Versioned<ActionExecution>>>> {
        Box::pin(async move { Ok(self.snapshot(id)) })
    }

    fn compare_and_update<'a>(
        &'a self,
        id: &'a str,
        expected: Revision,
        update: ExecutionUpdate,
    ) -> BoxFuture<'a, Result<UpdateResult>> {
        Box::pin(async move { Ok(self.compare_and_update_now(id, expected, &update)) })
    }
}
