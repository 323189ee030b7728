// src/store/mod.rs

//! Execution record store.
//!
//! The reconciler talks to an `ExecutionStore` instead of a concrete database
//! driver. Writes are compare-and-swap on the record's revision counter; the
//! store never hands out locks.
//!
//! - [`memory::MemoryExecutionStore`] keeps records in-process (tests,
//!   `memory://`).
//! - [`file::FileExecutionStore`] keeps one JSON document per execution in a
//!   directory (`file://<dir>`).

use std::sync::Arc;

use crate::errors::Result;
use crate::fs::RealFileSystem;
use crate::models::{ActionExecution, ExecutionUpdate, Revision, Versioned};
use crate::types::{BackendUrl, BoxFuture};

pub mod file;
pub mod memory;

pub use file::FileExecutionStore;
pub use memory::MemoryExecutionStore;

/// Result of a conditional update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateResult {
    /// Written; the record is now at this revision.
    Updated(Revision),
    /// Someone else wrote first; the record is at `current`.
    Conflict { current: Revision },
    NotFound,
}

/// Durable keyed storage for execution records.
///
/// Implementations report transport failures as
/// [`TrackerError::StoreUnavailable`](crate::errors::TrackerError::StoreUnavailable).
pub trait ExecutionStore: Send + Sync {
    /// Fetch a record with its current revision.
    fn get<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<Option<Versioned<ActionExecution>>>>;

    /// Apply `update` only if the record is still at `expected`.
    ///
    /// On success the revision is incremented by one.
    fn compare_and_update<'a>(
        &'a self,
        id: &'a str,
        expected: Revision,
        update: ExecutionUpdate,
    ) -> BoxFuture<'a, Result<UpdateResult>>;
}

/// Open the store selected by `[database].connection`.
pub fn open(url: &BackendUrl) -> Result<Arc<dyn ExecutionStore>> {
    match url {
        BackendUrl::Memory => Ok(Arc::new(MemoryExecutionStore::new())),
        BackendUrl::File(dir) => Ok(Arc::new(FileExecutionStore::open(
            Arc::new(RealFileSystem),
            dir,
        )?)),
    }
}
