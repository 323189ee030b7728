// src/queue/mod.rs

//! Status queue consumer side.
//!
//! Delivery is at-least-once: a message is handed out again once its
//! visibility timeout lapses without an ack, and may arrive twice or slightly
//! out of order. The supervisor acks only after the reconciler has durably
//! applied (or definitively rejected) the update.
//!
//! - [`memory::MemoryStatusQueue`]: in-process queue (tests, `memory://`).
//! - [`file::FileStatusQueue`]: spool directory (`file://<dir>`).

use std::sync::Arc;
use std::time::Duration;

use crate::errors::Result;
use crate::fs::RealFileSystem;
use crate::types::{BackendUrl, BoxFuture};

pub mod file;
pub mod memory;
pub mod message;

pub use file::FileStatusQueue;
pub use memory::{DeadLetter, MemoryStatusQueue};
pub use message::{Delivery, StatusMessage};

/// Source of status update messages.
///
/// Implementations report transport failures as
/// [`TrackerError::QueueUnavailable`](crate::errors::TrackerError::QueueUnavailable).
pub trait StatusQueue: Send + Sync {
    /// Claim up to `max` messages, hiding them from other receivers for
    /// `visibility_timeout`.
    fn receive_batch(
        &self,
        max: usize,
        visibility_timeout: Duration,
    ) -> BoxFuture<'_, Result<Vec<Delivery>>>;

    /// Permanently remove a delivered message.
    fn ack<'a>(&'a self, delivery: &'a Delivery) -> BoxFuture<'a, Result<()>>;

    /// Move a delivered message to the dead-letter queue.
    fn nack_to_dead_letter<'a>(
        &'a self,
        delivery: &'a Delivery,
        reason: &'a str,
    ) -> BoxFuture<'a, Result<()>>;
}

/// Open the queue selected by `[messaging].endpoint`.
pub fn open(url: &BackendUrl) -> Result<Arc<dyn StatusQueue>> {
    match url {
        BackendUrl::Memory => Ok(Arc::new(MemoryStatusQueue::new())),
        BackendUrl::File(dir) => Ok(Arc::new(FileStatusQueue::open(
            Arc::new(RealFileSystem),
            dir,
        )?)),
    }
}
