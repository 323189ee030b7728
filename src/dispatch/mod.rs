// src/dispatch/mod.rs

//! Terminal-status notifications for downstream collaborators (workflow
//! engine, notification hooks).
//!
//! The reconciler calls [`Dispatcher::notify`] after a terminal write and
//! moves on; delivery, retries and failure logging happen behind it.
//!
//! - [`retrying`] owns the background delivery loop and its retry policy.
//! - [`notifiers`] has the concrete sinks a [`RetryingDispatcher`] delivers to.

use crate::models::ActionExecution;
use crate::types::BoxFuture;

pub mod notifiers;
pub mod retrying;

pub use notifiers::{ChannelNotifier, LogNotifier};
pub use retrying::{DispatchReport, RetryingDispatcher, spawn_dispatcher};

/// Fire-and-forget notification of a final execution snapshot.
pub trait Dispatcher: Send + Sync {
    fn notify(&self, snapshot: ActionExecution);
}

/// One delivery attempt to a downstream collaborator.
pub trait Notifier: Send + Sync {
    fn deliver<'a>(&'a self, snapshot: &'a ActionExecution) -> BoxFuture<'a, anyhow::Result<()>>;
}
