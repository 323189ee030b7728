// src/models/mod.rs

//! Document models shared by the store, the queue and the reconciler.
//!
//! - [`action`]: the immutable action definition.
//! - [`execution`]: the mutable execution record and its update type.
//! - [`status`]: the execution status enum.
//! - [`schema`]: declared-field rendering used by the `Display` impls.

pub mod action;
pub mod execution;
pub mod schema;
pub mod status;

pub use action::Action;
pub use execution::{ActionExecution, ExecutionId, ExecutionUpdate, Revision, Versioned};
pub use schema::Schema;
pub use status::ExecutionStatus;
