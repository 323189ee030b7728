// src/engine/mod.rs

//! Results-tracking engine.
//!
//! This module ties together:
//! - the status state machine ([`transitions`]), pure and synchronous
//! - the reconciler that applies one message against the store
//!   ([`reconciler`])
//! - the outcome -> queue-action mapping ([`disposition`])
//! - the supervisor that owns the consume loop, the worker pool, retries
//!   and shutdown ([`supervisor`])
//! - backoff and shutdown helpers shared with the dispatcher

pub mod backoff;
pub mod disposition;
pub mod reconciler;
pub mod shutdown;
pub mod supervisor;
pub mod transitions;

pub use backoff::Backoff;
pub use disposition::{Disposition, disposition};
pub use reconciler::{Outcome, Reconciler};
pub use supervisor::{Supervisor, SupervisorHandle, SupervisorOptions, TrackerStats};
pub use transitions::{Transition, TransitionTable};
pub use crate::types::ExhaustedRetryPolicy;
