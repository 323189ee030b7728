// src/engine/disposition.rs

//! What the supervisor does with a delivery once the reconciler has answered.

use crate::errors::TrackerError;

use super::reconciler::Outcome;

/// Queue-side action for one reconciled delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    Ack,
    /// Permanent failure; the string is the dead-letter reason.
    DeadLetter(String),
    /// Transient failure; try again later.
    Retry,
}

pub fn disposition(result: &Result<Outcome, TrackerError>) -> Disposition {
    match result {
        Ok(_) => Disposition::Ack,
        Err(err) if err.is_retryable() => Disposition::Retry,
        Err(err) => Disposition::DeadLetter(dead_letter_reason(err)),
    }
}

/// `"<kind>: <message>"`, e.g. `unknown_execution: Unknown execution: E9`.
pub fn dead_letter_reason(err: &TrackerError) -> String {
    format!("{}: {}", err.kind(), err)
}
