// src/errors.rs

//! Crate-wide error type and helpers.
//!
//! The tracker-specific variants split into two families:
//! - permanent: the triggering message is dead-lettered and never retried
//!   against the reconciler.
//! - retryable: the message stays unacknowledged and is retried with backoff.

use thiserror::Error;

use crate::models::ExecutionStatus;

#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("Unknown execution: {0}")]
    UnknownExecution(String),

    #[error("Invalid transition for execution {execution_id}: {from} -> {to}")]
    InvalidTransition {
        execution_id: String,
        from: ExecutionStatus,
        to: ExecutionStatus,
    },

    #[error("Result conflict for execution {execution_id}: already {status} with a different result")]
    ResultConflict {
        execution_id: String,
        status: ExecutionStatus,
    },

    #[error("Concurrency retries exhausted for execution {execution_id} after {attempts} attempts")]
    ConcurrencyExhausted { execution_id: String, attempts: u32 },

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Queue unavailable: {0}")]
    QueueUnavailable(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TrackerError {
    /// Whether the failure is transient and the message should be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TrackerError::ConcurrencyExhausted { .. }
                | TrackerError::StoreUnavailable(_)
                | TrackerError::QueueUnavailable(_)
        )
    }

    /// Short machine-friendly label, used as the dead-letter reason prefix and
    /// as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            TrackerError::UnknownExecution(_) => "unknown_execution",
            TrackerError::InvalidTransition { .. } => "invalid_transition",
            TrackerError::ResultConflict { .. } => "result_conflict",
            TrackerError::ConcurrencyExhausted { .. } => "concurrency_exhausted",
            TrackerError::StoreUnavailable(_) => "store_unavailable",
            TrackerError::QueueUnavailable(_) => "queue_unavailable",
            TrackerError::ConfigError(_) => "config",
            TrackerError::IoError(_) => "io",
            TrackerError::TomlError(_) => "toml",
            TrackerError::JsonError(_) => "json",
            TrackerError::Other(_) => "other",
        }
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, TrackerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taxonomy_splits_permanent_and_retryable() {
        let permanent = [
            TrackerError::UnknownExecution("E9".into()),
            TrackerError::InvalidTransition {
                execution_id: "E1".into(),
                from: ExecutionStatus::Running,
                to: ExecutionStatus::Scheduled,
            },
            TrackerError::ResultConflict {
                execution_id: "E1".into(),
                status: ExecutionStatus::Succeeded,
            },
        ];
        for err in &permanent {
            assert!(!err.is_retryable(), "{err} should be permanent");
        }

        let retryable = [
            TrackerError::ConcurrencyExhausted {
                execution_id: "E1".into(),
                attempts: 5,
            },
            TrackerError::StoreUnavailable("down".into()),
            TrackerError::QueueUnavailable("down".into()),
        ];
        for err in &retryable {
            assert!(err.is_retryable(), "{err} should be retryable");
        }
    }

    #[test]
    fn messages_carry_execution_id() {
        let err = TrackerError::InvalidTransition {
            execution_id: "E1".into(),
            from: ExecutionStatus::Running,
            to: ExecutionStatus::Requested,
        };
        assert_eq!(
            err.to_string(),
            "Invalid transition for execution E1: running -> requested"
        );
    }
}
