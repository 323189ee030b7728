// src/queue/message.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{ExecutionId, ExecutionStatus};

/// A status report for one execution, as published by the action runners.
///
/// `observed_at` is part of the wire contract. `message_id` may be omitted
/// by publishers; it is then empty after decoding and the queue backend
/// assigns a stable one (see [`FileStatusQueue`](super::FileStatusQueue)).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusMessage {
    #[serde(default)]
    pub message_id: String,
    pub execution_id: ExecutionId,
    pub status: ExecutionStatus,
    #[serde(default)]
    pub result: Option<String>,
    pub observed_at: DateTime<Utc>,
}

fn new_message_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

impl StatusMessage {
    pub fn new(execution_id: impl Into<ExecutionId>, status: ExecutionStatus) -> Self {
        Self {
            message_id: new_message_id(),
            execution_id: execution_id.into(),
            status,
            result: None,
            observed_at: Utc::now(),
        }
    }

    pub fn with_result(mut self, result: impl Into<String>) -> Self {
        self.result = Some(result.into());
        self
    }
}

/// One hand-out of a message by the queue.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub message: StatusMessage,
    /// Queue-specific handle used to ack or dead-letter this delivery.
    pub receipt: String,
    /// 1 on first delivery, incremented on each redelivery.
    pub attempt: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decoding_is_deterministic() {
        let body = r#"{"execution_id": "E1", "status": "running",
                       "observed_at": "2024-05-01T12:00:00Z"}"#;
        let a: StatusMessage = serde_json::from_str(body).unwrap();
        let b: StatusMessage = serde_json::from_str(body).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.execution_id, "E1");
        assert_eq!(a.status, ExecutionStatus::Running);
        assert!(a.result.is_none());
        assert!(a.message_id.is_empty());
        assert_eq!(a.observed_at.to_rfc3339(), "2024-05-01T12:00:00+00:00");
    }

    #[test]
    fn observed_at_is_required() {
        let body = r#"{"execution_id": "E1", "status": "running"}"#;
        let err = serde_json::from_str::<StatusMessage>(body).unwrap_err();
        assert!(err.to_string().contains("observed_at"), "{err}");
    }

    #[test]
    fn message_ids_are_unique() {
        let a = StatusMessage::new("E1", ExecutionStatus::Running);
        let b = StatusMessage::new("E1", ExecutionStatus::Running);
        assert_ne!(a.message_id, b.message_id);
    }
}
