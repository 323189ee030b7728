// src/models/execution.rs

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::action::Action;
use super::schema::{Schema, render};
use super::status::ExecutionStatus;

/// Canonical execution id type used throughout the tracker.
pub type ExecutionId = String;

/// Store-side revision counter used for optimistic concurrency.
pub type Revision = u64;

/// The persisted state of one action execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionExecution {
    pub id: ExecutionId,

    /// Most recently applied status.
    pub status: ExecutionStatus,

    pub start_timestamp: DateTime<Utc>,

    /// Set from the reporting timestamp when the execution reaches a terminal
    /// status.
    #[serde(default)]
    pub end_timestamp: Option<DateTime<Utc>>,

    /// Snapshot of the action this execution was created from.
    pub action: Action,

    #[serde(default)]
    pub runner_parameters: BTreeMap<String, Value>,

    #[serde(default)]
    pub action_parameters: BTreeMap<String, Value>,

    /// Action-defined result. Written once, on the terminal transition.
    #[serde(default)]
    pub result: Option<String>,
}

impl ActionExecution {
    /// A freshly requested execution of `action`.
    ///
    /// Every instance gets its own parameter maps and its own start timestamp.
    pub fn requested(id: impl Into<ExecutionId>, action: Action) -> Self {
        Self {
            id: id.into(),
            status: ExecutionStatus::Requested,
            start_timestamp: Utc::now(),
            end_timestamp: None,
            action,
            runner_parameters: BTreeMap::new(),
            action_parameters: BTreeMap::new(),
            result: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

impl Schema for ActionExecution {
    const NAME: &'static str = "ActionExecution";

    fn fields(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("id", json!(self.id)),
            ("action", json!(self.action.uri())),
            ("status", json!(self.status)),
            ("start_timestamp", json!(self.start_timestamp.to_rfc3339())),
            (
                "end_timestamp",
                json!(self.end_timestamp.map(|t| t.to_rfc3339())),
            ),
            ("runner_parameters", json!(self.runner_parameters)),
            ("action_parameters", json!(self.action_parameters)),
            ("result", json!(self.result)),
        ]
    }
}

impl fmt::Display for ActionExecution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        render(self, f)
    }
}

/// A record together with the revision it was read at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Versioned<T> {
    pub record: T,
    pub revision: Revision,
}

/// The mutable fields the reconciler writes in a single conditional update.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionUpdate {
    pub status: ExecutionStatus,
    pub result: Option<String>,
    pub end_timestamp: Option<DateTime<Utc>>,
}

impl ExecutionUpdate {
    /// Apply to a record in place. `result` and `end_timestamp` only ever fill
    /// empty slots.
    pub fn apply_to(&self, record: &mut ActionExecution) {
        record.status = self.status;
        if record.result.is_none() {
            record.result = self.result.clone();
        }
        if record.end_timestamp.is_none() {
            record.end_timestamp = self.end_timestamp;
        }
    }
}
