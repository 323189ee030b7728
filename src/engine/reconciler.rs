// src/engine/reconciler.rs

//! Applies one status message to its execution record.
//!
//! Each attempt is read -> classify -> conditional write. A revision conflict
//! means another worker (often a duplicate delivery of the same message) got
//! there first, so the whole evaluation is repeated against the fresh record;
//! that re-evaluation is what turns racing duplicates into no-ops.

use std::sync::Arc;

use tracing::{debug, info};

use crate::dispatch::Dispatcher;
use crate::errors::{Result, TrackerError};
use crate::models::{ExecutionStatus, ExecutionUpdate, Revision};
use crate::queue::StatusMessage;
use crate::store::{ExecutionStore, UpdateResult};

use super::transitions::{Transition, TransitionTable};

/// Successful reconciliation outcomes. Every one of them means "ack".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The record was written.
    Applied {
        revision: Revision,
        status: ExecutionStatus,
        terminal: bool,
    },
    /// The record already had this status (and result).
    Duplicate,
    /// The record is terminal; the message is a late delivery.
    Stale,
}

pub struct Reconciler {
    store: Arc<dyn ExecutionStore>,
    dispatcher: Arc<dyn Dispatcher>,
    table: TransitionTable,
    max_attempts: u32,
}

impl Reconciler {
    pub fn new(
        store: Arc<dyn ExecutionStore>,
        dispatcher: Arc<dyn Dispatcher>,
        max_attempts: u32,
    ) -> Self {
        Self {
            store,
            dispatcher,
            table: TransitionTable::new(),
            max_attempts: max_attempts.max(1),
        }
    }

    /// Apply `message` to the stored record.
    ///
    /// On a terminal write the dispatcher is notified with the final snapshot
    /// before this returns, i.e. before the caller acknowledges the message.
    pub async fn apply(&self, message: &StatusMessage) -> Result<Outcome> {
        let id = message.execution_id.as_str();

        for attempt in 1..=self.max_attempts {
            let Some(current) = self.store.get(id).await? else {
                return Err(TrackerError::UnknownExecution(id.to_string()));
            };

            let stored = current.record.status;
            let transition = self.table.classify(
                stored,
                current.record.result.as_deref(),
                message.status,
                message.result.as_deref(),
            );

            match transition {
                Transition::Duplicate => {
                    debug!(execution_id = %id, message_id = %message.message_id, status = %stored, "duplicate status update");
                    return Ok(Outcome::Duplicate);
                }
                Transition::Stale => {
                    debug!(
                        execution_id = %id,
                        message_id = %message.message_id,
                        stored = %stored,
                        incoming = %message.status,
                        "stale status update for finished execution"
                    );
                    return Ok(Outcome::Stale);
                }
                Transition::Regression => {
                    return Err(TrackerError::InvalidTransition {
                        execution_id: id.to_string(),
                        from: stored,
                        to: message.status,
                    });
                }
                Transition::ResultConflict => {
                    return Err(TrackerError::ResultConflict {
                        execution_id: id.to_string(),
                        status: stored,
                    });
                }
                Transition::Apply => {}
            }

            let terminal = message.status.is_terminal();
            let update = ExecutionUpdate {
                status: message.status,
                result: if terminal { message.result.clone() } else { None },
                end_timestamp: terminal.then_some(message.observed_at),
            };

            match self
                .store
                .compare_and_update(id, current.revision, update.clone())
                .await?
            {
                UpdateResult::Updated(revision) => {
                    info!(
                        execution_id = %id,
                        message_id = %message.message_id,
                        from = %stored,
                        to = %message.status,
                        revision,
                        "status applied"
                    );
                    if terminal {
                        let mut snapshot = current.record;
                        update.apply_to(&mut snapshot);
                        self.dispatcher.notify(snapshot);
                    }
                    return Ok(Outcome::Applied {
                        revision,
                        status: message.status,
                        terminal,
                    });
                }
                UpdateResult::Conflict { current: now_at } => {
                    debug!(
                        execution_id = %id,
                        message_id = %message.message_id,
                        attempt,
                        expected = current.revision,
                        found = now_at,
                        "revision conflict; re-evaluating"
                    );
                }
                UpdateResult::NotFound => {
                    return Err(TrackerError::UnknownExecution(id.to_string()));
                }
            }
        }

        Err(TrackerError::ConcurrencyExhausted {
            execution_id: id.to_string(),
            attempts: self.max_attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use crate::models::{Action, ActionExecution};
    use crate::store::MemoryExecutionStore;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<ActionExecution>>);

    impl Dispatcher for Recorder {
        fn notify(&self, snapshot: ActionExecution) {
            self.0.lock().unwrap().push(snapshot);
        }
    }

    fn setup(status: ExecutionStatus) -> (MemoryExecutionStore, Arc<Recorder>, Reconciler) {
        let store = MemoryExecutionStore::new();
        let mut record =
            ActionExecution::requested("E1", Action::new("core.local", "local.py", "run-local"));
        record.status = status;
        store.insert(record);
        let recorder = Arc::new(Recorder::default());
        let reconciler = Reconciler::new(Arc::new(store.clone()), recorder.clone(), 3);
        (store, recorder, reconciler)
    }

    #[tokio::test]
    async fn non_terminal_results_are_not_persisted() {
        let (store, recorder, reconciler) = setup(ExecutionStatus::Scheduled);
        let msg = StatusMessage::new("E1", ExecutionStatus::Running).with_result("partial");

        let outcome = reconciler.apply(&msg).await.unwrap();

        assert!(matches!(outcome, Outcome::Applied { terminal: false, .. }));
        let record = store.snapshot("E1").unwrap().record;
        assert_eq!(record.status, ExecutionStatus::Running);
        assert!(record.result.is_none());
        assert!(record.end_timestamp.is_none());
        assert!(recorder.0.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn terminal_write_sets_end_timestamp_and_notifies() {
        let (store, recorder, reconciler) = setup(ExecutionStatus::Running);
        let msg = StatusMessage::new("E1", ExecutionStatus::Failed).with_result("exit 1");

        reconciler.apply(&msg).await.unwrap();

        let record = store.snapshot("E1").unwrap().record;
        assert_eq!(record.end_timestamp, Some(msg.observed_at));
        let notified = recorder.0.lock().unwrap();
        assert_eq!(notified.len(), 1);
        assert_eq!(notified[0], record);
    }

    #[tokio::test]
    async fn regression_is_invalid() {
        let (store, _, reconciler) = setup(ExecutionStatus::Running);
        let msg = StatusMessage::new("E1", ExecutionStatus::Scheduled);

        let err = reconciler.apply(&msg).await.unwrap_err();

        assert!(matches!(err, TrackerError::InvalidTransition { .. }));
        assert_eq!(store.write_count(), 0);
    }
}
