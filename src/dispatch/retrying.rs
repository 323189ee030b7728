// src/dispatch/retrying.rs

//! Background delivery loop with per-snapshot retries.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

use crate::engine::backoff::Backoff;
use crate::models::ActionExecution;

use super::{Dispatcher, Notifier};

/// Totals reported by the delivery loop when it finishes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub delivered: usize,
    pub failed: usize,
}

/// [`Dispatcher`] that hands snapshots to the background loop started by
/// [`spawn_dispatcher`]. `notify` never blocks and never fails.
#[derive(Debug, Clone)]
pub struct RetryingDispatcher {
    tx: mpsc::UnboundedSender<ActionExecution>,
}

impl Dispatcher for RetryingDispatcher {
    fn notify(&self, snapshot: ActionExecution) {
        let id = snapshot.id.clone();
        if self.tx.send(snapshot).is_err() {
            error!(execution_id = %id, "dispatch loop has stopped; dropping notification");
        }
    }
}

/// Spawn the background delivery loop.
///
/// Each snapshot is delivered in its own Tokio task so a slow or failing
/// collaborator never holds up the others. A delivery is attempted up to
/// `max_attempts` times with `backoff` between attempts.
///
/// The loop finishes once every `RetryingDispatcher` clone is dropped and all
/// pending deliveries have settled.
pub fn spawn_dispatcher(
    notifier: Arc<dyn Notifier>,
    backoff: Backoff,
    max_attempts: u32,
) -> (RetryingDispatcher, JoinHandle<DispatchReport>) {
    let (tx, mut rx) = mpsc::unbounded_channel::<ActionExecution>();

    let handle = tokio::spawn(async move {
        info!("dispatch loop started");

        let mut pending: JoinSet<bool> = JoinSet::new();
        let mut report = DispatchReport::default();

        loop {
            tokio::select! {
                next = rx.recv() => match next {
                    Some(snapshot) => {
                        let notifier = Arc::clone(&notifier);
                        pending.spawn(async move {
                            deliver_with_retry(notifier.as_ref(), &snapshot, backoff, max_attempts).await
                        });
                    }
                    None => break,
                },
                Some(done) = pending.join_next(), if !pending.is_empty() => {
                    record(&mut report, done);
                }
            }
        }

        while let Some(done) = pending.join_next().await {
            record(&mut report, done);
        }

        info!(
            delivered = report.delivered,
            failed = report.failed,
            "dispatch loop finished (channel closed)"
        );
        report
    });

    (RetryingDispatcher { tx }, handle)
}

fn record(report: &mut DispatchReport, done: Result<bool, tokio::task::JoinError>) {
    match done {
        Ok(true) => report.delivered += 1,
        Ok(false) => report.failed += 1,
        Err(err) => {
            error!(error = %err, "dispatch task panicked");
            report.failed += 1;
        }
    }
}

async fn deliver_with_retry(
    notifier: &dyn Notifier,
    snapshot: &ActionExecution,
    backoff: Backoff,
    max_attempts: u32,
) -> bool {
    for attempt in 1..=max_attempts {
        match notifier.deliver(snapshot).await {
            Ok(()) => {
                debug!(execution_id = %snapshot.id, attempt, "dispatch delivered");
                return true;
            }
            Err(err) if attempt < max_attempts => {
                let delay = backoff.delay(attempt);
                warn!(
                    execution_id = %snapshot.id,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "dispatch failed; retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => {
                error!(
                    execution_id = %snapshot.id,
                    attempts = max_attempts,
                    error = %err,
                    "dispatch failed; giving up"
                );
            }
        }
    }
    false
}
