// src/engine/supervisor.rs

use std::fmt;
use std::sync::Arc;

use anyhow::anyhow;
use tokio::sync::{Semaphore, watch};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::config::TrackerSettings;
use crate::errors::{Result, TrackerError};
use crate::queue::{Delivery, StatusQueue};
use crate::types::ExhaustedRetryPolicy;

use super::disposition::{Disposition, dead_letter_reason, disposition};
use super::reconciler::{Outcome, Reconciler};
use super::shutdown;

/// Options that are not part of the file configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct SupervisorOptions {
    /// Exit as soon as a receive comes back empty (used for `--once`).
    pub exit_when_idle: bool,
}

/// Counters reported when the supervisor stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrackerStats {
    pub received: usize,
    pub acked: usize,
    pub applied: usize,
    pub duplicates: usize,
    pub stale: usize,
    pub dead_lettered: usize,
    /// Messages sent into another in-batch retry round (counted per round).
    pub retried: usize,
    /// Messages left unacknowledged after exhausting retries, under
    /// [`ExhaustedRetryPolicy::Redeliver`].
    pub left_for_redelivery: usize,
    /// Messages left unacknowledged because shutdown cut them short.
    pub abandoned: usize,
    pub queue_errors: usize,
}

/// Owns the consume loop: receive a batch, reconcile it on a bounded worker
/// pool, then ack / dead-letter / retry each delivery.
///
/// All tracker semantics live in [`Reconciler`]; this is the IO shell around
/// it.
pub struct Supervisor {
    reconciler: Arc<Reconciler>,
    queue: Arc<dyn StatusQueue>,
    settings: TrackerSettings,
    options: SupervisorOptions,
    shutdown: watch::Receiver<bool>,
    stats: TrackerStats,
}

impl fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Supervisor")
            .field("settings", &self.settings)
            .field("options", &self.options)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl Supervisor {
    pub fn new(
        reconciler: Arc<Reconciler>,
        queue: Arc<dyn StatusQueue>,
        settings: &TrackerSettings,
        options: SupervisorOptions,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            reconciler,
            queue,
            settings: settings.clone(),
            options,
            shutdown,
            stats: TrackerStats::default(),
        }
    }

    /// Main consume loop. Returns once shutdown is requested (after draining)
    /// or, with `exit_when_idle`, once the queue comes back empty.
    pub async fn run(mut self) -> Result<TrackerStats> {
        info!(
            worker_pool_size = self.settings.worker_pool_size,
            batch_size = self.settings.batch_size,
            visibility_timeout_ms = self.settings.visibility_timeout.as_millis() as u64,
            "results tracker started"
        );

        loop {
            if shutdown::is_requested(&self.shutdown) {
                info!("shutdown requested; no longer receiving");
                break;
            }

            let Some(batch) = self.receive().await else {
                break;
            };

            if batch.is_empty() {
                if self.options.exit_when_idle {
                    info!("queue is idle; exiting");
                    break;
                }
                let idle = self.settings.idle_poll_interval;
                if !shutdown::sleep_unless_shutdown(idle, &mut self.shutdown).await {
                    break;
                }
                continue;
            }

            debug!(size = batch.len(), "received batch");
            self.stats.received += batch.len();
            self.process_batch(batch).await;
        }

        info!(stats = ?self.stats, "results tracker stopped");
        Ok(self.stats)
    }

    /// Receive the next batch, backing off on queue errors until shutdown.
    async fn receive(&mut self) -> Option<Vec<Delivery>> {
        let mut failures = 0u32;
        loop {
            match self
                .queue
                .receive_batch(self.settings.batch_size, self.settings.visibility_timeout)
                .await
            {
                Ok(batch) => return Some(batch),
                Err(err) => {
                    failures = failures.saturating_add(1);
                    self.stats.queue_errors += 1;
                    let delay = self.settings.backoff.delay(failures);
                    warn!(
                        error = %err,
                        failures,
                        delay_ms = delay.as_millis() as u64,
                        "receiving from status queue failed; backing off"
                    );
                    if !shutdown::sleep_unless_shutdown(delay, &mut self.shutdown).await {
                        return None;
                    }
                }
            }
        }
    }

    async fn process_batch(&mut self, batch: Vec<Delivery>) {
        let mut pending = batch;
        let mut round = 0u32;

        loop {
            let mut retry: Vec<(Delivery, TrackerError)> = Vec::new();

            for (delivery, result) in self.reconcile_all(pending).await {
                match disposition(&result) {
                    Disposition::Ack => {
                        if let Ok(outcome) = result {
                            self.record_outcome(outcome);
                        }
                        self.ack(&delivery).await;
                    }
                    Disposition::DeadLetter(reason) => {
                        warn!(
                            execution_id = %delivery.message.execution_id,
                            message_id = %delivery.message.message_id,
                            status = %delivery.message.status,
                            reason = %reason,
                            "permanent failure; dead-lettering"
                        );
                        self.dead_letter(&delivery, &reason).await;
                    }
                    Disposition::Retry => {
                        if let Err(err) = result {
                            warn!(
                                execution_id = %delivery.message.execution_id,
                                message_id = %delivery.message.message_id,
                                error = %err,
                                round,
                                "transient failure"
                            );
                            retry.push((delivery, err));
                        }
                    }
                }
            }

            if retry.is_empty() {
                return;
            }

            round += 1;
            if round > self.settings.max_batch_retries {
                self.retries_exhausted(retry, round - 1).await;
                return;
            }

            let delay = self.settings.backoff.delay(round);
            debug!(
                count = retry.len(),
                round,
                delay_ms = delay.as_millis() as u64,
                "retrying transient failures"
            );
            if !shutdown::sleep_unless_shutdown(delay, &mut self.shutdown).await {
                info!(count = retry.len(), "shutdown during retry backoff; leaving messages unacknowledged");
                self.stats.abandoned += retry.len();
                return;
            }

            self.stats.retried += retry.len();
            pending = retry.into_iter().map(|(delivery, _)| delivery).collect();
        }
    }

    /// Reconcile every delivery concurrently, at most `worker_pool_size` at a
    /// time.
    ///
    /// Once shutdown is requested, workers that have not started yet skip
    /// their message and running ones get `shutdown_grace` to finish before
    /// they are aborted. Skipped and aborted deliveries are not returned and
    /// stay unacknowledged.
    async fn reconcile_all(
        &mut self,
        deliveries: Vec<Delivery>,
    ) -> Vec<(Delivery, Result<Outcome>)> {
        let semaphore = Arc::new(Semaphore::new(self.settings.worker_pool_size));
        let mut workers = JoinSet::new();

        for delivery in deliveries {
            let reconciler = Arc::clone(&self.reconciler);
            let semaphore = Arc::clone(&semaphore);
            let shutdown_rx = self.shutdown.clone();

            workers.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                if shutdown::is_requested(&shutdown_rx) {
                    return (delivery, None);
                }
                let result = reconciler.apply(&delivery.message).await;
                (delivery, Some(result))
            });
        }

        let mut completed = Vec::new();
        let mut shutdown_rx = self.shutdown.clone();
        let mut deadline: Option<Instant> = None;

        loop {
            let joined = match deadline {
                None => tokio::select! {
                    joined = workers.join_next() => joined,
                    _ = shutdown::wait_for_shutdown(&mut shutdown_rx) => {
                        info!(
                            grace_ms = self.settings.shutdown_grace.as_millis() as u64,
                            "shutdown requested; draining in-flight reconciliations"
                        );
                        deadline = Some(Instant::now() + self.settings.shutdown_grace);
                        continue;
                    }
                },
                Some(at) => match tokio::time::timeout_at(at, workers.join_next()).await {
                    Ok(joined) => joined,
                    Err(_) => {
                        let left = workers.len();
                        warn!(left, "shutdown grace elapsed; aborting in-flight reconciliations");
                        self.stats.abandoned += left;
                        workers.abort_all();
                        break;
                    }
                },
            };

            match joined {
                None => break,
                Some(Ok((delivery, Some(result)))) => completed.push((delivery, result)),
                Some(Ok((delivery, None))) => {
                    debug!(
                        execution_id = %delivery.message.execution_id,
                        message_id = %delivery.message.message_id,
                        "not started before shutdown; leaving unacknowledged"
                    );
                    self.stats.abandoned += 1;
                }
                Some(Err(err)) => {
                    error!(error = %err, "reconciliation worker panicked");
                    self.stats.abandoned += 1;
                }
            }
        }

        completed
    }

    async fn retries_exhausted(&mut self, retry: Vec<(Delivery, TrackerError)>, rounds: u32) {
        for (delivery, err) in retry {
            match self.settings.exhausted_retry_policy {
                ExhaustedRetryPolicy::DeadLetter => {
                    let reason = format!(
                        "retries exhausted after {rounds} rounds; {}",
                        dead_letter_reason(&err)
                    );
                    error!(
                        execution_id = %delivery.message.execution_id,
                        message_id = %delivery.message.message_id,
                        reason = %reason,
                        "dead-lettering after retries"
                    );
                    self.dead_letter(&delivery, &reason).await;
                }
                ExhaustedRetryPolicy::Redeliver => {
                    warn!(
                        execution_id = %delivery.message.execution_id,
                        message_id = %delivery.message.message_id,
                        error = %err,
                        "retries exhausted; leaving for queue redelivery"
                    );
                    self.stats.left_for_redelivery += 1;
                }
            }
        }
    }

    fn record_outcome(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Applied { .. } => self.stats.applied += 1,
            Outcome::Duplicate => self.stats.duplicates += 1,
            Outcome::Stale => self.stats.stale += 1,
        }
    }

    async fn ack(&mut self, delivery: &Delivery) {
        match self.queue.ack(delivery).await {
            Ok(()) => self.stats.acked += 1,
            Err(err) => {
                // Redelivery of an applied update resolves as a duplicate.
                warn!(
                    execution_id = %delivery.message.execution_id,
                    message_id = %delivery.message.message_id,
                    error = %err,
                    "ack failed; message will be redelivered"
                );
                self.stats.queue_errors += 1;
            }
        }
    }

    async fn dead_letter(&mut self, delivery: &Delivery, reason: &str) {
        match self.queue.nack_to_dead_letter(delivery, reason).await {
            Ok(()) => self.stats.dead_lettered += 1,
            Err(err) => {
                error!(
                    execution_id = %delivery.message.execution_id,
                    message_id = %delivery.message.message_id,
                    error = %err,
                    "dead-lettering failed; message will be redelivered"
                );
                self.stats.queue_errors += 1;
            }
        }
    }
}

/// A supervisor running on its own Tokio task.
pub struct SupervisorHandle {
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<Result<TrackerStats>>,
}

impl SupervisorHandle {
    pub fn start(
        reconciler: Arc<Reconciler>,
        queue: Arc<dyn StatusQueue>,
        settings: &TrackerSettings,
        options: SupervisorOptions,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = shutdown::channel();
        let supervisor = Supervisor::new(reconciler, queue, settings, options, shutdown_rx);
        let handle = tokio::spawn(supervisor.run());
        Self {
            shutdown_tx,
            handle,
        }
    }

    pub fn trigger_shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Wait for the supervisor to stop on its own (e.g. `exit_when_idle`).
    pub async fn join(self) -> Result<TrackerStats> {
        match self.handle.await {
            Ok(result) => result,
            Err(err) => Err(TrackerError::Other(anyhow!("supervisor task panicked: {err}"))),
        }
    }

    pub async fn shutdown(self) -> Result<TrackerStats> {
        self.trigger_shutdown();
        self.join().await
    }
}
