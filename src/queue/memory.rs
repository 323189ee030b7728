// src/queue/memory.rs

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::errors::Result;
use crate::types::BoxFuture;

use super::{Delivery, StatusMessage, StatusQueue};

/// A message that was moved to the dead-letter queue.
#[derive(Debug, Clone, PartialEq)]
pub struct DeadLetter {
    pub message: StatusMessage,
    pub reason: String,
}

#[derive(Debug)]
struct InFlight {
    message: StatusMessage,
    receipt: String,
    attempt: u32,
    visible_at: Instant,
}

#[derive(Debug, Default)]
struct QueueState {
    ready: VecDeque<(StatusMessage, u32)>,
    in_flight: HashMap<String, InFlight>,
    acked: Vec<String>,
    dead_letters: Vec<DeadLetter>,
}

impl QueueState {
    /// Move in-flight messages whose visibility timeout lapsed back to the
    /// front of the ready queue.
    fn requeue_expired(&mut self, now: Instant) {
        let expired: Vec<String> = self
            .in_flight
            .iter()
            .filter(|(_, f)| f.visible_at <= now)
            .map(|(id, _)| id.clone())
            .collect();

        for id in expired {
            if let Some(f) = self.in_flight.remove(&id) {
                debug!(message_id = %id, attempt = f.attempt, "visibility timeout lapsed; redelivering");
                self.ready.push_front((f.message, f.attempt));
            }
        }
    }

    /// Remove the in-flight entry only if `receipt` is its current delivery.
    fn settle(&mut self, delivery: &Delivery) -> Option<InFlight> {
        let id = &delivery.message.message_id;
        match self.in_flight.get(id) {
            Some(f) if f.receipt == delivery.receipt => self.in_flight.remove(id),
            _ => {
                debug!(
                    message_id = %id,
                    receipt = %delivery.receipt,
                    "settling a delivery that is no longer current; ignoring"
                );
                None
            }
        }
    }
}

/// In-process status queue with visibility-timeout redelivery.
///
/// Clones share the same queue, so a test can keep one handle for publishing
/// and inspection while the supervisor consumes through another.
#[derive(Debug, Clone, Default)]
pub struct MemoryStatusQueue {
    state: Arc<Mutex<QueueState>>,
}

impl MemoryStatusQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, message: StatusMessage) {
        self.lock().ready.push_back((message, 0));
    }

    /// Messages waiting to be received (excluding in-flight ones).
    pub fn ready_len(&self) -> usize {
        self.lock().ready.len()
    }

    pub fn in_flight_len(&self) -> usize {
        self.lock().in_flight.len()
    }

    /// Ids of acknowledged messages, in ack order.
    pub fn acked(&self) -> Vec<String> {
        self.lock().acked.clone()
    }

    pub fn dead_letters(&self) -> Vec<DeadLetter> {
        self.lock().dead_letters.clone()
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn receive_now(&self, max: usize, visibility_timeout: Duration) -> Vec<Delivery> {
        let now = Instant::now();
        let mut state = self.lock();
        state.requeue_expired(now);

        let mut batch = Vec::new();
        while batch.len() < max {
            let Some((message, previous)) = state.ready.pop_front() else {
                break;
            };
            let attempt = previous + 1;
            let receipt = format!("{}#{}", message.message_id, attempt);
            state.in_flight.insert(
                message.message_id.clone(),
                InFlight {
                    message: message.clone(),
                    receipt: receipt.clone(),
                    attempt,
                    visible_at: now + visibility_timeout,
                },
            );
            batch.push(Delivery {
                message,
                receipt,
                attempt,
            });
        }
        batch
    }
}

impl StatusQueue for MemoryStatusQueue {
    fn receive_batch(
        &self,
        max: usize,
        visibility_timeout: Duration,
    ) -> BoxFuture<'_, Result<Vec<Delivery>>> {
        Box::pin(async move { Ok(self.receive_now(max, visibility_timeout)) })
    }

    fn ack<'a>(&'a self, delivery: &'a Delivery) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let mut state = self.lock();
            if let Some(f) = state.settle(delivery) {
                state.acked.push(f.message.message_id);
            }
            Ok(())
        })
    }

    fn nack_to_dead_letter<'a>(
        &'a self,
        delivery: &'a Delivery,
        reason: &'a str,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let mut state = self.lock();
            if let Some(f) = state.settle(delivery) {
                state.dead_letters.push(DeadLetter {
                    message: f.message,
                    reason: reason.to_string(),
                });
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ExecutionStatus;

    const VISIBILITY: Duration = Duration::from_secs(30);

    #[tokio::test(start_paused = true)]
    async fn unacked_messages_come_back_after_visibility_timeout() {
        let queue = MemoryStatusQueue::new();
        queue.publish(StatusMessage::new("E1", ExecutionStatus::Running));

        let first = queue.receive_batch(10, VISIBILITY).await.unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].attempt, 1);
        assert!(queue.receive_batch(10, VISIBILITY).await.unwrap().is_empty());

        tokio::time::advance(VISIBILITY + Duration::from_millis(1)).await;

        let second = queue.receive_batch(10, VISIBILITY).await.unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].attempt, 2);
        assert_eq!(second[0].message, first[0].message);

        // The first delivery is no longer current; acking it is a no-op.
        queue.ack(&first[0]).await.unwrap();
        assert!(queue.acked().is_empty());
        queue.ack(&second[0]).await.unwrap();
        assert_eq!(queue.acked(), vec![first[0].message.message_id.clone()]);
        assert_eq!(queue.in_flight_len(), 0);
    }

    #[tokio::test]
    async fn batches_are_bounded_and_fifo() {
        let queue = MemoryStatusQueue::new();
        for id in ["E1", "E2", "E3"] {
            queue.publish(StatusMessage::new(id, ExecutionStatus::Running));
        }

        let batch = queue.receive_batch(2, VISIBILITY).await.unwrap();
        let ids: Vec<_> = batch.iter().map(|d| d.message.execution_id.as_str()).collect();
        assert_eq!(ids, vec!["E1", "E2"]);
        assert_eq!(queue.ready_len(), 1);
    }

    #[tokio::test]
    async fn dead_letter_records_reason() {
        let queue = MemoryStatusQueue::new();
        queue.publish(StatusMessage::new("E9", ExecutionStatus::Running));
        let batch = queue.receive_batch(1, VISIBILITY).await.unwrap();

        queue
            .nack_to_dead_letter(&batch[0], "unknown_execution: E9")
            .await
            .unwrap();

        let dead = queue.dead_letters();
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].reason, "unknown_execution: E9");
        assert_eq!(queue.in_flight_len(), 0);
    }
}
