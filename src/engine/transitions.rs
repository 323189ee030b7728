// src/engine/transitions.rs

//! Pure execution-status state machine.
//!
//! ```text
//! requested -> scheduled -> running -> {succeeded, failed, timed_out, canceled}
//! requested -> canceled
//! scheduled -> canceled
//! ```
//!
//! A status is a legal successor when it is reachable through these edges, so
//! a report may skip intermediate states that were lost or are still in
//! flight. Nothing leaves a terminal state.
//!
//! No Tokio, no store, no IO: [`TransitionTable::classify`] is the single
//! decision point the reconciler consults.

use petgraph::algo::has_path_connecting;
use petgraph::graphmap::DiGraphMap;

use crate::models::ExecutionStatus;

use ExecutionStatus::*;

const EDGES: [(ExecutionStatus, ExecutionStatus); 8] = [
    (Requested, Scheduled),
    (Requested, Canceled),
    (Scheduled, Running),
    (Scheduled, Canceled),
    (Running, Succeeded),
    (Running, Failed),
    (Running, TimedOut),
    (Running, Canceled),
];

/// How an incoming status relates to the stored one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Legal forward move; write it.
    Apply,
    /// Same status (and compatible payload) as stored; nothing to do.
    Duplicate,
    /// Stored status is terminal and the update is a late or out-of-order
    /// delivery of some other status; nothing to do.
    Stale,
    /// Stored status is non-terminal and the update would move it backwards.
    Regression,
    /// Stored status is terminal, the update repeats it with a different
    /// result. The stored result wins.
    ResultConflict,
}

/// The status graph, built once.
#[derive(Debug, Clone)]
pub struct TransitionTable {
    graph: DiGraphMap<ExecutionStatus, ()>,
}

impl Default for TransitionTable {
    fn default() -> Self {
        Self::new()
    }
}

impl TransitionTable {
    pub fn new() -> Self {
        let mut graph = DiGraphMap::new();
        for status in ExecutionStatus::ALL {
            graph.add_node(status);
        }
        for (from, to) in EDGES {
            graph.add_edge(from, to, ());
        }
        Self { graph }
    }

    /// Direct edges out of `status`.
    pub fn successors(&self, status: ExecutionStatus) -> Vec<ExecutionStatus> {
        let mut next: Vec<_> = self.graph.neighbors(status).collect();
        next.sort();
        next
    }

    /// Whether `to` can follow `from` (directly or by skipping states).
    pub fn is_reachable(&self, from: ExecutionStatus, to: ExecutionStatus) -> bool {
        from != to && has_path_connecting(&self.graph, from, to, None)
    }

    /// Classify an incoming `(status, result)` against the stored record.
    ///
    /// A missing incoming result never conflicts with a stored one.
    pub fn classify(
        &self,
        stored: ExecutionStatus,
        stored_result: Option<&str>,
        incoming: ExecutionStatus,
        incoming_result: Option<&str>,
    ) -> Transition {
        if stored == incoming {
            return match incoming_result {
                Some(new) if stored.is_terminal() && stored_result != Some(new) => {
                    Transition::ResultConflict
                }
                _ => Transition::Duplicate,
            };
        }

        if stored.is_terminal() {
            return Transition::Stale;
        }

        if self.is_reachable(stored, incoming) {
            Transition::Apply
        } else {
            Transition::Regression
        }
    }
}
