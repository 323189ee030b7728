// tests/transition_properties.rs

mod common;
use crate::common::builders::ExecutionBuilder;
use crate::common::reconciler;

use proptest::prelude::*;

use resultstracker::engine::{Outcome, TransitionTable};
use resultstracker::errors::TrackerError;
use resultstracker::models::ExecutionStatus;
use resultstracker::queue::StatusMessage;
use resultstracker::store::MemoryExecutionStore;

fn block_on<F: std::future::Future>(f: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(f)
}

/// Walk the transition graph from `requested`, picking successors by index.
/// Stops at the first terminal status.
fn walk(choices: &[usize]) -> Vec<ExecutionStatus> {
    let table = TransitionTable::new();
    let mut path = Vec::new();
    let mut current = ExecutionStatus::Requested;
    for choice in choices {
        let next = table.successors(current);
        if next.is_empty() {
            break;
        }
        current = next[choice % next.len()];
        path.push(current);
    }
    path
}

fn any_status() -> impl Strategy<Value = ExecutionStatus> {
    prop::sample::select(ExecutionStatus::ALL.to_vec())
}

fn terminal_status() -> impl Strategy<Value = ExecutionStatus> {
    prop::sample::select(
        ExecutionStatus::ALL
            .into_iter()
            .filter(|s| s.is_terminal())
            .collect::<Vec<_>>(),
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn valid_sequences_end_in_last_status(
        choices in prop::collection::vec(any::<usize>(), 1..6),
        repeat_each in any::<bool>(),
        result in "[a-z]{1,8}",
    ) {
        let path = walk(&choices);
        prop_assume!(!path.is_empty());

        let store = MemoryExecutionStore::new();
        store.insert(ExecutionBuilder::new("E1").build());
        let (reconciler, dispatcher) = reconciler(&store);

        let messages: Vec<StatusMessage> = path
            .iter()
            .map(|status| {
                let msg = StatusMessage::new("E1", *status);
                if status.is_terminal() { msg.with_result(result.clone()) } else { msg }
            })
            .collect();

        block_on(async {
            for msg in &messages {
                reconciler.apply(msg).await.unwrap();
                if repeat_each {
                    let again = reconciler.apply(msg).await.unwrap();
                    assert_eq!(again, Outcome::Duplicate);
                }
            }
        });

        let last = *path.last().unwrap();
        let stored = store.snapshot("E1").unwrap();
        prop_assert_eq!(stored.record.status, last);
        prop_assert_eq!(stored.revision as usize, path.len());
        if last.is_terminal() {
            prop_assert_eq!(stored.record.result.as_deref(), Some(result.as_str()));
            prop_assert!(stored.record.end_timestamp.is_some());
            prop_assert_eq!(dispatcher.notified().len(), 1);
        } else {
            prop_assert!(stored.record.result.is_none());
            prop_assert!(dispatcher.notified().is_empty());
        }
    }

    #[test]
    fn nothing_after_terminal_mutates(
        terminal in terminal_status(),
        incoming in any_status(),
        stored_result in "[a-z]{1,4}",
        incoming_result in prop::option::of("[a-z]{1,4}"),
    ) {
        let store = MemoryExecutionStore::new();
        store.insert(
            ExecutionBuilder::new("E1")
                .status(terminal)
                .result(&stored_result)
                .build(),
        );
        let before = store.snapshot("E1").unwrap();
        let (reconciler, dispatcher) = reconciler(&store);

        let mut msg = StatusMessage::new("E1", incoming);
        msg.result = incoming_result.clone();
        let outcome = block_on(reconciler.apply(&msg));

        prop_assert_eq!(store.snapshot("E1").unwrap(), before);
        prop_assert_eq!(store.write_count(), 0);
        prop_assert!(dispatcher.notified().is_empty());

        let payload_differs = incoming_result
            .as_deref()
            .is_some_and(|r| r != stored_result);
        match outcome {
            Ok(Outcome::Duplicate) => {
                prop_assert_eq!(incoming, terminal);
                prop_assert!(!payload_differs);
            }
            Ok(Outcome::Stale) => {
                prop_assert_ne!(incoming, terminal);
            }
            Err(TrackerError::ResultConflict { .. }) => {
                prop_assert_eq!(incoming, terminal);
                prop_assert!(payload_differs);
            }
            other => {
                prop_assert!(false, "unexpected outcome {:?}", other);
            }
        }
    }
}
