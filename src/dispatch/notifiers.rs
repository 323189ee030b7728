// src/dispatch/notifiers.rs

use anyhow::Context;
use tokio::sync::mpsc;
use tracing::info;

use crate::models::ActionExecution;
use crate::types::BoxFuture;

use super::Notifier;

/// Logs the final snapshot. Used when no downstream collaborator is wired.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn deliver<'a>(&'a self, snapshot: &'a ActionExecution) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(async move {
            info!(
                execution_id = %snapshot.id,
                status = %snapshot.status,
                "execution finished: {snapshot}"
            );
            Ok(())
        })
    }
}

/// Forwards snapshots to an in-process consumer (e.g. a workflow engine
/// task) over a bounded channel.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::Sender<ActionExecution>,
}

impl ChannelNotifier {
    pub fn new(tx: mpsc::Sender<ActionExecution>) -> Self {
        Self { tx }
    }
}

impl Notifier for ChannelNotifier {
    fn deliver<'a>(&'a self, snapshot: &'a ActionExecution) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(async move {
            self.tx
                .send(snapshot.clone())
                .await
                .with_context(|| format!("forwarding execution '{}' downstream", snapshot.id))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Action;

    #[tokio::test]
    async fn channel_notifier_forwards_and_reports_closed_receiver() {
        let (tx, mut rx) = mpsc::channel(1);
        let notifier = ChannelNotifier::new(tx);
        let snapshot = ActionExecution::requested("E1", Action::new("a", "a.sh", "local"));

        notifier.deliver(&snapshot).await.unwrap();
        assert_eq!(rx.recv().await.unwrap().id, "E1");

        drop(rx);
        let err = notifier.deliver(&snapshot).await.unwrap_err();
        assert!(err.to_string().contains("E1"));
    }
}
