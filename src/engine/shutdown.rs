// src/engine/shutdown.rs

//! Shutdown signalling over a `watch::channel(false)`.
//!
//! The sender side flips the value to `true` once; every loop and backoff
//! sleep observes it through these helpers. A dropped sender never counts as
//! a shutdown request.

use std::time::Duration;

use tokio::sync::watch;

/// Create a shutdown channel. Send `true` to request shutdown.
pub fn channel() -> (watch::Sender<bool>, watch::Receiver<bool>) {
    watch::channel(false)
}

pub fn is_requested(rx: &watch::Receiver<bool>) -> bool {
    *rx.borrow()
}

/// Resolve once shutdown has been requested. Pends forever if the sender is
/// dropped without requesting it.
pub async fn wait_for_shutdown(rx: &mut watch::Receiver<bool>) {
    if rx.wait_for(|requested| *requested).await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// Sleep for `delay` unless shutdown is requested first.
///
/// Returns `false` when shutdown interrupted (or preceded) the wait.
pub async fn sleep_unless_shutdown(delay: Duration, rx: &mut watch::Receiver<bool>) -> bool {
    if is_requested(rx) {
        return false;
    }
    tokio::select! {
        _ = tokio::time::sleep(delay) => true,
        _ = wait_for_shutdown(rx) => false,
    }
}
