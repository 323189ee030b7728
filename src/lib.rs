// src/lib.rs

pub mod cli;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod errors;
pub mod fs;
pub mod logging;
pub mod models;
pub mod queue;
pub mod store;
pub mod types;

use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};

use crate::cli::CliArgs;
use crate::config::TrackerConfig;
use crate::dispatch::{LogNotifier, spawn_dispatcher};
use crate::engine::{Reconciler, Supervisor, SupervisorOptions, shutdown};
use crate::types::BackendUrl;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - the execution store and status queue named in the config
/// - the retrying dispatcher
/// - reconciler + supervisor
/// - Ctrl-C handling
pub async fn run(args: CliArgs, config: TrackerConfig) -> Result<()> {
    if args.dry_run {
        print_dry_run(&config);
        return Ok(());
    }

    if config.store == BackendUrl::Memory || config.queue == BackendUrl::Memory {
        warn!("memory:// backends are not durable; state is lost on exit");
    }

    let store = store::open(&config.store)?;
    let queue = queue::open(&config.queue)?;

    let (dispatcher, dispatch_loop) = spawn_dispatcher(
        Arc::new(LogNotifier),
        config.tracker.backoff,
        config.tracker.dispatch_max_attempts,
    );

    let reconciler = Arc::new(Reconciler::new(
        store,
        Arc::new(dispatcher),
        config.tracker.max_reconcile_attempts,
    ));

    // Ctrl-C → graceful shutdown.
    let (shutdown_tx, shutdown_rx) = shutdown::channel();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            eprintln!("failed to listen for Ctrl+C: {e}");
            return;
        }
        info!("Ctrl+C received; shutting down");
        let _ = shutdown_tx.send(true);
    });

    let options = SupervisorOptions {
        exit_when_idle: args.once,
    };
    let supervisor = Supervisor::new(reconciler, queue, &config.tracker, options, shutdown_rx);
    let stats = supervisor.run().await?;
    info!(?stats, "supervisor finished");

    // The supervisor held the last dispatcher handle, so the loop is draining.
    match tokio::time::timeout(config.tracker.shutdown_grace, dispatch_loop).await {
        Ok(Ok(report)) => info!(
            delivered = report.delivered,
            failed = report.failed,
            "dispatch loop drained"
        ),
        Ok(Err(e)) => warn!(error = %e, "dispatch loop panicked"),
        Err(_) => warn!("dispatch loop did not drain within the shutdown grace period"),
    }

    Ok(())
}

/// Simple dry-run output: print the effective configuration.
fn print_dry_run(cfg: &TrackerConfig) {
    let t = &cfg.tracker;
    println!("resultstracker dry-run");
    println!("  resultstracker.logging = {}", cfg.logging.display());
    println!("  database.connection = {:?}", cfg.store);
    println!("  messaging.endpoint = {:?}", cfg.queue);
    println!();
    println!("tracker:");
    println!("  worker_pool_size = {}", t.worker_pool_size);
    println!("  batch_size = {}", t.batch_size);
    println!("  visibility_timeout = {:?}", t.visibility_timeout);
    println!("  max_reconcile_attempts = {}", t.max_reconcile_attempts);
    println!("  max_batch_retries = {}", t.max_batch_retries);
    println!("  exhausted_retry_policy = {:?}", t.exhausted_retry_policy);
    println!("  backoff = {:?}..{:?}", t.backoff.base, t.backoff.max);
    println!("  idle_poll_interval = {:?}", t.idle_poll_interval);
    println!("  shutdown_grace = {:?}", t.shutdown_grace);
    println!("  dispatch_max_attempts = {}", t.dispatch_max_attempts);
}
