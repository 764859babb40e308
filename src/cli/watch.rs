//! Watch command implementation

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

use crate::config::Config;
use crate::store::ActivityStore;
use crate::watcher::Orchestrator;

/// Backfill, then follow live changes until SIGINT/SIGTERM.
pub async fn run(store: Arc<ActivityStore>, config: &Config) -> Result<()> {
    let orchestrator = Arc::new(Orchestrator::new(
        store,
        config.watch_roots(),
        config.watch_options(),
    ));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut runner = tokio::spawn(orchestrator.run(shutdown_rx));

    tokio::select! {
        finished = &mut runner => {
            return finished.context("watch task panicked")?;
        }
        signal = wait_for_shutdown() => signal?,
    }

    info!("Shutting down");
    let _ = shutdown_tx.send(true);
    runner.await.context("watch task panicked")?
}

async fn wait_for_shutdown() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm =
            signal(SignalKind::terminate()).context("Failed to register SIGTERM")?;
        let mut sigint = signal(SignalKind::interrupt()).context("Failed to register SIGINT")?;
        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM"),
            _ = sigint.recv() => info!("Received SIGINT"),
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .context("Failed to register Ctrl+C handler")?;
        info!("Received Ctrl+C");
    }
    Ok(())
}
