//! Watch command implementation.

use filesync_engine::{spawn_watcher, SyncAgent, SyncConfig};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

/// Watches the configured directory until Ctrl-C.
pub fn run(config: SyncConfig) -> Result<(), Box<dyn std::error::Error>> {
    if !config.local_dir.is_dir() {
        return Err(format!("{} is not a directory", config.local_dir.display()).into());
    }

    // The blocking HTTP client must be created and dropped outside the
    // runtime, so the agent outlives `block_on`.
    let transport = super::http_transport(&config.server_url, config.timeout)?;
    let agent = SyncAgent::new(config, Arc::new(transport))?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        let (events_tx, events_rx) = mpsc::channel(agent.config().queue_capacity);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let _watcher = spawn_watcher(&agent.config().local_dir, events_tx)?;

        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("cannot listen for Ctrl-C: {}", e);
                return;
            }
            tracing::info!("shutting down");
            let _ = shutdown_tx.send(true);
        });

        agent.run(events_rx, shutdown_rx).await
    })?;

    drop(runtime);
    Ok(())
}
