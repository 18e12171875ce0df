//! Serve command implementation.

use filesync_server::{ServerConfig, SyncServer};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Runs the store server until Ctrl-C.
pub fn run(
    bind: SocketAddr,
    root: PathBuf,
    max_upload_bytes: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = ServerConfig::new(bind, root).with_max_upload_bytes(max_upload_bytes);
    config.ensure_root()?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async move {
        SyncServer::new(config)
            .serve(async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!("cannot listen for Ctrl-C: {}", e);
                }
                tracing::info!("shutting down");
            })
            .await
    })?;

    Ok(())
}
