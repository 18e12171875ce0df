//! Sync command implementation.

use filesync_engine::{PassReport, SyncAgent, SyncConfig};
use serde::Serialize;
use std::sync::Arc;

/// Result of a one-shot pass.
#[derive(Debug, Serialize)]
pub struct SyncSummary {
    /// Synced directory.
    pub dir: String,
    /// Server URL.
    pub server: String,
    /// Files downloaded.
    pub pulled: usize,
    /// Files uploaded.
    pub pushed: usize,
    /// Local files deleted.
    pub deleted_local: usize,
    /// Names already in sync.
    pub up_to_date: usize,
    /// Names skipped this pass.
    pub skipped: usize,
    /// Names whose transfer failed.
    pub failed: usize,
    /// Pass duration in milliseconds.
    pub duration_ms: u128,
}

impl SyncSummary {
    fn new(config: &SyncConfig, report: &PassReport) -> Self {
        Self {
            dir: config.local_dir.display().to_string(),
            server: config.server_url.clone(),
            pulled: report.pulled,
            pushed: report.pushed,
            deleted_local: report.deleted_local,
            up_to_date: report.up_to_date,
            skipped: report.skipped,
            failed: report.failed,
            duration_ms: report.duration.as_millis(),
        }
    }
}

/// Runs one reconciliation pass and prints the outcome.
pub fn run(config: SyncConfig, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let transport = super::http_transport(&config.server_url, config.timeout)?;
    let agent = SyncAgent::new(config, Arc::new(transport))?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let report = runtime.block_on(agent.sync_once())?;
    drop(runtime);

    let summary = SyncSummary::new(agent.config(), &report);
    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&summary)?),
        _ => {
            println!("Synced {} with {}", summary.dir, summary.server);
            println!("  pulled:        {}", summary.pulled);
            println!("  pushed:        {}", summary.pushed);
            println!("  deleted local: {}", summary.deleted_local);
            println!("  up to date:    {}", summary.up_to_date);
            println!("  skipped:       {}", summary.skipped);
            println!("  failed:        {}", summary.failed);
            println!("  took {} ms", summary.duration_ms);
        }
    }

    if summary.failed > 0 {
        return Err(format!("{} transfers failed", summary.failed).into());
    }
    Ok(())
}
