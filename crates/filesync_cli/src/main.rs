//! filesync CLI
//!
//! Command-line client and server for filesync.
//!
//! # Commands
//!
//! - `serve` - Run the file store server
//! - `watch` - Watch a directory and keep it in sync
//! - `sync` - Run a single reconciliation pass
//! - `list` - List the files held by a server

mod commands;

use clap::{Args, Parser, Subcommand};
use filesync_engine::{OrphanPolicy, SyncConfig};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// filesync command-line tools.
#[derive(Parser)]
#[command(name = "filesync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Options shared by every client command.
#[derive(Args, Clone)]
pub struct ClientArgs {
    /// Server base URL
    #[arg(short, long, default_value = "http://127.0.0.1:8080")]
    server: String,

    /// Local directory to sync
    #[arg(short, long, default_value = ".")]
    dir: PathBuf,

    /// What to do with files that exist only locally (manifest, mirror)
    #[arg(long, default_value = "manifest")]
    orphans: OrphanPolicy,

    /// Where to keep the sync manifest (default: inside the directory)
    #[arg(long)]
    manifest: Option<PathBuf>,

    /// Extra ignore pattern (prefix or suffix), may be repeated
    #[arg(long = "ignore")]
    ignore: Vec<String>,

    /// Replace the default ignore patterns instead of extending them
    #[arg(long)]
    no_default_ignores: bool,

    /// Request timeout in seconds
    #[arg(long, default_value = "30")]
    timeout_secs: u64,
}

/// Name of the manifest file kept inside the synced directory.
const MANIFEST_FILE: &str = ".filesync-manifest.json";

impl ClientArgs {
    /// Builds the engine configuration.
    pub fn to_config(&self) -> SyncConfig {
        let mut config = SyncConfig::new(&self.server, &self.dir)
            .with_orphan_policy(self.orphans)
            .with_timeout(Duration::from_secs(self.timeout_secs))
            .with_manifest_path(
                self.manifest
                    .clone()
                    .unwrap_or_else(|| self.dir.join(MANIFEST_FILE)),
            );

        let mut patterns = if self.no_default_ignores {
            Vec::new()
        } else {
            config.ignore_patterns.clone()
        };
        patterns.extend(self.ignore.iter().cloned());
        config = config.with_ignore_patterns(patterns);
        config
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run the file store server
    Serve {
        /// Address to bind to
        #[arg(short, long, default_value = "127.0.0.1:8080")]
        bind: SocketAddr,

        /// Directory holding the stored files
        #[arg(short, long, default_value = "sync_folder")]
        root: PathBuf,

        /// Largest accepted upload, in bytes
        #[arg(long, default_value = "1073741824")]
        max_upload_bytes: usize,
    },

    /// Watch a directory and keep it in sync with a server
    Watch {
        #[command(flatten)]
        client: ClientArgs,

        /// Quiet period before a changed file is uploaded, in milliseconds
        #[arg(long, default_value = "1000")]
        debounce_ms: u64,

        /// Seconds between full reconciliation passes
        #[arg(long, default_value = "5")]
        interval_secs: u64,
    },

    /// Run a single reconciliation pass and exit
    Sync {
        #[command(flatten)]
        client: ClientArgs,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// List the files held by a server
    List {
        /// Server base URL
        #[arg(short, long, default_value = "http://127.0.0.1:8080")]
        server: String,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Serve {
            bind,
            root,
            max_upload_bytes,
        } => {
            commands::serve::run(bind, root, max_upload_bytes)?;
        }
        Commands::Watch {
            client,
            debounce_ms,
            interval_secs,
        } => {
            let config = client
                .to_config()
                .with_debounce_window(Duration::from_millis(debounce_ms))
                .with_reconcile_interval(Duration::from_secs(interval_secs.max(1)));
            commands::watch::run(config)?;
        }
        Commands::Sync { client, format } => {
            commands::sync::run(client.to_config(), &format)?;
        }
        Commands::List { server, format } => {
            commands::list::run(&server, &format)?;
        }
        Commands::Version => {
            println!("filesync CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
