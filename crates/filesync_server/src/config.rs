//! Server configuration.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration for the store server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to.
    pub bind_addr: SocketAddr,
    /// Directory holding the stored files.
    pub root: PathBuf,
    /// Request timeout.
    pub request_timeout: Duration,
    /// Largest accepted upload body, in bytes.
    pub max_upload_bytes: usize,
}

impl ServerConfig {
    /// Creates a new server configuration storing files under `root`.
    pub fn new(bind_addr: SocketAddr, root: impl Into<PathBuf>) -> Self {
        Self {
            bind_addr,
            root: root.into(),
            request_timeout: Duration::from_secs(30),
            max_upload_bytes: 1024 * 1024 * 1024,
        }
    }

    /// Sets the bind address.
    pub fn with_bind_addr(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Sets the request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the maximum upload size.
    pub fn with_max_upload_bytes(mut self, max: usize) -> Self {
        self.max_upload_bytes = max;
        self
    }

    /// Returns the storage directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Creates the storage directory if it does not exist.
    pub fn ensure_root(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.root)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new(SocketAddr::from(([127, 0, 0, 1], 8080)), "sync_folder")
    }
}
