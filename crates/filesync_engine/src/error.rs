//! Error types for the sync engine.

use filesync_protocol::ProtocolError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during sync operations.
///
/// None of these is fatal to the engine: each one abandons a single
/// operation or pass, and the next natural trigger retries.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Network or transport error.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// The remote listing could not be fetched; the pass is abandoned.
    #[error("remote snapshot unavailable: {0}")]
    SnapshotUnavailable(Box<SyncError>),

    /// Malformed response body.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Server answered with a non-success status.
    #[error("server error {status}: {message}")]
    Server {
        /// HTTP status code.
        status: u16,
        /// Error message from the response body.
        message: String,
    },

    /// Local filesystem error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Filesystem watcher error.
    #[error("watch error: {0}")]
    Watch(#[from] notify::Error),

    /// The agent was shut down.
    #[error("sync cancelled")]
    Cancelled,
}

impl SyncError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Wraps a listing failure.
    pub fn snapshot_unavailable(cause: SyncError) -> Self {
        Self::SnapshotUnavailable(Box::new(cause))
    }

    /// Returns true if the next trigger may succeed where this one failed.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Transport { retryable, .. } => *retryable,
            SyncError::SnapshotUnavailable(cause) => cause.is_retryable(),
            SyncError::Server { status, .. } => *status >= 500 || *status == 408,
            SyncError::Io(_) => true,
            _ => false,
        }
    }
}
