//! Error types for the store server.

use filesync_protocol::ProtocolError;
use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur in the store server.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Invalid request format.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// File name rejected by validation.
    #[error(transparent)]
    InvalidName(#[from] ProtocolError),

    /// No such file in the store.
    #[error("file not found: {0}")]
    NotFound(String),

    /// No such route.
    #[error("no such endpoint: {0}")]
    UnknownEndpoint(String),

    /// Route exists but not for this method.
    #[error("method {method} not allowed for {path}")]
    MethodNotAllowed {
        /// Request method.
        method: String,
        /// Request path.
        path: String,
    },

    /// Upload body exceeds the configured limit.
    #[error("payload too large: {size} > {limit} bytes")]
    PayloadTooLarge {
        /// Body size.
        size: usize,
        /// Configured limit.
        limit: usize,
    },

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServerError {
    /// HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            ServerError::InvalidRequest(_) | ServerError::InvalidName(_) => 400,
            ServerError::NotFound(_) | ServerError::UnknownEndpoint(_) => 404,
            ServerError::MethodNotAllowed { .. } => 405,
            ServerError::PayloadTooLarge { .. } => 413,
            ServerError::Io(_) => 500,
        }
    }

    /// Returns true if this is a client error (4xx).
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }

    /// Returns true if this is a server error (5xx).
    pub fn is_server_error(&self) -> bool {
        self.status_code() >= 500
    }
}
