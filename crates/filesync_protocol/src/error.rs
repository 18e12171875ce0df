//! Error types for the store protocol.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors raised while validating or decoding protocol data.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// File name is not a valid flat name.
    #[error("invalid file name {name:?}: {reason}")]
    InvalidName {
        /// The offending name.
        name: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// Digest string is not 64 hex characters.
    #[error("invalid digest: {0}")]
    InvalidDigest(String),

    /// Malformed JSON body.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = ProtocolError::InvalidName {
            name: "a/b".into(),
            reason: "contains a path separator",
        };
        let msg = err.to_string();
        assert!(msg.contains("a/b"));
        assert!(msg.contains("separator"));
    }
}
