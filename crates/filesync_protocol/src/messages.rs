//! Store protocol messages.
//!
//! All non-download responses are JSON objects so callers branch on
//! explicit fields rather than prose.

use crate::digest::{ContentDigest, Fingerprint};
use crate::error::ProtocolResult;
use crate::timestamp::Timestamp;
use serde::{Deserialize, Serialize};

/// One of the five store endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// `GET /files`: every name with its digest.
    List,
    /// `GET /file_info/{name}`: last-write time of one file.
    Info(String),
    /// `POST /upload/{name}`: store the raw request body under `name`.
    Upload(String),
    /// `GET /download/{name}`: raw bytes of one file.
    Download(String),
    /// `DELETE /delete/{name}`: remove one file.
    Delete(String),
}

impl Endpoint {
    /// HTTP method for this endpoint.
    pub fn method(&self) -> &'static str {
        match self {
            Endpoint::List | Endpoint::Info(_) | Endpoint::Download(_) => "GET",
            Endpoint::Upload(_) => "POST",
            Endpoint::Delete(_) => "DELETE",
        }
    }

    /// Request path, with the name percent-encoded.
    pub fn path(&self) -> String {
        match self {
            Endpoint::List => "/files".to_string(),
            Endpoint::Info(name) => format!("/file_info/{}", urlencoding::encode(name)),
            Endpoint::Upload(name) => format!("/upload/{}", urlencoding::encode(name)),
            Endpoint::Download(name) => format!("/download/{}", urlencoding::encode(name)),
            Endpoint::Delete(name) => format!("/delete/{}", urlencoding::encode(name)),
        }
    }

    /// Parses a request path (ignoring any query string).
    ///
    /// The name is percent-decoded but not validated; the store does that.
    pub fn parse(path: &str) -> Option<Endpoint> {
        let path = path.split('?').next().unwrap_or(path);
        if path == "/files" {
            return Some(Endpoint::List);
        }

        let (prefix, raw) = path.strip_prefix('/')?.split_once('/')?;
        let name = urlencoding::decode(raw).ok()?.into_owned();
        match prefix {
            "file_info" => Some(Endpoint::Info(name)),
            "upload" => Some(Endpoint::Upload(name)),
            "download" => Some(Endpoint::Download(name)),
            "delete" => Some(Endpoint::Delete(name)),
            _ => None,
        }
    }
}

/// One entry of a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// Flat file name.
    pub name: String,
    /// Content digest, `None` if the server could not read the file.
    pub digest: Option<ContentDigest>,
}

impl FileEntry {
    /// Builds an entry from a fingerprint.
    pub fn new(name: impl Into<String>, fingerprint: Fingerprint) -> Self {
        Self {
            name: name.into(),
            digest: fingerprint.digest(),
        }
    }

    /// Returns the entry's fingerprint.
    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::from(self.digest)
    }
}

/// Response body of `GET /files`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListResponse {
    /// All files in the store.
    pub files: Vec<FileEntry>,
}

impl ListResponse {
    /// Encodes to JSON.
    pub fn encode(&self) -> ProtocolResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decodes from JSON.
    pub fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Response body of `GET /file_info/{name}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileInfo {
    /// Flat file name.
    pub name: String,
    /// Last-write time in fractional seconds since the epoch.
    pub mod_time: f64,
}

impl FileInfo {
    /// Creates an info record.
    pub fn new(name: impl Into<String>, mod_time: Timestamp) -> Self {
        Self {
            name: name.into(),
            mod_time: mod_time.as_secs_f64(),
        }
    }

    /// Returns the last-write time.
    pub fn timestamp(&self) -> Timestamp {
        Timestamp::from_secs_f64(self.mod_time)
    }

    /// Encodes to JSON.
    pub fn encode(&self) -> ProtocolResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decodes from JSON.
    pub fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Success body of mutating endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Confirmation {
    /// Human-readable confirmation.
    pub message: String,
}

impl Confirmation {
    /// Creates a confirmation.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Encodes to JSON.
    pub fn encode(&self) -> ProtocolResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decodes from JSON.
    pub fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Body of every error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Error description.
    pub error: String,
}

impl ErrorBody {
    /// Creates an error body.
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }

    /// Encodes to JSON.
    pub fn encode(&self) -> ProtocolResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decodes from JSON.
    pub fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
