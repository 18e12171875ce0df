//! # filesync Protocol
//!
//! Store protocol types and content fingerprinting for filesync.
//!
//! This crate provides:
//! - `ContentDigest` / `Fingerprint` for content identity
//! - `Timestamp` for last-write times
//! - Wire messages for the five store endpoints (list, info, upload,
//!   download, delete)
//! - Flat file-name validation
//!
//! Apart from the fingerprinter reading a caller-supplied stream, this is a
//! pure protocol crate with no I/O.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod digest;
mod error;
mod messages;
mod name;
mod timestamp;

pub use digest::{fingerprint, fingerprint_file, ContentDigest, Fingerprint, CHUNK_SIZE};
pub use error::{ProtocolError, ProtocolResult};
pub use messages::{Confirmation, Endpoint, ErrorBody, FileEntry, FileInfo, ListResponse};
pub use name::{file_name_of, validate_name};
pub use timestamp::Timestamp;
