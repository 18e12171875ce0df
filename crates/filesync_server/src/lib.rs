//! # filesync Server
//!
//! Directory-backed HTTP store server for filesync.
//!
//! This crate provides:
//! - A flat file store over one plain directory
//! - HTTP endpoints (list, info, upload, download, delete)
//! - An axum adapter with graceful shutdown
//!
//! # Protocol
//!
//! | method   | path                 | response                      |
//! |----------|----------------------|-------------------------------|
//! | `GET`    | `/files`             | `{"files":[{name, digest}]}`  |
//! | `GET`    | `/file_info/{name}`  | `{"name", "mod_time"}`        |
//! | `POST`   | `/upload/{name}`     | `{"message"}`                 |
//! | `GET`    | `/download/{name}`   | raw bytes                     |
//! | `DELETE` | `/delete/{name}`     | `{"message"}`                 |
//!
//! Errors are `{"error"}` with a 4xx/5xx status. The server stores whatever
//! it receives; ignore rules are a client concern.

#![deny(unsafe_code)]
#![warn(missing_docs)]
// Production code MUST NOT use panic!/unwrap()/expect()
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod config;
mod error;
mod handler;
mod server;
mod store;

pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use handler::{HandlerContext, HandlerResponse, RequestHandler, JSON, OCTET_STREAM};
pub use server::SyncServer;
pub use store::FileStore;
