//! CLI command implementations.

pub mod list;
pub mod serve;
pub mod sync;
pub mod watch;

use filesync_engine::{HttpTransport, ReqwestClient, SyncResult};
use std::time::Duration;

/// Builds the HTTP transport. Must be called outside the async runtime.
pub fn http_transport(server: &str, timeout: Duration) -> SyncResult<HttpTransport<ReqwestClient>> {
    Ok(HttpTransport::new(server, ReqwestClient::new(timeout)?))
}
