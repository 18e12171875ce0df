//! Request handlers for store endpoints.

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::store::FileStore;
use filesync_protocol::{Confirmation, Endpoint, ErrorBody, FileInfo, ListResponse};
use std::sync::Arc;

/// Content type of JSON bodies.
pub const JSON: &str = "application/json";
/// Content type of downloaded file bodies.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Context for request handling.
pub struct HandlerContext {
    /// Server configuration.
    pub config: ServerConfig,
    /// File store (shared across all handlers).
    pub store: Arc<FileStore>,
}

impl HandlerContext {
    /// Creates a new handler context.
    pub fn new(config: ServerConfig, store: Arc<FileStore>) -> Self {
        Self { config, store }
    }
}

/// A transport-independent response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerResponse {
    /// HTTP status code.
    pub status: u16,
    /// Content type of `body`.
    pub content_type: &'static str,
    /// Response body.
    pub body: Vec<u8>,
}

impl HandlerResponse {
    fn json(status: u16, body: Vec<u8>) -> Self {
        Self {
            status,
            content_type: JSON,
            body,
        }
    }

    fn error(err: &ServerError) -> Self {
        let body = ErrorBody::new(err.to_string())
            .encode()
            .unwrap_or_else(|_| br#"{"error":"unencodable error"}"#.to_vec());
        Self::json(err.status_code(), body)
    }

    /// Returns true for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Handler for store requests.
pub struct RequestHandler {
    context: Arc<HandlerContext>,
}

impl RequestHandler {
    /// Creates a new request handler.
    pub fn new(context: Arc<HandlerContext>) -> Self {
        Self { context }
    }

    /// Routes one request. Never fails: errors become JSON error bodies.
    pub fn handle(&self, method: &str, path: &str, body: &[u8]) -> HandlerResponse {
        match self.dispatch(method, path, body) {
            Ok(response) => response,
            Err(e) => {
                if e.is_server_error() {
                    tracing::error!("{} {} failed: {}", method, path, e);
                } else {
                    tracing::debug!("{} {} rejected: {}", method, path, e);
                }
                HandlerResponse::error(&e)
            }
        }
    }

    fn dispatch(&self, method: &str, path: &str, body: &[u8]) -> ServerResult<HandlerResponse> {
        let endpoint =
            Endpoint::parse(path).ok_or_else(|| ServerError::UnknownEndpoint(path.to_string()))?;

        if !method.eq_ignore_ascii_case(endpoint.method()) {
            return Err(ServerError::MethodNotAllowed {
                method: method.to_string(),
                path: path.to_string(),
            });
        }

        match endpoint {
            Endpoint::List => self.handle_list(),
            Endpoint::Info(name) => self.handle_info(&name),
            Endpoint::Upload(name) => self.handle_upload(&name, body),
            Endpoint::Download(name) => self.handle_download(&name),
            Endpoint::Delete(name) => self.handle_delete(&name),
        }
    }

    /// Handles `GET /files`.
    pub fn handle_list(&self) -> ServerResult<HandlerResponse> {
        let files = self.context.store.list()?;
        let body = ListResponse { files }.encode().map_err(invalid)?;
        Ok(HandlerResponse::json(200, body))
    }

    /// Handles `GET /file_info/{name}`.
    pub fn handle_info(&self, name: &str) -> ServerResult<HandlerResponse> {
        let mod_time = self.context.store.info(name)?;
        let body = FileInfo::new(name, mod_time).encode().map_err(invalid)?;
        Ok(HandlerResponse::json(200, body))
    }

    /// Handles `POST /upload/{name}`.
    pub fn handle_upload(&self, name: &str, body: &[u8]) -> ServerResult<HandlerResponse> {
        let limit = self.context.config.max_upload_bytes;
        if body.len() > limit {
            return Err(ServerError::PayloadTooLarge {
                size: body.len(),
                limit,
            });
        }

        self.context.store.put(name, body)?;
        let body = Confirmation::new(format!("File '{name}' uploaded successfully"))
            .encode()
            .map_err(invalid)?;
        Ok(HandlerResponse::json(200, body))
    }

    /// Handles `GET /download/{name}`.
    pub fn handle_download(&self, name: &str) -> ServerResult<HandlerResponse> {
        let data = self.context.store.get(name)?;
        Ok(HandlerResponse {
            status: 200,
            content_type: OCTET_STREAM,
            body: data,
        })
    }

    /// Handles `DELETE /delete/{name}`.
    pub fn handle_delete(&self, name: &str) -> ServerResult<HandlerResponse> {
        self.context.store.delete(name)?;
        let body = Confirmation::new(format!("File '{name}' deleted successfully"))
            .encode()
            .map_err(invalid)?;
        Ok(HandlerResponse::json(200, body))
    }
}

fn invalid(err: filesync_protocol::ProtocolError) -> ServerError {
    ServerError::InvalidRequest(err.to_string())
}
