//! HTTP store server.

use crate::config::ServerConfig;
use crate::handler::{HandlerContext, HandlerResponse, RequestHandler};
use crate::store::FileStore;
use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{header, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

/// The store server.
///
/// Serves one directory over the five store endpoints. Routing and request
/// handling live in [`RequestHandler`], which is independent of HTTP; this
/// type only adapts it to axum.
///
/// # Example
///
/// ```no_run
/// use filesync_server::{ServerConfig, SyncServer};
///
/// # async fn run() -> std::io::Result<()> {
/// let config = ServerConfig::default();
/// config.ensure_root()?;
/// let server = SyncServer::new(config);
/// server.serve(async { let _ = tokio::signal::ctrl_c().await; }).await
/// # }
/// ```
pub struct SyncServer {
    handler: Arc<RequestHandler>,
    context: Arc<HandlerContext>,
}

#[derive(Clone)]
struct AppState {
    handler: Arc<RequestHandler>,
    timeout: Duration,
}

impl SyncServer {
    /// Creates a new server over `config.root`.
    pub fn new(config: ServerConfig) -> Self {
        let store = Arc::new(FileStore::new(config.root.clone()));
        Self::with_store(config, store)
    }

    /// Creates a server over an existing store.
    pub fn with_store(config: ServerConfig, store: Arc<FileStore>) -> Self {
        let context = Arc::new(HandlerContext::new(config, store));
        let handler = Arc::new(RequestHandler::new(Arc::clone(&context)));

        Self { handler, context }
    }

    /// Returns the request handler.
    pub fn handler(&self) -> &RequestHandler {
        &self.handler
    }

    /// Returns the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.context.config
    }

    /// Handles one request without going through HTTP.
    pub fn handle(&self, method: &str, path: &str, body: &[u8]) -> HandlerResponse {
        self.handler.handle(method, path, body)
    }

    /// Builds the axum router. Every request is forwarded to the handler.
    pub fn router(&self) -> Router {
        let state = AppState {
            handler: Arc::clone(&self.handler),
            timeout: self.context.config.request_timeout,
        };

        Router::new()
            .fallback(forward)
            .layer(DefaultBodyLimit::max(self.context.config.max_upload_bytes))
            .with_state(state)
    }

    /// Binds `config.bind_addr` and serves until `shutdown` resolves.
    pub async fn serve<F>(self, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.context.config.bind_addr).await?;
        self.serve_on(listener, shutdown).await
    }

    /// Serves on an already bound listener until `shutdown` resolves.
    pub async fn serve_on<F>(self, listener: TcpListener, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr: SocketAddr = listener.local_addr()?;
        tracing::info!(
            "serving {} on http://{}",
            self.context.config.root.display(),
            addr
        );

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("server shutdown complete");
        Ok(())
    }
}

async fn forward(State(state): State<AppState>, method: Method, uri: Uri, body: Bytes) -> Response {
    let path = uri.path().to_string();
    let handler = Arc::clone(&state.handler);

    // The store does blocking file I/O.
    let task = tokio::task::spawn_blocking(move || handler.handle(method.as_str(), &path, &body));

    match tokio::time::timeout(state.timeout, task).await {
        Ok(Ok(response)) => {
            let status =
                StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (
                status,
                [(header::CONTENT_TYPE, response.content_type)],
                response.body,
            )
                .into_response()
        }
        Ok(Err(e)) => {
            tracing::error!("request handler panicked: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
        Err(_) => {
            tracing::warn!("request timed out after {:?}", state.timeout);
            StatusCode::REQUEST_TIMEOUT.into_response()
        }
    }
}
