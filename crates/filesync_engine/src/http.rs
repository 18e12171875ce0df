//! HTTP transport implementation.
//!
//! [`HttpTransport`] speaks the store's JSON protocol over any
//! [`HttpClient`]. [`ReqwestClient`] is the production client;
//! [`LoopbackClient`] routes requests to an in-process server for tests.

use crate::error::{SyncError, SyncResult};
use crate::snapshot::RemoteSnapshot;
use crate::transport::StoreTransport;
use filesync_protocol::{Confirmation, Endpoint, ErrorBody, FileInfo, ListResponse, Timestamp};
use parking_lot::RwLock;
use std::time::Duration;

/// A raw HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// Status code.
    pub status: u16,
    /// Response body.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Creates a response.
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Returns true for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// HTTP client abstraction.
///
/// An `Err` means no response was received at all (connection refused,
/// timeout, DNS); any status code, including errors, is an `Ok`.
pub trait HttpClient: Send + Sync {
    /// Sends a GET request.
    fn get(&self, url: &str) -> Result<HttpResponse, String>;

    /// Sends a POST request with a raw body.
    fn post(&self, url: &str, body: Vec<u8>) -> Result<HttpResponse, String>;

    /// Sends a DELETE request.
    fn delete(&self, url: &str) -> Result<HttpResponse, String>;
}

/// HTTP-based store transport.
pub struct HttpTransport<C: HttpClient> {
    /// Base URL of the store (e.g., "http://127.0.0.1:8080").
    base_url: String,
    /// HTTP client implementation.
    client: C,
    /// Last error message.
    last_error: RwLock<Option<String>>,
}

impl<C: HttpClient> HttpTransport<C> {
    /// Creates a new HTTP transport.
    pub fn new(base_url: impl Into<String>, client: C) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            last_error: RwLock::new(None),
        }
    }

    /// Returns the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the last error message.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().clone()
    }

    fn set_error(&self, err: &str) {
        *self.last_error.write() = Some(err.to_string());
    }

    fn clear_error(&self) {
        *self.last_error.write() = None;
    }

    fn send(&self, endpoint: &Endpoint, body: Option<Vec<u8>>) -> SyncResult<HttpResponse> {
        let url = format!("{}{}", self.base_url, endpoint.path());
        let result = match endpoint {
            Endpoint::Upload(_) => self.client.post(&url, body.unwrap_or_default()),
            Endpoint::Delete(_) => self.client.delete(&url),
            _ => self.client.get(&url),
        };

        match result {
            Ok(response) => {
                self.clear_error();
                Ok(response)
            }
            Err(e) => {
                self.set_error(&e);
                Err(SyncError::transport_retryable(format!(
                    "{} {}: {}",
                    endpoint.method(),
                    url,
                    e
                )))
            }
        }
    }

    fn server_error(&self, response: &HttpResponse) -> SyncError {
        let message = ErrorBody::decode(&response.body)
            .map(|b| b.error)
            .unwrap_or_else(|_| String::from_utf8_lossy(&response.body).into_owned());
        self.set_error(&message);
        SyncError::Server {
            status: response.status,
            message,
        }
    }
}

impl<C: HttpClient> StoreTransport for HttpTransport<C> {
    fn list(&self) -> SyncResult<RemoteSnapshot> {
        let response = self.send(&Endpoint::List, None)?;
        if !response.is_success() {
            return Err(self.server_error(&response));
        }
        let listing = ListResponse::decode(&response.body)?;
        Ok(RemoteSnapshot::from_entries(
            listing.files.into_iter().map(|f| {
                let fingerprint = f.fingerprint();
                (f.name, fingerprint)
            }),
        ))
    }

    fn mod_time(&self, name: &str) -> SyncResult<Option<Timestamp>> {
        let response = self.send(&Endpoint::Info(name.to_string()), None)?;
        match response.status {
            404 => Ok(None),
            _ if response.is_success() => Ok(Some(FileInfo::decode(&response.body)?.timestamp())),
            _ => Err(self.server_error(&response)),
        }
    }

    fn put(&self, name: &str, data: Vec<u8>) -> SyncResult<String> {
        let response = self.send(&Endpoint::Upload(name.to_string()), Some(data))?;
        if !response.is_success() {
            return Err(self.server_error(&response));
        }
        Ok(Confirmation::decode(&response.body)?.message)
    }

    fn get(&self, name: &str) -> SyncResult<Option<Vec<u8>>> {
        let response = self.send(&Endpoint::Download(name.to_string()), None)?;
        match response.status {
            404 => Ok(None),
            _ if response.is_success() => Ok(Some(response.body)),
            _ => Err(self.server_error(&response)),
        }
    }

    fn delete(&self, name: &str) -> SyncResult<bool> {
        let response = self.send(&Endpoint::Delete(name.to_string()), None)?;
        match response.status {
            404 => Ok(false),
            _ if response.is_success() => Ok(true),
            _ => Err(self.server_error(&response)),
        }
    }
}

/// Production HTTP client backed by `reqwest::blocking`.
///
/// Must be built and called outside of an async context; the agent runs
/// transport calls on blocking threads.
pub struct ReqwestClient {
    client: reqwest::blocking::Client,
}

impl ReqwestClient {
    /// Builds a client whose requests time out after `timeout`.
    pub fn new(timeout: Duration) -> SyncResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SyncError::transport_fatal(format!("cannot build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    fn finish(
        result: reqwest::Result<reqwest::blocking::Response>,
    ) -> Result<HttpResponse, String> {
        let response = result.map_err(|e| e.to_string())?;
        let status = response.status().as_u16();
        let body = response.bytes().map_err(|e| e.to_string())?;
        Ok(HttpResponse::new(status, body.to_vec()))
    }
}

impl HttpClient for ReqwestClient {
    fn get(&self, url: &str) -> Result<HttpResponse, String> {
        Self::finish(self.client.get(url).send())
    }

    fn post(&self, url: &str, body: Vec<u8>) -> Result<HttpResponse, String> {
        Self::finish(
            self.client
                .post(url)
                .header("content-type", "application/octet-stream")
                .body(body)
                .send(),
        )
    }

    fn delete(&self, url: &str) -> Result<HttpResponse, String> {
        Self::finish(self.client.delete(url).send())
    }
}

/// Trait for servers that can handle loopback requests.
pub trait LoopbackServer {
    /// Handles one request. `path` has no scheme or host.
    fn handle(&self, method: &str, path: &str, body: &[u8]) -> Result<HttpResponse, String>;
}

/// A loopback HTTP client that routes requests directly to a server.
///
/// Useful for testing without actual network overhead.
pub struct LoopbackClient<S: LoopbackServer> {
    server: S,
}

impl<S: LoopbackServer + Send + Sync> LoopbackClient<S> {
    /// Creates a new loopback client connected to the given server.
    pub fn new(server: S) -> Self {
        Self { server }
    }

    /// Returns the server.
    pub fn server(&self) -> &S {
        &self.server
    }
}

/// Strips scheme and authority from `url`.
fn path_of(url: &str) -> &str {
    let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
    rest.find('/').map_or("/", |i| &rest[i..])
}

impl<S: LoopbackServer + Send + Sync> HttpClient for LoopbackClient<S> {
    fn get(&self, url: &str) -> Result<HttpResponse, String> {
        self.server.handle("GET", path_of(url), &[])
    }

    fn post(&self, url: &str, body: Vec<u8>) -> Result<HttpResponse, String> {
        self.server.handle("POST", path_of(url), &body)
    }

    fn delete(&self, url: &str) -> Result<HttpResponse, String> {
        self.server.handle("DELETE", path_of(url), &[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use filesync_protocol::{ContentDigest, FileEntry, Fingerprint};
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Answers every request with a canned response and records the path.
    struct TestServer {
        response: RwLock<HttpResponse>,
        last_request: RwLock<Option<(String, String)>>,
        last_body: RwLock<Vec<u8>>,
        down: AtomicBool,
    }

    impl TestServer {
        fn new() -> Self {
            Self {
                response: RwLock::new(HttpResponse::new(200, Vec::new())),
                last_request: RwLock::new(None),
                last_body: RwLock::new(Vec::new()),
                down: AtomicBool::new(false),
            }
        }

        fn respond(&self, status: u16, body: impl Into<Vec<u8>>) {
            *self.response.write() = HttpResponse::new(status, body);
        }
    }

    impl LoopbackServer for &TestServer {
        fn handle(&self, method: &str, path: &str, body: &[u8]) -> Result<HttpResponse, String> {
            *self.last_request.write() = Some((method.to_string(), path.to_string()));
            *self.last_body.write() = body.to_vec();
            if self.down.load(Ordering::SeqCst) {
                return Err("connection refused".into());
            }
            Ok(self.response.read().clone())
        }
    }

    fn transport(server: &TestServer) -> HttpTransport<LoopbackClient<&TestServer>> {
        HttpTransport::new("http://store.example.com:8080/", LoopbackClient::new(server))
    }

    #[test]
    fn transport_creation() {
        let server = TestServer::new();
        let transport = transport(&server);
        assert_eq!(transport.base_url(), "http://store.example.com:8080");
        assert!(transport.last_error().is_none());
    }

    #[test]
    fn path_extraction() {
        assert_eq!(path_of("http://host:8080/files"), "/files");
        assert_eq!(path_of("https://host/download/a%20b"), "/download/a%20b");
        assert_eq!(path_of("http://host"), "/");
        assert_eq!(path_of("/files"), "/files");
    }

    #[test]
    fn list_decodes_entries() {
        let server = TestServer::new();
        let body = ListResponse {
            files: vec![
                FileEntry::new("a.txt", ContentDigest::of(b"a").into()),
                FileEntry::new("locked.bin", Fingerprint::Unreadable),
            ],
        }
        .encode()
        .unwrap();
        server.respond(200, body);

        let snapshot = transport(&server).list().unwrap();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.get("a.txt"), Some(ContentDigest::of(b"a").into()));
        assert_eq!(snapshot.get("locked.bin"), Some(Fingerprint::Unreadable));
        assert_eq!(
            server.last_request.read().clone(),
            Some(("GET".to_string(), "/files".to_string()))
        );
    }

    #[test]
    fn not_found_is_benign() {
        let server = TestServer::new();
        server.respond(404, ErrorBody::new("File 'x' not found").encode().unwrap());
        let transport = transport(&server);

        assert_eq!(transport.mod_time("x").unwrap(), None);
        assert_eq!(transport.get("x").unwrap(), None);
        assert!(!transport.delete("x").unwrap());
        // A missing listing endpoint is not benign.
        assert!(matches!(
            transport.list(),
            Err(SyncError::Server { status: 404, .. })
        ));
    }

    #[test]
    fn upload_sends_raw_body() {
        let server = TestServer::new();
        server.respond(200, Confirmation::new("File 'a.txt' uploaded").encode().unwrap());

        let message = transport(&server).put("a.txt", b"\x00raw bytes".to_vec()).unwrap();
        assert!(message.contains("a.txt"));
        assert_eq!(*server.last_body.read(), b"\x00raw bytes");
        assert_eq!(
            server.last_request.read().clone(),
            Some(("POST".to_string(), "/upload/a.txt".to_string()))
        );
    }

    #[test]
    fn server_error_carries_message() {
        let server = TestServer::new();
        server.respond(500, ErrorBody::new("disk full").encode().unwrap());
        let transport = transport(&server);

        let err = transport.put("a.txt", b"x".to_vec()).unwrap_err();
        match &err {
            SyncError::Server { status, message } => {
                assert_eq!(*status, 500);
                assert_eq!(message, "disk full");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.is_retryable());
        assert_eq!(transport.last_error().as_deref(), Some("disk full"));
    }

    #[test]
    fn unreachable_server_is_retryable() {
        let server = TestServer::new();
        server.down.store(true, Ordering::SeqCst);
        let transport = transport(&server);

        let err = transport.list().unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(transport.last_error().as_deref(), Some("connection refused"));

        server.down.store(false, Ordering::SeqCst);
        server.respond(200, ListResponse::default().encode().unwrap());
        transport.list().unwrap();
        assert!(transport.last_error().is_none());
    }

    #[test]
    fn names_are_percent_encoded() {
        let server = TestServer::new();
        server.respond(200, b"bytes".to_vec());
        let data = transport(&server).get("my file.txt").unwrap();
        assert_eq!(data, Some(b"bytes".to_vec()));
        assert_eq!(
            server.last_request.read().clone(),
            Some(("GET".to_string(), "/download/my%20file.txt".to_string()))
        );
    }

    #[test]
    fn mod_time_decodes_info() {
        let server = TestServer::new();
        server.respond(
            200,
            FileInfo::new("a.txt", Timestamp::from_secs(1_700_000_000))
                .encode()
                .unwrap(),
        );
        assert_eq!(
            transport(&server).mod_time("a.txt").unwrap(),
            Some(Timestamp::from_secs(1_700_000_000))
        );
    }

    #[test]
    fn reqwest_client_builds() {
        assert!(ReqwestClient::new(Duration::from_secs(5)).is_ok());
    }
}
