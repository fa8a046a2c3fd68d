//! Shared test fixtures for auth, api, migration and listen test modules.
//!
//! Keeping the temp dir, mock HTTP server and browser spy here prevents each
//! test module from rebuilding ad-hoc socket plumbing.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use crate::auth::{OAuthClientConfig, OAuthEndpoints, SecretString, Server, Token, UrlOpener};
use crate::ui::{ProgressHandle, RenderSink};

static TEST_DIR_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Temporary directory fixture with best-effort cleanup.
#[derive(Debug)]
pub struct TestTempDir {
    path: PathBuf,
}

impl TestTempDir {
    /// Create a unique temporary directory with a readable prefix.
    pub fn new(prefix: &str) -> Self {
        let suffix = TEST_DIR_COUNTER.fetch_add(1, Ordering::Relaxed);
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        let dir = std::env::temp_dir().join(format!(
            "polar-{prefix}-{}-{millis}-{suffix}",
            std::process::id()
        ));
        fs::create_dir_all(&dir).expect("failed to create temporary fixture directory");
        Self { path: dir }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn child(&self, relative: &str) -> PathBuf {
        self.path.join(relative)
    }

    /// Write UTF-8 text to a child path, creating parent directories as needed.
    pub fn write_text(&self, relative: &str, content: &str) -> PathBuf {
        let path = self.child(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("failed to create parent directories for fixture");
        }
        fs::write(&path, content).expect("failed to write fixture file");
        path
    }
}

impl Drop for TestTempDir {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.path);
    }
}

/// Token issued at `issued_at` that lives for one hour. The refresh token is
/// `refresh-<access>`.
pub fn sample_token(server: Server, access: &str, issued_at: DateTime<Utc>) -> Token {
    Token::issue(
        server,
        SecretString::new(access.to_string()),
        Some(SecretString::new(format!("refresh-{access}"))),
        Duration::from_secs(3600),
        vec!["openid".to_string(), "products:read".to_string()],
        issued_at,
    )
}

/// A loopback port that was free a moment ago.
pub fn free_loopback_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .and_then(|listener| listener.local_addr())
        .map(|addr| addr.port())
        .expect("failed to reserve a loopback port")
}

/// Endpoint table pointing both environments at local test servers.
pub fn test_endpoints(token_url: &str, callback_port: u16) -> OAuthEndpoints {
    let client = |client_id: &str| OAuthClientConfig {
        client_id: client_id.to_string(),
        authorization_url: format!("http://127.0.0.1:{callback_port}/authorize"),
        token_url: token_url.to_string(),
        redirect_url: format!("http://127.0.0.1:{callback_port}/oauth/callback"),
        scopes: vec!["openid".to_string(), "products:read".to_string()],
    };
    OAuthEndpoints::new(client("production-client"), client("sandbox-client"))
}

/// Browser stand-in: records each URL and, like a user approving consent,
/// follows up with a GET to the redirect URI carrying `code=spy-code`.
#[derive(Debug, Default)]
pub struct SpyBrowser {
    opened: Mutex<Vec<String>>,
    state_override: Option<String>,
    redirect: bool,
}

impl SpyBrowser {
    pub fn completing_redirect() -> Self {
        Self {
            redirect: true,
            ..Self::default()
        }
    }

    /// Redirect with a `state` that differs from the one requested.
    pub fn with_state_override(state: &str) -> Self {
        Self {
            redirect: true,
            state_override: Some(state.to_string()),
            ..Self::default()
        }
    }

    /// Record URLs without completing the redirect.
    pub fn recording_only() -> Self {
        Self::default()
    }

    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().unwrap().clone()
    }
}

impl UrlOpener for SpyBrowser {
    fn open(&self, url: &str) -> bool {
        self.opened.lock().unwrap().push(url.to_string());
        if !self.redirect {
            return true;
        }
        let parsed = reqwest::Url::parse(url).expect("authorization url");
        let params: HashMap<String, String> = parsed.query_pairs().into_owned().collect();
        let state = self
            .state_override
            .clone()
            .unwrap_or_else(|| params.get("state").cloned().unwrap_or_default());
        let mut callback =
            reqwest::Url::parse(&params["redirect_uri"]).expect("redirect_uri parameter");
        callback
            .query_pairs_mut()
            .append_pair("code", "spy-code")
            .append_pair("state", &state);
        tokio::spawn(async move {
            let _ = reqwest::get(callback).await;
        });
        true
    }
}

/// One request captured by [`MockHttpServer`].
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub target: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Decode an `application/x-www-form-urlencoded` body.
    pub fn form(&self) -> HashMap<String, String> {
        let url = reqwest::Url::parse(&format!("http://form.invalid/?{}", self.body))
            .expect("form body");
        url.query_pairs().into_owned().collect()
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).expect("json body")
    }
}

/// Canned response returned by a [`MockHttpServer`] responder.
#[derive(Debug, Clone)]
pub struct MockResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl MockResponse {
    pub fn json(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: vec![("Content-Type".to_string(), "application/json".to_string())],
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }
}

type Responder = dyn Fn(&RecordedRequest) -> MockResponse + Send + Sync;

/// Minimal HTTP/1.1 server that records every request and answers each one
/// with `Connection: close`.
pub struct MockHttpServer {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    task: JoinHandle<()>,
}

impl MockHttpServer {
    pub async fn start<F>(responder: F) -> Self
    where
        F: Fn(&RecordedRequest) -> MockResponse + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let responder: Arc<Responder> = Arc::new(responder);

        let recorded = Arc::clone(&requests);
        let task = tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    continue;
                };
                let recorded = Arc::clone(&recorded);
                let responder = Arc::clone(&responder);
                tokio::spawn(async move {
                    serve_one(stream, recorded, responder).await;
                });
            }
        });

        Self {
            addr,
            requests,
            task,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Drop for MockHttpServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve_one(
    mut stream: TcpStream,
    recorded: Arc<Mutex<Vec<RecordedRequest>>>,
    responder: Arc<Responder>,
) {
    let Some(request) = read_request(&mut stream).await else {
        return;
    };
    recorded.lock().unwrap().push(request.clone());
    let response = responder(&request);

    let mut head = format!("HTTP/1.1 {} {}\r\n", response.status, reason(response.status));
    for (name, value) in &response.headers {
        head.push_str(&format!("{name}: {value}\r\n"));
    }
    head.push_str(&format!(
        "Content-Length: {}\r\nConnection: close\r\n\r\n",
        response.body.len()
    ));
    let _ = stream.write_all(head.as_bytes()).await;
    let _ = stream.write_all(response.body.as_bytes()).await;
    let _ = stream.shutdown().await;
}

async fn read_request(stream: &mut TcpStream) -> Option<RecordedRequest> {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 4096];
    let head_end = loop {
        if let Some(pos) = buffer.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buffer.extend_from_slice(&chunk[..n]);
    };

    let head = String::from_utf8_lossy(&buffer[..head_end]).into_owned();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next()?.split_whitespace();
    let method = request_line.next()?.to_string();
    let target = request_line.next()?.to_string();
    let headers: Vec<(String, String)> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
        .collect();
    let content_length = headers
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.parse::<usize>().ok())
        .unwrap_or(0);

    let mut body = buffer[head_end..].to_vec();
    while body.len() < content_length {
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..n]);
    }

    Some(RecordedRequest {
        method,
        target,
        headers,
        body: String::from_utf8_lossy(&body).into_owned(),
    })
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        400 => "Bad Request",
        401 => "Unauthorized",
        404 => "Not Found",
        422 => "Unprocessable Entity",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Status",
    }
}

/// Render sink that records every line instead of printing it.
#[derive(Default)]
pub struct RecordingSink {
    lines: Mutex<Vec<String>>,
}

impl RecordingSink {
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines().iter().any(|line| line.contains(needle))
    }

    fn record(&self, line: String) {
        self.lines.lock().unwrap().push(line);
    }
}

impl RenderSink for RecordingSink {
    fn progress(&self, label: &str) -> ProgressHandle {
        self.record(format!("progress: {label}"));
        ProgressHandle::disabled()
    }

    fn warn(&self, msg: &str) {
        self.record(format!("warning: {msg}"));
    }

    fn section(&self, title: &str) {
        self.record(format!("section: {title}"));
    }

    fn activity(&self, text: &str) {
        self.record(format!("activity: {text}"));
    }

    fn field(&self, key: &str, value: &str) {
        self.record(format!("field: {key}: {value}"));
    }

    fn detail(&self, text: &str) {
        self.record(format!("detail: {text}"));
    }

    fn error(&self, msg: &str) {
        self.record(format!("error: {msg}"));
    }

    fn output(&self, line: &str) {
        self.record(format!("output: {line}"));
    }

    fn forward_result(&self, text: &str, ok: bool) {
        self.record(format!(">> {text} ({})", if ok { "ok" } else { "failed" }));
    }
}

/// Build one SSE event block with a `data:` line.
pub fn sse_data_block(data: &str) -> String {
    format!("data: {data}\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temp_dir_fixture_writes_and_resolves_paths() {
        let fixture = TestTempDir::new("fixture");
        let file = fixture.write_text("nested/file.txt", "hello");
        assert_eq!(fs::read_to_string(file).unwrap(), "hello");
        assert!(fixture.path().exists());
    }

    #[tokio::test]
    async fn mock_server_records_requests() {
        let server = MockHttpServer::start(|request| {
            MockResponse::json(201, format!("{{\"echo\":\"{}\"}}", request.method))
        })
        .await;
        let response = reqwest::Client::new()
            .post(server.url("/v1/things"))
            .form(&[("a", "1 2")])
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 201);
        assert_eq!(response.text().await.unwrap(), r#"{"echo":"POST"}"#);

        let requests = server.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].target, "/v1/things");
        assert_eq!(requests[0].form()["a"], "1 2");
    }
}
