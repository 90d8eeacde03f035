//! Shared utilities for fetch integration tests.
//!
//! Provides tunables with near-zero delays, a recording progress observer and
//! a scripted raw HTTP/1.1 server for failure modes wiremock cannot produce
//! (bodies cut short, connections held open mid-body).

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use mediafetch_core::{FetchConfig, ProgressObserver, ProgressUpdate, RetryPolicy};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Tunables that keep tests fast: no backoff, no range-check retries.
pub fn fast_config() -> FetchConfig {
    let mut config = FetchConfig::default()
        .with_retry_policy(RetryPolicy::immediate())
        .with_connection_retry_delay(Duration::from_millis(10));
    config.range_check_retries = 0;
    config
}

/// Deterministic non-repeating-looking payload.
pub fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| u8::try_from(i % 251).unwrap_or(0)).collect()
}

/// Number of entries in a directory.
pub fn entry_count(dir: &std::path::Path) -> usize {
    std::fs::read_dir(dir).expect("read dir").count()
}

/// Observer that keeps every update it receives.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    updates: Mutex<Vec<ProgressUpdate>>,
}

impl RecordingObserver {
    pub fn updates(&self) -> Vec<ProgressUpdate> {
        self.updates.lock().expect("observer lock").clone()
    }
}

impl ProgressObserver for RecordingObserver {
    fn on_progress(&self, _url: &str, update: &ProgressUpdate) {
        self.updates.lock().expect("observer lock").push(*update);
    }
}

/// Request line and range header seen by [`ScriptedServer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRequest {
    pub method: String,
    pub path: String,
    /// Start offset of a `Range: bytes=<start>-` header.
    pub range_start: Option<u64>,
}

/// Response written verbatim by [`ScriptedServer`].
#[derive(Debug, Clone)]
pub struct RawResponse {
    status: u16,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
    send_bytes: Option<usize>,
    hold_open: Option<Duration>,
}

impl RawResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Vec::new(),
            send_bytes: None,
            hold_open: None,
        }
    }

    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }

    /// Body whose full length is declared in `Content-Length`.
    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Sends only the first `n` body bytes, then closes the connection.
    pub fn truncated_at(mut self, n: usize) -> Self {
        self.send_bytes = Some(n);
        self
    }

    /// Keeps the connection open this long after the sent bytes.
    pub fn hold_open(mut self, duration: Duration) -> Self {
        self.hold_open = Some(duration);
        self
    }
}

type Handler = dyn Fn(&RawRequest) -> RawResponse + Send + Sync;

/// One-response-per-connection HTTP server driven by a closure.
pub struct ScriptedServer {
    base_url: String,
    requests: Arc<Mutex<Vec<RawRequest>>>,
}

impl ScriptedServer {
    pub async fn start<F>(handler: F) -> Self
    where
        F: Fn(&RawRequest) -> RawResponse + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind scripted server");
        let base_url = format!(
            "http://{}",
            listener.local_addr().expect("scripted server address")
        );
        let requests = Arc::new(Mutex::new(Vec::new()));
        let handler: Arc<Handler> = Arc::new(handler);

        let log = Arc::clone(&requests);
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                let handler = Arc::clone(&handler);
                let log = Arc::clone(&log);
                tokio::spawn(async move {
                    serve_connection(socket, handler.as_ref(), &log).await;
                });
            }
        });

        Self { base_url, requests }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// GET requests received so far, in arrival order.
    pub fn gets(&self) -> Vec<RawRequest> {
        self.requests
            .lock()
            .expect("request log lock")
            .iter()
            .filter(|r| r.method == "GET")
            .cloned()
            .collect()
    }

    /// Number of HEAD requests received for `path`.
    pub fn heads_to(&self, path: &str) -> usize {
        self.requests
            .lock()
            .expect("request log lock")
            .iter()
            .filter(|r| r.method == "HEAD" && r.path == path)
            .count()
    }
}

async fn serve_connection(
    mut socket: TcpStream,
    handler: &Handler,
    log: &Mutex<Vec<RawRequest>>,
) {
    let mut head = Vec::new();
    let mut buf = [0u8; 1024];
    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
        match socket.read(&mut buf).await {
            Ok(0) | Err(_) => return,
            Ok(n) => head.extend_from_slice(&buf[..n]),
        }
    }

    let request = parse_request(&String::from_utf8_lossy(&head));
    let response = handler(&request);
    let is_head = request.method == "HEAD";
    log.lock().expect("request log lock").push(request);

    let mut out = format!(
        "HTTP/1.1 {} Scripted\r\nContent-Length: {}\r\nConnection: close\r\n",
        response.status,
        response.body.len()
    );
    for (name, value) in &response.headers {
        out.push_str(&format!("{name}: {value}\r\n"));
    }
    out.push_str("\r\n");

    if socket.write_all(out.as_bytes()).await.is_err() {
        return;
    }
    if !is_head {
        let end = response
            .send_bytes
            .unwrap_or(response.body.len())
            .min(response.body.len());
        if socket.write_all(&response.body[..end]).await.is_err() {
            return;
        }
    }
    let _ = socket.flush().await;
    if let Some(duration) = response.hold_open {
        tokio::time::sleep(duration).await;
    }
    let _ = socket.shutdown().await;
}

fn parse_request(head: &str) -> RawRequest {
    let mut lines = head.lines();
    let mut request_line = lines.next().unwrap_or_default().split_whitespace();
    let method = request_line.next().unwrap_or_default().to_string();
    let path = request_line.next().unwrap_or_default().to_string();

    let range_start = lines
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("range"))
        .and_then(|(_, value)| {
            value
                .trim()
                .strip_prefix("bytes=")?
                .strip_suffix('-')?
                .parse()
                .ok()
        });

    RawRequest {
        method,
        path,
        range_start,
    }
}
