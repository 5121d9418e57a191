//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Bytes;
use axum::http::{HeaderValue, StatusCode};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use secret_gate::forward::{OutboundRequest, Upstream, UpstreamError, UpstreamResponse};

/// 128-character secret used across the integration tests.
pub fn test_secret() -> String {
    "s3cr3t-".repeat(18) + "xy"
}

/// Canned reply for [`start_mock_backend`].
#[derive(Clone)]
pub struct MockReply {
    pub status_line: &'static str,
    pub headers: Vec<(&'static str, String)>,
    pub body: String,
    pub delay: Duration,
}

impl MockReply {
    pub fn new(status_line: &'static str, body: impl Into<String>) -> Self {
        Self {
            status_line,
            headers: Vec::new(),
            body: body.into(),
            delay: Duration::ZERO,
        }
    }

    pub fn header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// Start a raw-TCP backend on an ephemeral loopback port.
///
/// Every request gets `reply`. The raw request text (head and body) is
/// recorded in the returned log.
pub async fn start_mock_backend(reply: MockReply) -> (SocketAddr, Arc<Mutex<Vec<String>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let log = Arc::new(Mutex::new(Vec::new()));
    let recorded = log.clone();

    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            let reply = reply.clone();
            let log = log.clone();
            tokio::spawn(async move {
                serve_one(socket, reply, log).await;
            });
        }
    });

    (addr, recorded)
}

async fn serve_one(mut socket: TcpStream, reply: MockReply, log: Arc<Mutex<Vec<String>>>) {
    let Some(raw) = read_request(&mut socket).await else {
        return;
    };
    log.lock().unwrap().push(raw);

    tokio::time::sleep(reply.delay).await;

    let mut response = format!(
        "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n",
        reply.status_line,
        reply.body.len()
    );
    for (name, value) in &reply.headers {
        response.push_str(&format!("{}: {}\r\n", name, value));
    }
    response.push_str("\r\n");
    response.push_str(&reply.body);

    let _ = socket.write_all(response.as_bytes()).await;
    let _ = socket.shutdown().await;
}

/// Read one request: the head, then `Content-Length` bytes of body.
async fn read_request(socket: &mut TcpStream) -> Option<String> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let head_end = loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
    let content_length = head
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while buf.len() < head_end + content_length {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    Some(String::from_utf8_lossy(&buf).to_string())
}

/// In-process transport that records what it was asked to send.
#[derive(Default)]
pub struct FakeUpstream {
    pub sent: Arc<Mutex<Vec<OutboundRequest>>>,
    pub reply: Option<(StatusCode, Option<&'static str>, &'static str)>,
    pub timeout: bool,
}

impl FakeUpstream {
    pub fn replying(status: StatusCode, content_type: Option<&'static str>, body: &'static str) -> Self {
        Self {
            reply: Some((status, content_type, body)),
            ..Default::default()
        }
    }

    pub fn timing_out() -> Self {
        Self {
            timeout: true,
            ..Default::default()
        }
    }
}

impl Upstream for FakeUpstream {
    async fn send(&self, request: OutboundRequest) -> Result<UpstreamResponse, UpstreamError> {
        let timeout = request.timeout;
        self.sent.lock().unwrap().push(request);
        if self.timeout {
            return Err(UpstreamError::Timeout(timeout));
        }

        let (status, content_type, body) = self
            .reply
            .unwrap_or((StatusCode::OK, Some("application/json"), r#"{"ok":true}"#));
        Ok(UpstreamResponse {
            status,
            content_type: content_type.map(HeaderValue::from_static),
            body: Bytes::from_static(body.as_bytes()),
        })
    }
}

/// Fresh blacklist path in the temp dir.
pub fn temp_blacklist() -> std::path::PathBuf {
    std::env::temp_dir().join(format!("secret-gate-it-{}.txt", uuid::Uuid::new_v4()))
}

