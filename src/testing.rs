//! Test doubles shared by the unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use crate::error::{AppError, PublishError, Result};
use crate::models::{BillKey, BillRecord, BillType};
use crate::services::{BillSource, LinkShortener, Publisher};

/// A record with predictable fields for `HR-100` style keys.
pub(crate) fn record(bill_type: BillType, number: u32, title: &str) -> BillRecord {
    let key = BillKey::new(bill_type, number);
    BillRecord::new(
        key,
        "Rep. Doe, John [R-TX-1]",
        title,
        format!("https://www.congress.gov/bill/115th-congress/bill/{number}"),
        chrono::NaiveDate::from_ymd_opt(2017, 1, 3),
    )
}

// --- Canned HTTP server ---

pub(crate) struct CannedResponse {
    status: u16,
    body: String,
}

impl CannedResponse {
    pub(crate) fn json(status: u16, body: &str) -> Self {
        Self {
            status,
            body: body.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct RecordedRequest {
    pub line: String,
    pub headers: String,
    pub body: String,
}

/// Loopback server answering one connection per canned response.
pub(crate) struct CannedServer {
    pub base_url: String,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    handle: JoinHandle<()>,
}

impl CannedServer {
    pub(crate) fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Drop for CannedServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

pub(crate) async fn serve_canned(responses: Vec<CannedResponse>) -> CannedServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let requests = Arc::new(Mutex::new(Vec::new()));
    let recorded = Arc::clone(&requests);

    let handle = tokio::spawn(async move {
        for response in responses {
            let Ok((mut stream, _)) = listener.accept().await else {
                return;
            };
            let request = read_request(&mut stream).await;
            recorded.lock().unwrap().push(request);

            let reason = reqwest::StatusCode::from_u16(response.status)
                .ok()
                .and_then(|s| s.canonical_reason())
                .unwrap_or("Unknown");
            let reply = format!(
                "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                response.status,
                reason,
                response.body.len(),
                response.body
            );
            let _ = stream.write_all(reply.as_bytes()).await;
            let _ = stream.shutdown().await;
        }
    });

    CannedServer {
        base_url: format!("http://{addr}"),
        requests,
        handle,
    }
}

async fn read_request(stream: &mut TcpStream) -> RecordedRequest {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];

    let header_end = loop {
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
        let n = stream.read(&mut chunk).await.unwrap_or(0);
        if n == 0 {
            break buf.len();
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let content_length = head
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            if name.trim().eq_ignore_ascii_case("content-length") {
                value.trim().parse::<usize>().ok()
            } else {
                None
            }
        })
        .unwrap_or(0);

    while buf.len() < header_end + content_length {
        let n = stream.read(&mut chunk).await.unwrap_or(0);
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    let mut lines = head.lines();
    let line = lines.next().unwrap_or_default().to_string();
    let headers = lines.collect::<Vec<_>>().join("\n");
    let body = String::from_utf8_lossy(&buf[header_end..]).to_string();

    RecordedRequest {
        line,
        headers,
        body,
    }
}

// --- Scripted service fakes ---

/// Source returning scripted batches, then empty batches.
#[derive(Default)]
pub(crate) struct FakeSource {
    batches: Mutex<VecDeque<Result<Vec<BillRecord>>>>,
    calls: AtomicUsize,
}

impl FakeSource {
    pub(crate) fn new(batches: Vec<Result<Vec<BillRecord>>>) -> Self {
        Self {
            batches: Mutex::new(batches.into()),
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BillSource for FakeSource {
    async fn fetch(&self) -> Result<Vec<BillRecord>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.batches
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}

/// Shortener replaying scripted reachability, then a fixed fallback.
pub(crate) struct FakeShortener {
    script: Mutex<VecDeque<bool>>,
    fallback: bool,
    calls: AtomicUsize,
}

impl FakeShortener {
    pub(crate) fn working() -> Self {
        Self::scripted(Vec::new(), true)
    }

    pub(crate) fn unreachable() -> Self {
        Self::scripted(Vec::new(), false)
    }

    /// `true` answers a call with a short URL, `false` with a failure.
    pub(crate) fn scripted(script: Vec<bool>, fallback: bool) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback,
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LinkShortener for FakeShortener {
    async fn shorten(&self, long_url: &str) -> Result<String> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let reachable = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(self.fallback);
        if reachable {
            Ok(format!("https://is.gd/s{n}"))
        } else {
            Err(AppError::shortening(long_url, "connection refused"))
        }
    }
}

/// Publisher replaying scripted outcomes, succeeding once the script runs out.
#[derive(Default)]
pub(crate) struct FakePublisher {
    verify: Option<PublishError>,
    script: Mutex<VecDeque<std::result::Result<(), PublishError>>>,
    attempts: Mutex<Vec<String>>,
    published: Mutex<Vec<String>>,
}

impl FakePublisher {
    pub(crate) fn new(script: Vec<std::result::Result<(), PublishError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            ..Self::default()
        }
    }

    pub(crate) fn failing_verification(error: PublishError) -> Self {
        Self {
            verify: Some(error),
            ..Self::default()
        }
    }

    pub(crate) fn attempts(&self) -> Vec<String> {
        self.attempts.lock().unwrap().clone()
    }

    pub(crate) fn published(&self) -> Vec<String> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl Publisher for FakePublisher {
    async fn verify_credentials(&self) -> std::result::Result<(), PublishError> {
        match &self.verify {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    async fn publish(&self, text: &str) -> std::result::Result<(), PublishError> {
        self.attempts.lock().unwrap().push(text.to_string());
        let outcome = self.script.lock().unwrap().pop_front().unwrap_or(Ok(()));
        if outcome.is_ok() {
            self.published.lock().unwrap().push(text.to_string());
        }
        outcome
    }
}
