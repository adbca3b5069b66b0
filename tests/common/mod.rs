//! Shared utilities for integration testing.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

use log_relay::{DiscoveryEvent, ServiceDiscovery};

/// A request recorded by a mock collector.
#[derive(Debug, Clone)]
pub struct ReceivedRequest {
    pub path: String,
    pub body: serde_json::Value,
}

/// Decides how the mock collector answers a request to `path`.
/// `None` means the connection is held open without a response.
pub type Responder = Arc<dyn Fn(&str) -> Option<(u16, String)> + Send + Sync>;

/// A mock collector on an ephemeral local port, recording every request.
pub struct MockCollector {
    pub port: u16,
    requests: Arc<Mutex<Vec<ReceivedRequest>>>,
}

impl MockCollector {
    pub fn address(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    pub fn received(&self) -> Vec<ReceivedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn received_on(&self, path: &str) -> Vec<ReceivedRequest> {
        self.received()
            .into_iter()
            .filter(|r| r.path == path)
            .collect()
    }
}

/// Start a collector answering every request with 200 `{"code":0}`.
#[allow(dead_code)]
pub async fn start_ok_collector() -> MockCollector {
    start_collector(Arc::new(|_| Some((200, "{\"code\":0}".to_string())))).await
}

/// Start a collector with programmable per-path behavior.
#[allow(dead_code)]
pub async fn start_collector(responder: Responder) -> MockCollector {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let requests: Arc<Mutex<Vec<ReceivedRequest>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = requests.clone();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((socket, _)) => {
                    let responder = responder.clone();
                    let sink = sink.clone();
                    tokio::spawn(async move {
                        handle_connection(socket, responder, sink).await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    MockCollector { port, requests }
}

async fn handle_connection(
    mut socket: TcpStream,
    responder: Responder,
    sink: Arc<Mutex<Vec<ReceivedRequest>>>,
) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];

    let header_end = loop {
        let n = match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => n,
        };
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = find_subsequence(&buf, b"\r\n\r\n") {
            break pos + 4;
        }
        if buf.len() > 64 * 1024 {
            return;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let path = head
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .unwrap_or("/")
        .to_string();
    let content_length = head
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse::<usize>().ok())
                .flatten()
        })
        .unwrap_or(0);

    while buf.len() < header_end + content_length {
        let n = match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => n,
        };
        buf.extend_from_slice(&chunk[..n]);
    }

    let body_end = std::cmp::min(buf.len(), header_end + content_length);
    let body = serde_json::from_slice(&buf[header_end..body_end]).unwrap_or(serde_json::Value::Null);
    sink.lock().unwrap().push(ReceivedRequest { path: path.clone(), body });

    match responder(&path) {
        Some((status, response_body)) => {
            let response = format!(
                "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                status_text(status),
                response_body.len(),
                response_body
            );
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        }
        None => {
            // Hold the connection open until the client gives up.
            tokio::time::sleep(Duration::from_secs(30)).await;
        }
    }
}

fn status_text(status: u16) -> &'static str {
    match status {
        200 => "OK",
        404 => "Not Found",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "OK",
    }
}

fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// A scriptable discovery capability fed from the test body.
#[allow(dead_code)]
pub struct ChannelDiscovery {
    rx: Mutex<Option<UnboundedReceiver<DiscoveryEvent>>>,
}

#[allow(dead_code)]
impl ChannelDiscovery {
    pub fn new() -> (Arc<Self>, UnboundedSender<DiscoveryEvent>) {
        let (tx, rx) = unbounded_channel();
        (
            Arc::new(Self {
                rx: Mutex::new(Some(rx)),
            }),
            tx,
        )
    }
}

impl ServiceDiscovery for ChannelDiscovery {
    fn scan(&self, _protocol: &str) -> UnboundedReceiver<DiscoveryEvent> {
        self.rx
            .lock()
            .unwrap()
            .take()
            .expect("scan may only be called once per ChannelDiscovery")
    }
}

/// Poll `condition` until it holds or two seconds pass.
pub async fn wait_for<F: Fn() -> bool>(condition: F) -> bool {
    for _ in 0..100 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    condition()
}
