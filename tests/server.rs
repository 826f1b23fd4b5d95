mod common;

use chrono::{DateTime, Utc};
use factory_dashboard::dispatch::{self, DispatchHandle, Dispatcher, ScatterSelection};
use factory_dashboard::server::{self, Accept, ServerLimits};
use factory_dashboard::{prepare_at, ViewResolver};
use serde_json::Value;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;

fn handle() -> DispatchHandle {
    let ds = prepare_at(&common::raw_table(), 10_000, common::now()).unwrap();
    let dispatcher = Dispatcher::new(
        ViewResolver::new(Arc::new(ds)),
        ScatterSelection::new("Drill_Pressure", "Drilling_Speed"),
    )
    .unwrap();
    dispatch::spawn(dispatcher, 8)
}

async fn start(limits: ServerLimits) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(server::serve_with(listener, handle(), limits));
    addr
}

async fn exchange(addr: SocketAddr, request: &[u8]) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(request).await.unwrap();
    let mut buf = Vec::new();
    timeout(Duration::from_secs(5), stream.read_to_end(&mut buf))
        .await
        .expect("server did not close the connection")
        .unwrap();
    String::from_utf8(buf).unwrap()
}

fn body(response: &str) -> Value {
    let (_, body) = response.split_once("\r\n\r\n").unwrap();
    serde_json::from_str(body).unwrap()
}

/// Fails the first `failures` accepts, then hands out real connections.
struct FlakyListener {
    inner: TcpListener,
    failures: AtomicUsize,
}

impl Accept for FlakyListener {
    fn accept_conn(&self) -> impl Future<Output = io::Result<(TcpStream, SocketAddr)>> + Send {
        async move {
            let left = self.failures.load(Ordering::SeqCst);
            if left > 0 {
                self.failures.store(left - 1, Ordering::SeqCst);
                return Err(io::Error::other("too many open files"));
            }
            self.inner.accept().await
        }
    }
}

#[tokio::test]
async fn health_over_socket() {
    let addr = start(ServerLimits::default()).await;
    let response = exchange(addr, b"GET /api/health HTTP/1.1\r\nHost: x\r\n\r\n").await;
    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"), "{}", response);
    assert!(response.contains("Content-Length: 15\r\n"));
    assert!(response.contains("Connection: close\r\n"));
    assert!(response.ends_with("{\"status\":\"ok\"}"));
}

#[tokio::test]
async fn dataset_summary_over_socket() {
    let addr = start(ServerLimits::default()).await;
    let response = exchange(addr, b"GET /api/dataset HTTP/1.1\r\n\r\n").await;
    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
    let body = body(&response);
    assert_eq!(body["rows"], 5);
    let prepared_at: DateTime<Utc> = serde_json::from_value(body["prepared_at"].clone()).unwrap();
    assert_eq!(prepared_at, common::now());
    assert_eq!(body["imputed_cells"]["Drill_Pressure"], 1);
    assert_eq!(body["imputed_cells"]["Milling_Circle_Diameter"], 1);
    assert!(body["imputed_cells"].get("Turning_Cut_Depth").is_none());
}

#[tokio::test]
async fn keeps_serving_after_accept_errors() {
    let listener = FlakyListener {
        inner: TcpListener::bind("127.0.0.1:0").await.unwrap(),
        failures: AtomicUsize::new(3),
    };
    let addr = listener.inner.local_addr().unwrap();
    tokio::spawn(server::serve_with(listener, handle(), ServerLimits::default()));

    let response = exchange(addr, b"GET /api/health HTTP/1.1\r\n\r\n").await;
    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"), "{}", response);
}

#[tokio::test]
async fn idle_client_is_dropped_after_head_timeout() {
    let addr = start(ServerLimits { head_timeout: Duration::from_millis(50), ..ServerLimits::default() }).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(b"GET /api/hea").await.unwrap();
    let mut buf = Vec::new();
    let read = timeout(Duration::from_secs(5), stream.read_to_end(&mut buf)).await;
    assert!(read.is_ok(), "connection still open");
    assert!(buf.is_empty());
}

#[tokio::test]
async fn oversized_request_line_is_rejected() {
    let limits = ServerLimits { max_head_bytes: 64, ..ServerLimits::default() };
    let addr = start(limits).await;
    let mut request = b"GET /api/health?pad=".to_vec();
    request.resize(64, b'x');
    let response = exchange(addr, &request).await;
    assert!(response.starts_with("HTTP/1.1 400 BAD REQUEST\r\n"), "{}", response);
    assert_eq!(body(&response)["error"], "request head too large");
}
