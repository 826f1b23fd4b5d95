//! JSON-over-HTTP boundary.
//!
//! Endpoints:
//!   GET /api/health
//!   GET /api/columns
//!   GET /api/subsystems
//!   GET /api/views
//!   GET /api/dataset
//!   GET /api/select/subsystem?key=K
//!   GET /api/select/scatter?x=A&y=B   (either side may be omitted)

use serde_json::json;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{sleep, timeout};
use url::Url;

use crate::dispatch::{DispatchHandle, SelectionEvent, SlotId};
use crate::logging::{self, obj, v_int, v_str, Domain};
use crate::resolver::{Subsystem, SubsystemKey};

#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: &'static str,
    pub content_type: &'static str,
    pub body: String,
}

impl Response {
    fn json(body: serde_json::Value) -> Self {
        Self { status: "200 OK", content_type: "application/json", body: body.to_string() }
    }

    fn bad_request(msg: &str) -> Self {
        Self {
            status: "400 BAD REQUEST",
            content_type: "application/json",
            body: json!({ "error": msg }).to_string(),
        }
    }

    fn not_found() -> Self {
        Self { status: "404 NOT FOUND", content_type: "text/plain", body: "Not Found".to_string() }
    }

    fn unavailable(msg: &str) -> Self {
        Self {
            status: "503 SERVICE UNAVAILABLE",
            content_type: "application/json",
            body: json!({ "error": msg }).to_string(),
        }
    }

    pub fn to_http(&self) -> String {
        format!(
            "HTTP/1.1 {}\r\n\
             Content-Type: {}\r\n\
             Access-Control-Allow-Origin: *\r\n\
             Content-Length: {}\r\n\
             Connection: close\r\n\r\n{}",
            self.status,
            self.content_type,
            self.body.len(),
            self.body
        )
    }
}

/// Limits applied while reading a request head.
#[derive(Debug, Clone, Copy)]
pub struct ServerLimits {
    pub head_timeout: Duration,
    pub max_head_bytes: u64,
}

impl Default for ServerLimits {
    fn default() -> Self {
        Self { head_timeout: Duration::from_secs(5), max_head_bytes: 8 * 1024 }
    }
}

/// Source of accepted connections; `TcpListener` in production.
pub trait Accept {
    fn accept_conn(&self) -> impl Future<Output = io::Result<(TcpStream, SocketAddr)>> + Send;
}

impl Accept for TcpListener {
    fn accept_conn(&self) -> impl Future<Output = io::Result<(TcpStream, SocketAddr)>> + Send {
        TcpListener::accept(self)
    }
}

const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

pub async fn serve(listener: TcpListener, handle: DispatchHandle) {
    serve_with(listener, handle, ServerLimits::default()).await
}

/// Runs until the process exits. Accept failures (fd exhaustion included)
/// are logged and retried after a short pause.
pub async fn serve_with<A: Accept>(acceptor: A, handle: DispatchHandle, limits: ServerLimits) {
    loop {
        let (stream, peer) = match acceptor.accept_conn().await {
            Ok(conn) => conn,
            Err(err) => {
                logging::warn(Domain::Server, "server.accept_error", obj(&[("msg", v_str(&err.to_string()))]));
                sleep(ACCEPT_BACKOFF).await;
                continue;
            }
        };
        let handle = handle.clone();
        tokio::spawn(async move {
            if let Err(err) = handle_connection(stream, &handle, limits).await {
                logging::warn(
                    Domain::Server,
                    "server.connection_error",
                    obj(&[("peer", v_str(&peer.to_string())), ("msg", v_str(&err.to_string()))]),
                );
            }
        });
    }
}

async fn handle_connection(stream: TcpStream, handle: &DispatchHandle, limits: ServerLimits) -> io::Result<()> {
    let (read, mut write) = stream.into_split();
    let mut reader = BufReader::new(read.take(limits.max_head_bytes));

    let request = match timeout(limits.head_timeout, read_head(&mut reader)).await {
        Err(_) => return Err(io::Error::new(io::ErrorKind::TimedOut, "request head timed out")),
        Ok(Ok(Some(line))) => line,
        Ok(Ok(None)) => return Ok(()),
        Ok(Err(err)) if err.kind() == io::ErrorKind::InvalidData => {
            let response = Response::bad_request(&err.to_string());
            write.write_all(response.to_http().as_bytes()).await?;
            write.shutdown().await?;
            return Err(err);
        }
        Ok(Err(err)) => return Err(err),
    };

    let response = route(handle, &request).await;
    logging::debug(
        Domain::Server,
        "server.request",
        obj(&[
            ("request", v_str(&request)),
            ("status", v_str(response.status)),
            ("bytes", v_int(response.body.len() as u64)),
        ]),
    );
    write.write_all(response.to_http().as_bytes()).await?;
    write.shutdown().await
}

/// Request line, with the headers drained. `None` if the peer sent nothing.
async fn read_head<R: AsyncBufRead + Unpin>(reader: &mut R) -> io::Result<Option<String>> {
    let mut request = String::new();
    if reader.read_line(&mut request).await? == 0 {
        return Ok(None);
    }
    if !request.ends_with('\n') {
        return Err(head_too_large());
    }
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).await? == 0 || line.trim_end().is_empty() {
            break;
        }
        if !line.ends_with('\n') {
            return Err(head_too_large());
        }
    }
    Ok(Some(request.trim_end().to_string()))
}

fn head_too_large() -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, "request head too large")
}

pub async fn route(handle: &DispatchHandle, request_line: &str) -> Response {
    let mut parts = request_line.split_whitespace();
    let (method, target) = match (parts.next(), parts.next()) {
        (Some(m), Some(t)) => (m, t),
        _ => return Response::bad_request("malformed request line"),
    };
    if method != "GET" {
        return Response::not_found();
    }
    let url = match Url::parse(&format!("http://localhost{}", target)) {
        Ok(u) => u,
        Err(_) => return Response::bad_request("malformed target"),
    };
    let param = |name: &str| {
        url.query_pairs()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.into_owned())
    };

    match url.path() {
        "/api/health" => Response::json(json!({ "status": "ok" })),
        "/api/columns" => Response::json(json!(handle.resolver().registry().options())),
        "/api/subsystems" => Response::json(json!(Subsystem::menu())),
        "/api/views" => Response::json(json!({
            "subsystem": handle.latest(SlotId::Subsystem),
            "scatter": handle.latest(SlotId::Scatter),
        })),
        "/api/dataset" => {
            let dataset = handle.resolver().dataset();
            Response::json(json!({
                "rows": dataset.len(),
                "prepared_at": dataset.prepared_at(),
                "imputed_cells": dataset.imputed_cells(),
            }))
        }
        "/api/select/subsystem" => match param("key") {
            Some(key) => dispatch(handle, SelectionEvent::Subsystem(SubsystemKey::parse(&key))).await,
            None => Response::bad_request("missing key"),
        },
        "/api/select/scatter" => {
            let event = match (param("x"), param("y")) {
                (Some(x), Some(y)) => SelectionEvent::ScatterPair { x, y },
                (Some(x), None) => SelectionEvent::ScatterX(x),
                (None, Some(y)) => SelectionEvent::ScatterY(y),
                (None, None) => return Response::bad_request("missing x or y"),
            };
            dispatch(handle, event).await
        }
        _ => Response::not_found(),
    }
}

async fn dispatch(handle: &DispatchHandle, event: SelectionEvent) -> Response {
    match handle.dispatch(event).await {
        Ok(update) => Response::json(json!(update)),
        Err(err) => {
            logging::error(Domain::Server, "server.dispatch_failed", obj(&[("msg", v_str(&err.to_string()))]));
            Response::unavailable(&err.to_string())
        }
    }
}
