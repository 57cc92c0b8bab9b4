use std::collections::HashMap;
use std::net::SocketAddr;

use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use trellis::App;
use trellis::error::Error;
use trellis::middleware::body_parser::{JsonOptions, json_with};
use trellis::middleware::{Flow, error_handler, handler};
use trellis::router::Routes;

struct RawResponse {
    status: u16,
    headers: HashMap<String, String>,
    body: Vec<u8>,
}

fn test_app() -> App {
    let mut app = App::new();
    app.use_middleware(json_with(JsonOptions { limit: Some(64) }));

    app.get(
        "/hello",
        [handler(|ctx| {
            Box::pin(async move {
                ctx.res.send("hello");
                Ok(Flow::Halt)
            })
        })],
    );

    app.post(
        "/echo",
        [handler(|ctx| {
            Box::pin(async move {
                let body = ctx.req.body.to_json();
                ctx.res.json(&json!({ "got": body }));
                Ok(Flow::Halt)
            })
        })],
    );

    // Answers without looking at the body.
    app.post(
        "/ignore",
        [handler(|ctx| {
            Box::pin(async move {
                ctx.res.send("ignored");
                Ok(Flow::Halt)
            })
        })],
    );

    app
}

async fn start() -> SocketAddr {
    let server = test_app().bind("127.0.0.1:0").await.unwrap();
    let addr = server.local_addr().unwrap();
    tokio::spawn(server.run());
    addr
}

/// Reads one response framed by its Content-Length.
async fn read_response(stream: &mut TcpStream, buf: &mut Vec<u8>) -> RawResponse {
    let head_end = loop {
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos;
        }
        let mut chunk = [0u8; 1024];
        let n = stream.read(&mut chunk).await.unwrap();
        assert!(n > 0, "connection closed before response head");
        buf.extend_from_slice(&chunk[..n]);
    };

    let head = String::from_utf8(buf[..head_end].to_vec()).unwrap();
    let mut lines = head.split("\r\n");
    let status = lines
        .next()
        .and_then(|l| l.split_whitespace().nth(1))
        .and_then(|s| s.parse().ok())
        .unwrap();
    let headers: HashMap<String, String> = lines
        .filter_map(|l| l.split_once(':'))
        .map(|(k, v)| (k.trim().to_ascii_lowercase(), v.trim().to_string()))
        .collect();

    let len: usize = headers
        .get("content-length")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    buf.drain(..head_end + 4);

    while buf.len() < len {
        let mut chunk = [0u8; 1024];
        let n = stream.read(&mut chunk).await.unwrap();
        assert!(n > 0, "connection closed before response body");
        buf.extend_from_slice(&chunk[..n]);
    }
    let body = buf.drain(..len).collect();

    RawResponse {
        status,
        headers,
        body,
    }
}

async fn assert_closed(stream: &mut TcpStream) {
    let mut rest = Vec::new();
    let n = stream.read_to_end(&mut rest).await.unwrap_or(0);
    assert_eq!(n, 0, "expected the server to close the connection");
}

#[tokio::test]
async fn test_keep_alive_serves_sequential_requests() {
    let addr = start().await;
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let mut buf = Vec::new();

    for _ in 0..2 {
        stream
            .write_all(b"GET /hello HTTP/1.1\r\nHost: test\r\n\r\n")
            .await
            .unwrap();
        let res = read_response(&mut stream, &mut buf).await;

        assert_eq!(res.status, 200);
        assert_eq!(res.body, b"hello");
        assert_eq!(res.headers.get("connection").map(String::as_str), Some("keep-alive"));
    }
}

#[tokio::test]
async fn test_pipelined_requests() {
    let addr = start().await;
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let mut buf = Vec::new();

    stream
        .write_all(
            b"POST /echo HTTP/1.1\r\nContent-Type: application/json\r\nContent-Length: 7\r\n\r\n{\"a\":1}GET /hello HTTP/1.1\r\n\r\n",
        )
        .await
        .unwrap();

    let first = read_response(&mut stream, &mut buf).await;
    assert_eq!(first.status, 200);
    let value: serde_json::Value = serde_json::from_slice(&first.body).unwrap();
    assert_eq!(value, json!({ "got": { "a": 1 } }));

    let second = read_response(&mut stream, &mut buf).await;
    assert_eq!(second.body, b"hello");
}

#[tokio::test]
async fn test_unread_body_is_drained_for_next_request() {
    let addr = start().await;
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let mut buf = Vec::new();

    stream
        .write_all(b"POST /ignore HTTP/1.1\r\nContent-Type: text/plain\r\nContent-Length: 11\r\n\r\nhello world")
        .await
        .unwrap();
    let res = read_response(&mut stream, &mut buf).await;
    assert_eq!(res.body, b"ignored");

    stream.write_all(b"GET /hello HTTP/1.1\r\n\r\n").await.unwrap();
    let res = read_response(&mut stream, &mut buf).await;
    assert_eq!(res.body, b"hello");
}

#[tokio::test]
async fn test_oversized_body_is_413_and_closes() {
    let addr = start().await;
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let mut buf = Vec::new();

    let body = format!("{{\"data\":\"{}\"}}", "x".repeat(100));
    let request = format!(
        "POST /echo HTTP/1.1\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{}",
        body.len(),
        body
    );
    stream.write_all(request.as_bytes()).await.unwrap();

    let res = read_response(&mut stream, &mut buf).await;
    assert_eq!(res.status, 413);
    assert_eq!(res.headers.get("connection").map(String::as_str), Some("close"));
    assert_closed(&mut stream).await;
}

#[tokio::test]
async fn test_peer_closing_mid_body_reaches_error_handler() {
    let mut app = test_app();
    app.use_middleware(error_handler(|err, ctx| {
        Box::pin(async move {
            let kind = if matches!(err, Error::Io(_)) { "io" } else { "other" };
            ctx.res.set_status(err.status()).send(kind);
            Ok(Flow::Halt)
        })
    }));

    let server = app.bind("127.0.0.1:0").await.unwrap();
    let addr = server.local_addr().unwrap();
    tokio::spawn(server.run());

    let mut stream = TcpStream::connect(addr).await.unwrap();
    let mut buf = Vec::new();

    stream
        .write_all(b"POST /echo HTTP/1.1\r\nContent-Type: application/json\r\nContent-Length: 10\r\n\r\n{\"a")
        .await
        .unwrap();
    // Half-close: the body ends early but the response can still be read.
    stream.shutdown().await.unwrap();

    let res = read_response(&mut stream, &mut buf).await;
    assert_eq!(res.status, 500);
    assert_eq!(res.body, b"io");
    assert_eq!(res.headers.get("connection").map(String::as_str), Some("close"));
}

#[tokio::test]
async fn test_head_response_has_no_body() {
    let addr = start().await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    // HEAD is not routed here, so the 404 text would be the body.
    stream
        .write_all(b"HEAD /hello HTTP/1.1\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();

    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).await.unwrap();
    let raw = String::from_utf8(raw).unwrap();

    assert!(raw.starts_with("HTTP/1.1 404 Not Found\r\n"));
    assert!(raw.contains("Content-Length: 9\r\n"));
    assert!(raw.ends_with("\r\n\r\n"));
}

#[tokio::test]
async fn test_http10_closes_by_default() {
    let addr = start().await;
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let mut buf = Vec::new();

    stream.write_all(b"GET /hello HTTP/1.0\r\n\r\n").await.unwrap();

    let res = read_response(&mut stream, &mut buf).await;
    assert_eq!(res.status, 200);
    assert_eq!(res.headers.get("connection").map(String::as_str), Some("close"));
    assert_closed(&mut stream).await;
}

#[tokio::test]
async fn test_chunked_body_is_501() {
    let addr = start().await;
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let mut buf = Vec::new();

    stream
        .write_all(b"POST /echo HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n5\r\nhello\r\n0\r\n\r\n")
        .await
        .unwrap();

    let res = read_response(&mut stream, &mut buf).await;
    assert_eq!(res.status, 501);
    assert_closed(&mut stream).await;
}

#[tokio::test]
async fn test_malformed_request_is_400() {
    let addr = start().await;
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let mut buf = Vec::new();

    stream
        .write_all(b"GET /hello HTTP/1.1\r\nno colon here\r\n\r\n")
        .await
        .unwrap();

    let res = read_response(&mut stream, &mut buf).await;
    assert_eq!(res.status, 400);
    assert_eq!(res.body, b"Bad Request");
    assert_closed(&mut stream).await;
}

#[tokio::test]
async fn test_oversized_head_is_431() {
    let addr = start().await;
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let mut buf = Vec::new();

    let request = format!(
        "GET /hello HTTP/1.1\r\nX-Filler: {}\r\n\r\n",
        "a".repeat(70 * 1024)
    );
    // The server may stop reading before everything is written.
    let _ = stream.write_all(request.as_bytes()).await;

    let res = read_response(&mut stream, &mut buf).await;
    assert_eq!(res.status, 431);
}

#[tokio::test]
async fn test_bind_conflict_is_listen_error() {
    let first = test_app().bind("127.0.0.1:0").await.unwrap();
    let addr = first.local_addr().unwrap();

    let err = test_app().bind(addr).await.unwrap_err();
    assert!(matches!(err, Error::Listen { .. }));
}

#[tokio::test]
async fn test_listen_reports_bound_address() {
    let (tx, rx) = tokio::sync::oneshot::channel();

    tokio::spawn(test_app().listen("127.0.0.1:0", move |addr| {
        let _ = tx.send(addr);
    }));

    let addr = rx.await.unwrap();
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let mut buf = Vec::new();

    stream.write_all(b"GET /hello HTTP/1.1\r\n\r\n").await.unwrap();
    let res = read_response(&mut stream, &mut buf).await;
    assert_eq!(res.body, b"hello");
}
