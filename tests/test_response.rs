use trellis::http::response::{Response, ResponseBody, ResponseBuilder, StatusCode};
use trellis::http::writer::ResponseWriter;

fn body_bytes(response: &Response) -> &[u8] {
    match &response.body {
        ResponseBody::Bytes(b) => b,
        _ => &[],
    }
}

async fn serialize(response: Response, keep_alive: bool, head_only: bool) -> String {
    let mut out: Vec<u8> = Vec::new();
    ResponseWriter::new(response, keep_alive, head_only)
        .write_to_stream(&mut out)
        .await
        .unwrap();
    String::from_utf8(out).unwrap()
}

#[test]
fn test_status_code_as_u16() {
    assert_eq!(StatusCode::OK.as_u16(), 200);
    assert_eq!(StatusCode::CREATED.as_u16(), 201);
    assert_eq!(StatusCode::NO_CONTENT.as_u16(), 204);
    assert_eq!(StatusCode::BAD_REQUEST.as_u16(), 400);
    assert_eq!(StatusCode::NOT_FOUND.as_u16(), 404);
    assert_eq!(StatusCode::PAYLOAD_TOO_LARGE.as_u16(), 413);
    assert_eq!(StatusCode::INTERNAL_SERVER_ERROR.as_u16(), 500);
}

#[test]
fn test_status_code_reason_phrase() {
    assert_eq!(StatusCode::OK.reason_phrase(), "OK");
    assert_eq!(StatusCode::NO_CONTENT.reason_phrase(), "No Content");
    assert_eq!(StatusCode::NOT_FOUND.reason_phrase(), "Not Found");
    assert_eq!(StatusCode::from(418).reason_phrase(), "I'm a Teapot");
    assert_eq!(StatusCode::from(599).reason_phrase(), "Unknown");
}

#[test]
fn test_response_builder_basic() {
    let response = ResponseBuilder::new(StatusCode::OK)
        .body(b"Hello, World!".to_vec())
        .build();

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(body_bytes(&response), b"Hello, World!");
    assert_eq!(response.header("Content-Length"), Some("13"));
}

#[test]
fn test_response_builder_header_replaces_case_insensitively() {
    let response = ResponseBuilder::new(StatusCode::OK)
        .header("Content-Type", "text/plain")
        .header("content-type", "application/json")
        .build();

    assert_eq!(response.header("CONTENT-TYPE"), Some("application/json"));
    assert_eq!(
        response
            .headers
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case("content-type"))
            .count(),
        1
    );
}

#[test]
fn test_response_plain_uses_reason_phrase() {
    let response = Response::plain(StatusCode::NOT_FOUND);

    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(body_bytes(&response), b"Not Found");
    assert_eq!(response.header("Content-Type"), Some("text/plain"));
}

#[tokio::test]
async fn test_writer_serializes_status_line_and_headers() {
    let raw = serialize(ResponseBuilder::new(StatusCode::OK).body("hi").build(), true, false).await;

    assert!(raw.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(raw.contains("Content-Length: 2\r\n"));
    assert!(raw.contains("Connection: keep-alive\r\n"));
    assert!(raw.ends_with("\r\n\r\nhi"));
}

#[tokio::test]
async fn test_writer_close_connection_header() {
    let raw = serialize(Response::plain(StatusCode::INTERNAL_SERVER_ERROR), false, false).await;

    assert!(raw.starts_with("HTTP/1.1 500 Internal Server Error\r\n"));
    assert!(raw.contains("Connection: close\r\n"));
}

#[tokio::test]
async fn test_writer_head_only_omits_body() {
    let raw = serialize(ResponseBuilder::new(StatusCode::OK).body("hello").build(), true, true).await;

    assert!(raw.contains("Content-Length: 5\r\n"));
    assert!(raw.ends_with("\r\n\r\n"));
}
