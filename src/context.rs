//! Per-request state handed to every handler.
//!
//! A [`Context`] is built by the connection for each request from the parsed
//! head, the body stream and the peer address. It owns the request-side fields
//! handlers read (`pathname`, `query`, `params`, `body`, ...) and the
//! [`ResponseContext`] they write to.

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};
use std::path::Path;

use bytes::Bytes;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::Error;
use crate::http::body::BodyStream;
use crate::http::mime::get_mime_type;
use crate::http::request::{Method, Request};
use crate::http::response::{
    Response, ResponseBody, ResponseBuilder, StatusCode, get_header, set_header,
};
use crate::router::target::Target;

pub struct Context {
    pub req: RequestContext,
    pub res: ResponseContext,
    /// Free-form values middleware pass to later handlers.
    pub locals: HashMap<String, Value>,
}

/// Decoded request body, filled in by a body-parser middleware.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Body {
    #[default]
    Empty,
    Json(Value),
    Form(HashMap<String, String>),
}

impl Body {
    pub fn is_empty(&self) -> bool {
        matches!(self, Body::Empty)
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Body::Json(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_form(&self) -> Option<&HashMap<String, String>> {
        match self {
            Body::Form(f) => Some(f),
            _ => None,
        }
    }

    /// The body as a JSON value; forms become objects of strings and an empty
    /// body becomes `{}`.
    pub fn to_json(&self) -> Value {
        match self {
            Body::Empty => Value::Object(Default::default()),
            Body::Json(v) => v.clone(),
            Body::Form(f) => Value::Object(
                f.iter()
                    .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                    .collect(),
            ),
        }
    }
}

pub struct RequestContext {
    pub method: Method,
    /// Raw request target as sent by the client.
    pub url: String,
    pub pathname: String,
    pub query: HashMap<String, String>,
    /// Route parameters; empty until a route matches.
    pub params: HashMap<String, String>,
    pub fragment: Option<String>,
    pub body: Body,
    pub client_address: IpAddr,
    pub version: String,
    headers: HashMap<String, String>,
    stream: BodyStream,
}

impl RequestContext {
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .get(&key.to_ascii_lowercase())
            .map(|v| v.as_str())
    }

    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// Media type of the request without parameters, lowercased.
    pub fn content_type(&self) -> Option<String> {
        self.header("Content-Type").map(|ct| {
            ct.split(';')
                .next()
                .unwrap_or_default()
                .trim()
                .to_ascii_lowercase()
        })
    }

    /// Raw access to the request body stream.
    pub fn body_stream(&mut self) -> &mut BodyStream {
        &mut self.stream
    }

    /// Deserializes the decoded body into `T`.
    pub fn body_as<T: DeserializeOwned>(&self) -> Result<T, Error> {
        serde_json::from_value(self.body.to_json())
            .map_err(|e| Error::BodyDecode(e.to_string()))
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(|v| v.as_str())
    }
}

/// Something `send` can write.
pub enum Payload {
    Text(String),
    Bytes(Bytes),
    Json(Value),
}

impl From<&str> for Payload {
    fn from(s: &str) -> Self {
        Payload::Text(s.to_string())
    }
}

impl From<String> for Payload {
    fn from(s: String) -> Self {
        Payload::Text(s)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(b: Vec<u8>) -> Self {
        Payload::Bytes(b.into())
    }
}

impl From<Bytes> for Payload {
    fn from(b: Bytes) -> Self {
        Payload::Bytes(b)
    }
}

impl From<Value> for Payload {
    fn from(v: Value) -> Self {
        match v {
            Value::String(s) => Payload::Text(s),
            other => Payload::Json(other),
        }
    }
}

/// Options for [`ResponseContext::send_file`].
#[derive(Debug, Clone, Default)]
pub struct SendFileOptions {
    /// Overrides the content type derived from the file extension.
    pub mime_type: Option<String>,
    /// Adds `Cache-Control: public, max-age=<seconds>`.
    pub max_age: Option<u64>,
}

/// Response under construction.
///
/// Once the response has ended, every further write, status change or header
/// change is silently ignored.
#[derive(Debug)]
pub struct ResponseContext {
    status: StatusCode,
    headers: Vec<(String, String)>,
    body: ResponseBody,
    ended: bool,
}

impl Default for ResponseContext {
    fn default() -> Self {
        Self {
            status: StatusCode::OK,
            headers: Vec::new(),
            body: ResponseBody::Empty,
            ended: false,
        }
    }
}

impl ResponseContext {
    pub fn status_code(&self) -> StatusCode {
        self.status
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }

    /// Responses are buffered until the pipeline finishes, so headers count as
    /// sent as soon as the response has ended.
    pub fn headers_sent(&self) -> bool {
        self.ended
    }

    pub fn header(&self, key: &str) -> Option<&str> {
        get_header(&self.headers, key)
    }

    pub fn set_status(&mut self, code: impl Into<StatusCode>) -> &mut Self {
        if !self.ended {
            self.status = code.into();
        }
        self
    }

    pub fn set_header(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        if !self.ended {
            set_header(&mut self.headers, key.into(), value.into());
        }
        self
    }

    /// Writes text or bytes as `text/plain`; JSON values other than strings
    /// are delegated to [`json`](Self::json).
    pub fn send(&mut self, data: impl Into<Payload>) {
        if self.ended {
            return;
        }
        match data.into() {
            Payload::Json(value) => self.json(&value),
            Payload::Text(text) => self.finish("text/plain", text.into()),
            Payload::Bytes(bytes) => self.finish("text/plain", bytes),
        }
    }

    pub fn json<T: Serialize + ?Sized>(&mut self, data: &T) {
        if self.ended {
            return;
        }
        match serde_json::to_vec(data) {
            Ok(bytes) => self.finish("application/json", bytes.into()),
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize JSON response");
                self.send_status(StatusCode::INTERNAL_SERVER_ERROR);
            }
        }
    }

    /// Ends the response with the given status and its reason phrase as a
    /// plain-text body.
    pub fn send_status(&mut self, status: StatusCode) {
        if self.ended {
            return;
        }
        self.status = status;
        set_header(&mut self.headers, "Content-Type".into(), "text/plain".into());
        self.finish("text/plain", Bytes::from_static(status.reason_phrase().as_bytes()));
    }

    /// Ends the response without a body.
    pub fn end(&mut self) {
        self.ended = true;
    }

    /// Opens `path` and streams it as the response body.
    ///
    /// The file stays open only until the response has been written. If it
    /// cannot be opened, a 500 plain-text response is sent instead.
    pub async fn send_file(&mut self, path: impl AsRef<Path>, options: &SendFileOptions) {
        if self.ended {
            return;
        }
        let path = path.as_ref();

        let mime = options
            .mime_type
            .clone()
            .unwrap_or_else(|| get_mime_type(path).to_string());
        self.set_header("Content-Type", mime);

        if let Some(max_age) = options.max_age {
            self.set_header("Cache-Control", format!("public, max-age={}", max_age));
        }

        let opened = async {
            let file = tokio::fs::File::open(path).await?;
            let len = file.metadata().await?.len();
            Ok::<_, std::io::Error>((file, len))
        };

        match opened.await {
            Ok((file, len)) => {
                self.body = ResponseBody::File { file, len };
                self.ended = true;
            }
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "error serving file");
                self.headers
                    .retain(|(k, _)| !k.eq_ignore_ascii_case("Cache-Control"));
                self.send_status(StatusCode::INTERNAL_SERVER_ERROR);
            }
        }
    }

    fn finish(&mut self, default_type: &str, body: Bytes) {
        if self.header("Content-Type").is_none() {
            set_header(&mut self.headers, "Content-Type".into(), default_type.into());
        }
        self.body = ResponseBody::Bytes(body);
        self.ended = true;
    }

    /// Body bytes of an in-memory response, if any.
    pub fn body_bytes(&self) -> Option<&Bytes> {
        match &self.body {
            ResponseBody::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn into_response(self) -> Response {
        let mut builder = ResponseBuilder::new(self.status);
        for (k, v) in self.headers {
            builder = builder.header(k, v);
        }
        match self.body {
            ResponseBody::Empty => builder.build(),
            ResponseBody::Bytes(b) => builder.body(b).build(),
            ResponseBody::File { file, len } => builder.file(file, len).build(),
        }
    }
}

impl Context {
    /// Builds the context for one request.
    pub fn new(head: Request, stream: BodyStream, client_address: IpAddr) -> Self {
        let target = Target::parse(&head.target);

        Self {
            req: RequestContext {
                method: head.method,
                url: head.target,
                pathname: target.pathname,
                query: target.query,
                params: HashMap::new(),
                fragment: target.fragment,
                body: Body::Empty,
                client_address,
                version: head.version,
                headers: head.headers,
                stream,
            },
            res: ResponseContext::default(),
            locals: HashMap::new(),
        }
    }

    /// A context with an empty body from the loopback address.
    pub fn from_request(head: Request) -> Self {
        Self::new(head, BodyStream::empty(), IpAddr::V4(Ipv4Addr::LOCALHOST))
    }

    /// Splits the context into the body stream, for the connection to reclaim,
    /// and the finished response.
    pub fn finish(self) -> (BodyStream, Response) {
        (self.req.stream, self.res.into_response())
    }
}
