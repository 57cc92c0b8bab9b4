use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

use crate::context::Context;
use crate::http::body::{BodyStream, BoxedReader};
use crate::http::parser::{MAX_HEAD_SIZE, ParseError, parse_request_head};
use crate::http::request::{Method, Request};
use crate::http::response::{Response, StatusCode};
use crate::http::writer::ResponseWriter;
use crate::middleware::pipeline::Pipeline;

type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// How long a closing connection keeps discarding input the client is still
/// sending, so the close is not turned into a reset.
const LINGER_TIMEOUT: Duration = Duration::from_secs(1);
const LINGER_MAX_BYTES: usize = 1024 * 1024;

pub struct Connection {
    reader: BoxedReader,
    writer: BoxedWriter,
    /// Bytes read from the transport that belong to the next request head.
    buffer: BytesMut,
    peer: SocketAddr,
    pipeline: Arc<Pipeline>,
    state: ConnectionState,
    /// Set when the connection closes with request bytes left unread.
    linger: bool,
}

pub enum ConnectionState {
    Reading,
    Processing(Request),
    Writing(ResponseWriter, bool), // bool = keep_alive?
    Closed,
}

/// Result of waiting for the next request head.
enum Incoming {
    Request(Request),
    /// The head was unacceptable; answer with this status and close.
    Rejected(StatusCode),
    Closed,
}

impl Connection {
    pub fn new<S>(stream: S, peer: SocketAddr, pipeline: Arc<Pipeline>) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, writer) = tokio::io::split(stream);
        Self {
            reader: Box::new(reader),
            writer: Box::new(writer),
            buffer: BytesMut::with_capacity(4096),
            peer,
            pipeline,
            state: ConnectionState::Reading,
            linger: false,
        }
    }

    pub async fn run(&mut self) -> anyhow::Result<()> {
        loop {
            self.state = match std::mem::replace(&mut self.state, ConnectionState::Closed) {
                ConnectionState::Reading => match self.read_request().await? {
                    Incoming::Request(req) => ConnectionState::Processing(req),
                    Incoming::Rejected(status) => {
                        self.linger = true;
                        let writer = ResponseWriter::new(Response::plain(status), false, false);
                        ConnectionState::Writing(writer, false)
                    }
                    Incoming::Closed => ConnectionState::Closed,
                },

                ConnectionState::Processing(req) => {
                    let (writer, keep_alive) = self.process(req).await;
                    ConnectionState::Writing(writer, keep_alive)
                }

                ConnectionState::Writing(mut writer, keep_alive) => {
                    writer.write_to_stream(&mut self.writer).await?;
                    self.writer.flush().await?;

                    if keep_alive {
                        ConnectionState::Reading // go back for next request
                    } else {
                        ConnectionState::Closed
                    }
                }

                ConnectionState::Closed => break,
            };
        }

        let _ = self.writer.shutdown().await;
        if self.linger {
            self.discard_input().await;
        }
        Ok(())
    }

    async fn discard_input(&mut self) {
        let reader = &mut self.reader;
        let drain = async move {
            let mut scratch = [0u8; 8192];
            let mut discarded = 0;
            while discarded < LINGER_MAX_BYTES {
                match reader.read(&mut scratch).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => discarded += n,
                }
            }
        };
        let _ = tokio::time::timeout(LINGER_TIMEOUT, drain).await;
    }

    async fn read_request(&mut self) -> anyhow::Result<Incoming> {
        loop {
            // Try parsing whatever we already have
            match parse_request_head(&self.buffer) {
                Ok((request, consumed)) => {
                    let _ = self.buffer.split_to(consumed);
                    return Ok(Incoming::Request(request));
                }

                Err(ParseError::Incomplete) => {
                    if self.buffer.len() > MAX_HEAD_SIZE {
                        debug!("Request head from {} exceeds {} bytes", self.peer, MAX_HEAD_SIZE);
                        return Ok(Incoming::Rejected(
                            StatusCode::REQUEST_HEADER_FIELDS_TOO_LARGE,
                        ));
                    }
                }

                Err(e) => {
                    debug!("HTTP parse error from {}: {:?}", self.peer, e);
                    let status = match e {
                        ParseError::UnsupportedTransferEncoding | ParseError::InvalidMethod => {
                            StatusCode::NOT_IMPLEMENTED
                        }
                        _ => StatusCode::BAD_REQUEST,
                    };
                    return Ok(Incoming::Rejected(status));
                }
            }

            let n = self.reader.read_buf(&mut self.buffer).await?;

            if n == 0 {
                // Client closed connection
                if !self.buffer.is_empty() {
                    debug!("{} closed the connection mid-request", self.peer);
                }
                return Ok(Incoming::Closed);
            }
        }
    }

    /// Runs one request through the pipeline and takes the transport back
    /// afterwards.
    async fn process(&mut self, req: Request) -> (ResponseWriter, bool) {
        let mut keep_alive = req.keep_alive();
        let head_only = req.method == Method::HEAD;

        let reader = std::mem::replace(&mut self.reader, Box::new(tokio::io::empty()));
        let stream = BodyStream::new(reader, self.buffer.split(), req.content_length());

        let mut ctx = Context::new(req, stream, self.peer.ip());
        self.pipeline.dispatch(&mut ctx).await;
        let (mut stream, response) = ctx.finish();

        if !stream.is_aborted() {
            if let Err(e) = stream.drain().await {
                debug!("Failed to drain request body from {}: {}", self.peer, e);
                keep_alive = false;
            }
        }

        let parts = stream.into_parts();
        if parts.aborted || parts.unread > 0 {
            if parts.aborted {
                warn!("Request body from {} was aborted; closing connection", self.peer);
            }
            keep_alive = false;
            self.linger = true;
        }
        self.reader = parts.reader;
        self.buffer = parts.leftover;

        (ResponseWriter::new(response, keep_alive, head_only), keep_alive)
    }
}
