//! Streaming request-body decoders.
//!
//! Neither parser runs automatically; install them with `use_middleware`.
//! Each only touches requests whose media type it understands and passes every
//! other request through unchanged.

use bytes::BytesMut;
use tracing::debug;

use crate::context::{Body, Context};
use crate::error::Error;
use crate::middleware::{Flow, Handler, handler};

/// Default body limit: 1 MiB.
pub const DEFAULT_LIMIT: usize = 1024 * 1024;

/// Upper bound on the up-front buffer reservation; the declared length is
/// client-controlled, so larger bodies grow the buffer as chunks arrive.
const INITIAL_CAPACITY: usize = 64 * 1024;

const JSON_TYPE: &str = "application/json";
const FORM_TYPE: &str = "application/x-www-form-urlencoded";

#[derive(Debug, Clone, Copy)]
pub struct JsonOptions {
    /// Largest accepted body in bytes; `None` disables the check.
    pub limit: Option<usize>,
}

impl Default for JsonOptions {
    fn default() -> Self {
        Self {
            limit: Some(DEFAULT_LIMIT),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct UrlencodedOptions {
    /// Reserved; nested-object decoding is not implemented.
    pub extended: bool,
    /// Largest accepted body in bytes.
    pub limit: usize,
}

impl Default for UrlencodedOptions {
    fn default() -> Self {
        Self {
            extended: false,
            limit: DEFAULT_LIMIT,
        }
    }
}

/// JSON body parser with the default limit.
pub fn json() -> Handler {
    json_with(JsonOptions::default())
}

pub fn json_with(options: JsonOptions) -> Handler {
    handler(move |ctx| {
        Box::pin(async move {
            if ctx.req.content_type().as_deref() != Some(JSON_TYPE) {
                return Ok(Flow::Next);
            }

            let raw = read_body(ctx, options.limit).await?;
            let value = serde_json::from_slice(&raw).map_err(|e| Error::BodyDecode(e.to_string()))?;

            ctx.req.body = Body::Json(value);
            Ok(Flow::Next)
        })
    })
}

/// Form-urlencoded body parser with the default limit.
pub fn urlencoded() -> Handler {
    urlencoded_with(UrlencodedOptions::default())
}

pub fn urlencoded_with(options: UrlencodedOptions) -> Handler {
    handler(move |ctx| {
        Box::pin(async move {
            if ctx.req.content_type().as_deref() != Some(FORM_TYPE) {
                return Ok(Flow::Next);
            }

            let raw = read_body(ctx, Some(options.limit)).await?;
            let text = std::str::from_utf8(&raw)
                .map_err(|e| Error::BodyDecode(format!("form body is not UTF-8: {}", e)))?;

            let form = url::form_urlencoded::parse(text.as_bytes())
                .into_owned()
                .collect();

            ctx.req.body = Body::Form(form);
            Ok(Flow::Next)
        })
    })
}

/// Accumulates the body, aborting the stream as soon as it grows past `limit`.
async fn read_body(ctx: &mut Context, limit: Option<usize>) -> Result<BytesMut, Error> {
    let stream = ctx.req.body_stream();

    if let Some(limit) = limit {
        if stream.content_length() > limit as u64 {
            debug!(
                declared = stream.content_length(),
                limit, "rejecting body by declared length"
            );
            stream.abort();
            return Err(Error::BodySizeExceeded { limit });
        }
    }

    let capacity = stream
        .content_length()
        .min(limit.unwrap_or(DEFAULT_LIMIT) as u64)
        .min(INITIAL_CAPACITY as u64) as usize;
    let mut raw = BytesMut::with_capacity(capacity);
    while let Some(chunk) = stream.chunk().await? {
        if let Some(limit) = limit {
            if raw.len() + chunk.len() > limit {
                stream.abort();
                return Err(Error::BodySizeExceeded { limit });
            }
        }
        raw.extend_from_slice(&chunk);
    }

    Ok(raw)
}
