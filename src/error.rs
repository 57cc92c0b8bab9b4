//! Error taxonomy for the request pipeline.
//!
//! Every fault a handler, middleware or the framework itself can raise is a
//! variant of [`Error`]. Each variant carries an HTTP status tag, read through
//! [`Error::status`], which the default error response uses when no error
//! middleware ends the response.

use std::any::Any;
use std::path::PathBuf;

use crate::http::request::Method;
use crate::http::response::StatusCode;

/// Result alias used by handlers and middleware.
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The request body could not be decoded (malformed JSON, non UTF-8 form data).
    #[error("failed to decode request body: {0}")]
    BodyDecode(String),

    /// The request body exceeded the parser's configured limit.
    #[error("request entity too large (limit {limit} bytes)")]
    BodySizeExceeded { limit: usize },

    /// A handler failed with an explicit status.
    #[error("{message}")]
    Http { status: StatusCode, message: String },

    /// A handler failed with an arbitrary error.
    #[error(transparent)]
    Handler(#[from] anyhow::Error),

    /// A handler panicked while processing the request.
    #[error("handler panicked: {0}")]
    Panic(String),

    /// A filesystem error other than "not found" while serving a file.
    #[error("failed to serve {}: {source}", path.display())]
    StaticFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The listener could not bind its address.
    #[error("failed to bind {addr}: {source}")]
    Listen {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// A route was registered with an unusable pattern or no handlers.
    #[error("invalid route {method} {path}: {reason}")]
    InvalidRoute {
        method: Method,
        path: String,
        reason: String,
    },

    /// Transport failure, including the peer closing the connection mid-body.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Builds a handler error tagged with an explicit status.
    pub fn http(status: impl Into<StatusCode>, message: impl Into<String>) -> Self {
        Error::Http {
            status: status.into(),
            message: message.into(),
        }
    }

    /// The status a response for this error should carry.
    pub fn status(&self) -> StatusCode {
        match self {
            Error::BodyDecode(_) => StatusCode::BAD_REQUEST,
            Error::BodySizeExceeded { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Error::Http { status, .. } => *status,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Error::Panic(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_tags() {
        assert_eq!(Error::BodyDecode("x".into()).status().as_u16(), 400);
        assert_eq!(Error::BodySizeExceeded { limit: 1 }.status().as_u16(), 413);
        assert_eq!(Error::http(403, "nope").status().as_u16(), 403);
        assert_eq!(Error::from(anyhow::anyhow!("boom")).status().as_u16(), 500);
    }

    #[test]
    fn panic_payloads() {
        let err = Error::from_panic(Box::new("static message"));
        assert_eq!(err.to_string(), "handler panicked: static message");

        let err = Error::from_panic(Box::new(String::from("owned")));
        assert_eq!(err.to_string(), "handler panicked: owned");
    }
}
