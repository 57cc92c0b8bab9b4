//! Trellis - a small HTTP application server framework
//!
//! Routing, a middleware pipeline with an error chain, streaming body
//! parsers, CORS and static file serving over a hand-written HTTP/1.1 layer.

pub mod app;
pub mod config;
pub mod context;
pub mod error;
pub mod http;
pub mod middleware;
pub mod router;
pub mod server;

pub use app::App;
pub use context::{Body, Context, Payload, RequestContext, ResponseContext, SendFileOptions};
pub use error::{Error, Result};
pub use http::request::Method;
pub use http::response::StatusCode;
pub use middleware::{ErrorHandler, Flow, Handler, Middleware, error_handler, handler};
pub use router::{Router, Routes, TrailingSlash};
pub use server::Server;

/// Everything needed to declare an application.
pub mod prelude {
    pub use crate::app::App;
    pub use crate::context::{Body, Context, SendFileOptions};
    pub use crate::error::Error;
    pub use crate::http::request::Method;
    pub use crate::http::response::StatusCode;
    pub use crate::middleware::body_parser::{json, urlencoded};
    pub use crate::middleware::cors::{CorsConfig, cors};
    pub use crate::middleware::static_files::StaticOptions;
    pub use crate::middleware::{Flow, error_handler, handler, logger};
    pub use crate::router::{Router, Routes, TrailingSlash};
}
