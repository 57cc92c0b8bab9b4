//! Handlers, middleware and the built-in middleware set.
//!
//! A handler is an async function over `&mut Context`. Its result drives the
//! pipeline: [`Flow::Next`] advances to the next middleware or route handler,
//! [`Flow::Halt`] stops the chain, and an `Err` diverts the request into the
//! error chain.
//!
//! ```ignore
//! app.use_middleware(handler(|ctx| Box::pin(async move {
//!     ctx.locals.insert("seen".into(), true.into());
//!     Ok(Flow::Next)
//! })));
//! ```

pub mod body_parser;
pub mod cors;
pub mod pipeline;
pub mod static_files;

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::context::Context;
use crate::error::Error;

/// What a handler tells the pipeline to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Next,
    Halt,
}

pub type HandlerFuture<'a> = Pin<Box<dyn Future<Output = Result<Flow, Error>> + Send + 'a>>;

type HandlerFn = dyn for<'a> Fn(&'a mut Context) -> HandlerFuture<'a> + Send + Sync;
type ErrorHandlerFn = dyn for<'a> Fn(&'a Error, &'a mut Context) -> HandlerFuture<'a> + Send + Sync;

/// A request handler or normal middleware.
#[derive(Clone)]
pub struct Handler(Arc<HandlerFn>);

/// Error-handling middleware, invoked with the current error.
#[derive(Clone)]
pub struct ErrorHandler(Arc<ErrorHandlerFn>);

impl Handler {
    pub fn new<F>(f: F) -> Self
    where
        F: for<'a> Fn(&'a mut Context) -> HandlerFuture<'a> + Send + Sync + 'static,
    {
        Handler(Arc::new(f))
    }

    pub fn call<'a>(&'a self, ctx: &'a mut Context) -> HandlerFuture<'a> {
        (self.0)(ctx)
    }
}

impl ErrorHandler {
    pub fn new<F>(f: F) -> Self
    where
        F: for<'a> Fn(&'a Error, &'a mut Context) -> HandlerFuture<'a> + Send + Sync + 'static,
    {
        ErrorHandler(Arc::new(f))
    }

    pub fn call<'a>(&'a self, err: &'a Error, ctx: &'a mut Context) -> HandlerFuture<'a> {
        (self.0)(err, ctx)
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Handler")
    }
}

impl fmt::Debug for ErrorHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ErrorHandler")
    }
}

/// Wraps a closure or function as a [`Handler`].
pub fn handler<F>(f: F) -> Handler
where
    F: for<'a> Fn(&'a mut Context) -> HandlerFuture<'a> + Send + Sync + 'static,
{
    Handler::new(f)
}

/// Wraps a closure or function as an [`ErrorHandler`].
pub fn error_handler<F>(f: F) -> ErrorHandler
where
    F: for<'a> Fn(&'a Error, &'a mut Context) -> HandlerFuture<'a> + Send + Sync + 'static,
{
    ErrorHandler::new(f)
}

/// Middleware kinds. The kind is chosen at registration, never inferred.
#[derive(Debug, Clone)]
pub enum Middleware {
    Normal(Handler),
    Error(ErrorHandler),
}

impl From<Handler> for Middleware {
    fn from(h: Handler) -> Self {
        Middleware::Normal(h)
    }
}

impl From<ErrorHandler> for Middleware {
    fn from(h: ErrorHandler) -> Self {
        Middleware::Error(h)
    }
}

/// Logs `METHOD path - client` for every request.
pub fn logger() -> Handler {
    handler(|ctx| {
        Box::pin(async move {
            tracing::info!(
                "{} {} - {}",
                ctx.req.method,
                ctx.req.pathname,
                ctx.req.client_address
            );
            Ok(Flow::Next)
        })
    })
}
