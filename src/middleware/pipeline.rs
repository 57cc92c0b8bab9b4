//! The request-processing pipeline.
//!
//! Each request moves through three phases:
//!
//! ```text
//!   normal middleware ──▶ route handlers ──▶ done
//!          │                    │
//!          └──── Err / panic ───┴──▶ error middleware ──▶ done
//! ```
//!
//! Normal and error middleware only run when their mount prefix covers the
//! request path. An unmatched request falls through to the static SPA
//! fallback, then to a 404. The pipeline is assembled once and never mutated
//! while requests are in flight.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use tracing::{debug, error, warn};

use crate::context::Context;
use crate::error::Error;
use crate::http::request::Method;
use crate::http::response::StatusCode;
use crate::middleware::static_files::ServeStatic;
use crate::middleware::{ErrorHandler, Flow, Handler};
use crate::router::pattern::prefix_matches;
use crate::router::table::RouteTable;

/// A middleware together with the prefix it is mounted under.
#[derive(Debug, Clone)]
pub struct Mounted<T> {
    pub prefix: String,
    pub handler: T,
}

#[derive(Debug, Default)]
pub struct Pipeline {
    routes: RouteTable,
    middleware: Vec<Mounted<Handler>>,
    error_middleware: Vec<Mounted<ErrorHandler>>,
    fallback: Option<Arc<ServeStatic>>,
}

/// Where the normal chain left the request.
enum Outcome {
    /// The chain stopped or the response ended; nothing more to do.
    Done,
    /// No route handled the request.
    Unhandled,
}

impl Pipeline {
    pub fn new(
        routes: RouteTable,
        middleware: Vec<Mounted<Handler>>,
        error_middleware: Vec<Mounted<ErrorHandler>>,
        fallback: Option<Arc<ServeStatic>>,
    ) -> Self {
        Self {
            routes,
            middleware,
            error_middleware,
            fallback,
        }
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Runs one request to completion. Never fails: every fault ends up as a
    /// response.
    pub async fn dispatch(&self, ctx: &mut Context) {
        debug!(method = %ctx.req.method, path = %ctx.req.pathname, "dispatching request");

        match self.run(ctx).await {
            Ok(Outcome::Done) => {}
            Ok(Outcome::Unhandled) => {
                if let Err(err) = self.unmatched(ctx).await {
                    self.handle_error(err, ctx).await;
                }
            }
            Err(err) => self.handle_error(err, ctx).await,
        }

        if !ctx.res.is_ended() {
            warn!(
                method = %ctx.req.method,
                path = %ctx.req.pathname,
                "chain halted without ending the response"
            );
            ctx.res.end();
        }
    }

    async fn run(&self, ctx: &mut Context) -> Result<Outcome, Error> {
        for mounted in &self.middleware {
            if ctx.res.is_ended() {
                return Ok(Outcome::Done);
            }
            if !prefix_matches(&mounted.prefix, &ctx.req.pathname) {
                continue;
            }
            if invoke(&mounted.handler, ctx).await? == Flow::Halt {
                return Ok(Outcome::Done);
            }
        }

        if ctx.res.is_ended() {
            return Ok(Outcome::Done);
        }

        let Some(found) = self.routes.find(ctx.req.method, &ctx.req.url) else {
            return Ok(Outcome::Unhandled);
        };

        ctx.req.params = found.params;
        if found.fragment.is_some() {
            ctx.req.fragment = found.fragment;
        }

        for h in &found.route.handlers {
            if ctx.res.is_ended() {
                return Ok(Outcome::Done);
            }
            if invoke(h, ctx).await? == Flow::Halt {
                return Ok(Outcome::Done);
            }
        }

        // Every handler passed the request on and none answered it.
        if ctx.res.is_ended() {
            Ok(Outcome::Done)
        } else {
            Ok(Outcome::Unhandled)
        }
    }

    async fn unmatched(&self, ctx: &mut Context) -> Result<(), Error> {
        let wants_document = matches!(ctx.req.method, Method::GET | Method::HEAD);

        if let (Some(root), true) = (&self.fallback, wants_document) {
            match root.serve_index(ctx).await {
                Ok(true) => return Ok(()),
                Ok(false) => {}
                Err(e) => debug!(error = %e, "SPA fallback unavailable"),
            }
        }

        ctx.res.send_status(StatusCode::NOT_FOUND);
        Ok(())
    }

    async fn handle_error(&self, mut err: Error, ctx: &mut Context) {
        debug!(error = %err, path = %ctx.req.pathname, "running error chain");

        for mounted in &self.error_middleware {
            if ctx.res.is_ended() {
                return;
            }
            if !prefix_matches(&mounted.prefix, &ctx.req.pathname) {
                continue;
            }

            let outcome = invoke_error(&mounted.handler, &err, ctx).await;
            match outcome {
                Ok(Flow::Next) => {}
                Ok(Flow::Halt) => break,
                Err(new_err) => err = new_err,
            }
        }

        if !ctx.res.is_ended() {
            let status = err.status();
            if status.as_u16() >= 500 {
                error!(error = %err, path = %ctx.req.pathname, "unhandled error");
            } else {
                warn!(error = %err, path = %ctx.req.pathname, "unhandled error");
            }
            ctx.res.send_status(status);
        }
    }
}

/// Runs a handler, turning a panic into an error.
async fn invoke(handler: &Handler, ctx: &mut Context) -> Result<Flow, Error> {
    AssertUnwindSafe(async move { handler.call(ctx).await })
        .catch_unwind()
        .await
        .unwrap_or_else(|panic| Err(Error::from_panic(panic)))
}

async fn invoke_error(handler: &ErrorHandler, err: &Error, ctx: &mut Context) -> Result<Flow, Error> {
    AssertUnwindSafe(async move { handler.call(err, ctx).await })
        .catch_unwind()
        .await
        .unwrap_or_else(|panic| Err(Error::from_panic(panic)))
}
