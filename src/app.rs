//! Application builder.
//!
//! An [`App`] collects routes, middleware and static mounts during setup.
//! Binding freezes it into an immutable [`Pipeline`] shared by every
//! connection; nothing can be registered after that.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::net::ToSocketAddrs;

use crate::error::Error;
use crate::http::request::Method;
use crate::middleware::pipeline::{Mounted, Pipeline};
use crate::middleware::static_files::{ServeStatic, StaticOptions};
use crate::middleware::{Handler, Middleware};
use crate::router::pattern::TrailingSlash;
use crate::router::sub::{Mount, Router, Routes};
use crate::router::table::RouteTable;
use crate::server::listener::Server;

#[derive(Debug, Default)]
pub struct App {
    router: Router,
    /// Last mounted static directory; its index is the SPA fallback.
    fallback: Option<Arc<ServeStatic>>,
    trailing_slash: TrailingSlash,
}

impl App {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trailing_slash(&mut self, policy: TrailingSlash) -> &mut Self {
        self.trailing_slash = policy;
        self
    }

    /// Serves files from `dir` under `url_prefix`.
    ///
    /// The most recently mounted directory also becomes the SPA fallback root
    /// for requests nothing else handled.
    pub fn serve_static(
        &mut self,
        url_prefix: &str,
        dir: impl Into<PathBuf>,
        options: StaticOptions,
    ) -> &mut Self {
        let serve = Arc::new(ServeStatic::new(url_prefix, dir, options));
        self.router.use_at(url_prefix, serve.handler());
        self.fallback = Some(serve);
        self
    }

    /// Compiles every declaration into the request pipeline.
    pub fn into_pipeline(self) -> Result<Pipeline, Error> {
        let (route_decls, middleware_decls) = self.router.into_decls();

        let mut routes = RouteTable::new(self.trailing_slash);
        for decl in route_decls {
            routes.add(decl.method, &decl.path, decl.handlers)?;
        }

        let mut normal = Vec::new();
        let mut errors = Vec::new();
        for decl in middleware_decls {
            match decl.middleware {
                Middleware::Normal(handler) => normal.push(Mounted {
                    prefix: decl.path,
                    handler,
                }),
                Middleware::Error(handler) => errors.push(Mounted {
                    prefix: decl.path,
                    handler,
                }),
            }
        }

        tracing::debug!(
            routes = routes.len(),
            middleware = normal.len(),
            error_middleware = errors.len(),
            "pipeline assembled"
        );

        Ok(Pipeline::new(routes, normal, errors, self.fallback))
    }

    /// Freezes the application and binds a listener on `addr`.
    ///
    /// A bind failure is logged and returned; the process keeps running.
    pub async fn bind<A>(self, addr: A) -> Result<Server, Error>
    where
        A: ToSocketAddrs + std::fmt::Display,
    {
        let pipeline = self.into_pipeline()?;
        Server::bind(addr, pipeline).await
    }

    /// Binds, calls `on_listening` with the bound address, then serves until
    /// the accept loop stops.
    pub async fn listen<A, F>(self, addr: A, on_listening: F) -> Result<(), Error>
    where
        A: ToSocketAddrs + std::fmt::Display,
        F: FnOnce(SocketAddr),
    {
        let server = self.bind(addr).await?;
        on_listening(server.local_addr()?);
        server.run().await
    }
}

impl Routes for App {
    fn route<I>(&mut self, method: Method, path: &str, handlers: I) -> &mut Self
    where
        I: IntoIterator<Item = Handler>,
    {
        self.router.route(method, path, handlers);
        self
    }

    fn use_at(&mut self, prefix: &str, item: impl Into<Mount>) -> &mut Self {
        self.router.use_at(prefix, item);
        self
    }
}
