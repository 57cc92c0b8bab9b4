//! Detached route groups and the registration surface shared with `App`.
//!
//! A [`Router`] only collects declarations. Mounting it with
//! [`Routes::use_at`] copies every route and middleware into the parent with
//! the mount prefix prepended.

use crate::http::request::Method;
use crate::middleware::{ErrorHandler, Handler, Middleware};
use crate::router::pattern::join_paths;

/// A route declaration that has not been compiled yet.
#[derive(Debug, Clone)]
pub struct RouteDecl {
    pub method: Method,
    pub path: String,
    pub handlers: Vec<Handler>,
}

/// A middleware declaration with its mount path.
#[derive(Debug, Clone)]
pub struct MiddlewareDecl {
    pub path: String,
    pub middleware: Middleware,
}

/// Anything that can be flattened into an application's tables.
///
/// Third-party router types plug in by implementing this trait.
pub trait RouteSource: Send {
    fn routes(&self) -> Vec<RouteDecl>;
    fn middleware(&self) -> Vec<MiddlewareDecl>;
}

/// What `use_at` accepts: a single middleware or a whole route source.
pub enum Mount {
    Middleware(Middleware),
    Source(Box<dyn RouteSource>),
}

impl Mount {
    pub fn source(source: impl RouteSource + 'static) -> Self {
        Mount::Source(Box::new(source))
    }
}

impl From<Middleware> for Mount {
    fn from(m: Middleware) -> Self {
        Mount::Middleware(m)
    }
}

impl From<Handler> for Mount {
    fn from(h: Handler) -> Self {
        Mount::Middleware(Middleware::Normal(h))
    }
}

impl From<ErrorHandler> for Mount {
    fn from(h: ErrorHandler) -> Self {
        Mount::Middleware(Middleware::Error(h))
    }
}

impl From<Router> for Mount {
    fn from(r: Router) -> Self {
        Mount::Source(Box::new(r))
    }
}

/// Route and middleware registration.
///
/// Handlers in a chain run in the order given.
pub trait Routes {
    fn route<I>(&mut self, method: Method, path: &str, handlers: I) -> &mut Self
    where
        I: IntoIterator<Item = Handler>;

    /// Registers middleware under `prefix`, or flattens a route source with
    /// `prefix` prepended to all of its paths.
    fn use_at(&mut self, prefix: &str, item: impl Into<Mount>) -> &mut Self;

    fn use_middleware(&mut self, item: impl Into<Mount>) -> &mut Self {
        self.use_at("/", item)
    }

    fn get<I: IntoIterator<Item = Handler>>(&mut self, path: &str, handlers: I) -> &mut Self {
        self.route(Method::GET, path, handlers)
    }

    fn post<I: IntoIterator<Item = Handler>>(&mut self, path: &str, handlers: I) -> &mut Self {
        self.route(Method::POST, path, handlers)
    }

    fn put<I: IntoIterator<Item = Handler>>(&mut self, path: &str, handlers: I) -> &mut Self {
        self.route(Method::PUT, path, handlers)
    }

    fn patch<I: IntoIterator<Item = Handler>>(&mut self, path: &str, handlers: I) -> &mut Self {
        self.route(Method::PATCH, path, handlers)
    }

    fn delete<I: IntoIterator<Item = Handler>>(&mut self, path: &str, handlers: I) -> &mut Self {
        self.route(Method::DELETE, path, handlers)
    }

    fn head<I: IntoIterator<Item = Handler>>(&mut self, path: &str, handlers: I) -> &mut Self {
        self.route(Method::HEAD, path, handlers)
    }

    fn options<I: IntoIterator<Item = Handler>>(&mut self, path: &str, handlers: I) -> &mut Self {
        self.route(Method::OPTIONS, path, handlers)
    }

    /// Registers the same chain for every method in [`Method::ALL`].
    fn all<I: IntoIterator<Item = Handler>>(&mut self, path: &str, handlers: I) -> &mut Self {
        let handlers: Vec<Handler> = handlers.into_iter().collect();
        for method in Method::ALL {
            self.route(method, path, handlers.clone());
        }
        self
    }
}

/// A detached collection of routes and middleware.
#[derive(Debug, Clone, Default)]
pub struct Router {
    routes: Vec<RouteDecl>,
    middleware: Vec<MiddlewareDecl>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route_decls(&self) -> &[RouteDecl] {
        &self.routes
    }

    pub fn middleware_decls(&self) -> &[MiddlewareDecl] {
        &self.middleware
    }

    pub(crate) fn into_decls(self) -> (Vec<RouteDecl>, Vec<MiddlewareDecl>) {
        (self.routes, self.middleware)
    }
}

impl Routes for Router {
    fn route<I>(&mut self, method: Method, path: &str, handlers: I) -> &mut Self
    where
        I: IntoIterator<Item = Handler>,
    {
        self.routes.push(RouteDecl {
            method,
            path: path.to_string(),
            handlers: handlers.into_iter().collect(),
        });
        self
    }

    fn use_at(&mut self, prefix: &str, item: impl Into<Mount>) -> &mut Self {
        match item.into() {
            Mount::Middleware(middleware) => self.middleware.push(MiddlewareDecl {
                path: prefix.to_string(),
                middleware,
            }),
            Mount::Source(source) => {
                for decl in source.routes() {
                    tracing::debug!(
                        method = %decl.method,
                        path = %join_paths(prefix, &decl.path),
                        "adding route from mounted router"
                    );
                    self.routes.push(RouteDecl {
                        path: join_paths(prefix, &decl.path),
                        ..decl
                    });
                }
                for decl in source.middleware() {
                    self.middleware.push(MiddlewareDecl {
                        path: join_paths(prefix, &decl.path),
                        ..decl
                    });
                }
            }
        }
        self
    }
}

impl RouteSource for Router {
    fn routes(&self) -> Vec<RouteDecl> {
        self.routes.clone()
    }

    fn middleware(&self) -> Vec<MiddlewareDecl> {
        self.middleware.clone()
    }
}
