use std::collections::HashMap;

use crate::error::Error;
use crate::http::request::Method;
use crate::middleware::Handler;
use crate::router::pattern::{Pattern, TrailingSlash};
use crate::router::target::Target;

/// A method and compiled pattern bound to an ordered handler chain.
#[derive(Debug, Clone)]
pub struct Route {
    pub method: Method,
    pub pattern: Pattern,
    pub handlers: Vec<Handler>,
}

/// A resolved route together with everything extracted from the target.
#[derive(Debug)]
pub struct RouteMatch<'t> {
    pub route: &'t Route,
    pub params: HashMap<String, String>,
    pub query: HashMap<String, String>,
    pub fragment: Option<String>,
}

/// Routes in registration order. The first route that matches wins.
#[derive(Debug, Default)]
pub struct RouteTable {
    routes: Vec<Route>,
    trailing_slash: TrailingSlash,
}

impl RouteTable {
    pub fn new(trailing_slash: TrailingSlash) -> Self {
        Self {
            routes: Vec::new(),
            trailing_slash,
        }
    }

    /// Compiles `path` and appends the route. At least one handler is required.
    pub fn add(&mut self, method: Method, path: &str, handlers: Vec<Handler>) -> Result<(), Error> {
        if handlers.is_empty() {
            return Err(Error::InvalidRoute {
                method,
                path: path.to_string(),
                reason: "no handlers".to_string(),
            });
        }

        let pattern = Pattern::parse(path).map_err(|e| Error::InvalidRoute {
            method,
            path: path.to_string(),
            reason: e.to_string(),
        })?;

        self.routes.push(Route {
            method,
            pattern,
            handlers,
        });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Route> {
        self.routes.iter()
    }

    /// Resolves a raw request target (path, optional `?query`, optional
    /// `#fragment`) against the table.
    pub fn find(&self, method: Method, target: &str) -> Option<RouteMatch<'_>> {
        let Target {
            pathname,
            query,
            fragment,
        } = Target::parse(target);

        self.routes
            .iter()
            .filter(|route| route.method == method)
            .find_map(|route| {
                route
                    .pattern
                    .matches(&pathname, self.trailing_slash)
                    .map(|params| (route, params))
            })
            .map(|(route, params)| RouteMatch {
                route,
                params,
                query,
                fragment,
            })
    }
}
