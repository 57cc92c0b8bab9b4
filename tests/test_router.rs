use trellis::error::Error;
use trellis::http::request::Method;
use trellis::middleware::{Flow, Handler, Middleware, handler};
use trellis::router::{MiddlewareDecl, Mount, RouteDecl, RouteSource, RouteTable, Router, Routes, TrailingSlash};
use trellis::App;

fn noop() -> Handler {
    handler(|_ctx| Box::pin(async { Ok(Flow::Next) }))
}

fn table(policy: TrailingSlash, routes: &[(Method, &str)]) -> RouteTable {
    let mut table = RouteTable::new(policy);
    for (method, path) in routes {
        table.add(*method, path, vec![noop()]).unwrap();
    }
    table
}

#[test]
fn test_route_literal_match() {
    let t = table(TrailingSlash::Strict, &[(Method::GET, "/api/health")]);

    assert!(t.find(Method::GET, "/api/health").is_some());
    assert!(t.find(Method::POST, "/api/health").is_none());
    assert!(t.find(Method::GET, "/api/healthz").is_none());
}

#[test]
fn test_route_params_are_captured_and_decoded() {
    let t = table(TrailingSlash::Strict, &[(Method::GET, "/users/:user/files/:name")]);

    let found = t.find(Method::GET, "/users/7/files/my%20doc.txt").unwrap();
    assert_eq!(found.params.get("user").map(String::as_str), Some("7"));
    assert_eq!(found.params.get("name").map(String::as_str), Some("my doc.txt"));
}

#[test]
fn test_route_query_and_fragment_are_split_off() {
    let t = table(TrailingSlash::Strict, &[(Method::GET, "/search")]);

    let found = t.find(Method::GET, "/search?q=rust&page=2#results").unwrap();
    assert_eq!(found.query.get("q").map(String::as_str), Some("rust"));
    assert_eq!(found.query.get("page").map(String::as_str), Some("2"));
    assert_eq!(found.fragment.as_deref(), Some("results"));
}

#[test]
fn test_route_first_registered_wins() {
    let t = table(
        TrailingSlash::Strict,
        &[(Method::GET, "/tasks/:id"), (Method::GET, "/tasks/new")],
    );

    let found = t.find(Method::GET, "/tasks/new").unwrap();
    assert_eq!(found.route.pattern.as_str(), "/tasks/:id");
    assert_eq!(found.params.get("id").map(String::as_str), Some("new"));
}

#[test]
fn test_route_param_needs_equal_segment_count() {
    let t = table(TrailingSlash::Strict, &[(Method::GET, "/tasks/:id")]);

    assert!(t.find(Method::GET, "/tasks").is_none());
    assert!(t.find(Method::GET, "/tasks/1/extra").is_none());

    // A parameter captures whatever occupies its segment, even nothing.
    let found = t.find(Method::GET, "/tasks/").unwrap();
    assert_eq!(found.params.get("id").map(String::as_str), Some(""));
}

#[test]
fn test_trailing_slash_strict() {
    let t = table(TrailingSlash::Strict, &[(Method::GET, "/tasks")]);

    assert!(t.find(Method::GET, "/tasks").is_some());
    assert!(t.find(Method::GET, "/tasks/").is_none());
}

#[test]
fn test_trailing_slash_ignore() {
    let t = table(
        TrailingSlash::Ignore,
        &[(Method::GET, "/tasks"), (Method::GET, "/users/")],
    );

    assert!(t.find(Method::GET, "/tasks/").is_some());
    assert!(t.find(Method::GET, "/users").is_some());
    assert!(t.find(Method::GET, "/users/").is_some());
}

#[test]
fn test_route_table_rejects_bad_routes() {
    let mut t = RouteTable::new(TrailingSlash::Strict);

    let err = t.add(Method::GET, "/a/:", vec![noop()]).unwrap_err();
    assert!(matches!(err, Error::InvalidRoute { .. }));

    let err = t.add(Method::GET, "/a/:id/:id", vec![noop()]).unwrap_err();
    assert!(matches!(err, Error::InvalidRoute { .. }));

    let err = t.add(Method::GET, "/a", Vec::new()).unwrap_err();
    assert!(matches!(err, Error::InvalidRoute { .. }));

    assert!(t.is_empty());
}

#[test]
fn test_router_mount_prefixes_routes_and_middleware() {
    let mut inner = Router::new();
    inner.use_middleware(noop());
    inner.get("/tasks/:id", [noop()]);
    inner.post("/", [noop()]);

    let mut outer = Router::new();
    outer.use_at("/api/v1", inner);

    let routes: Vec<_> = outer
        .route_decls()
        .iter()
        .map(|d| (d.method, d.path.as_str()))
        .collect();
    assert_eq!(
        routes,
        vec![(Method::GET, "/api/v1/tasks/:id"), (Method::POST, "/api/v1")]
    );

    let middleware = outer.middleware_decls();
    assert_eq!(middleware.len(), 1);
    assert_eq!(middleware[0].path, "/api/v1");
    assert!(matches!(middleware[0].middleware, Middleware::Normal(_)));
}

/// A route group that is not a `Router`: one health route per service name.
struct HealthChecks {
    services: Vec<&'static str>,
}

impl RouteSource for HealthChecks {
    fn routes(&self) -> Vec<RouteDecl> {
        self.services
            .iter()
            .map(|name| RouteDecl {
                method: Method::GET,
                path: format!("/{}/health", name),
                handlers: vec![noop()],
            })
            .collect()
    }

    fn middleware(&self) -> Vec<MiddlewareDecl> {
        vec![MiddlewareDecl {
            path: "/".to_string(),
            middleware: Middleware::Normal(noop()),
        }]
    }
}

#[test]
fn test_custom_route_source_is_flattened_under_prefix() {
    let mut app = App::new();
    app.use_at(
        "/internal",
        Mount::source(HealthChecks {
            services: vec!["db", "cache"],
        }),
    );

    let pipeline = app.into_pipeline().unwrap();
    assert_eq!(pipeline.routes().len(), 2);
    assert!(pipeline.routes().find(Method::GET, "/internal/db/health").is_some());
    assert!(pipeline.routes().find(Method::GET, "/internal/cache/health").is_some());
    assert!(pipeline.routes().find(Method::GET, "/db/health").is_none());
}

#[test]
fn test_router_all_registers_every_method() {
    let mut router = Router::new();
    router.all("/any", [noop()]);

    let methods: Vec<Method> = router.route_decls().iter().map(|d| d.method).collect();
    assert_eq!(methods, Method::ALL.to_vec());
}

#[test]
fn test_app_into_pipeline_compiles_routes() {
    let mut app = App::new();
    app.get("/a", [noop()]).post("/b/:id", [noop(), noop()]);

    let pipeline = app.into_pipeline().unwrap();
    assert_eq!(pipeline.routes().len(), 2);
    assert!(pipeline.routes().find(Method::POST, "/b/1").is_some());
}

#[test]
fn test_app_into_pipeline_reports_invalid_route() {
    let mut app = App::new();
    app.get("/ok", [noop()]).get("/broken/:", [noop()]);

    let err = app.into_pipeline().unwrap_err();
    match err {
        Error::InvalidRoute { method, path, .. } => {
            assert_eq!(method, Method::GET);
            assert_eq!(path, "/broken/:");
        }
        other => panic!("unexpected error: {other}"),
    }
}
