use serde_json::json;
use trellis::config::Config;
use trellis::middleware::body_parser::{JsonOptions, UrlencodedOptions, json_with, urlencoded_with};
use trellis::prelude::*;

fn api_router() -> Router {
    let mut api = Router::new();

    api.get(
        "/items/:id",
        [handler(|ctx| {
            Box::pin(async move {
                let id = ctx.req.param("id").unwrap_or_default().to_string();
                ctx.res.json(&json!({ "id": id }));
                Ok(Flow::Halt)
            })
        })],
    );

    api
}

fn build_app(cfg: &Config) -> App {
    let mut app = App::new();
    app.trailing_slash(cfg.trailing_slash);

    app.use_middleware(cors(cfg.cors.clone()))
        .use_middleware(json_with(JsonOptions {
            limit: Some(cfg.body_limit),
        }))
        .use_middleware(urlencoded_with(UrlencodedOptions {
            limit: cfg.body_limit,
            ..Default::default()
        }))
        .use_middleware(logger());

    app.get(
        "/api/health",
        [handler(|ctx| {
            Box::pin(async move {
                ctx.res.json(&json!({ "status": "ok" }));
                Ok(Flow::Halt)
            })
        })],
    );

    app.post(
        "/api/echo",
        [handler(|ctx| {
            Box::pin(async move {
                let body = ctx.req.body.to_json();
                ctx.res.set_status(StatusCode::CREATED).json(&body);
                Ok(Flow::Halt)
            })
        })],
    );

    app.get(
        "/api/query",
        [handler(|ctx| {
            Box::pin(async move {
                let query = ctx.req.query.clone();
                ctx.res.json(&query);
                Ok(Flow::Halt)
            })
        })],
    );

    app.use_at("/api", api_router());

    app.use_middleware(error_handler(|err, ctx| {
        Box::pin(async move {
            tracing::warn!("request failed: {}", err);
            ctx.res
                .set_status(err.status())
                .json(&json!({ "success": false, "error": err.to_string() }));
            Ok(Flow::Halt)
        })
    }));

    if let Some(dir) = &cfg.static_dir {
        app.serve_static(&cfg.static_prefix, dir.clone(), StaticOptions::default());
    }

    app
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .init();

    let cfg = Config::load()?;
    let app = build_app(&cfg);

    tokio::select! {
        res = app.listen(cfg.listen_addr.as_str(), |addr| {
            tracing::info!("Server ready at http://{}", addr);
        }) => {
            res?;
        }

        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    Ok(())
}
