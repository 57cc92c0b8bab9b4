//! Cross-origin resource sharing headers.

use std::sync::Arc;

use serde::Deserialize;

use crate::http::request::Method;
use crate::middleware::{Flow, Handler, handler};

/// CORS settings. Keys are camelCase in configuration files
/// (`allowedHeaders`, `preflightContinue`, `optionsSuccessStatus`).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CorsConfig {
    pub origin: String,
    pub methods: String,
    pub allowed_headers: String,
    pub exposed_headers: Option<String>,
    pub credentials: bool,
    /// Preflight cache lifetime in seconds.
    pub max_age: Option<u64>,
    /// Let preflight requests continue down the pipeline instead of ending
    /// them here.
    pub preflight_continue: bool,
    pub options_success_status: u16,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            origin: "*".to_string(),
            methods: "GET,HEAD,PUT,PATCH,POST,DELETE".to_string(),
            allowed_headers: "Content-Type,Authorization".to_string(),
            exposed_headers: None,
            credentials: false,
            max_age: None,
            preflight_continue: false,
            options_success_status: 204,
        }
    }
}

/// Builds the CORS middleware.
///
/// Every response gets the allow-origin header. `OPTIONS` requests also get
/// the allow-methods and allow-headers headers and, unless
/// `preflight_continue` is set, end here with `options_success_status`.
pub fn cors(config: CorsConfig) -> Handler {
    let config = Arc::new(config);

    handler(move |ctx| {
        let config = Arc::clone(&config);
        Box::pin(async move {
            let res = &mut ctx.res;
            res.set_header("Access-Control-Allow-Origin", config.origin.as_str());

            if config.credentials {
                res.set_header("Access-Control-Allow-Credentials", "true");
            }

            if let Some(exposed) = &config.exposed_headers {
                res.set_header("Access-Control-Expose-Headers", exposed.as_str());
            }

            if ctx.req.method != Method::OPTIONS {
                return Ok(Flow::Next);
            }

            let res = &mut ctx.res;
            res.set_header("Access-Control-Allow-Methods", config.methods.as_str());
            res.set_header("Access-Control-Allow-Headers", config.allowed_headers.as_str());

            if let Some(max_age) = config.max_age {
                res.set_header("Access-Control-Max-Age", max_age.to_string());
            }

            if config.preflight_continue {
                return Ok(Flow::Next);
            }

            res.set_status(config.options_success_status).end();
            Ok(Flow::Halt)
        })
    })
}
