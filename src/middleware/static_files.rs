//! Static file serving with single-page-app fallback.
//!
//! A [`ServeStatic`] maps request paths under its URL prefix onto files under
//! its root directory. A missing file is not an error: the request continues
//! down the pipeline. Other filesystem errors are logged and answered with 500.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use percent_encoding::percent_decode_str;
use tracing::error;

use crate::context::{Context, SendFileOptions};
use crate::error::Error;
use crate::http::request::Method;
use crate::http::response::StatusCode;
use crate::middleware::{Flow, Handler, handler};
use crate::router::pattern::prefix_matches;

pub const DEFAULT_INDEX: &str = "index.html";

#[derive(Debug, Clone)]
pub struct StaticOptions {
    /// Content type for every file, instead of one derived from the extension.
    pub mime_type: Option<String>,
    /// `Cache-Control` max-age in seconds.
    pub max_age: Option<u64>,
    /// Document served for the directory root and as the SPA fallback.
    pub index: String,
}

impl Default for StaticOptions {
    fn default() -> Self {
        Self {
            mime_type: None,
            max_age: None,
            index: DEFAULT_INDEX.to_string(),
        }
    }
}

#[derive(Debug)]
pub struct ServeStatic {
    prefix: String,
    root: PathBuf,
    options: StaticOptions,
}

impl ServeStatic {
    pub fn new(prefix: impl Into<String>, root: impl Into<PathBuf>, options: StaticOptions) -> Self {
        Self {
            prefix: prefix.into(),
            root: root.into(),
            options,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Maps a request path to a file path under the root.
    ///
    /// Returns `None` when the path is outside the URL prefix. The path is
    /// percent-decoded and normalized so it can never leave the root.
    pub fn resolve(&self, pathname: &str) -> Option<PathBuf> {
        if !prefix_matches(&self.prefix, pathname) {
            return None;
        }

        let prefix = self.prefix.trim_end_matches('/');
        let rest = &pathname[prefix.len()..];
        let decoded = percent_decode_str(rest).decode_utf8_lossy();
        let parts = normalize_components(&decoded);

        if parts.is_empty() {
            return Some(self.root.join(&self.options.index));
        }

        let mut path = self.root.clone();
        path.extend(parts);
        Some(path)
    }

    pub async fn serve(&self, ctx: &mut Context) -> Result<Flow, Error> {
        if !matches!(ctx.req.method, Method::GET | Method::HEAD) {
            return Ok(Flow::Next);
        }

        let Some(path) = self.resolve(&ctx.req.pathname) else {
            return Ok(Flow::Next);
        };

        match self.serve_path(ctx, &path).await {
            Ok(true) => Ok(Flow::Halt),
            Ok(false) => Ok(Flow::Next),
            Err(e) => {
                error!(error = %e, "static middleware error");
                ctx.res.send_status(StatusCode::INTERNAL_SERVER_ERROR);
                Ok(Flow::Halt)
            }
        }
    }

    /// Serves the index document of the root. Returns `false` if it does not
    /// exist.
    pub async fn serve_index(&self, ctx: &mut Context) -> Result<bool, Error> {
        let path = self.root.join(&self.options.index);
        self.serve_path(ctx, &path).await
    }

    async fn serve_path(&self, ctx: &mut Context, path: &Path) -> Result<bool, Error> {
        match tokio::fs::metadata(path).await {
            Ok(meta) if meta.is_file() => {
                let options = SendFileOptions {
                    mime_type: self.options.mime_type.clone(),
                    max_age: self.options.max_age,
                };
                ctx.res.send_file(path, &options).await;
                Ok(true)
            }
            Ok(_) => Ok(false),
            Err(e) if is_absent(&e) => Ok(false),
            Err(source) => Err(Error::StaticFile {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Wraps a shared instance as middleware.
    pub fn handler(self: &Arc<Self>) -> Handler {
        let this = Arc::clone(self);
        handler(move |ctx| {
            let this = Arc::clone(&this);
            Box::pin(async move { this.serve(ctx).await })
        })
    }
}

fn is_absent(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::NotFound | std::io::ErrorKind::NotADirectory
    )
}

/// Splits a URL path into components, collapsing `.` and `..` without ever
/// climbing above the first component.
pub fn normalize_components(path: &str) -> Vec<&str> {
    let mut stack = Vec::new();

    for part in path.split(['/', '\\']) {
        match part {
            "" | "." => continue,
            ".." => {
                stack.pop();
            }
            _ => stack.push(part),
        }
    }

    stack
}
