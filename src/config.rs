use std::path::{Path, PathBuf};

use anyhow::Context as _;
use serde::Deserialize;

use crate::middleware::body_parser::DEFAULT_LIMIT;
use crate::middleware::cors::CorsConfig;
use crate::router::pattern::TrailingSlash;

/// Environment variable naming an optional YAML config file.
pub const CONFIG_ENV: &str = "TRELLIS_CONFIG";
/// Environment variable overriding the listen address.
pub const LISTEN_ENV: &str = "LISTEN";

pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8080";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub listen_addr: String,
    /// Directory served as static files and SPA fallback, if any.
    pub static_dir: Option<PathBuf>,
    pub static_prefix: String,
    /// Byte limit applied to both body parsers.
    pub body_limit: usize,
    pub trailing_slash: TrailingSlash,
    pub cors: CorsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            static_dir: None,
            static_prefix: "/".to_string(),
            body_limit: DEFAULT_LIMIT,
            trailing_slash: TrailingSlash::default(),
            cors: CorsConfig::default(),
        }
    }
}

impl Config {
    /// Defaults, then the file named by `TRELLIS_CONFIG`, then `LISTEN`.
    pub fn load() -> anyhow::Result<Self> {
        let mut cfg = match std::env::var(CONFIG_ENV) {
            Ok(path) => Self::from_file(&path)?,
            Err(_) => Self::default(),
        };

        if let Ok(addr) = std::env::var(LISTEN_ENV) {
            cfg.listen_addr = addr;
        }

        Ok(cfg)
    }

    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        Self::from_yaml_str(&content)
            .with_context(|| format!("parsing config file {}", path.display()))
    }

    pub fn from_yaml_str(content: &str) -> anyhow::Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }
}
