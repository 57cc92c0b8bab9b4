//! Route patterns and mount-prefix helpers.
//!
//! A pattern is compiled once, at registration, into a list of segments.
//! Matching compares the request path segment by segment: literals must be
//! byte-equal, `:name` parameters match any segment and capture it
//! percent-decoded. Segment counts must be equal, so there is no wildcard.

use std::collections::HashMap;

use percent_encoding::percent_decode_str;
use serde::Deserialize;

/// Prefix marking a named parameter segment.
pub const PARAM_SIGIL: char = ':';

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Param(String),
}

/// How a single trailing `/` is treated when matching routes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrailingSlash {
    /// `/tasks/` and `/tasks` are different paths.
    #[default]
    Strict,
    /// A trailing `/` on a non-root path is ignored on both sides.
    Ignore,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PatternError {
    #[error("parameter segment has no name")]
    EmptyParam,
    #[error("parameter `{0}` appears more than once")]
    DuplicateParam(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    source: String,
    segments: Vec<Segment>,
}

impl Pattern {
    pub fn parse(source: &str) -> Result<Self, PatternError> {
        let mut segments = Vec::new();
        let mut seen = Vec::new();

        for part in source.split('/') {
            match part.strip_prefix(PARAM_SIGIL) {
                Some("") => return Err(PatternError::EmptyParam),
                Some(name) => {
                    if seen.contains(&name) {
                        return Err(PatternError::DuplicateParam(name.to_string()));
                    }
                    seen.push(name);
                    segments.push(Segment::Param(name.to_string()));
                }
                None => segments.push(Segment::Literal(part.to_string())),
            }
        }

        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Matches a request path, returning captured parameters on success.
    pub fn matches(&self, pathname: &str, policy: TrailingSlash) -> Option<HashMap<String, String>> {
        let path_parts: Vec<&str> = normalize(pathname, policy).split('/').collect();
        let segments = match policy {
            TrailingSlash::Strict => &self.segments[..],
            TrailingSlash::Ignore => trim_trailing_segment(&self.segments),
        };

        if segments.len() != path_parts.len() {
            return None;
        }

        let mut params = HashMap::new();
        for (segment, part) in segments.iter().zip(path_parts) {
            match segment {
                Segment::Param(name) => {
                    let value = percent_decode_str(part).decode_utf8_lossy().into_owned();
                    params.insert(name.clone(), value);
                }
                Segment::Literal(lit) if lit == part => {}
                Segment::Literal(_) => return None,
            }
        }

        Some(params)
    }
}

fn normalize(pathname: &str, policy: TrailingSlash) -> &str {
    match policy {
        TrailingSlash::Ignore if pathname.len() > 1 => {
            pathname.strip_suffix('/').unwrap_or(pathname)
        }
        _ => pathname,
    }
}

fn trim_trailing_segment(segments: &[Segment]) -> &[Segment] {
    // "/a/" compiles to ["", "a", ""]; the root "/" is ["", ""] and stays.
    match segments {
        [rest @ .., Segment::Literal(last)] if last.is_empty() && rest.len() > 1 => rest,
        _ => segments,
    }
}

/// Whether a middleware mounted at `prefix` applies to `pathname`.
///
/// Matching respects segment boundaries: `/api` covers `/api` and `/api/x`
/// but not `/apiary`. The root prefix covers everything.
pub fn prefix_matches(prefix: &str, pathname: &str) -> bool {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        return true;
    }

    match pathname.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// Joins a mount prefix and a path with exactly one `/` between them.
///
/// The root prefix leaves the path unchanged, and a root path yields the
/// prefix itself.
pub fn join_paths(prefix: &str, path: &str) -> String {
    if prefix.is_empty() || prefix == "/" {
        return path.to_string();
    }
    if path.is_empty() || path == "/" {
        return prefix.to_string();
    }

    let prefix = prefix.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{}/{}", prefix, path)
}
