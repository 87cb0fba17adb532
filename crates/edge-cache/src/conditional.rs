//! Conditional GET evaluation.

use std::fmt;

use http::header::{CACHE_CONTROL, IF_MODIFIED_SINCE, IF_NONE_MATCH};
use http::HeaderMap;

/// Whether the client's cached copy can be reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// The client copy matches; answer 304.
    Fresh,
    /// Send the full response.
    Stale,
}

impl Freshness {
    /// Check if the client copy is fresh.
    pub fn is_fresh(&self) -> bool {
        matches!(self, Self::Fresh)
    }
}

impl fmt::Display for Freshness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fresh => write!(f, "FRESH"),
            Self::Stale => write!(f, "STALE"),
        }
    }
}

/// Evaluate request validators against the current ETag.
///
/// Rules:
/// - no `If-None-Match` and no `If-Modified-Since`: stale
/// - `Cache-Control: no-cache` on the request: stale
/// - `If-None-Match` other than `*` must list the ETag (weak comparison)
/// - `If-Modified-Since` is stale, since no `Last-Modified` is ever sent
pub fn check_freshness(request_headers: &HeaderMap, etag: &str) -> Freshness {
    let none_match = header_str(request_headers, IF_NONE_MATCH);
    let modified_since = header_str(request_headers, IF_MODIFIED_SINCE);

    if none_match.is_none() && modified_since.is_none() {
        return Freshness::Stale;
    }

    let no_cache = request_headers
        .get_all(CACHE_CONTROL)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|directive| directive.trim().eq_ignore_ascii_case("no-cache"));
    if no_cache {
        return Freshness::Stale;
    }

    if let Some(none_match) = none_match {
        if none_match.trim() != "*" && !etag_listed(&none_match, etag) {
            return Freshness::Stale;
        }
    }

    if modified_since.is_some() {
        return Freshness::Stale;
    }

    Freshness::Fresh
}

// Repeated headers are joined with ", ", as Node does.
fn header_str(headers: &HeaderMap, name: http::header::HeaderName) -> Option<String> {
    let values: Vec<&str> = headers
        .get_all(name)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter(|v| !v.trim().is_empty())
        .collect();
    if values.is_empty() {
        None
    } else {
        Some(values.join(", "))
    }
}

fn etag_listed(none_match: &str, etag: &str) -> bool {
    let current = strip_weak(etag);
    none_match
        .split(|c: char| c == ',' || c == ' ')
        .filter(|candidate| !candidate.is_empty())
        .any(|candidate| strip_weak(candidate) == current)
}

fn strip_weak(tag: &str) -> &str {
    tag.strip_prefix("W/").unwrap_or(tag)
}
