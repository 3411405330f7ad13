//! Decides which responses get their body inspected.
//!
//! # Responsibilities
//! - Reject paths matching the ignore list
//! - Accept only GET responses that are gzip-encoded HTML
//!
//! # Design Decisions
//! - Pure function over the request line, response headers and the injected pattern set
//! - Header checks are substring checks, so parameters like `; charset=utf-8` still match

use axum::http::{header, HeaderMap, Method};

use crate::filter::ignore::IgnorePatternSet;

/// Per-exchange inspection decision.
#[derive(Debug, Clone, Default)]
pub struct PathFilter {
    ignore: IgnorePatternSet,
}

impl PathFilter {
    /// Create a filter with the given ignore list.
    pub fn new(ignore: IgnorePatternSet) -> Self {
        Self { ignore }
    }

    /// Returns true if the response body should go through the transcoder.
    pub fn should_process(&self, method: &Method, path: &str, headers: &HeaderMap) -> bool {
        if self.ignore.is_ignored(path) {
            tracing::trace!(path = %path, "Path ignored by pattern");
            return false;
        }

        *method == Method::GET
            && header_contains(headers, header::CONTENT_TYPE, "text/html")
            && header_contains(headers, header::CONTENT_ENCODING, "gzip")
    }

    pub fn ignore_patterns(&self) -> &IgnorePatternSet {
        &self.ignore
    }
}

fn header_contains(headers: &HeaderMap, name: header::HeaderName, needle: &str) -> bool {
    headers
        .get_all(name)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|v| v.contains(needle))
}
