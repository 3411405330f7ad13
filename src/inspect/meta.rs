//! Meta tag extraction from (possibly partial) HTML.

use axum::http::StatusCode;
use scraper::{Html, Selector};
use std::sync::LazyLock;

const META_WITH_NAME_SELECTOR_STR: &str = "meta[name]";

static META_WITH_NAME_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(META_WITH_NAME_SELECTOR_STR)
        .expect("Failed to parse meta selector - this is a bug")
});

/// Finds the `content` of `<meta name="{target}">` in HTML text.
#[derive(Debug, Clone)]
pub struct MetaExtractor {
    target_name: String,
}

impl MetaExtractor {
    pub fn new(target_name: impl Into<String>) -> Self {
        Self {
            target_name: target_name.into(),
        }
    }

    pub fn target_name(&self) -> &str {
        &self.target_name
    }

    /// Returns the content attribute of the first meta element named `target_name`.
    ///
    /// Text that does not contain the target name at all is rejected without
    /// parsing. Truncated markup never errors; an unfinished tag is simply not found.
    pub fn extract(&self, text: &str) -> Option<String> {
        self.find_content(text, |content| Some(content.to_string()))
    }

    /// Returns the first matching content value that parses as a status code.
    pub fn extract_status(&self, text: &str) -> Option<StatusCode> {
        self.find_content(text, parse_status)
    }

    fn find_content<T>(&self, text: &str, accept: impl FnMut(&str) -> Option<T>) -> Option<T> {
        if !text.contains(self.target_name.as_str()) {
            return None;
        }

        let document = Html::parse_document(text);
        let mut contents = document
            .select(&META_WITH_NAME_SELECTOR)
            .filter(|element| element.value().attr("name") == Some(self.target_name.as_str()))
            .filter_map(|element| element.value().attr("content"));
        contents.find_map(accept)
    }
}

/// Parse a meta content value as a final HTTP status code (200..=599).
///
/// Informational codes cannot carry a response body, so they are rejected
/// like any other unusable value.
pub fn parse_status(value: &str) -> Option<StatusCode> {
    value
        .trim()
        .parse::<u16>()
        .ok()
        .filter(|code| (200..=599).contains(code))
        .and_then(|code| StatusCode::from_u16(code).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str =
        r#"<html><head><meta name="app:status" content="503"></head><body>hi</body></html>"#;

    #[test]
    fn finds_content() {
        let extractor = MetaExtractor::new("app:status");
        assert_eq!(extractor.extract(PAGE).as_deref(), Some("503"));
        assert_eq!(extractor.extract_status(PAGE), Some(StatusCode::SERVICE_UNAVAILABLE));
    }

    #[test]
    fn fast_reject_without_name() {
        let extractor = MetaExtractor::new("app:status");
        assert_eq!(extractor.extract("<html><head><title>x</title>"), None);
    }

    #[test]
    fn name_must_match_exactly() {
        let extractor = MetaExtractor::new("app:status");
        let html = r#"<meta name="app:status-old" content="404"><p>app:status</p>"#;
        assert_eq!(extractor.extract(html), None);
    }

    #[test]
    fn name_only_in_text_is_not_found() {
        let extractor = MetaExtractor::new("app:status");
        assert_eq!(extractor.extract("<p>the app:status tag</p>"), None);
    }

    #[test]
    fn tag_without_content_is_not_found() {
        let extractor = MetaExtractor::new("app:status");
        assert_eq!(extractor.extract(r#"<meta name="app:status">"#), None);
    }

    #[test]
    fn truncated_tag_does_not_error() {
        let extractor = MetaExtractor::new("app:status");
        assert_eq!(extractor.extract(r#"<html><head><meta name="app:status" cont"#), None);
        assert_eq!(extractor.extract(r#"<html><head><meta name="app:sta"#), None);
    }

    #[test]
    fn fragment_without_head_is_found() {
        let extractor = MetaExtractor::new("app:status");
        let html = r#"<meta name="app:status" content="404"><div>unterminated"#;
        assert_eq!(extractor.extract_status(html), Some(StatusCode::NOT_FOUND));
    }

    #[test]
    fn extraction_is_idempotent() {
        let extractor = MetaExtractor::new("app:status");
        let text = PAGE.to_string();
        let first = extractor.extract(&text);
        let second = extractor.extract(&text);
        assert_eq!(first, second);
        assert_eq!(text, PAGE);
    }

    #[test]
    fn status_parsing() {
        assert_eq!(parse_status("404"), Some(StatusCode::NOT_FOUND));
        assert_eq!(parse_status(" 410 "), Some(StatusCode::GONE));
        assert_eq!(parse_status("abc"), None);
        assert_eq!(parse_status(""), None);
        assert_eq!(parse_status("42"), None);
        assert_eq!(parse_status("1000"), None);
        assert_eq!(parse_status("-1"), None);
        assert_eq!(parse_status("100"), None);
        assert_eq!(parse_status("103"), None);
        assert_eq!(parse_status("199"), None);
        assert_eq!(parse_status("600"), None);
        assert_eq!(parse_status("999"), None);
        assert_eq!(parse_status("200"), Some(StatusCode::OK));
        assert_eq!(parse_status("599"), Some(StatusCode::from_u16(599).unwrap()));
    }

    #[test]
    fn informational_status_is_skipped() {
        let extractor = MetaExtractor::new("app:status");
        let html = r#"<meta name="app:status" content="103"><meta name="app:status" content="404">"#;
        assert_eq!(extractor.extract(html).as_deref(), Some("103"));
        assert_eq!(extractor.extract_status(html), Some(StatusCode::NOT_FOUND));
    }

    #[test]
    fn unparseable_status_is_none() {
        let extractor = MetaExtractor::new("app:status");
        let html = r#"<meta name="app:status" content="not-found">"#;
        assert_eq!(extractor.extract(html).as_deref(), Some("not-found"));
        assert_eq!(extractor.extract_status(html), None);
    }

    #[test]
    fn first_parseable_status_wins() {
        let extractor = MetaExtractor::new("app:status");
        let html = r#"<meta name="app:status" content="soon"><meta name="app:status" content="410"><meta name="app:status" content="500">"#;
        assert_eq!(extractor.extract(html).as_deref(), Some("soon"));
        assert_eq!(extractor.extract_status(html), Some(StatusCode::GONE));
    }
}
