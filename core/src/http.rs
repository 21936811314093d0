//! Request descriptor and raw response types.
//!
//! # Design
//! `HttpRequest` can only be obtained through `HttpRequest::new` or
//! `HttpRequestBuilder::build`, both of which validate the URL. Fields are
//! private, so a descriptor that exists is a valid descriptor and stays that
//! way until the engine consumes it. Header names are stored lowercased in a
//! sorted map; HTTP header names are case-insensitive and their order carries
//! no meaning here.

use std::collections::BTreeMap;
use std::fmt;

use bytes::Bytes;
use url::Url;

use crate::error::{InvalidUrlKind, SpiderError};

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated, immutable HTTP request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    url: Url,
    method: HttpMethod,
    headers: BTreeMap<String, String>,
    body: Option<Bytes>,
}

impl HttpRequest {
    /// A GET request with no headers and no body.
    pub fn new(url: &str) -> Result<Self, SpiderError> {
        Self::builder(url).build()
    }

    pub fn builder(url: &str) -> HttpRequestBuilder {
        HttpRequestBuilder::new(url)
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    /// Look up a header by name, ignoring case.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }
}

/// Collects the optional parts of a request; `build` validates the URL.
///
/// Validation is deferred to `build` so the builder itself never holds a
/// half-valid request that could be executed.
#[derive(Debug, Clone)]
#[must_use = "HttpRequestBuilder does nothing until .build() is called"]
pub struct HttpRequestBuilder {
    url: String,
    method: HttpMethod,
    headers: BTreeMap<String, String>,
    body: Option<Bytes>,
}

impl HttpRequestBuilder {
    fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            method: HttpMethod::Get,
            headers: BTreeMap::new(),
            body: None,
        }
    }

    pub fn method(mut self, method: HttpMethod) -> Self {
        self.method = method;
        self
    }

    /// Set a header, replacing any earlier value under the same name.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers
            .insert(name.to_ascii_lowercase(), value.to_string());
        self
    }

    pub fn headers<I, K, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        for (name, value) in headers {
            self.headers
                .insert(name.as_ref().to_ascii_lowercase(), value.into());
        }
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn build(self) -> Result<HttpRequest, SpiderError> {
        let url = parse_absolute_url(&self.url)?;
        Ok(HttpRequest {
            url,
            method: self.method,
            headers: self.headers,
            body: self.body,
        })
    }
}

/// Parse `raw` and require both a scheme and a host.
fn parse_absolute_url(raw: &str) -> Result<Url, SpiderError> {
    let invalid = |kind, reason: String| SpiderError::InvalidUrl {
        url: raw.to_string(),
        kind,
        reason,
    };

    if raw.chars().any(char::is_whitespace) {
        return Err(invalid(
            InvalidUrlKind::ParseError,
            "URL contains whitespace".to_string(),
        ));
    }

    let url = Url::parse(raw).map_err(|err| match err {
        url::ParseError::RelativeUrlWithoutBase => {
            invalid(InvalidUrlKind::MissingScheme, err.to_string())
        }
        url::ParseError::EmptyHost => invalid(InvalidUrlKind::MissingHost, err.to_string()),
        other => invalid(InvalidUrlKind::ParseError, other.to_string()),
    })?;

    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(url),
        _ => Err(invalid(
            InvalidUrlKind::MissingHost,
            format!("URL with scheme '{}' has no host", url.scheme()),
        )),
    }
}

/// A raw HTTP response as returned by a transport.
///
/// Status interpretation is left to the engine; a transport hands back
/// whatever status the server sent.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn invalid_kind(raw: &str) -> InvalidUrlKind {
        match HttpRequest::new(raw).unwrap_err() {
            SpiderError::InvalidUrl { kind, url, .. } => {
                assert_eq!(url, raw);
                kind
            }
            other => panic!("{raw}: unexpected error {other:?}"),
        }
    }

    #[test]
    fn new_defaults_to_get_without_headers_or_body() {
        let req = HttpRequest::new("https://example.com/api/x").unwrap();
        assert_eq!(req.method(), HttpMethod::Get);
        assert_eq!(req.url().as_str(), "https://example.com/api/x");
        assert_eq!(req.url().host_str(), Some("example.com"));
        assert!(req.headers().is_empty());
        assert!(req.body().is_none());
    }

    #[test]
    fn builder_sets_method_headers_and_body() {
        let req = HttpRequest::builder("http://localhost:3000/echo")
            .method(HttpMethod::Post)
            .header("Content-Type", "application/json")
            .headers([("X-Trace", "abc")])
            .body(r#"{"a":1}"#)
            .build()
            .unwrap();

        assert_eq!(req.method(), HttpMethod::Post);
        assert_eq!(req.header("content-type"), Some("application/json"));
        assert_eq!(req.header("CONTENT-TYPE"), Some("application/json"));
        assert_eq!(req.header("x-trace"), Some("abc"));
        assert_eq!(req.body().unwrap().as_ref(), br#"{"a":1}"#);
    }

    #[test]
    fn later_header_replaces_earlier_one() {
        let req = HttpRequest::builder("http://localhost/")
            .header("Accept", "text/plain")
            .header("accept", "application/json")
            .build()
            .unwrap();
        assert_eq!(req.headers().len(), 1);
        assert_eq!(req.header("accept"), Some("application/json"));
    }

    #[test]
    fn string_with_spaces_is_rejected() {
        let err = HttpRequest::new("invalid url").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidUrl);
        assert_eq!(invalid_kind("invalid url"), InvalidUrlKind::ParseError);
    }

    #[test]
    fn whitespace_anywhere_is_rejected() {
        for raw in [
            "https://example.com/a b",
            "https://example.com/x?q=a b",
            " https://example.com/api/x",
            "https://example.com/api/x ",
            "https://example.com/api/x\n",
            "https://example.com/\tx",
        ] {
            assert_eq!(invalid_kind(raw), InvalidUrlKind::ParseError, "{raw:?}");
        }
    }

    #[test]
    fn missing_scheme_is_rejected() {
        assert_eq!(invalid_kind("example.com/api"), InvalidUrlKind::MissingScheme);
        assert_eq!(invalid_kind("/api/character"), InvalidUrlKind::MissingScheme);
        assert_eq!(invalid_kind(""), InvalidUrlKind::MissingScheme);
    }

    #[test]
    fn missing_host_is_rejected() {
        assert_eq!(invalid_kind("http://"), InvalidUrlKind::MissingHost);
        assert_eq!(invalid_kind("mailto:rick@example.com"), InvalidUrlKind::MissingHost);
        assert_eq!(invalid_kind("file:///tmp/data.json"), InvalidUrlKind::MissingHost);
    }

    #[test]
    fn malformed_host_is_a_parse_error() {
        assert_eq!(invalid_kind("https://exa mple.com"), InvalidUrlKind::ParseError);
        assert_eq!(invalid_kind("http://localhost:99999/"), InvalidUrlKind::ParseError);
    }

    #[test]
    fn builder_validates_only_at_build() {
        let builder = HttpRequest::builder("not a url").method(HttpMethod::Delete);
        assert!(builder.build().is_err());
    }

    #[test]
    fn method_names_are_uppercase_verbs() {
        assert_eq!(HttpMethod::default(), HttpMethod::Get);
        assert_eq!(HttpMethod::Patch.as_str(), "PATCH");
        assert_eq!(HttpMethod::Options.to_string(), "OPTIONS");
    }

    #[test]
    fn response_success_range() {
        let response = |status| HttpResponse {
            status,
            body: Bytes::new(),
        };
        assert!(response(200).is_success());
        assert!(response(204).is_success());
        assert!(!response(199).is_success());
        assert!(!response(301).is_success());
        assert!(!response(404).is_success());
    }
}
