//! Caller-facing requests and assembly of wire-level descriptors.
//!
//! # Design
//! A `Request` holds a typed body that has not been serialized yet. The URL
//! and method are checked when the `Request` is created, so by the time an
//! issuance starts the only thing left that can fail before the network is
//! body serialization. `assemble_request` then turns the serialized payload
//! into an immutable `HttpRequest`.

use url::Url;

use crate::body::{Body, Payload};
use crate::error::BuildError;
use crate::http::{Headers, HttpMethod, HttpRequest, CONTENT_TYPE};

/// A request that has been validated but whose body is not yet serialized.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: HttpMethod,
    pub url: Url,
    pub headers: Headers,
    pub body: Option<Body>,
}

impl Request {
    /// Parse `method` and `url` eagerly.
    pub fn new(method: &str, url: &str) -> Result<Self, BuildError> {
        Ok(Self::from_parts(method.parse()?, parse_url(url)?))
    }

    pub fn from_parts(method: HttpMethod, url: Url) -> Self {
        Self {
            method,
            url,
            headers: Headers::new(),
            body: None,
        }
    }

    pub fn get(url: &str) -> Result<Self, BuildError> {
        Ok(Self::from_parts(HttpMethod::Get, parse_url(url)?))
    }

    pub fn put(url: &str) -> Result<Self, BuildError> {
        Ok(Self::from_parts(HttpMethod::Put, parse_url(url)?))
    }

    pub fn post(url: &str) -> Result<Self, BuildError> {
        Ok(Self::from_parts(HttpMethod::Post, parse_url(url)?))
    }

    pub fn patch(url: &str) -> Result<Self, BuildError> {
        Ok(Self::from_parts(HttpMethod::Patch, parse_url(url)?))
    }

    pub fn delete(url: &str) -> Result<Self, BuildError> {
        Ok(Self::from_parts(HttpMethod::Delete, parse_url(url)?))
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn headers<K, V>(mut self, headers: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.headers.extend(headers);
        self
    }

    pub fn body(mut self, body: impl Into<Body>) -> Self {
        self.body = Some(body.into());
        self
    }
}

/// A descriptor re-enters the pipeline with its bytes passed through as-is.
impl From<HttpRequest> for Request {
    fn from(request: HttpRequest) -> Self {
        Self {
            method: request.method,
            url: request.url,
            headers: request.headers,
            body: request.body.map(Body::Bytes),
        }
    }
}

/// Parse an absolute `http` or `https` URL.
pub fn parse_url(url: &str) -> Result<Url, BuildError> {
    let invalid = |reason: String| BuildError::InvalidUrl {
        url: url.to_string(),
        reason,
    };
    if url.trim().is_empty() {
        return Err(invalid("url is empty".to_string()));
    }
    let parsed = Url::parse(url).map_err(|e| invalid(e.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme {:?}", parsed.scheme())));
    }
    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(invalid("url has no host".to_string()));
    }
    Ok(parsed)
}

/// Build a descriptor from unchecked parts.
pub fn build_request(
    method: &str,
    url: &str,
    headers: Headers,
    payload: Payload,
) -> Result<HttpRequest, BuildError> {
    Ok(assemble_request(method.parse()?, parse_url(url)?, headers, payload))
}

/// Merge the payload's content type into `headers` and produce the
/// descriptor. A `content-type` the caller set explicitly is kept.
pub fn assemble_request(
    method: HttpMethod,
    url: Url,
    mut headers: Headers,
    payload: Payload,
) -> HttpRequest {
    if let Some(content_type) = payload.content_type {
        if !headers.contains(CONTENT_TYPE) {
            headers.insert(CONTENT_TYPE, content_type);
        }
    }
    let body = (!payload.bytes.is_empty()).then_some(payload.bytes);
    HttpRequest {
        method,
        url,
        headers,
        body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::APPLICATION_JSON;

    #[test]
    fn new_parses_method_and_url() {
        let req = Request::new("post", "http://localhost:3000/items").unwrap();
        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(req.url.as_str(), "http://localhost:3000/items");
        assert!(req.headers.is_empty());
        assert!(req.body.is_none());
    }

    #[test]
    fn rejects_unsupported_method_before_url() {
        let err = Request::new("TRACE", "not a url").unwrap_err();
        assert_eq!(err, BuildError::UnsupportedMethod("TRACE".to_string()));
    }

    #[test]
    fn rejects_malformed_urls() {
        for url in ["", "   ", "localhost:3000", "/relative/path", "ftp://example.com/file", "http://"] {
            assert!(
                matches!(Request::get(url), Err(BuildError::InvalidUrl { .. })),
                "{url:?} should be rejected"
            );
        }
    }

    #[test]
    fn verb_constructors() {
        assert_eq!(Request::get("http://a.test").unwrap().method, HttpMethod::Get);
        assert_eq!(Request::put("http://a.test").unwrap().method, HttpMethod::Put);
        assert_eq!(Request::post("http://a.test").unwrap().method, HttpMethod::Post);
        assert_eq!(Request::patch("http://a.test").unwrap().method, HttpMethod::Patch);
        assert_eq!(Request::delete("http://a.test").unwrap().method, HttpMethod::Delete);
    }

    #[test]
    fn builder_methods_accumulate_headers_and_body() {
        let req = Request::post("https://a.test/x")
            .unwrap()
            .header("Accept", "application/json")
            .headers([("X-One", "1"), ("accept", "text/html")])
            .body("payload");
        assert_eq!(req.headers.get("accept"), Some("text/html"));
        assert_eq!(req.headers.get("x-one"), Some("1"));
        assert_eq!(req.body, Some(Body::Text("payload".to_string())));
    }

    #[test]
    fn assemble_adds_payload_content_type() {
        let payload = Payload::new(b"{}".to_vec(), Some(APPLICATION_JSON));
        let req = build_request("PUT", "http://a.test/x", Headers::new(), payload).unwrap();
        assert_eq!(req.method, HttpMethod::Put);
        assert_eq!(req.content_type(), Some(APPLICATION_JSON));
        assert_eq!(req.body.as_deref(), Some(&b"{}"[..]));
    }

    #[test]
    fn caller_content_type_wins() {
        let headers: Headers = [("Content-Type", "application/vnd.custom+json")].into_iter().collect();
        let payload = Payload::new(b"{}".to_vec(), Some(APPLICATION_JSON));
        let req = build_request("POST", "http://a.test", headers, payload).unwrap();
        assert_eq!(req.content_type(), Some("application/vnd.custom+json"));
        assert_eq!(req.headers.len(), 1);
    }

    #[test]
    fn empty_payload_has_no_body_or_content_type() {
        let req = build_request("GET", "http://a.test", Headers::new(), Payload::empty()).unwrap();
        assert!(req.body.is_none());
        assert!(req.headers.is_empty());
    }

    #[test]
    fn build_request_checks_method_and_url() {
        assert!(matches!(
            build_request("HEAD", "http://a.test", Headers::new(), Payload::empty()),
            Err(BuildError::UnsupportedMethod(_))
        ));
        assert!(matches!(
            build_request("GET", "nope", Headers::new(), Payload::empty()),
            Err(BuildError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn descriptor_converts_back_into_request() {
        let descriptor = build_request(
            "POST",
            "http://a.test",
            Headers::new(),
            Payload::new(vec![1, 2], Some("application/octet-stream")),
        )
        .unwrap();
        let req = Request::from(descriptor);
        assert_eq!(req.body, Some(Body::Bytes(vec![1, 2])));
        assert_eq!(req.headers.content_type(), Some("application/octet-stream"));
    }
}
