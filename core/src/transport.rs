//! The transport collaborator boundary.
//!
//! # Design
//! A `Transport` turns one `HttpRequest` into one `HttpResponse` or one
//! `TransportError`. The returned future is the completion signal: it
//! resolves at most once, and dropping it cancels the exchange. Everything
//! below that line (sockets, TLS, redirects, pooling) belongs to the
//! implementation.
//!
//! `ReqwestTransport` is the default implementation. It owns a single
//! `reqwest::Client`, which is the shared session every issuance goes
//! through; the client is internally reference-counted and safe to use from
//! many tasks at once.

use std::future::Future;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::redirect::Policy;

use crate::config::TransportConfig;
use crate::error::TransportError;
use crate::http::{Headers, HttpMethod, HttpRequest, HttpResponse};

/// Executes wire-level requests.
pub trait Transport: Send + Sync + 'static {
    fn execute(
        &self,
        request: HttpRequest,
    ) -> impl Future<Output = Result<HttpResponse, TransportError>> + Send;
}

/// `Transport` backed by a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(config: &TransportConfig) -> Result<Self, TransportError> {
        let mut builder = reqwest::Client::builder().redirect(if config.follow_redirects {
            Policy::limited(config.max_redirects)
        } else {
            Policy::none()
        });
        if let Some(timeout) = config.timeout() {
            builder = builder.timeout(timeout);
        }
        if let Some(timeout) = config.connect_timeout() {
            builder = builder.connect_timeout(timeout);
        }
        if let Some(agent) = &config.user_agent {
            builder = builder.user_agent(agent.as_str());
        }
        if !config.default_headers.is_empty() {
            builder = builder.default_headers(header_map(&config.default_headers)?);
        }
        Ok(Self {
            client: builder.build()?,
        })
    }

    /// Wrap an already-configured client.
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Transport for ReqwestTransport {
    fn execute(
        &self,
        request: HttpRequest,
    ) -> impl Future<Output = Result<HttpResponse, TransportError>> + Send {
        let mut builder = self
            .client
            .request(reqwest_method(request.method), request.url);
        for (name, value) in request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }
        async move {
            let response = builder.send().await?;
            let status = response.status().as_u16();
            let headers: Headers = response
                .headers()
                .iter()
                .map(|(name, value)| {
                    (
                        name.as_str().to_string(),
                        String::from_utf8_lossy(value.as_bytes()).into_owned(),
                    )
                })
                .collect();
            let body = response.bytes().await?.to_vec();
            Ok(HttpResponse {
                status,
                headers,
                body,
            })
        }
    }
}

fn reqwest_method(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::Get => reqwest::Method::GET,
        HttpMethod::Put => reqwest::Method::PUT,
        HttpMethod::Post => reqwest::Method::POST,
        HttpMethod::Patch => reqwest::Method::PATCH,
        HttpMethod::Delete => reqwest::Method::DELETE,
    }
}

fn header_map(pairs: &[(String, String)]) -> Result<HeaderMap, TransportError> {
    let mut map = HeaderMap::new();
    for (name, value) in pairs {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| TransportError::Other(format!("invalid header name {name:?}: {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| TransportError::Other(format!("invalid header value {value:?}: {e}")))?;
        map.insert(name, value);
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_mapping() {
        assert_eq!(reqwest_method(HttpMethod::Patch), reqwest::Method::PATCH);
        assert_eq!(reqwest_method(HttpMethod::Delete), reqwest::Method::DELETE);
    }

    #[test]
    fn default_headers_are_validated() {
        let ok = header_map(&[("Accept".to_string(), "application/json".to_string())]).unwrap();
        assert_eq!(ok.get("accept").unwrap(), "application/json");

        let err = header_map(&[("bad header".to_string(), "x".to_string())]).unwrap_err();
        assert!(matches!(err, TransportError::Other(_)));
    }

    #[test]
    fn builds_from_config() {
        let config = TransportConfig {
            timeout_secs: Some(5),
            user_agent: Some("test-agent".to_string()),
            follow_redirects: false,
            default_headers: vec![("X-Client".to_string(), "core".to_string())],
            ..TransportConfig::default()
        };
        assert!(ReqwestTransport::new(&config).is_ok());
    }

    #[test]
    fn rejects_bad_default_headers() {
        let config = TransportConfig {
            default_headers: vec![("X-Bad".to_string(), "line\nbreak".to_string())],
            ..TransportConfig::default()
        };
        assert!(ReqwestTransport::new(&config).is_err());
    }
}
