//! Asynchronous HTTP request pipeline.
//!
//! # Overview
//! Takes a method, URL, headers, and an optional typed body; serializes the
//! body, sends the request through a shared transport, then parses and
//! validates the response and hands the caller exactly one typed outcome.
//! Issuing never blocks: `RequestIssuer::issue` returns a cancellable
//! `TaskHandle` and the outcome arrives later through a success or error
//! continuation.
//!
//! # Design
//! - Serialization, parsing, and validation are traits with built-in
//!   identity, string, and JSON implementations, chosen by content type when
//!   nothing is configured (by body variant for requests without one).
//! - The transport is a trait too. `ReqwestTransport` is the default; tests
//!   substitute scripted fakes.
//! - URL and method are checked when a `Request` is created, before any
//!   issuance exists.
//! - Every failure is terminal and arrives as one categorized `RequestError`.
//!   There are no retries at this layer.

pub mod body;
pub mod config;
pub mod error;
mod finite;
pub mod http;
pub mod issuer;
pub mod request;
pub mod response;
pub mod status;
pub mod transport;
pub mod validate;

pub use body::{
    default_serializer, Body, BodyParser, BodySerializer, ContentKind, ContentTypeParser,
    DefaultSerializer, IdentityParser, IdentitySerializer, JsonParser, JsonSerializer, Payload,
    StringParser, StringSerializer, APPLICATION_JSON, TEXT_HTML, TEXT_PLAIN_UTF8,
};
pub use config::TransportConfig;
pub use error::{
    BuildError, ParseError, RequestError, SerializationError, TransportError, ValidationError,
};
pub use http::{Headers, HttpMethod, HttpRequest, HttpResponse};
pub use issuer::{IssueOptions, IssueState, PipelineConfig, RequestIssuer, TaskHandle};
pub use request::{build_request, Request};
pub use response::Response;
pub use status::{classify, StatusCategory};
pub use transport::{ReqwestTransport, Transport};
pub use validate::{AcceptCategories, DefaultValidator, ResponseValidator};
