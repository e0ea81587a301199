//! Typed bodies and the pluggable serializer/parser pair.
//!
//! # Design
//! `Body` is the typed value on both sides of the wire. Encoding and decoding
//! go through the `BodySerializer` and `BodyParser` traits, each with three
//! built-in implementations (identity, UTF-8 string, JSON). When nothing is
//! configured, the `content-type` on each side picks the codec, falling back
//! to identity for unknown types. A request without a `content-type` is
//! encoded according to its body's variant instead.
//!
//! Closures with the right signature implement both traits, so one-off
//! pipeline pieces do not need a named type.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::{ParseError, SerializationError};
use crate::finite::ensure_finite;
use crate::http::Headers;

pub const APPLICATION_JSON: &str = "application/json";
pub const TEXT_HTML: &str = "text/html";
pub const TEXT_PLAIN_UTF8: &str = "text/plain; charset=utf-8";

/// A typed request or response body.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Body {
    /// No body. Serializes to nothing; JSON parsing of an empty response
    /// yields this instead of an error.
    #[default]
    Empty,
    Bytes(Vec<u8>),
    Text(String),
    Json(Value),
}

impl Body {
    /// Encode any serde-serializable value as a structured body.
    ///
    /// Fails on NaN or infinite floats instead of writing them as `null`.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, SerializationError> {
        ensure_finite(value)?;
        Ok(Body::Json(serde_json::to_value(value)?))
    }

    /// Decode this body into a caller type.
    ///
    /// `Empty` decodes as JSON `null`, so it fits `Option<T>` and `()`.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, ParseError> {
        let value = match self {
            Body::Empty => serde_json::from_value(Value::Null)?,
            Body::Bytes(bytes) => serde_json::from_slice(bytes)?,
            Body::Text(text) => serde_json::from_str(text)?,
            Body::Json(value) => T::deserialize(value)?,
        };
        Ok(value)
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Body::Empty => true,
            Body::Bytes(bytes) => bytes.is_empty(),
            Body::Text(text) => text.is_empty(),
            Body::Json(_) => false,
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Body::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Body::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Body::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Body::Bytes(bytes)
    }
}

impl From<&[u8]> for Body {
    fn from(bytes: &[u8]) -> Self {
        Body::Bytes(bytes.to_vec())
    }
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Body::Text(text)
    }
}

impl From<&str> for Body {
    fn from(text: &str) -> Self {
        Body::Text(text.to_string())
    }
}

impl From<Value> for Body {
    fn from(value: Value) -> Self {
        Body::Json(value)
    }
}

/// Encoded request body ready for the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Payload {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

impl Payload {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(bytes: Vec<u8>, content_type: Option<&str>) -> Self {
        Self {
            bytes,
            content_type: content_type.map(str::to_string),
        }
    }
}

/// Which built-in codec a content type selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Identity,
    Text,
    Json,
}

impl ContentKind {
    /// Classify a `content-type` value by its media type, ignoring parameters.
    pub fn from_content_type(content_type: &str) -> Self {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        if essence == APPLICATION_JSON || essence == "text/json" || essence.ends_with("+json") {
            ContentKind::Json
        } else if essence.starts_with("text/") {
            ContentKind::Text
        } else {
            ContentKind::Identity
        }
    }

    pub fn from_headers(headers: &Headers) -> Self {
        headers
            .content_type()
            .map_or(ContentKind::Identity, ContentKind::from_content_type)
    }
}

/// Encodes a typed body into bytes plus a content type.
pub trait BodySerializer: Send + Sync {
    fn serialize(&self, body: &Body) -> Result<Payload, SerializationError>;
}

/// Decodes raw response bytes into a typed body.
pub trait BodyParser: Send + Sync {
    fn parse(&self, status: u16, headers: &Headers, raw: &[u8]) -> Result<Body, ParseError>;
}

impl<F> BodySerializer for F
where
    F: Fn(&Body) -> Result<Payload, SerializationError> + Send + Sync,
{
    fn serialize(&self, body: &Body) -> Result<Payload, SerializationError> {
        self(body)
    }
}

impl<F> BodyParser for F
where
    F: Fn(u16, &Headers, &[u8]) -> Result<Body, ParseError> + Send + Sync,
{
    fn parse(&self, status: u16, headers: &Headers, raw: &[u8]) -> Result<Body, ParseError> {
        self(status, headers, raw)
    }
}

/// Passes bytes through untouched and leaves the content type unset.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentitySerializer;

impl BodySerializer for IdentitySerializer {
    fn serialize(&self, body: &Body) -> Result<Payload, SerializationError> {
        match body {
            Body::Empty => Ok(Payload::empty()),
            Body::Bytes(bytes) => Ok(Payload::new(bytes.clone(), None)),
            Body::Text(text) => Ok(Payload::new(text.as_bytes().to_vec(), None)),
            Body::Json(_) => Err(SerializationError::new(
                "structured body cannot be sent as raw bytes",
            )),
        }
    }
}

/// Encodes text as UTF-8 with a `text/plain` content type.
#[derive(Debug, Clone, Copy, Default)]
pub struct StringSerializer;

impl BodySerializer for StringSerializer {
    fn serialize(&self, body: &Body) -> Result<Payload, SerializationError> {
        match body {
            Body::Empty => Ok(Payload::empty()),
            Body::Text(text) => Ok(Payload::new(
                text.as_bytes().to_vec(),
                Some(TEXT_PLAIN_UTF8),
            )),
            Body::Bytes(bytes) => match std::str::from_utf8(bytes) {
                Ok(_) => Ok(Payload::new(bytes.clone(), Some(TEXT_PLAIN_UTF8))),
                Err(e) => Err(SerializationError::new(format!(
                    "body is not representable as text: {e}"
                ))),
            },
            Body::Json(_) => Err(SerializationError::new(
                "structured body cannot be sent as text",
            )),
        }
    }
}

/// Encodes structured data as JSON.
///
/// Text is encoded as a JSON string. Raw bytes are accepted only when they
/// already hold a JSON document.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer;

impl BodySerializer for JsonSerializer {
    fn serialize(&self, body: &Body) -> Result<Payload, SerializationError> {
        let bytes = match body {
            Body::Empty => return Ok(Payload::empty()),
            Body::Json(value) => serde_json::to_vec(value)?,
            Body::Text(text) => serde_json::to_vec(text)?,
            Body::Bytes(bytes) => {
                serde_json::from_slice::<Value>(bytes).map_err(|e| {
                    SerializationError::new(format!("bytes are not a json document: {e}"))
                })?;
                bytes.clone()
            }
        };
        Ok(Payload::new(bytes, Some(APPLICATION_JSON)))
    }
}

/// Picks a serializer from the body's own variant. Used for requests that
/// declare no content type.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultSerializer;

impl BodySerializer for DefaultSerializer {
    fn serialize(&self, body: &Body) -> Result<Payload, SerializationError> {
        match body {
            Body::Empty => Ok(Payload::empty()),
            Body::Bytes(_) => IdentitySerializer.serialize(body),
            Body::Text(_) => StringSerializer.serialize(body),
            Body::Json(_) => JsonSerializer.serialize(body),
        }
    }
}

/// Returns the raw bytes unchanged. Never fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityParser;

impl BodyParser for IdentityParser {
    fn parse(&self, _status: u16, _headers: &Headers, raw: &[u8]) -> Result<Body, ParseError> {
        Ok(Body::Bytes(raw.to_vec()))
    }
}

/// Decodes the body as UTF-8 text.
#[derive(Debug, Clone, Copy, Default)]
pub struct StringParser;

impl BodyParser for StringParser {
    fn parse(&self, _status: u16, _headers: &Headers, raw: &[u8]) -> Result<Body, ParseError> {
        let text = std::str::from_utf8(raw)?;
        Ok(Body::Text(text.to_string()))
    }
}

/// Decodes the body as JSON. An empty or all-whitespace body is `Body::Empty`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonParser;

impl BodyParser for JsonParser {
    fn parse(&self, _status: u16, _headers: &Headers, raw: &[u8]) -> Result<Body, ParseError> {
        if raw.iter().all(u8::is_ascii_whitespace) {
            return Ok(Body::Empty);
        }
        Ok(Body::Json(serde_json::from_slice(raw)?))
    }
}

/// Picks a parser from the response's `content-type` header.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentTypeParser;

impl BodyParser for ContentTypeParser {
    fn parse(&self, status: u16, headers: &Headers, raw: &[u8]) -> Result<Body, ParseError> {
        parser_for(ContentKind::from_headers(headers)).parse(status, headers, raw)
    }
}

pub fn parser_for(kind: ContentKind) -> &'static dyn BodyParser {
    match kind {
        ContentKind::Identity => &IdentityParser,
        ContentKind::Text => &StringParser,
        ContentKind::Json => &JsonParser,
    }
}

pub fn serializer_for(kind: ContentKind) -> &'static dyn BodySerializer {
    match kind {
        ContentKind::Identity => &IdentitySerializer,
        ContentKind::Text => &StringSerializer,
        ContentKind::Json => &JsonSerializer,
    }
}

/// The serializer used when none is configured: the request's declared
/// content type decides, and the body's variant only without one.
pub fn default_serializer(content_type: Option<&str>) -> &'static dyn BodySerializer {
    match content_type {
        Some(content_type) => serializer_for(ContentKind::from_content_type(content_type)),
        None => &DefaultSerializer,
    }
}
