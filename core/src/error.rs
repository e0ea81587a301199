//! Error types for the request pipeline.
//!
//! # Design
//! A failed issuance always carries exactly one `RequestError` variant, named
//! after the pipeline stage that failed. Stage-local errors (`ParseError`,
//! `SerializationError`, ...) are separate types so custom pipeline pieces can
//! return them without constructing the whole union. `BuildError` is kept
//! outside the union: a bad URL or method is rejected before an issuance
//! exists and never reaches a continuation.

use thiserror::Error;

/// The single error delivered for a failed issuance.
#[derive(Debug, Error)]
pub enum RequestError {
    /// The transport could not complete the exchange.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The request body could not be encoded. No network activity happened.
    #[error(transparent)]
    Serialization(#[from] SerializationError),

    /// The response body did not match the expected shape.
    #[error(transparent)]
    Parsing(#[from] ParseError),

    /// A well-formed response was rejected by the validation policy.
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl RequestError {
    /// The response status, when the failure happened after a response arrived.
    pub fn status(&self) -> Option<u16> {
        match self {
            RequestError::Validation(e) => Some(e.status),
            _ => None,
        }
    }
}

/// Rejected request construction: a caller programming error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error("invalid url {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("unsupported http method: {0}")]
    UnsupportedMethod(String),
}

/// Failure reported by the transport collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Connection refused, DNS failure, or TLS handshake failure.
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("i/o error: {0}")]
    Io(String),

    #[error("transport error: {0}")]
    Other(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout(err.to_string())
        } else if err.is_connect() {
            TransportError::Connect(err.to_string())
        } else if err.is_body() || err.is_decode() {
            TransportError::Io(err.to_string())
        } else {
            TransportError::Other(err.to_string())
        }
    }
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::ConnectionRefused
            | std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::ConnectionAborted
            | std::io::ErrorKind::NotConnected => TransportError::Connect(err.to_string()),
            std::io::ErrorKind::TimedOut => TransportError::Timeout(err.to_string()),
            _ => TransportError::Io(err.to_string()),
        }
    }
}

/// The request body could not be encoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("serialization failed: {message}")]
pub struct SerializationError {
    pub message: String,
}

impl SerializationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for SerializationError {
    fn from(err: serde_json::Error) -> Self {
        SerializationError::new(err.to_string())
    }
}

/// The response body could not be decoded.
///
/// `line` and `column` are 1-based and only set when the decoder reports a
/// position.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("parsing failed: {message}")]
pub struct ParseError {
    pub message: String,
    pub line: Option<usize>,
    pub column: Option<usize>,
}

impl ParseError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            line: None,
            column: None,
        }
    }
}

impl From<serde_json::Error> for ParseError {
    fn from(err: serde_json::Error) -> Self {
        // serde_json reports line 0 for errors that carry no position.
        let (line, column) = if err.line() == 0 {
            (None, None)
        } else {
            (Some(err.line()), Some(err.column()))
        };
        Self {
            message: err.to_string(),
            line,
            column,
        }
    }
}

impl From<std::str::Utf8Error> for ParseError {
    fn from(err: std::str::Utf8Error) -> Self {
        ParseError::new(format!("body is not valid utf-8: {err}"))
    }
}

/// The response was rejected by the validation policy.
///
/// `detail` is a best-effort description pulled from the response body and
/// is empty when none could be found.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("HTTP {status}{}", detail_suffix(.detail))]
pub struct ValidationError {
    pub status: u16,
    pub detail: String,
}

impl ValidationError {
    pub fn new(status: u16, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }
}

fn detail_suffix(detail: &str) -> String {
    if detail.is_empty() {
        String::new()
    } else {
        format!(": {detail}")
    }
}
