//! The envelope handed to the success continuation.
//!
//! Carries both the raw bytes and the parsed `Body`, so callers that need
//! the wire form do not have to configure an identity parser.

use serde::de::DeserializeOwned;

use crate::body::Body;
use crate::error::ParseError;
use crate::http::Headers;
use crate::status::{classify, StatusCategory};

/// A response that has been parsed and accepted by the validator.
///
/// Handed by value to the success continuation, which owns it from then on.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: u16,
    pub headers: Headers,
    pub raw_body: Vec<u8>,
    pub body: Body,
}

impl Response {
    pub fn category(&self) -> StatusCategory {
        classify(i32::from(self.status))
    }

    /// Decode the parsed body into a caller type.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ParseError> {
        self.body.deserialize()
    }
}
