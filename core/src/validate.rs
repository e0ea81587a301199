//! Response validation policy.
//!
//! # Design
//! A validator sees the status, headers, and parsed body after parsing has
//! succeeded. The default accepts informational and success statuses only;
//! any custom validator replaces that policy entirely.

use serde_json::Value;

use crate::body::Body;
use crate::error::ValidationError;
use crate::http::Headers;
use crate::status::StatusCategory;

/// Decides whether a parsed response counts as a success.
pub trait ResponseValidator: Send + Sync {
    fn validate(&self, status: u16, headers: &Headers, body: &Body) -> Result<(), ValidationError>;
}

impl<F> ResponseValidator for F
where
    F: Fn(u16, &Headers, &Body) -> Result<(), ValidationError> + Send + Sync,
{
    fn validate(&self, status: u16, headers: &Headers, body: &Body) -> Result<(), ValidationError> {
        self(status, headers, body)
    }
}

/// Accepts 1xx and 2xx; rejects everything else with whatever error detail
/// the body offers.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultValidator;

impl ResponseValidator for DefaultValidator {
    fn validate(&self, status: u16, _headers: &Headers, body: &Body) -> Result<(), ValidationError> {
        if StatusCategory::of(i32::from(status)).is_acceptable() {
            Ok(())
        } else {
            Err(ValidationError::new(status, error_detail(body)))
        }
    }
}

/// Accepts every category listed, rejects the rest.
///
/// ```
/// use http_request::{AcceptCategories, StatusCategory};
///
/// let validator = AcceptCategories::new([StatusCategory::Success, StatusCategory::Redirection]);
/// ```
#[derive(Debug, Clone)]
pub struct AcceptCategories {
    accepted: Vec<StatusCategory>,
}

impl AcceptCategories {
    pub fn new(accepted: impl IntoIterator<Item = StatusCategory>) -> Self {
        Self {
            accepted: accepted.into_iter().collect(),
        }
    }
}

impl ResponseValidator for AcceptCategories {
    fn validate(&self, status: u16, _headers: &Headers, body: &Body) -> Result<(), ValidationError> {
        if self.accepted.contains(&StatusCategory::of(i32::from(status))) {
            Ok(())
        } else {
            Err(ValidationError::new(status, error_detail(body)))
        }
    }
}

const DETAIL_KEYS: [&str; 5] = ["detail", "message", "error_description", "error", "title"];

/// Best-effort extraction of an error description from a parsed body.
///
/// Looks for the usual keys of JSON error payloads (`detail`, `message`,
/// `error`, ...) in that order. A key holding an object is searched the same
/// way, to any depth. Text bodies of up to 512 bytes are used trimmed.
/// Returns an empty string when nothing fits.
pub fn error_detail(body: &Body) -> String {
    match body {
        Body::Json(value) => json_detail(value).unwrap_or_default(),
        Body::Text(text) if text.len() <= 512 => text.trim().to_string(),
        _ => String::new(),
    }
}

fn json_detail(value: &Value) -> Option<String> {
    let object = value.as_object()?;
    for key in DETAIL_KEYS {
        match object.get(key) {
            Some(Value::String(text)) if !text.is_empty() => return Some(text.clone()),
            Some(nested @ Value::Object(_)) => {
                if let Some(text) = json_detail(nested) {
                    return Some(text);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn validate(status: u16, body: Body) -> Result<(), ValidationError> {
        DefaultValidator.validate(status, &Headers::new(), &body)
    }

    #[test]
    fn default_accepts_informational_and_success() {
        assert!(validate(100, Body::Empty).is_ok());
        assert!(validate(200, Body::Empty).is_ok());
        assert!(validate(299, Body::Empty).is_ok());
    }

    #[test]
    fn default_rejects_everything_else() {
        for status in [301, 404, 500, 599, 600, 0] {
            let err = validate(status, Body::Json(json!({"ok": true}))).unwrap_err();
            assert_eq!(err.status, status);
        }
    }

    #[test]
    fn detail_comes_from_json_error_fields() {
        let err = validate(422, Body::Json(json!({"message": "title missing"}))).unwrap_err();
        assert_eq!(err.detail, "title missing");

        let err = validate(400, Body::Json(json!({"error": {"message": "nested"}}))).unwrap_err();
        assert_eq!(err.detail, "nested");

        let err = validate(401, Body::Json(json!({"error": "invalid_token"}))).unwrap_err();
        assert_eq!(err.detail, "invalid_token");
    }

    #[test]
    fn missing_detail_yields_empty_string() {
        let err = validate(404, Body::Empty).unwrap_err();
        assert_eq!(err, ValidationError::new(404, ""));

        let err = validate(500, Body::Json(json!([1, 2]))).unwrap_err();
        assert!(err.detail.is_empty());

        let err = validate(500, Body::Bytes(vec![0xff])).unwrap_err();
        assert!(err.detail.is_empty());
    }

    #[test]
    fn short_text_bodies_become_detail() {
        let err = validate(503, Body::Text("  maintenance\n".into())).unwrap_err();
        assert_eq!(err.detail, "maintenance");
        let err = validate(503, Body::Text("x".repeat(2048))).unwrap_err();
        assert!(err.detail.is_empty());
    }

    #[test]
    fn accept_categories_can_allow_redirects() {
        let validator = AcceptCategories::new([StatusCategory::Success, StatusCategory::Redirection]);
        assert!(validator.validate(301, &Headers::new(), &Body::Empty).is_ok());
        assert!(validator.validate(200, &Headers::new(), &Body::Empty).is_ok());
        assert!(validator.validate(404, &Headers::new(), &Body::Empty).is_err());
    }

    #[test]
    fn closure_validator() {
        let only_204 = |status: u16, _: &Headers, _: &Body| {
            if status == 204 {
                Ok(())
            } else {
                Err(ValidationError::new(status, "expected 204"))
            }
        };
        assert!(only_204.validate(204, &Headers::new(), &Body::Empty).is_ok());
        assert_eq!(
            only_204.validate(200, &Headers::new(), &Body::Empty).unwrap_err().detail,
            "expected 204"
        );
    }
}
