//! HTTP status code classification.
//!
//! # Design
//! Classification is plain arithmetic over the documented ranges. Codes are
//! taken as `i32` so that out-of-range values from any source (including a
//! misbehaving transport) still classify, as `Unknown`, instead of failing.

/// The class an HTTP status code falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCategory {
    /// 100–199
    Informational,
    /// 200–299
    Success,
    /// 300–399
    Redirection,
    /// 400–499
    ClientError,
    /// 500–599
    ServerError,
    /// Anything outside 100–599.
    Unknown,
}

impl StatusCategory {
    pub fn of(code: i32) -> Self {
        classify(code)
    }

    /// Whether the default validation policy accepts this category.
    pub fn is_acceptable(self) -> bool {
        matches!(self, StatusCategory::Informational | StatusCategory::Success)
    }

    pub fn is_error(self) -> bool {
        matches!(self, StatusCategory::ClientError | StatusCategory::ServerError)
    }
}

/// Map a status code to its category.
pub fn classify(code: i32) -> StatusCategory {
    match code {
        100..=199 => StatusCategory::Informational,
        200..=299 => StatusCategory::Success,
        300..=399 => StatusCategory::Redirection,
        400..=499 => StatusCategory::ClientError,
        500..=599 => StatusCategory::ServerError,
        _ => StatusCategory::Unknown,
    }
}

pub fn is_informational(code: i32) -> bool {
    classify(code) == StatusCategory::Informational
}

pub fn is_success(code: i32) -> bool {
    classify(code) == StatusCategory::Success
}

pub fn is_redirection(code: i32) -> bool {
    classify(code) == StatusCategory::Redirection
}

pub fn is_client_error(code: i32) -> bool {
    classify(code) == StatusCategory::ClientError
}

pub fn is_server_error(code: i32) -> bool {
    classify(code) == StatusCategory::ServerError
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_boundaries() {
        assert_eq!(classify(99), StatusCategory::Unknown);
        assert_eq!(classify(100), StatusCategory::Informational);
        assert_eq!(classify(199), StatusCategory::Informational);
        assert_eq!(classify(200), StatusCategory::Success);
        assert_eq!(classify(299), StatusCategory::Success);
        assert_eq!(classify(300), StatusCategory::Redirection);
        assert_eq!(classify(399), StatusCategory::Redirection);
        assert_eq!(classify(400), StatusCategory::ClientError);
        assert_eq!(classify(499), StatusCategory::ClientError);
        assert_eq!(classify(500), StatusCategory::ServerError);
        assert_eq!(classify(599), StatusCategory::ServerError);
        assert_eq!(classify(600), StatusCategory::Unknown);
    }

    #[test]
    fn negative_and_huge_codes_are_unknown() {
        assert_eq!(classify(-1), StatusCategory::Unknown);
        assert_eq!(classify(0), StatusCategory::Unknown);
        assert_eq!(classify(i32::MIN), StatusCategory::Unknown);
        assert_eq!(classify(i32::MAX), StatusCategory::Unknown);
    }

    #[test]
    fn documented_ranges_partition_without_gaps() {
        for code in 100..600 {
            let hits = [
                is_informational(code),
                is_success(code),
                is_redirection(code),
                is_client_error(code),
                is_server_error(code),
            ]
            .iter()
            .filter(|hit| **hit)
            .count();
            assert_eq!(hits, 1, "code {code} matched {hits} categories");
            assert_ne!(classify(code), StatusCategory::Unknown);
        }
    }

    #[test]
    fn only_informational_and_success_are_acceptable() {
        assert!(StatusCategory::of(101).is_acceptable());
        assert!(StatusCategory::of(204).is_acceptable());
        assert!(!StatusCategory::of(301).is_acceptable());
        assert!(!StatusCategory::of(404).is_acceptable());
        assert!(!StatusCategory::of(503).is_acceptable());
        assert!(!StatusCategory::of(700).is_acceptable());
    }

    #[test]
    fn error_categories() {
        assert!(StatusCategory::ClientError.is_error());
        assert!(StatusCategory::ServerError.is_error());
        assert!(!StatusCategory::Redirection.is_error());
        assert!(!StatusCategory::Unknown.is_error());
    }
}
