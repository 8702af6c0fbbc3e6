use std::fmt;

use serde_json::Value;
use thiserror::Error;

/// Classified failure of a request against the inventory API.
///
/// Cloneable so a failed read can be kept on its cache entry and handed to
/// every subscriber.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// No response reached us: connect failure, timeout, broken body.
    #[error("Network error: {0}")]
    Network(String),

    #[error("Unauthorized - sign in required")]
    Unauthorized,

    #[error("Access denied: {0}")]
    Forbidden(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Rejected input; carries the server's detail verbatim.
    #[error("{0}")]
    Validation(String),

    #[error("Server error: {0}")]
    Server(String),

    #[error("Unexpected status {status}: {detail}")]
    Unknown { status: u16, detail: String },

    /// A success status whose body could not be understood.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            return body.to_string();
        }
        let mut end = MAX_ERROR_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
    }

    /// Pull the human-readable detail out of an error body.
    ///
    /// The API answers with a plain string, `{ "title": .. }` or
    /// `{ "message": .. }`; anything else is passed through as text.
    pub fn detail_from_body(body: &str) -> String {
        let trimmed = body.trim();
        let detail = match serde_json::from_str::<Value>(trimmed) {
            Ok(Value::String(s)) => s,
            Ok(Value::Object(map)) => ["title", "message"]
                .iter()
                .find_map(|field| map.get(*field).and_then(|v| v.as_str()))
                .map(|s| s.to_string())
                .unwrap_or_else(|| trimmed.to_string()),
            _ => trimmed.to_string(),
        };
        Self::truncate_body(&detail)
    }

    pub fn from_status(status: u16, body: &str) -> Self {
        let detail = Self::detail_from_body(body);
        match status {
            400 => ApiError::Validation(detail),
            401 => ApiError::Unauthorized,
            403 => ApiError::Forbidden(detail),
            404 => ApiError::NotFound(detail),
            500..=599 => ApiError::Server(detail),
            _ => ApiError::Unknown { status, detail },
        }
    }

    /// Reads may be retried for these; writes never are.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ApiError::Network(_) | ApiError::Server(_))
    }

    /// Map the failure to what the console should tell the user.
    ///
    /// `has_token` keeps "never signed in" and "signed in without the
    /// required role" apart for a 403.
    pub fn notice(&self, has_token: bool) -> UserNotice {
        match self {
            ApiError::Unauthorized => UserNotice::SignIn,
            ApiError::Forbidden(_) if has_token => UserNotice::InsufficientRole,
            ApiError::Forbidden(_) => UserNotice::SignIn,
            ApiError::Validation(detail) => UserNotice::Invalid(detail.clone()),
            ApiError::NotFound(_) => UserNotice::NotFound,
            ApiError::Network(_) | ApiError::Server(_) => UserNotice::RetryLater,
            ApiError::Unknown { .. } | ApiError::InvalidResponse(_) => {
                UserNotice::Unexpected(self.to_string())
            }
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ApiError::InvalidResponse(e.to_string())
        } else if e.is_timeout() {
            ApiError::Network(format!("request timed out: {}", e))
        } else {
            ApiError::Network(e.to_string())
        }
    }
}

/// User-facing outcome of a failed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserNotice {
    SignIn,
    InsufficientRole,
    Invalid(String),
    NotFound,
    RetryLater,
    Unexpected(String),
}

impl fmt::Display for UserNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserNotice::SignIn => f.write_str("Please sign in to continue."),
            UserNotice::InsufficientRole => {
                f.write_str("Your role does not allow this action.")
            }
            UserNotice::Invalid(detail) => f.write_str(detail),
            UserNotice::NotFound => f.write_str("The requested item no longer exists."),
            UserNotice::RetryLater => {
                f.write_str("The service is unavailable right now. Please try again later.")
            }
            UserNotice::Unexpected(detail) => write!(f, "Something went wrong: {}", detail),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detail_from_body_shapes() {
        assert_eq!(ApiError::detail_from_body("\"Name is required\""), "Name is required");
        assert_eq!(
            ApiError::detail_from_body(r#"{"title":"One or more validation errors occurred."}"#),
            "One or more validation errors occurred."
        );
        assert_eq!(
            ApiError::detail_from_body(r#"{"message":"Quantity must be positive"}"#),
            "Quantity must be positive"
        );
        assert_eq!(ApiError::detail_from_body("plain text"), "plain text");
        assert_eq!(ApiError::detail_from_body(r#"{"other":1}"#), r#"{"other":1}"#);
    }

    #[test]
    fn test_from_status_classification() {
        assert_eq!(
            ApiError::from_status(400, r#"{"title":"bad"}"#),
            ApiError::Validation("bad".to_string())
        );
        assert_eq!(ApiError::from_status(401, ""), ApiError::Unauthorized);
        assert!(matches!(ApiError::from_status(403, ""), ApiError::Forbidden(_)));
        assert!(matches!(ApiError::from_status(404, ""), ApiError::NotFound(_)));
        assert!(matches!(ApiError::from_status(500, "boom"), ApiError::Server(_)));
        assert_eq!(
            ApiError::from_status(409, "conflict"),
            ApiError::Unknown {
                status: 409,
                detail: "conflict".to_string()
            }
        );
    }

    #[test]
    fn test_truncates_long_bodies() {
        let body = "x".repeat(MAX_ERROR_BODY_LENGTH + 20);
        let detail = ApiError::detail_from_body(&body);
        assert!(detail.starts_with(&"x".repeat(MAX_ERROR_BODY_LENGTH)));
        assert!(detail.ends_with("(truncated, 520 total bytes)"));
    }

    #[test]
    fn test_notice_keeps_no_token_and_forbidden_apart() {
        let forbidden = ApiError::Forbidden("admins only".to_string());
        assert_eq!(forbidden.notice(true), UserNotice::InsufficientRole);
        assert_eq!(forbidden.notice(false), UserNotice::SignIn);
        assert_eq!(ApiError::Unauthorized.notice(true), UserNotice::SignIn);
        assert_eq!(
            ApiError::Validation("Name is required".to_string()).notice(true),
            UserNotice::Invalid("Name is required".to_string())
        );
        assert_eq!(ApiError::Network("down".to_string()).notice(true), UserNotice::RetryLater);
        assert_eq!(ApiError::Server("500".to_string()).notice(false), UserNotice::RetryLater);
    }

    #[test]
    fn test_retryable_classes() {
        assert!(ApiError::Network("reset".to_string()).is_retryable());
        assert!(ApiError::Server("oops".to_string()).is_retryable());
        assert!(!ApiError::Unauthorized.is_retryable());
        assert!(!ApiError::Validation("x".to_string()).is_retryable());
    }
}
