use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    /// Human-readable message from the auth service, shown inline to the
    /// viewer.
    #[error("{0}")]
    AuthFailed(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Unauthorized - session may be expired")]
    Unauthorized,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Error body shapes the auth service returns, depending on endpoint.
#[derive(Deserialize)]
struct AuthErrorBody {
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            format!(
                "{}... (truncated, {} total bytes)",
                &body[..MAX_ERROR_BODY_LENGTH],
                body.len()
            )
        }
    }

    /// Pull the human-readable message out of an auth error body, if any.
    fn auth_message(body: &str) -> Option<String> {
        let parsed: AuthErrorBody = serde_json::from_str(body).ok()?;
        parsed.msg.or(parsed.message).or(parsed.error_description)
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let truncated = Self::truncate_body(body);
        match status.as_u16() {
            401 => ApiError::Unauthorized,
            403 => ApiError::AccessDenied(truncated),
            404 => ApiError::NotFound(truncated),
            429 => ApiError::RateLimited,
            500..=599 => ApiError::ServerError(truncated),
            _ => ApiError::InvalidResponse(format!("Status {}: {}", status, truncated)),
        }
    }

    /// Like `from_status`, but auth endpoints carry a message field meant
    /// for the viewer; surface it verbatim when present.
    pub fn from_auth_status(status: reqwest::StatusCode, body: &str) -> Self {
        if let Some(message) = Self::auth_message(body) {
            return ApiError::AuthFailed(message);
        }
        Self::from_status(status, body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status_mapping() {
        let unauthorized = ApiError::from_status(reqwest::StatusCode::UNAUTHORIZED, "");
        assert!(matches!(unauthorized, ApiError::Unauthorized));

        let rate_limited = ApiError::from_status(reqwest::StatusCode::TOO_MANY_REQUESTS, "");
        assert!(matches!(rate_limited, ApiError::RateLimited));

        let server = ApiError::from_status(reqwest::StatusCode::BAD_GATEWAY, "upstream down");
        assert!(matches!(server, ApiError::ServerError(body) if body == "upstream down"));
    }

    #[test]
    fn test_auth_message_extraction() {
        let err = ApiError::from_auth_status(
            reqwest::StatusCode::BAD_REQUEST,
            r#"{"error": "invalid_grant", "error_description": "Invalid login credentials"}"#,
        );
        assert_eq!(err.to_string(), "Invalid login credentials");

        let err = ApiError::from_auth_status(
            reqwest::StatusCode::UNPROCESSABLE_ENTITY,
            r#"{"code": 422, "msg": "Password should be at least 6 characters"}"#,
        );
        assert_eq!(err.to_string(), "Password should be at least 6 characters");
    }

    #[test]
    fn test_auth_status_without_message_falls_through() {
        let err = ApiError::from_auth_status(reqwest::StatusCode::UNAUTHORIZED, "not json");
        assert!(matches!(err, ApiError::Unauthorized));
    }

    #[test]
    fn test_truncate_body() {
        let long = "x".repeat(600);
        let err = ApiError::from_status(reqwest::StatusCode::INTERNAL_SERVER_ERROR, &long);
        let text = err.to_string();
        assert!(text.contains("truncated, 600 total bytes"));
    }
}
