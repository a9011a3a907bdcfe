//! Upstream client error types.

use std::fmt;

use thiserror::Error;

/// Result type for upstream API calls.
pub type ApiResult<T> = Result<T, ApiError>;

/// Best-effort body of a failed upstream response.
///
/// Parsed as JSON when the upstream declares a JSON content type and the
/// body parses, otherwise kept as raw text.
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorDetail {
    Json(serde_json::Value),
    Text(String),
}

impl fmt::Display for ErrorDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json(value) => write!(f, "{}", value),
            Self::Text(text) => f.write_str(text),
        }
    }
}

impl ErrorDetail {
    /// Convert the detail into a JSON value (text becomes a JSON string).
    pub fn to_value(&self) -> serde_json::Value {
        match self {
            Self::Json(value) => value.clone(),
            Self::Text(text) => serde_json::Value::String(text.clone()),
        }
    }
}

/// Errors surfaced by [`ApiClient`](super::ApiClient).
///
/// Transport failures never leave the client as raw `reqwest` errors; they
/// are flattened into [`ApiError::Request`].
#[derive(Debug, Error)]
pub enum ApiError {
    /// The upstream answered with a non-2xx status.
    #[error("API error {status}: {detail}")]
    Upstream { status: u16, detail: ErrorDetail },

    /// The request could not be completed (connect, timeout, body decode).
    #[error("API request failed: {0}")]
    Request(String),

    /// No upstream credential is configured.
    #[error("{0}")]
    AuthConfig(String),

    /// A header name or value could not be encoded.
    #[error("Invalid header: {0}")]
    InvalidHeader(String),
}

impl ApiError {
    /// Create an upstream status error.
    pub fn upstream(status: u16, detail: ErrorDetail) -> Self {
        Self::Upstream { status, detail }
    }

    /// Create a request failure.
    pub fn request(msg: impl Into<String>) -> Self {
        Self::Request(msg.into())
    }

    /// Create a missing-credential error.
    pub fn auth_config(msg: impl Into<String>) -> Self {
        Self::AuthConfig(msg.into())
    }

    /// Create an invalid header error.
    pub fn invalid_header(msg: impl Into<String>) -> Self {
        Self::InvalidHeader(msg.into())
    }

    /// HTTP status of an upstream failure, if there was one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Upstream { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Parsed upstream body of an upstream failure, if there was one.
    pub fn detail(&self) -> Option<&ErrorDetail> {
        match self {
            Self::Upstream { detail, .. } => Some(detail),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Request("request timed out".to_string())
        } else if err.is_connect() {
            Self::Request(format!("connection failed: {}", err))
        } else if err.is_decode() {
            Self::Request(format!("invalid response body: {}", err))
        } else {
            Self::Request(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_upstream_display_json_detail() {
        let err = ApiError::upstream(404, ErrorDetail::Json(json!({"message": "not found"})));
        assert_eq!(err.to_string(), r#"API error 404: {"message":"not found"}"#);
        assert_eq!(err.status(), Some(404));
    }

    #[test]
    fn test_upstream_display_text_detail() {
        let err = ApiError::upstream(500, ErrorDetail::Text("boom".to_string()));
        assert_eq!(err.to_string(), "API error 500: boom");
        assert_eq!(err.detail().map(ErrorDetail::to_value), Some(json!("boom")));
    }

    #[test]
    fn test_non_upstream_has_no_status() {
        let err = ApiError::request("request timed out");
        assert_eq!(err.status(), None);
        assert!(err.detail().is_none());
    }
}
