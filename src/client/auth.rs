//! Outbound authentication strategies.
//!
//! Each strategy knows how to turn its credential into request headers.
//! Strategies are computed eagerly on every request so a missing credential
//! fails before anything touches the network.

use std::fmt;

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};

use super::error::{ApiError, ApiResult};

/// Token used in place of a missing credential when test mode is on.
pub const TEST_TOKEN: &str = "test-token";

/// Default header name for [`ApiKeyAuth`].
pub const DEFAULT_API_KEY_HEADER: &str = "X-API-Key";

/// Capability to produce authentication headers for an upstream request.
pub trait AuthStrategy: Send + Sync + fmt::Debug {
    /// Produce the headers to inject into every upstream request.
    fn auth_headers(&self) -> ApiResult<HeaderMap>;
}

/// Resolve a configured token, falling back to [`TEST_TOKEN`] in test mode.
fn resolve_token<'a>(token: Option<&'a str>, test_mode: bool, kind: &str) -> ApiResult<&'a str> {
    match token {
        Some(token) if !token.is_empty() => Ok(token),
        _ if test_mode => Ok(TEST_TOKEN),
        _ => Err(ApiError::auth_config(format!(
            "{} is required. Set the token parameter or appropriate environment variable.",
            kind
        ))),
    }
}

fn header_value(value: &str) -> ApiResult<HeaderValue> {
    HeaderValue::from_str(value).map_err(|e| ApiError::invalid_header(e.to_string()))
}

fn header_name(name: &str) -> ApiResult<HeaderName> {
    HeaderName::from_bytes(name.as_bytes()).map_err(|e| ApiError::invalid_header(e.to_string()))
}

// ============================================================================
// Bearer token
// ============================================================================

/// `Authorization: Bearer <token>`.
#[derive(Clone)]
pub struct BearerToken {
    token: Option<String>,
    test_mode: bool,
}

impl BearerToken {
    pub fn new(token: Option<String>) -> Self {
        Self {
            token,
            test_mode: false,
        }
    }

    /// Allow the synthetic test token when no token is configured.
    pub fn test_mode(mut self, enabled: bool) -> Self {
        self.test_mode = enabled;
        self
    }

    pub fn has_token(&self) -> bool {
        self.token.as_deref().is_some_and(|t| !t.is_empty())
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BearerToken")
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("test_mode", &self.test_mode)
            .finish()
    }
}

impl AuthStrategy for BearerToken {
    fn auth_headers(&self) -> ApiResult<HeaderMap> {
        let token = resolve_token(self.token.as_deref(), self.test_mode, "API token")?;
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, header_value(&format!("Bearer {}", token))?);
        Ok(headers)
    }
}

// ============================================================================
// API key
// ============================================================================

/// `<header>: <token>`, with the header name defaulting to `X-API-Key`.
#[derive(Clone)]
pub struct ApiKeyAuth {
    header: String,
    token: Option<String>,
    test_mode: bool,
}

impl ApiKeyAuth {
    pub fn new(token: Option<String>) -> Self {
        Self {
            header: DEFAULT_API_KEY_HEADER.to_string(),
            token,
            test_mode: false,
        }
    }

    /// Use a custom header name.
    pub fn header(mut self, name: impl Into<String>) -> Self {
        self.header = name.into();
        self
    }

    /// Allow the synthetic test token when no key is configured.
    pub fn test_mode(mut self, enabled: bool) -> Self {
        self.test_mode = enabled;
        self
    }
}

impl fmt::Debug for ApiKeyAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiKeyAuth")
            .field("header", &self.header)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("test_mode", &self.test_mode)
            .finish()
    }
}

impl AuthStrategy for ApiKeyAuth {
    fn auth_headers(&self) -> ApiResult<HeaderMap> {
        let token = resolve_token(self.token.as_deref(), self.test_mode, "API key")?;
        let mut headers = HeaderMap::new();
        headers.insert(header_name(&self.header)?, header_value(token)?);
        Ok(headers)
    }
}

// ============================================================================
// Custom
// ============================================================================

/// An arbitrary, fixed header set. An empty set means "no auth".
#[derive(Clone, Default)]
pub struct CustomHeaders {
    headers: Vec<(String, String)>,
}

impl CustomHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

impl fmt::Debug for CustomHeaders {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<_> = self.headers.iter().map(|(name, _)| name.as_str()).collect();
        f.debug_struct("CustomHeaders").field("headers", &names).finish()
    }
}

impl AuthStrategy for CustomHeaders {
    fn auth_headers(&self) -> ApiResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        for (name, value) in &self.headers {
            headers.insert(header_name(name)?, header_value(value)?);
        }
        Ok(headers)
    }
}
