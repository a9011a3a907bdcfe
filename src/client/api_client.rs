//! Upstream REST client.
//!
//! A thin JSON client over `reqwest`: one outbound call per invocation, no
//! retries, no pooled connections kept between calls. Every non-2xx response
//! is mapped to [`ApiError::Upstream`].

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use reqwest::{Method, Response};
use serde_json::{Map, Value};
use tracing::{debug, instrument, warn};

use super::auth::{AuthStrategy, CustomHeaders};
use super::error::{ApiError, ApiResult, ErrorDetail};

/// Default upstream request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

/// Default user agent sent with every request.
pub const DEFAULT_USER_AGENT: &str = concat!("mcp-server-toolkit/", env!("CARGO_PKG_VERSION"));

/// Optional parts of an upstream request.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    query: Option<Map<String, Value>>,
    body: Option<Value>,
    headers: Vec<(String, String)>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Query-string parameters. Only scalar values are encodable.
    pub fn query(mut self, params: Map<String, Value>) -> Self {
        self.query = Some(params);
        self
    }

    /// JSON request body.
    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Extra header; wins over default and auth headers of the same name.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// Builder for [`ApiClient`].
#[derive(Debug)]
pub struct ApiClientBuilder {
    base_url: String,
    auth: Arc<dyn AuthStrategy>,
    timeout: Duration,
    user_agent: String,
}

impl ApiClientBuilder {
    pub fn auth(mut self, strategy: impl AuthStrategy + 'static) -> Self {
        self.auth = Arc::new(strategy);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn build(self) -> ApiResult<ApiClient> {
        let http = reqwest::Client::builder()
            .timeout(self.timeout)
            .pool_max_idle_per_host(0)
            .build()
            .map_err(|e| ApiError::request(format!("failed to create HTTP client: {}", e)))?;

        Ok(ApiClient {
            http,
            base_url: self.base_url.trim_end_matches('/').to_string(),
            auth: self.auth,
            timeout: self.timeout,
            user_agent: self.user_agent,
        })
    }
}

/// JSON client for one upstream API.
///
/// Read-only after construction; share it behind an `Arc`.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    auth: Arc<dyn AuthStrategy>,
    timeout: Duration,
    user_agent: String,
}

impl ApiClient {
    /// Start building a client for `base_url` (trailing slashes are dropped).
    ///
    /// Without an explicit strategy the client sends no auth headers.
    pub fn builder(base_url: impl Into<String>) -> ApiClientBuilder {
        ApiClientBuilder {
            base_url: base_url.into(),
            auth: Arc::new(CustomHeaders::new()),
            timeout: DEFAULT_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// Target URL for an endpoint; the endpoint's leading slashes are stripped.
    pub fn url_for(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'))
    }

    /// Default headers merged with the auth strategy's headers.
    ///
    /// Fails eagerly when the strategy has no credential.
    pub fn default_headers(&self) -> ApiResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&self.user_agent)
                .map_err(|e| ApiError::invalid_header(e.to_string()))?,
        );
        for (name, value) in self.auth.auth_headers()? {
            if let Some(name) = name {
                headers.insert(name, value);
            }
        }
        Ok(headers)
    }

    /// Issue a request and return the parsed JSON body.
    #[instrument(skip_all, fields(method = %method, endpoint = %endpoint))]
    pub async fn request(
        &self,
        method: Method,
        endpoint: &str,
        options: RequestOptions,
    ) -> ApiResult<Value> {
        let url = self.url_for(endpoint);
        let mut headers = self.default_headers()?;
        for (name, value) in &options.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| ApiError::invalid_header(e.to_string()))?;
            let value =
                HeaderValue::from_str(value).map_err(|e| ApiError::invalid_header(e.to_string()))?;
            headers.insert(name, value);
        }

        debug!(url = %url, "Sending upstream request");

        let mut builder = self.http.request(method, &url).headers(headers);
        if let Some(query) = &options.query {
            builder = builder.query(query);
        }
        if let Some(body) = &options.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();

        if !status.is_success() {
            let detail = Self::error_detail(response).await;
            warn!(status = status.as_u16(), "Upstream request failed");
            return Err(ApiError::upstream(status.as_u16(), detail));
        }

        let bytes = response.bytes().await?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&bytes)
            .map_err(|e| ApiError::request(format!("invalid JSON response: {}", e)))
    }

    /// Parse a failed response body, preferring JSON when declared.
    async fn error_detail(response: Response) -> ErrorDetail {
        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("application/json"));

        let text = match response.text().await {
            Ok(text) => text,
            Err(e) => return ErrorDetail::Text(format!("<unreadable body: {}>", e)),
        };

        if is_json {
            match serde_json::from_str(&text) {
                Ok(value) => ErrorDetail::Json(value),
                Err(_) => ErrorDetail::Text(text),
            }
        } else {
            ErrorDetail::Text(text)
        }
    }

    pub async fn get(&self, endpoint: &str, options: RequestOptions) -> ApiResult<Value> {
        self.request(Method::GET, endpoint, options).await
    }

    pub async fn post(&self, endpoint: &str, options: RequestOptions) -> ApiResult<Value> {
        self.request(Method::POST, endpoint, options).await
    }

    pub async fn put(&self, endpoint: &str, options: RequestOptions) -> ApiResult<Value> {
        self.request(Method::PUT, endpoint, options).await
    }

    pub async fn delete(&self, endpoint: &str, options: RequestOptions) -> ApiResult<Value> {
        self.request(Method::DELETE, endpoint, options).await
    }
}
