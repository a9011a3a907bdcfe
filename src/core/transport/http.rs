//! HTTP transport implementation.
//!
//! HTTP server with JSON-RPC over POST requests at `/mcp/`.
//! `GET|POST /mcp` redirect there with 307 so the method and body survive.
//! Every request under `/mcp` passes the [`AuthGate`] first; `/health` and
//! `/` are always open.

use axum::{
    Json, Router,
    extract::{Request, State, rejection::JsonRejection},
    middleware::{self, Next},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use http::{StatusCode, header};
use rmcp::ServerHandler;
use rmcp::model::JsonObject;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::OnceLock;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, instrument, warn};

use super::{TransportConfig, TransportError, TransportResult, config::HttpConfig};
use crate::core::McpServer;
use crate::core::security::{AuthGate, MCP_PATH_PREFIX, RequestAuthError};

/// Canonical JSON-RPC endpoint.
pub const RPC_PATH: &str = "/mcp/";

/// HTTP transport handler.
pub struct HttpTransport {
    config: HttpConfig,
    router: OnceLock<Router>,
}

/// JSON-RPC request structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
}

/// JSON-RPC response structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

/// JSON-RPC error structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcResponse {
    /// Create a success response.
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Create an error response.
    pub fn error(id: Option<Value>, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }

    /// Parse error.
    pub fn parse_error(msg: impl Into<String>) -> Self {
        Self::error(None, -32700, msg)
    }

    /// Method not found error.
    pub fn method_not_found(id: Option<Value>) -> Self {
        Self::error(id, -32601, "Method not found")
    }

    /// Invalid request error.
    pub fn invalid_request(id: Option<Value>) -> Self {
        Self::error(id, -32600, "Invalid Request")
    }

    /// Invalid params error.
    pub fn invalid_params(id: Option<Value>, msg: impl Into<String>) -> Self {
        Self::error(id, -32602, msg)
    }

    /// Internal error.
    pub fn internal_error(id: Option<Value>, msg: impl Into<String>) -> Self {
        Self::error(id, -32603, msg)
    }
}

impl HttpTransport {
    /// Create a new HTTP transport with the given config.
    pub fn new(config: HttpConfig) -> Self {
        Self {
            config,
            router: OnceLock::new(),
        }
    }

    /// Create from TransportConfig (extracts HTTP config).
    pub fn from_transport_config(config: &TransportConfig) -> Option<Self> {
        match config {
            TransportConfig::Http(http_config) => Some(Self::new(http_config.clone())),
            #[allow(unreachable_patterns)]
            _ => None,
        }
    }

    /// Get the bind address.
    pub fn address(&self) -> String {
        format!("{}:{}", self.config.host, self.config.port)
    }

    /// The application router, built on first use and reused afterwards.
    pub fn router(&self, server: &McpServer) -> Router {
        self.router
            .get_or_init(|| build_router(server.clone(), self.config.enable_cors))
            .clone()
    }

    /// Run the HTTP transport until Ctrl-C.
    pub async fn run(self, server: McpServer) -> TransportResult<()> {
        let addr = self.address();
        let app = self.router(&server);

        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| TransportError::bind(&addr, e))?;

        let cors_status = if self.config.enable_cors {
            "enabled"
        } else {
            "disabled"
        };
        let auth_status = if server.auth_gate().is_required() {
            "required"
        } else {
            "disabled"
        };
        info!(
            "Ready - listening on http://{} (CORS {}, auth {})",
            addr, cors_status, auth_status
        );
        info!("  → JSON-RPC: POST {}", RPC_PATH);
        info!("  → Health:   GET /health");

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| TransportError::http(e.to_string()))?;

        info!("HTTP transport stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

/// Assemble the router for `server`.
pub fn build_router(server: McpServer, enable_cors: bool) -> Router {
    let gate = server.auth_gate().clone();

    let mut app = Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_check))
        .route(MCP_PATH_PREFIX, get(redirect_to_rpc).post(redirect_to_rpc))
        .route(RPC_PATH, post(handle_rpc))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(middleware::from_fn_with_state(gate, require_auth)),
        )
        .with_state(server);

    if enable_cors {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
        app = app.layer(cors);
    }

    app
}

/// Auth-gate middleware.
async fn require_auth(State(gate): State<AuthGate>, request: Request, next: Next) -> Response {
    let authorization = request
        .headers()
        .get(header::AUTHORIZATION)
        .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned());

    match gate.check(request.uri().path(), authorization.as_deref()) {
        Ok(()) => next.run(request).await,
        Err(reason) => {
            warn!(path = %request.uri().path(), "Rejected request: {}", reason);
            unauthorized(reason)
        }
    }
}

fn unauthorized(reason: RequestAuthError) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, "Bearer")],
        Json(json!({ "detail": reason.to_string() })),
    )
        .into_response()
}

async fn redirect_to_rpc() -> Redirect {
    Redirect::temporary(RPC_PATH)
}

/// Root handler - provides API info.
async fn root_handler(State(server): State<McpServer>) -> impl IntoResponse {
    Json(json!({
        "name": server.name(),
        "version": server.version(),
        "transport": "HTTP",
        "endpoints": {
            "rpc": RPC_PATH,
            "health": "/health"
        },
        "protocol": "JSON-RPC 2.0"
    }))
}

/// Health check endpoint.
async fn health_check(State(server): State<McpServer>) -> impl IntoResponse {
    let mut body = server.health();
    body["timestamp"] = json!(chrono::Utc::now().to_rfc3339());
    Json(body)
}

/// Handle JSON-RPC requests.
#[instrument(skip_all)]
async fn handle_rpc(
    State(server): State<McpServer>,
    body: Result<Json<JsonRpcRequest>, JsonRejection>,
) -> Response {
    let request = match body {
        Ok(Json(request)) => request,
        Err(rejection) => {
            warn!("Malformed JSON-RPC body: {}", rejection.body_text());
            return Json(JsonRpcResponse::parse_error(rejection.body_text())).into_response();
        }
    };

    info!("Received JSON-RPC request: {}", request.method);

    match process_request(&server, request).await {
        Some(response) => (StatusCode::OK, Json(response)).into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    }
}

/// Process a JSON-RPC request. Notifications produce no response.
async fn process_request(server: &McpServer, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
    if request.jsonrpc != "2.0" {
        return Some(JsonRpcResponse::invalid_request(request.id));
    }

    let response = match request.method.as_str() {
        "initialize" => handle_initialize(server, request),
        "ping" => JsonRpcResponse::success(request.id, json!({})),
        "tools/list" => handle_tools_list(server, request).await,
        "tools/call" => handle_tools_call(server, request).await,
        method if method.starts_with("notifications/") => {
            debug!("Received notification: {}", method);
            return None;
        }
        _ => {
            warn!("Unknown method: {}", request.method);
            JsonRpcResponse::method_not_found(request.id)
        }
    };
    Some(response)
}

fn handle_initialize(server: &McpServer, request: JsonRpcRequest) -> JsonRpcResponse {
    match serde_json::to_value(server.get_info()) {
        Ok(info) => JsonRpcResponse::success(request.id, info),
        Err(e) => JsonRpcResponse::internal_error(request.id, e.to_string()),
    }
}

async fn handle_tools_list(server: &McpServer, request: JsonRpcRequest) -> JsonRpcResponse {
    let tools = server.list_tools().await;
    JsonRpcResponse::success(request.id, json!({ "tools": tools }))
}

async fn handle_tools_call(server: &McpServer, request: JsonRpcRequest) -> JsonRpcResponse {
    let Some(params) = request.params else {
        return JsonRpcResponse::invalid_params(request.id, "Missing params");
    };

    let Some(name) = params.get("name").and_then(Value::as_str) else {
        return JsonRpcResponse::invalid_params(request.id, "Missing tool name");
    };

    let arguments: Option<JsonObject> = match params.get("arguments") {
        None | Some(Value::Null) => None,
        Some(Value::Object(map)) => Some(map.clone()),
        Some(_) => {
            return JsonRpcResponse::invalid_params(request.id, "Tool arguments must be an object");
        }
    };

    match server.dispatch(name, arguments).await {
        Ok(result) => match serde_json::to_value(result) {
            Ok(value) => JsonRpcResponse::success(request.id, value),
            Err(e) => JsonRpcResponse::internal_error(request.id, e.to_string()),
        },
        Err(e) => JsonRpcResponse::error(request.id, e.code.0, e.message.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ApiError;
    use crate::domains::tools::{ToolError, typed_tool};
    use axum::body::Body;
    use axum::http::Request as HttpRequest;
    use http_body_util::BodyExt;
    use schemars::JsonSchema;
    use tower::ServiceExt;

    #[derive(Deserialize, JsonSchema)]
    struct EchoParams {
        message: String,
    }

    #[derive(Deserialize, JsonSchema)]
    struct Empty {}

    fn server(api_key: Option<&str>, test_mode: bool) -> McpServer {
        let (echo, echo_handler) = typed_tool("echo", "Echo a message", |p: EchoParams| async move {
            Ok::<_, ToolError>(json!({ "echo": p.message }))
        });
        let (fail, fail_handler) = typed_tool("fail", "Always fails", |_: Empty| async {
            Err::<Value, _>(ToolError::from(ApiError::request("upstream unreachable")))
        });

        let mut builder = McpServer::builder("test-server")
            .test_mode(test_mode)
            .tool("misc", echo, echo_handler)
            .tool("misc", fail, fail_handler);
        if let Some(key) = api_key {
            builder = builder.api_key(key);
        }
        builder.build()
    }

    fn app(server: McpServer) -> Router {
        build_router(server, true)
    }

    fn rpc(method: &str, params: Value, auth: Option<&str>) -> HttpRequest<Body> {
        let mut builder = HttpRequest::builder()
            .method("POST")
            .uri(RPC_PATH)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(auth) = auth {
            builder = builder.header(header::AUTHORIZATION, auth);
        }
        let body = json!({"jsonrpc": "2.0", "id": 1, "method": method, "params": params});
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn get_request(uri: &str) -> HttpRequest<Body> {
        HttpRequest::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_valid_key_allowed() {
        let response = app(server(Some("secret"), false))
            .oneshot(rpc("tools/list", json!({}), Some("Bearer secret")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["result"]["tools"][0]["name"], json!("echo"));
    }

    #[tokio::test]
    async fn test_wrong_key_rejected() {
        let response = app(server(Some("secret"), false))
            .oneshot(rpc("tools/list", json!({}), Some("Bearer wrong")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get(header::WWW_AUTHENTICATE).unwrap(),
            "Bearer"
        );
        assert_eq!(json_body(response).await["detail"], json!("Invalid API key"));
    }

    #[tokio::test]
    async fn test_missing_and_malformed_header_rejected() {
        let response = app(server(Some("secret"), false))
            .oneshot(rpc("tools/list", json!({}), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let detail = json_body(response).await["detail"].clone();
        assert!(detail.as_str().unwrap().starts_with("Missing Authorization header"));

        let response = app(server(Some("secret"), false))
            .oneshot(rpc("tools/list", json!({}), Some("Basic secret")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let detail = json_body(response).await["detail"].clone();
        assert!(detail.as_str().unwrap().starts_with("Invalid Authorization header format"));
    }

    #[tokio::test]
    async fn test_test_mode_bypasses_gate() {
        let response = app(server(Some("secret"), true))
            .oneshot(rpc("tools/list", json!({}), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_health_is_open() {
        let response = app(server(Some("secret"), false))
            .oneshot(get_request("/health"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["status"], json!("healthy"));
        assert_eq!(body["server"], json!("test-server"));
        assert_eq!(body["has_api_client"], json!(false));
        assert_eq!(body["plugins"], json!([]));
        assert!(body["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_unslashed_prefix_redirects() {
        let response = app(server(None, false))
            .oneshot(get_request("/mcp"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(response.headers().get(header::LOCATION).unwrap(), "/mcp/");

        let request = HttpRequest::builder()
            .method("POST")
            .uri("/mcp")
            .body(Body::empty())
            .unwrap();
        let response = app(server(None, false)).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    }

    #[tokio::test]
    async fn test_redirect_is_gated() {
        let response = app(server(Some("secret"), false))
            .oneshot(get_request("/mcp"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_initialize_and_ping() {
        let response = app(server(None, false))
            .oneshot(rpc("initialize", json!({}), None))
            .await
            .unwrap();
        let body = json_body(response).await;
        assert_eq!(body["result"]["serverInfo"]["name"], json!("test-server"));
        assert!(body["result"]["capabilities"]["tools"].is_object());

        let response = app(server(None, false))
            .oneshot(rpc("ping", json!({}), None))
            .await
            .unwrap();
        assert_eq!(json_body(response).await["result"], json!({}));
    }

    #[tokio::test]
    async fn test_tools_call() {
        let response = app(server(None, false))
            .oneshot(rpc(
                "tools/call",
                json!({"name": "echo", "arguments": {"message": "hi"}}),
                None,
            ))
            .await
            .unwrap();
        let body = json_body(response).await;
        assert_eq!(body["id"], json!(1));
        assert_eq!(body["result"]["isError"], json!(false));
        assert_eq!(body["result"]["structuredContent"]["echo"], json!("hi"));
    }

    #[tokio::test]
    async fn test_tools_call_failure_is_error_result() {
        let response = app(server(None, false))
            .oneshot(rpc("tools/call", json!({"name": "fail"}), None))
            .await
            .unwrap();
        let body = json_body(response).await;
        assert_eq!(body["result"]["isError"], json!(true));
        let text = body["result"]["content"][0]["text"].as_str().unwrap();
        assert!(text.contains("upstream unreachable"));
    }

    #[tokio::test]
    async fn test_tools_call_param_errors() {
        let response = app(server(None, false))
            .oneshot(rpc("tools/call", json!({}), None))
            .await
            .unwrap();
        assert_eq!(json_body(response).await["error"]["code"], json!(-32602));

        let response = app(server(None, false))
            .oneshot(rpc("tools/call", json!({"name": "missing"}), None))
            .await
            .unwrap();
        assert_eq!(json_body(response).await["error"]["code"], json!(-32602));

        let response = app(server(None, false))
            .oneshot(rpc("tools/call", json!({"name": "echo", "arguments": {}}), None))
            .await
            .unwrap();
        assert_eq!(json_body(response).await["error"]["code"], json!(-32602));
    }

    #[tokio::test]
    async fn test_unknown_method_and_notifications() {
        let response = app(server(None, false))
            .oneshot(rpc("resources/list", json!({}), None))
            .await
            .unwrap();
        assert_eq!(json_body(response).await["error"]["code"], json!(-32601));

        let response = app(server(None, false))
            .oneshot(rpc("notifications/initialized", json!({}), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
    }

    #[tokio::test]
    async fn test_malformed_body_is_parse_error() {
        let request = HttpRequest::builder()
            .method("POST")
            .uri(RPC_PATH)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let response = app(server(None, false)).oneshot(request).await.unwrap();
        assert_eq!(json_body(response).await["error"]["code"], json!(-32700));
    }

    #[test]
    fn test_router_built_once() {
        let transport = HttpTransport::new(HttpConfig::default());
        let server = server(None, false);
        let _ = transport.router(&server);
        assert!(transport.router.get().is_some());
        assert_eq!(transport.address(), "127.0.0.1:8000");
    }
}
