//! MCP Server implementation and lifecycle management.
//!
//! The server owns an optional embedded [`ApiClient`], zero or more
//! [`Plugin`]s and the [`ToolSurface`] every transport dispatches through.
//!
//! ## Lifecycle
//!
//! `Constructed → Initializing → Serving → ShuttingDown → Stopped`
//!
//! Tools given to the builder are registered eagerly. Plugin tools are
//! registered during [`McpServer::start`], after each plugin's
//! `initialize()` succeeds. Plugins are handled one at a time in the order
//! they were added; the first failure aborts startup.

use async_trait::async_trait;
use rmcp::{
    ErrorData as McpError, RoleServer, ServerHandler,
    model::*,
    service::RequestContext,
};
use serde_json::{Value, json};
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, instrument, warn};

use super::config::Config;
use super::error::Result;
use super::security::AuthGate;
use crate::client::{ApiClient, ApiResult};
use crate::domains::plugins::{Plugin, ToolProvider};
use crate::domains::tools::{ToolError, ToolHandler, ToolSurface, into_call_result};

/// Server lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Constructed,
    Initializing,
    Serving,
    ShuttingDown,
    Stopped,
}

impl fmt::Display for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Constructed => "constructed",
            Self::Initializing => "initializing",
            Self::Serving => "serving",
            Self::ShuttingDown => "shutting_down",
            Self::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// Startup and shutdown hooks for a server with an embedded API client.
///
/// Both hooks default to no-ops.
#[async_trait]
pub trait ServerHooks: Send + Sync {
    /// Probe the upstream once during startup. A failure is logged, not fatal.
    async fn test_connection(&self, _client: &ApiClient) -> ApiResult<()> {
        Ok(())
    }

    /// Release resources on shutdown.
    async fn cleanup(&self) {}
}

struct DefaultHooks;

impl ServerHooks for DefaultHooks {}

struct ServerInner {
    name: String,
    version: String,
    instructions: Option<String>,
    api_client: Option<Arc<ApiClient>>,
    hooks: Arc<dyn ServerHooks>,
    plugins: Vec<Arc<dyn Plugin>>,
    tools: RwLock<ToolSurface>,
    state: RwLock<ServerState>,
    auth: AuthGate,
}

/// The main MCP server handler.
///
/// Cheap to clone; every clone shares the same state and tool surface.
#[derive(Clone)]
pub struct McpServer {
    inner: Arc<ServerInner>,
}

/// Builder for [`McpServer`].
pub struct ServerBuilder {
    name: String,
    version: String,
    instructions: Option<String>,
    api_key: Option<String>,
    config_api_key: Option<String>,
    auth_required: Option<bool>,
    config_auth_required: bool,
    test_mode: Option<bool>,
    config_test_mode: bool,
    api_client: Option<Arc<ApiClient>>,
    hooks: Arc<dyn ServerHooks>,
    plugins: Vec<Arc<dyn Plugin>>,
    tools: ToolSurface,
}

impl ServerBuilder {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            instructions: None,
            api_key: None,
            config_api_key: None,
            auth_required: None,
            config_auth_required: true,
            test_mode: None,
            config_test_mode: false,
            api_client: None,
            hooks: Arc::new(DefaultHooks),
            plugins: Vec::new(),
            tools: ToolSurface::new(),
        }
    }

    /// Apply loaded configuration: name override, version and auth section.
    ///
    /// Values set explicitly on the builder still win over the configured ones.
    pub fn with_config(mut self, config: &Config) -> Self {
        if let Some(name) = &config.server.name {
            self.name = name.clone();
        }
        self.version = config.server.version.clone();
        self.config_api_key = config.auth.api_key.clone();
        self.config_auth_required = config.auth.auth_required;
        self.config_test_mode = config.auth.test_mode;
        self
    }

    /// Key clients must present as `Authorization: Bearer <key>`.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Request authentication. Ignored when no key is configured.
    pub fn auth_required(mut self, required: bool) -> Self {
        self.auth_required = Some(required);
        self
    }

    pub fn test_mode(mut self, enabled: bool) -> Self {
        self.test_mode = Some(enabled);
        self
    }

    pub fn instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    /// Embed a single upstream client.
    pub fn api_client(mut self, client: ApiClient) -> Self {
        self.api_client = Some(Arc::new(client));
        self
    }

    pub fn hooks(mut self, hooks: impl ServerHooks + 'static) -> Self {
        self.hooks = Arc::new(hooks);
        self
    }

    /// Register a provider's tools now.
    pub fn tools(mut self, provider: &dyn ToolProvider) -> Self {
        provider.register_tools(&mut self.tools);
        self
    }

    /// Register one tool now.
    pub fn tool(mut self, category: &str, tool: Tool, handler: ToolHandler) -> Self {
        self.tools.register_in(category, tool, handler);
        self
    }

    /// Add a plugin. Its tools are registered when the server starts.
    pub fn plugin(mut self, plugin: impl Plugin + 'static) -> Self {
        self.plugins.push(Arc::new(plugin));
        self
    }

    pub fn build(self) -> McpServer {
        let api_key = self.api_key.or(self.config_api_key);
        let auth = AuthGate::new(
            api_key,
            self.auth_required.unwrap_or(self.config_auth_required),
            self.test_mode.unwrap_or(self.config_test_mode),
        );
        if !auth.is_required() {
            debug!("Inbound authentication disabled");
        }

        McpServer {
            inner: Arc::new(ServerInner {
                name: self.name,
                version: self.version,
                instructions: self.instructions,
                api_client: self.api_client,
                hooks: self.hooks,
                plugins: self.plugins,
                tools: RwLock::new(self.tools),
                state: RwLock::new(ServerState::Constructed),
                auth,
            }),
        }
    }
}

impl McpServer {
    pub fn builder(name: impl Into<String>) -> ServerBuilder {
        ServerBuilder::new(name)
    }

    /// Get the server name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Get the server version.
    pub fn version(&self) -> &str {
        &self.inner.version
    }

    pub fn api_client(&self) -> Option<&ApiClient> {
        self.inner.api_client.as_deref()
    }

    pub fn has_api_client(&self) -> bool {
        self.inner.api_client.is_some()
    }

    /// Plugin names in the order they were added.
    pub fn plugin_names(&self) -> Vec<&str> {
        self.inner.plugins.iter().map(|p| p.name()).collect()
    }

    pub fn auth_gate(&self) -> &AuthGate {
        &self.inner.auth
    }

    pub async fn state(&self) -> ServerState {
        *self.inner.state.read().await
    }

    async fn set_state(&self, state: ServerState) {
        debug!("Server state -> {}", state);
        *self.inner.state.write().await = state;
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Run the startup sequence.
    ///
    /// Calling this again after the first call is a no-op.
    #[instrument(skip(self), fields(server = %self.inner.name))]
    pub async fn start(&self) -> Result<()> {
        {
            let mut state = self.inner.state.write().await;
            if *state != ServerState::Constructed {
                debug!("Start requested in state {}, ignoring", *state);
                return Ok(());
            }
            *state = ServerState::Initializing;
        }

        if let Some(client) = &self.inner.api_client {
            match self.inner.hooks.test_connection(client).await {
                Ok(()) => info!("Upstream connection OK ({})", client.base_url()),
                Err(e) => warn!("Upstream connection test failed: {}", e),
            }
        }

        for plugin in &self.inner.plugins {
            info!("Initializing plugin: {}", plugin.name());
            if let Err(e) = plugin.initialize().await {
                error!("Plugin {} failed to initialize: {}", plugin.name(), e);
                self.set_state(ServerState::Stopped).await;
                return Err(e.into());
            }
            let mut tools = self.inner.tools.write().await;
            plugin.register_tools(&mut tools);
        }

        self.set_state(ServerState::Serving).await;
        info!(
            "{} v{} ready with {} tools",
            self.inner.name,
            self.inner.version,
            self.inner.tools.read().await.len()
        );
        Ok(())
    }

    /// Run the shutdown sequence. Cleanup errors are logged, not returned.
    #[instrument(skip(self), fields(server = %self.inner.name))]
    pub async fn shutdown(&self) {
        {
            let mut state = self.inner.state.write().await;
            if *state != ServerState::Serving {
                *state = ServerState::Stopped;
                return;
            }
            *state = ServerState::ShuttingDown;
        }

        info!("Shutting down");
        self.inner.hooks.cleanup().await;
        for plugin in &self.inner.plugins {
            if let Err(e) = plugin.cleanup().await {
                warn!("Plugin {} cleanup failed: {}", plugin.name(), e);
            }
        }

        self.set_state(ServerState::Stopped).await;
    }

    // ========================================================================
    // Dispatch (shared by all transports)
    // ========================================================================

    /// All registered tools in registration order.
    pub async fn list_tools(&self) -> Vec<Tool> {
        self.inner.tools.read().await.list()
    }

    /// Category of a registered tool.
    pub async fn tool_category(&self, name: &str) -> Option<String> {
        self.inner
            .tools
            .read()
            .await
            .registry()
            .category_of(name)
            .map(str::to_string)
    }

    /// Invoke a tool by name.
    #[instrument(skip(self, arguments), fields(tool = %name))]
    pub async fn dispatch(
        &self,
        name: &str,
        arguments: Option<JsonObject>,
    ) -> std::result::Result<CallToolResult, McpError> {
        let handler = self.inner.tools.read().await.handler(name);
        let outcome = match handler {
            Some(handler) => {
                info!("Calling tool: {}", name);
                handler(arguments.unwrap_or_default()).await
            }
            None => {
                warn!("Unknown tool: {}", name);
                Err(ToolError::not_found(name))
            }
        };
        into_call_result(outcome)
    }

    /// Liveness body for `GET /health`.
    pub fn health(&self) -> Value {
        json!({
            "status": "healthy",
            "server": self.inner.name,
            "has_api_client": self.has_api_client(),
            "plugins": self.plugin_names(),
        })
    }
}

impl ServerHandler for McpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: self.inner.instructions.clone(),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: self.inner.name.clone(),
                version: self.inner.version.clone(),
                ..Implementation::default()
            },
            ..Default::default()
        }
    }

    #[instrument(skip(self, _context))]
    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> std::result::Result<ListToolsResult, McpError> {
        info!("Listing tools");
        Ok(ListToolsResult {
            tools: McpServer::list_tools(self).await,
            next_cursor: None,
            meta: None,
        })
    }

    #[instrument(skip(self, _context))]
    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> std::result::Result<CallToolResult, McpError> {
        self.dispatch(&request.name, request.arguments).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ApiError;
    use crate::domains::plugins::{Lifecycle, PluginConfig, PluginError, PluginResult};
    use crate::domains::tools::typed_tool;
    use schemars::JsonSchema;
    use serde::Deserialize;
    use std::sync::Mutex;

    type Events = Arc<Mutex<Vec<String>>>;

    #[derive(Deserialize, JsonSchema)]
    struct Empty {}

    struct RecordingPlugin {
        name: &'static str,
        tool: &'static str,
        authenticates: bool,
        config: PluginConfig,
        events: Events,
    }

    impl RecordingPlugin {
        fn new(name: &'static str, tool: &'static str, authenticates: bool, events: &Events) -> Self {
            Self {
                name,
                tool,
                authenticates,
                config: PluginConfig::new(),
                events: events.clone(),
            }
        }

        fn record(&self, event: &str) {
            self.events
                .lock()
                .unwrap()
                .push(format!("{}:{}", event, self.name));
        }
    }

    #[async_trait]
    impl Lifecycle for RecordingPlugin {
        async fn initialize(&self) -> PluginResult<()> {
            self.record("initialize");
            if !self.authenticate().await {
                return Err(PluginError::authentication(self.name));
            }
            Ok(())
        }

        async fn cleanup(&self) -> PluginResult<()> {
            self.record("cleanup");
            Ok(())
        }
    }

    impl ToolProvider for RecordingPlugin {
        fn register_tools(&self, surface: &mut ToolSurface) {
            self.record("register");
            let plugin = self.name;
            let (tool, handler) = typed_tool(self.tool, "Test tool", move |_: Empty| async move {
                Ok::<_, ToolError>(json!({ "plugin": plugin }))
            });
            surface.register_in(self.name, tool, handler);
        }
    }

    #[async_trait]
    impl Plugin for RecordingPlugin {
        fn name(&self) -> &str {
            self.name
        }

        fn config(&self) -> &PluginConfig {
            &self.config
        }

        async fn authenticate(&self) -> bool {
            self.authenticates
        }
    }

    fn events() -> Events {
        Arc::new(Mutex::new(Vec::new()))
    }

    fn recorded(events: &Events) -> Vec<String> {
        events.lock().unwrap().clone()
    }

    #[tokio::test]
    async fn test_plugins_initialize_in_order() {
        let events = events();
        let server = McpServer::builder("test")
            .plugin(RecordingPlugin::new("a", "tool_a", true, &events))
            .plugin(RecordingPlugin::new("b", "tool_b", true, &events))
            .build();

        assert_eq!(server.state().await, ServerState::Constructed);
        assert!(server.list_tools().await.is_empty());

        server.start().await.unwrap();
        assert_eq!(server.state().await, ServerState::Serving);
        assert_eq!(
            recorded(&events),
            vec!["initialize:a", "register:a", "initialize:b", "register:b"]
        );

        let names: Vec<String> = server
            .list_tools()
            .await
            .into_iter()
            .map(|t| t.name.to_string())
            .collect();
        assert_eq!(names, vec!["tool_a", "tool_b"]);
        assert_eq!(server.tool_category("tool_b").await.as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn test_failed_plugin_aborts_startup() {
        let events = events();
        let server = McpServer::builder("test")
            .plugin(RecordingPlugin::new("a", "tool_a", false, &events))
            .plugin(RecordingPlugin::new("b", "tool_b", true, &events))
            .build();

        let err = server.start().await.unwrap_err();
        assert!(err.to_string().contains("Failed to authenticate with a"));
        assert_eq!(recorded(&events), vec!["initialize:a"]);
        assert_eq!(server.state().await, ServerState::Stopped);
        assert!(server.list_tools().await.is_empty());
    }

    #[tokio::test]
    async fn test_start_is_idempotent() {
        let events = events();
        let server = McpServer::builder("test")
            .plugin(RecordingPlugin::new("a", "tool_a", true, &events))
            .build();

        server.start().await.unwrap();
        server.start().await.unwrap();
        assert_eq!(recorded(&events), vec!["initialize:a", "register:a"]);
        assert_eq!(server.list_tools().await.len(), 1);
    }

    #[tokio::test]
    async fn test_shutdown_runs_cleanup() {
        let events = events();
        let server = McpServer::builder("test")
            .plugin(RecordingPlugin::new("a", "tool_a", true, &events))
            .plugin(RecordingPlugin::new("b", "tool_b", true, &events))
            .build();

        server.start().await.unwrap();
        server.shutdown().await;
        assert_eq!(server.state().await, ServerState::Stopped);
        let events = recorded(&events);
        assert_eq!(&events[4..], &["cleanup:a", "cleanup:b"]);
    }

    struct RecordingHooks {
        events: Events,
    }

    #[async_trait]
    impl ServerHooks for RecordingHooks {
        async fn cleanup(&self) {
            self.events.lock().unwrap().push("cleanup:hooks".to_string());
        }
    }

    #[tokio::test]
    async fn test_hook_cleanup_runs_before_plugins() {
        let events = events();
        let server = McpServer::builder("test")
            .hooks(RecordingHooks {
                events: events.clone(),
            })
            .plugin(RecordingPlugin::new("a", "tool_a", true, &events))
            .build();

        server.start().await.unwrap();
        server.shutdown().await;
        let events = recorded(&events);
        assert_eq!(&events[2..], &["cleanup:hooks", "cleanup:a"]);
    }

    #[tokio::test]
    async fn test_eager_tools_and_dispatch() {
        let events = events();
        let provider = RecordingPlugin::new("eager", "eager_tool", true, &events);
        let server = McpServer::builder("test").tools(&provider).build();

        assert_eq!(server.list_tools().await.len(), 1);

        let result = server.dispatch("eager_tool", None).await.unwrap();
        assert_eq!(result.is_error, Some(false));
        assert_eq!(result.structured_content, Some(json!({"plugin": "eager"})));

        let err = server.dispatch("missing", None).await.unwrap_err();
        assert!(err.message.contains("missing"));
    }

    #[tokio::test]
    async fn test_tool_failure_is_error_result() {
        let (tool, handler) = typed_tool("boom", "Always fails", |_: Empty| async {
            Err::<Value, _>(ToolError::from(ApiError::request("connection refused")))
        });
        let server = McpServer::builder("test").tool("misc", tool, handler).build();

        let result = server.dispatch("boom", None).await.unwrap();
        assert_eq!(result.is_error, Some(true));
    }

    struct FailingProbe;

    #[async_trait]
    impl ServerHooks for FailingProbe {
        async fn test_connection(&self, _client: &ApiClient) -> ApiResult<()> {
            Err(ApiError::request("unreachable"))
        }
    }

    #[tokio::test]
    async fn test_connection_failure_is_not_fatal() {
        let client = ApiClient::builder("http://127.0.0.1:9").build().unwrap();
        let server = McpServer::builder("test")
            .api_client(client)
            .hooks(FailingProbe)
            .build();

        server.start().await.unwrap();
        assert_eq!(server.state().await, ServerState::Serving);
        assert!(server.has_api_client());
    }

    #[test]
    fn test_explicit_api_key_wins_over_config() {
        let mut config = Config::default();
        config.auth.api_key = Some("from-env".to_string());

        let server = McpServer::builder("test")
            .api_key("explicit")
            .with_config(&config)
            .build();
        assert!(server.auth_gate().check("/mcp/", Some("Bearer explicit")).is_ok());
        assert!(server.auth_gate().check("/mcp/", Some("Bearer from-env")).is_err());

        let server = McpServer::builder("test").with_config(&config).build();
        assert!(server.auth_gate().check("/mcp/", Some("Bearer from-env")).is_ok());
    }

    #[test]
    fn test_explicit_auth_flags_win_over_config() {
        let mut config = Config::default();
        config.auth.api_key = Some("secret".to_string());
        config.auth.auth_required = true;
        config.auth.test_mode = false;

        let server = McpServer::builder("test")
            .auth_required(false)
            .with_config(&config)
            .build();
        assert!(!server.auth_gate().is_required());

        let server = McpServer::builder("test")
            .test_mode(true)
            .with_config(&config)
            .build();
        assert!(server.auth_gate().check("/mcp/", None).is_ok());

        let server = McpServer::builder("test").with_config(&config).build();
        assert!(server.auth_gate().is_required());
        assert!(server.auth_gate().check("/mcp/", None).is_err());
    }

    #[test]
    fn test_health_body() {
        let events = events();
        let server = McpServer::builder("crm")
            .plugin(RecordingPlugin::new("Capsule CRM", "t", true, &events))
            .build();
        assert_eq!(
            server.health(),
            json!({
                "status": "healthy",
                "server": "crm",
                "has_api_client": false,
                "plugins": ["Capsule CRM"]
            })
        );
    }

    #[test]
    fn test_server_info() {
        let server = McpServer::builder("crm").instructions("Query the CRM").build();
        let info = server.get_info();
        assert_eq!(info.server_info.name, "crm");
        assert_eq!(info.instructions.as_deref(), Some("Query the CRM"));
        assert!(info.capabilities.tools.is_some());
    }
}
