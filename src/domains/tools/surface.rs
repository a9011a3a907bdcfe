//! Tool dispatch surface.
//!
//! The surface is the single place tools are registered against. Each entry
//! pairs an rmcp [`Tool`] (name, description, input schema derived once at
//! registration) with a boxed async handler. Both the STDIO handler and the
//! HTTP JSON-RPC endpoint dispatch through it.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use rmcp::{
    ErrorData as McpError,
    handler::server::tool::cached_schema_for_type,
    model::{CallToolResult, Content, JsonObject, Tool},
};
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use super::error::ToolError;
use super::registry::ToolRegistry;

/// Future returned by a tool handler.
pub type ToolFuture = BoxFuture<'static, Result<Value, ToolError>>;

/// Type-erased tool handler taking the raw argument object.
pub type ToolHandler = Arc<dyn Fn(JsonObject) -> ToolFuture + Send + Sync>;

/// Build a tool definition and handler from a typed parameter struct.
///
/// The input schema is derived from `P` once here; at call time the
/// argument object is deserialized into `P` before `handler` runs.
pub fn typed_tool<P, F, Fut>(
    name: &'static str,
    description: &'static str,
    handler: F,
) -> (Tool, ToolHandler)
where
    P: DeserializeOwned + JsonSchema + Send + 'static,
    F: Fn(P) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, ToolError>> + Send + 'static,
{
    let tool = Tool::new(name, description, cached_schema_for_type::<P>());
    let handler: ToolHandler = Arc::new(move |args: JsonObject| {
        match serde_json::from_value::<P>(Value::Object(args)) {
            Ok(params) => handler(params).boxed(),
            Err(e) => futures::future::ready(Err(ToolError::invalid_arguments(e.to_string()))).boxed(),
        }
    });
    (tool, handler)
}

struct RegisteredTool {
    tool: Tool,
    handler: ToolHandler,
}

/// Ordered set of registered tools.
#[derive(Default)]
pub struct ToolSurface {
    tools: Vec<RegisteredTool>,
    index: HashMap<String, usize>,
    registry: ToolRegistry,
}

impl ToolSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. A tool with the same name is replaced in place.
    pub fn register(&mut self, tool: Tool, handler: ToolHandler) {
        let name = tool.name.to_string();
        match self.index.get(&name) {
            Some(&position) => {
                warn!("Tool '{}' registered twice, replacing previous handler", name);
                self.tools[position] = RegisteredTool { tool, handler };
            }
            None => {
                debug!("Registered tool '{}'", name);
                self.index.insert(name, self.tools.len());
                self.tools.push(RegisteredTool { tool, handler });
            }
        }
    }

    /// Register a tool and record it under `category` in the registry.
    pub fn register_in(&mut self, category: &str, tool: Tool, handler: ToolHandler) {
        self.registry
            .register_tool(category, tool.name.as_ref(), handler.clone());
        self.register(tool, handler);
    }

    /// Tool definitions in registration order.
    pub fn list(&self) -> Vec<Tool> {
        self.tools.iter().map(|t| t.tool.clone()).collect()
    }

    /// Tool names in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.tool.name.as_ref()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Handler for `name`, cloned out so the caller can drop any lock first.
    pub fn handler(&self, name: &str) -> Option<ToolHandler> {
        self.index
            .get(name)
            .map(|&position| self.tools[position].handler.clone())
    }

    /// Category bookkeeping for the registered tools.
    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }
}

/// Convert a handler outcome into an MCP tool result.
///
/// Caller mistakes (unknown tool, bad arguments) become protocol errors;
/// execution and upstream failures become a result with `isError: true`.
pub fn into_call_result(outcome: Result<Value, ToolError>) -> Result<CallToolResult, McpError> {
    match outcome {
        Ok(value) => {
            let text = serde_json::to_string_pretty(&value)
                .map_err(|e| McpError::internal_error(e.to_string(), None))?;
            Ok(CallToolResult {
                content: vec![Content::text(text)],
                structured_content: value.is_object().then_some(value),
                is_error: Some(false),
                meta: None,
            })
        }
        Err(e) if e.is_request_error() => Err(McpError::invalid_params(e.to_string(), None)),
        Err(e) => {
            warn!("Tool execution failed: {}", e);
            Ok(CallToolResult::error(vec![Content::text(e.to_string())]))
        }
    }
}
